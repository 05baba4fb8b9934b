//! Accessors over parsed YAML documents
//!
//! The pipeline and the repository loaders both inspect manifests as plain
//! `serde_yaml::Value` trees; these helpers keep the path digging in one
//! place.

use serde_yaml::Value;

/// Walk a field path into a mapping document
pub fn get_by_path<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = doc;
    for field in path {
        current = current.get(field)?;
    }
    Some(current)
}

/// Get a string field by path
pub fn get_str<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a str> {
    get_by_path(doc, path).and_then(Value::as_str)
}

/// Get a string field by path, with a default
pub fn get_str_or<'a>(doc: &'a Value, path: &[&str], default: &'a str) -> &'a str {
    get_str(doc, path).unwrap_or(default)
}

/// `kind` of the document, empty if missing
pub fn kind(doc: &Value) -> &str {
    get_str_or(doc, &["kind"], "")
}

/// `apiVersion` of the document, empty if missing
pub fn api_version(doc: &Value) -> &str {
    get_str_or(doc, &["apiVersion"], "")
}

/// API group of the document: the part of `apiVersion` before the slash
///
/// Core-group documents (`apiVersion: v1`) have an empty group.
pub fn group(doc: &Value) -> &str {
    let api_version = api_version(doc);
    match api_version.split_once('/') {
        Some((group, _)) => group,
        None => "",
    }
}

/// `metadata.name`, empty if missing
pub fn name(doc: &Value) -> &str {
    get_str_or(doc, &["metadata", "name"], "")
}

/// `metadata.namespace`, empty if missing
pub fn namespace(doc: &Value) -> &str {
    get_str_or(doc, &["metadata", "namespace"], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_group_kind() {
        let release = doc(
            r#"
apiVersion: helm.toolkit.fluxcd.io/v2beta2
kind: HelmRelease
metadata:
  namespace: testns
  name: test
"#,
        );

        assert_eq!(kind(&release), "HelmRelease");
        assert_eq!(group(&release), "helm.toolkit.fluxcd.io");
        assert_eq!(api_version(&release), "helm.toolkit.fluxcd.io/v2beta2");
        assert_eq!(name(&release), "test");
        assert_eq!(namespace(&release), "testns");
    }

    #[test]
    fn test_core_group_is_empty() {
        let configmap = doc("apiVersion: v1\nkind: ConfigMap\n");
        assert_eq!(group(&configmap), "");
        assert_eq!(kind(&configmap), "ConfigMap");
    }

    #[test]
    fn test_missing_fields_default_empty() {
        let empty = doc("{}");
        assert_eq!(kind(&empty), "");
        assert_eq!(name(&empty), "");
        assert_eq!(namespace(&empty), "");
    }

    #[test]
    fn test_get_str_path() {
        let release = doc(
            r#"
spec:
  chart:
    spec:
      chart: test-chart
      sourceRef:
        kind: HelmRepository
        name: local
"#,
        );

        assert_eq!(
            get_str(&release, &["spec", "chart", "spec", "chart"]),
            Some("test-chart")
        );
        assert_eq!(
            get_str(&release, &["spec", "chart", "spec", "sourceRef", "kind"]),
            Some("HelmRepository")
        );
        assert_eq!(get_str(&release, &["spec", "missing"]), None);
    }
}
