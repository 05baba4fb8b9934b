//! HelmRelease document model

use serde::Deserialize;
use serde_json::Value as JsonValue;

use fluxpand_core::docmeta;

use crate::error::{ExpandError, Result};

/// A `helm.toolkit.fluxcd.io/HelmRelease` object from the input stream
#[derive(Debug, Clone)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: String,
    pub spec: HelmReleaseSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    #[serde(default)]
    pub chart: ChartTemplate,

    /// Free-form user values
    #[serde(default)]
    pub values: Option<JsonValue>,

    #[serde(default)]
    pub target_namespace: Option<String>,

    #[serde(default)]
    pub release_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartTemplate {
    #[serde(default)]
    pub spec: ChartSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    /// Chart name (HTTP/OCI) or path within the repository (Git)
    #[serde(default)]
    pub chart: String,

    /// Version constraint
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub source_ref: SourceRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub api_version: Option<String>,
}

impl HelmRelease {
    /// Decode a HelmRelease from a parsed document
    pub fn from_value(doc: &serde_yaml::Value) -> Result<Self> {
        let name = docmeta::name(doc).to_string();
        let namespace = docmeta::namespace(doc).to_string();

        let invalid = |message: String| ExpandError::InvalidRelease {
            namespace: namespace.clone(),
            name: name.clone(),
            message,
        };

        let spec_value = doc.get("spec").cloned().unwrap_or(serde_yaml::Value::Null);
        let spec: HelmReleaseSpec =
            serde_yaml::from_value(spec_value).map_err(|e| invalid(e.to_string()))?;

        if spec.chart.spec.chart.is_empty() {
            return Err(invalid("missing spec.chart.spec.chart".to_string()));
        }
        if spec.chart.spec.source_ref.kind.is_empty() || spec.chart.spec.source_ref.name.is_empty()
        {
            return Err(invalid("missing spec.chart.spec.sourceRef".to_string()));
        }

        Ok(Self {
            name,
            namespace,
            spec,
        })
    }

    /// `namespace/name` for error messages
    pub fn identity(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// User values, empty when unset
    pub fn values(&self) -> JsonValue {
        self.spec
            .values
            .clone()
            .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()))
    }

    /// Target namespace: explicit, else the release's own namespace
    pub fn target_namespace(&self) -> &str {
        self.spec
            .target_namespace
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.namespace)
    }

    /// Release name: explicit, else `<target-namespace>-<metadata name>`
    pub fn release_name(&self) -> String {
        match self
            .spec
            .release_name
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            Some(name) => name.to_string(),
            None => format!("{}-{}", self.target_namespace(), self.name),
        }
    }

    /// Namespace the referenced repository is looked up in
    pub fn source_ref_namespace(&self) -> &str {
        self.spec
            .chart
            .spec
            .source_ref
            .namespace
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn release(yaml: &str) -> Result<HelmRelease> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        HelmRelease::from_value(&value)
    }

    const BASIC: &str = r#"
apiVersion: helm.toolkit.fluxcd.io/v2beta2
kind: HelmRelease
metadata:
  namespace: testns
  name: test
spec:
  chart:
    spec:
      chart: test-chart
      version: ">=0.1.0"
      sourceRef:
        kind: HelmRepository
        name: local
  values:
    data:
      foo: baz
"#;

    #[test]
    fn test_decode_basic() {
        let release = release(BASIC).unwrap();
        assert_eq!(release.identity(), "testns/test");
        assert_eq!(release.spec.chart.spec.chart, "test-chart");
        assert_eq!(release.spec.chart.spec.version, ">=0.1.0");
        assert_eq!(release.spec.chart.spec.source_ref.kind, "HelmRepository");
        assert_eq!(release.values(), json!({"data": {"foo": "baz"}}));
    }

    #[test]
    fn test_identity_defaults() {
        let release = release(BASIC).unwrap();
        assert_eq!(release.target_namespace(), "testns");
        assert_eq!(release.release_name(), "testns-test");
        assert_eq!(release.source_ref_namespace(), "testns");
    }

    #[test]
    fn test_explicit_identity() {
        let release = release(
            r#"
kind: HelmRelease
apiVersion: helm.toolkit.fluxcd.io/v2beta2
metadata: {namespace: testns, name: test}
spec:
  targetNamespace: otherns
  releaseName: my-release
  chart:
    spec:
      chart: test-chart
      sourceRef: {kind: HelmRepository, name: local, namespace: repons}
"#,
        )
        .unwrap();

        assert_eq!(release.target_namespace(), "otherns");
        assert_eq!(release.release_name(), "my-release");
        assert_eq!(release.source_ref_namespace(), "repons");
    }

    #[test]
    fn test_target_namespace_feeds_default_name() {
        let release = release(
            r#"
kind: HelmRelease
apiVersion: helm.toolkit.fluxcd.io/v2beta2
metadata: {namespace: testns, name: test}
spec:
  targetNamespace: otherns
  chart:
    spec:
      chart: test-chart
      sourceRef: {kind: HelmRepository, name: local}
"#,
        )
        .unwrap();
        assert_eq!(release.release_name(), "otherns-test");
    }

    #[test]
    fn test_missing_chart_is_fatal() {
        let err = release(
            r#"
kind: HelmRelease
apiVersion: helm.toolkit.fluxcd.io/v2beta2
metadata: {namespace: testns, name: test}
spec:
  chart:
    spec:
      sourceRef: {kind: HelmRepository, name: local}
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("testns/test"));
        assert!(err.to_string().contains("spec.chart.spec.chart"));
    }

    #[test]
    fn test_missing_source_ref_is_fatal() {
        let err = release(
            r#"
kind: HelmRelease
apiVersion: helm.toolkit.fluxcd.io/v2beta2
metadata: {namespace: testns, name: test}
spec:
  chart:
    spec:
      chart: test-chart
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sourceRef"));
    }
}
