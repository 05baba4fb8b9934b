//! Repository document model
//!
//! The pipeline hands each loader the source document a `HelmRelease`
//! references: `HelmRepository`, `GitRepository`, or `OCIRepository` from the
//! `source.toolkit.fluxcd.io` group.

use serde::Deserialize;
use std::time::Duration;

use fluxpand_core::docmeta;

use crate::error::{RepoError, Result};

/// A parsed repository document
#[derive(Debug, Clone)]
pub struct RepositoryDocument {
    pub kind: String,
    pub api_version: String,
    pub name: String,
    pub namespace: String,
    pub spec: RepositorySpec,
}

/// Typed `spec` of a repository document
#[derive(Debug, Clone)]
pub enum RepositorySpec {
    Helm(HelmRepositorySpec),
    Git(GitRepositorySpec),
    Oci(OciRepositorySpec),
}

/// `HelmRepository.spec`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRepositorySpec {
    pub url: String,

    /// Subtype discriminator; `oci` routes to the OCI loader
    #[serde(default, rename = "type")]
    pub repo_type: Option<String>,
}

/// `GitRepository.spec`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    pub url: String,

    #[serde(default, rename = "ref")]
    pub reference: Option<GitReference>,

    /// Clone timeout, e.g. `90s`
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
}

/// `GitRepository.spec.ref`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitReference {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub semver: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
}

impl GitReference {
    /// True when no checkout target is specified at all
    pub fn is_unspecified(&self) -> bool {
        self.branch.is_none()
            && self.tag.is_none()
            && self.semver.is_none()
            && self.name.is_none()
            && self.commit.is_none()
    }
}

/// `OCIRepository.spec`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciRepositorySpec {
    pub url: String,
}

impl RepositoryDocument {
    /// Parse a repository document from a YAML value
    pub fn from_value(doc: &serde_yaml::Value) -> Result<Self> {
        let kind = docmeta::kind(doc).to_string();
        let api_version = docmeta::api_version(doc).to_string();
        let name = docmeta::name(doc).to_string();
        let namespace = docmeta::namespace(doc).to_string();

        let spec_value = doc
            .get("spec")
            .cloned()
            .unwrap_or(serde_yaml::Value::Null);
        let decode = |message: serde_yaml::Error| RepoError::InvalidDocument {
            message: format!("{} {}/{}: {}", kind, namespace, name, message),
        };

        let spec = match kind.as_str() {
            "HelmRepository" => {
                RepositorySpec::Helm(serde_yaml::from_value(spec_value).map_err(decode)?)
            }
            "GitRepository" => {
                RepositorySpec::Git(serde_yaml::from_value(spec_value).map_err(decode)?)
            }
            "OCIRepository" => {
                RepositorySpec::Oci(serde_yaml::from_value(spec_value).map_err(decode)?)
            }
            _ => {
                return Err(RepoError::UnknownRepositoryKind {
                    kind,
                    namespace,
                    name,
                });
            }
        };

        Ok(Self {
            kind,
            api_version,
            name,
            namespace,
            spec,
        })
    }

    /// `kind namespace/name` for error messages
    pub fn identity(&self) -> String {
        format!("{} {}/{}", self.kind, self.namespace, self.name)
    }

    /// Repository URL regardless of spec flavor
    pub fn url(&self) -> &str {
        match &self.spec {
            RepositorySpec::Helm(spec) => &spec.url,
            RepositorySpec::Git(spec) => &spec.url,
            RepositorySpec::Oci(spec) => &spec.url,
        }
    }

    pub fn git_spec(&self) -> Result<&GitRepositorySpec> {
        match &self.spec {
            RepositorySpec::Git(spec) => Ok(spec),
            _ => Err(RepoError::InvalidDocument {
                message: format!("{} is not a GitRepository", self.identity()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<RepositoryDocument> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        RepositoryDocument::from_value(&value)
    }

    #[test]
    fn test_helm_repository() {
        let doc = parse(
            r#"
apiVersion: source.toolkit.fluxcd.io/v1beta2
kind: HelmRepository
metadata:
  namespace: testns
  name: local
spec:
  url: http://localhost:8080
"#,
        )
        .unwrap();

        assert_eq!(doc.kind, "HelmRepository");
        assert_eq!(doc.identity(), "HelmRepository testns/local");
        assert_eq!(doc.url(), "http://localhost:8080");
        match &doc.spec {
            RepositorySpec::Helm(spec) => assert!(spec.repo_type.is_none()),
            other => panic!("unexpected spec: {:?}", other),
        }
    }

    #[test]
    fn test_helm_repository_oci_subtype() {
        let doc = parse(
            r#"
kind: HelmRepository
apiVersion: source.toolkit.fluxcd.io/v1beta2
metadata: {namespace: ns, name: reg}
spec:
  url: oci://ghcr.io/org/charts
  type: oci
"#,
        )
        .unwrap();
        match &doc.spec {
            RepositorySpec::Helm(spec) => assert_eq!(spec.repo_type.as_deref(), Some("oci")),
            other => panic!("unexpected spec: {:?}", other),
        }
    }

    #[test]
    fn test_git_repository_with_reference_and_timeout() {
        let doc = parse(
            r#"
kind: GitRepository
apiVersion: source.toolkit.fluxcd.io/v1
metadata: {namespace: ns, name: repo}
spec:
  url: ssh://git@localhost/dummy.git
  timeout: 90s
  ref:
    branch: main
"#,
        )
        .unwrap();

        let spec = doc.git_spec().unwrap();
        assert_eq!(spec.timeout, Some(Duration::from_secs(90)));
        let reference = spec.reference.as_ref().unwrap();
        assert_eq!(reference.branch.as_deref(), Some("main"));
        assert!(!reference.is_unspecified());
    }

    #[test]
    fn test_git_reference_unspecified() {
        let reference = GitReference::default();
        assert!(reference.is_unspecified());
    }

    #[test]
    fn test_unknown_kind() {
        let err = parse(
            r#"
kind: ConfigMap
apiVersion: v1
metadata: {namespace: ns, name: cm}
"#,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("unknown kind ConfigMap for repository ns/cm"));
    }
}
