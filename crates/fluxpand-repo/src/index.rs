//! HTTP chart repository index
//!
//! Helm-compatible `index.yaml` parsing and version selection.

use semver::{Version, VersionReq};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{RepoError, Result};

/// Repository index downloaded from `<repo>/index.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default)]
    pub api_version: String,

    /// Chart entries by name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartEntry>>,
}

/// A chart entry within the index
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Archive download URLs; the first one is used
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 digest of the archive
    #[serde(default)]
    pub digest: Option<String>,
}

impl ChartEntry {
    /// Primary archive URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

impl RepositoryIndex {
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_slice(bytes)
    }

    /// Select the entry for `(name, constraint)`
    ///
    /// An empty constraint selects the highest parseable version. Entries
    /// with unparseable versions are ignored during constrained selection.
    pub fn find(&self, name: &str, constraint: &str, repo_url: &str) -> Result<&ChartEntry> {
        let entries = self.entries.get(name).ok_or_else(|| RepoError::ChartNotFound {
            name: name.to_string(),
            repo: repo_url.to_string(),
        })?;

        let requirement = if constraint.is_empty() {
            None
        } else {
            Some(VersionReq::parse(constraint).map_err(|e| RepoError::InvalidConstraint {
                name: name.to_string(),
                constraint: constraint.to_string(),
                message: e.to_string(),
            })?)
        };

        entries
            .iter()
            .filter_map(|entry| {
                let version = Version::parse(&entry.version).ok()?;
                match &requirement {
                    Some(req) if !req.matches(&version) => None,
                    _ => Some((version, entry)),
                }
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, entry)| entry)
            .ok_or_else(|| RepoError::NoMatchingVersion {
                name: name.to_string(),
                constraint: constraint.to_string(),
                repo: repo_url.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> RepositoryIndex {
        RepositoryIndex::from_yaml(
            r#"
apiVersion: v1
entries:
  test-chart:
    - name: test-chart
      version: "0.1.0"
      urls:
        - test-chart-0.1.0.tgz
      digest: "sha256:abc"
    - name: test-chart
      version: "0.2.0"
      urls:
        - test-chart-0.2.0.tgz
    - name: test-chart
      version: "not-a-version"
      urls:
        - test-chart-bad.tgz
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_find_with_constraint() {
        let index = sample_index();
        let entry = index.find("test-chart", ">=0.1.0", "http://repo/").unwrap();
        assert_eq!(entry.version, "0.2.0");

        let entry = index.find("test-chart", "=0.1.0", "http://repo/").unwrap();
        assert_eq!(entry.version, "0.1.0");
    }

    #[test]
    fn test_find_empty_constraint_takes_highest() {
        let index = sample_index();
        let entry = index.find("test-chart", "", "http://repo/").unwrap();
        assert_eq!(entry.version, "0.2.0");
    }

    #[test]
    fn test_find_unknown_chart() {
        let index = sample_index();
        let err = index.find("missing", "", "http://repo/").unwrap_err();
        assert!(matches!(err, RepoError::ChartNotFound { .. }));
    }

    #[test]
    fn test_find_unsatisfiable() {
        let index = sample_index();
        let err = index.find("test-chart", ">=1.0.0", "http://repo/").unwrap_err();
        assert!(matches!(err, RepoError::NoMatchingVersion { .. }));
    }

    #[test]
    fn test_find_invalid_constraint() {
        let index = sample_index();
        let err = index
            .find("test-chart", "not a constraint", "http://repo/")
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidConstraint { .. }));
    }

    #[test]
    fn test_download_url() {
        let index = sample_index();
        let entry = index.find("test-chart", "=0.1.0", "http://repo/").unwrap();
        assert_eq!(entry.download_url(), Some("test-chart-0.1.0.tgz"));
    }
}
