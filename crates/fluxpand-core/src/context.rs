//! Template rendering context

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chart::ChartMetadata;
use crate::error::{CoreError, Result};

/// Context available to all templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    /// Coalesced values for the chart being rendered
    pub values: JsonValue,

    /// Release information
    pub release: ReleaseInfo,

    /// Chart metadata
    pub chart: ChartInfo,

    /// Cluster capabilities
    pub capabilities: Capabilities,
}

impl TemplateContext {
    pub fn new(values: JsonValue, release: ReleaseInfo, chart: &ChartMetadata) -> Self {
        Self {
            values,
            release,
            chart: ChartInfo::from(chart),
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Derive the context for a subchart: scoped values, same release and
    /// capabilities, the subchart's own metadata.
    pub fn for_subchart(&self, values: JsonValue, chart: &ChartMetadata) -> Self {
        Self {
            values,
            release: self.release.clone(),
            chart: ChartInfo::from(chart),
            capabilities: self.capabilities.clone(),
        }
    }
}

/// Chart information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    pub name: String,
    pub version: String,
    pub app_version: Option<String>,
}

impl From<&ChartMetadata> for ChartInfo {
    fn from(meta: &ChartMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            version: meta.version.clone(),
            app_version: meta.app_version.clone(),
        }
    }
}

/// Release information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    /// Is this an install operation?
    pub is_install: bool,

    /// Is this an upgrade operation?
    pub is_upgrade: bool,

    /// Service identifier
    pub service: String,
}

impl ReleaseInfo {
    /// Release info for a fresh install: revision 1, install flags set
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: "Helm".to_string(),
        }
    }
}

/// Cluster capabilities advertised to templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Kubernetes version
    pub kube_version: KubeVersion,

    /// Available API versions
    pub api_versions: Vec<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            kube_version: KubeVersion::default(),
            api_versions: default_api_versions(),
        }
    }
}

impl Capabilities {
    /// Install a caller-specified Kubernetes version
    pub fn with_kube_version(mut self, version: KubeVersion) -> Self {
        self.kube_version = version;
        self
    }

    /// Add API versions on top of the built-in defaults
    ///
    /// The defaults always remain visible to templates; the caller's entries
    /// are additive.
    pub fn with_api_versions(mut self, versions: &[String]) -> Self {
        for version in versions {
            if !self.api_versions.iter().any(|v| v == version) {
                self.api_versions.push(version.clone());
            }
        }
        self
    }
}

/// Well-known API versions every template can rely on
fn default_api_versions() -> Vec<String> {
    [
        "v1",
        "admissionregistration.k8s.io/v1",
        "apiextensions.k8s.io/v1",
        "apps/v1",
        "autoscaling/v1",
        "autoscaling/v2",
        "batch/v1",
        "certificates.k8s.io/v1",
        "coordination.k8s.io/v1",
        "discovery.k8s.io/v1",
        "events.k8s.io/v1",
        "networking.k8s.io/v1",
        "policy/v1",
        "rbac.authorization.k8s.io/v1",
        "scheduling.k8s.io/v1",
        "storage.k8s.io/v1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Kubernetes version info
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeVersion {
    /// Full version string, e.g. `v1.28.0`
    pub version: String,
    pub major: String,
    pub minor: String,
}

impl Default for KubeVersion {
    fn default() -> Self {
        Self {
            version: "v1.28.0".to_string(),
            major: "1".to_string(),
            minor: "28".to_string(),
        }
    }
}

impl KubeVersion {
    /// Parse a user-supplied version string
    ///
    /// Accepts an optional `v` prefix and one to three numeric components;
    /// missing components are zero-filled, so `1.222` becomes `v1.222.0`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_start_matches('v');
        if trimmed.is_empty() {
            return Err(CoreError::InvalidKubeVersion {
                value: input.to_string(),
            });
        }

        let mut parts = trimmed.split('.');
        let major = parts.next().unwrap_or_default();
        let minor = parts.next().unwrap_or("0");
        let patch = parts.next().unwrap_or("0");

        for part in [major, minor, patch] {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(CoreError::InvalidKubeVersion {
                    value: input.to_string(),
                });
            }
        }
        if parts.next().is_some() {
            return Err(CoreError::InvalidKubeVersion {
                value: input.to_string(),
            });
        }

        Ok(Self {
            version: format!("v{}.{}.{}", major, minor, patch),
            major: major.to_string(),
            minor: minor.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kube_version_parse_partial() {
        let version = KubeVersion::parse("1.222").unwrap();
        assert_eq!(version.version, "v1.222.0");
        assert_eq!(version.major, "1");
        assert_eq!(version.minor, "222");
    }

    #[test]
    fn test_kube_version_parse_full() {
        let version = KubeVersion::parse("v1.28.3").unwrap();
        assert_eq!(version.version, "v1.28.3");
        assert_eq!(version.minor, "28");
    }

    #[test]
    fn test_kube_version_parse_invalid() {
        assert!(KubeVersion::parse("").is_err());
        assert!(KubeVersion::parse("abc").is_err());
        assert!(KubeVersion::parse("1.2.3.4").is_err());
    }

    #[test]
    fn test_capabilities_api_versions_additive() {
        let capabilities =
            Capabilities::default().with_api_versions(&["v2".to_string(), "v1".to_string()]);

        assert!(capabilities.api_versions.iter().any(|v| v == "v2"));
        // Defaults remain available.
        assert!(capabilities.api_versions.iter().any(|v| v == "policy/v1"));
        // No duplicates introduced.
        assert_eq!(
            capabilities.api_versions.iter().filter(|v| *v == "v1").count(),
            1
        );
    }

    #[test]
    fn test_release_info_for_install() {
        let release = ReleaseInfo::for_install("testns-test", "testns");
        assert_eq!(release.revision, 1);
        assert!(release.is_install);
        assert!(!release.is_upgrade);
    }
}
