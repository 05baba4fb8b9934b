//! OCI registry loader
//!
//! Charts stored as OCI artifacts: the chart name extends the repository
//! path, versions are tags. An exact semver constraint is used as the tag
//! directly; anything else goes through tag listing and constraint
//! filtering.

use semver::{Version, VersionReq};
use url::Url;

use fluxpand_core::{load_archive, Chart};

use crate::cache::chart_fingerprint;
use crate::error::{RepoError, Result};
use crate::loader::{load_chart_dependencies, ChartContext, LoaderConfig, RepositoryLoader};
use crate::source::{RepositoryDocument, RepositorySpec};
use crate::transport::RegistryAuth;
use crate::urlnorm::normalize_url;

pub struct OciChartLoader<'a> {
    config: LoaderConfig<'a>,
}

impl<'a> OciChartLoader<'a> {
    pub fn new(config: LoaderConfig<'a>) -> Self {
        Self { config }
    }

    fn repository_url(
        &self,
        repo_doc: Option<&RepositoryDocument>,
        repo_url: Option<&str>,
    ) -> Result<String> {
        match (repo_doc, repo_url) {
            (Some(doc), _) => match &doc.spec {
                RepositorySpec::Oci(spec) => Ok(spec.url.clone()),
                RepositorySpec::Helm(spec) => Ok(spec.url.clone()),
                _ => Err(RepoError::InvalidDocument {
                    message: format!("{} is not an OCI repository", doc.identity()),
                }),
            },
            (None, Some(url)) => Ok(url.to_string()),
            (None, None) => Err(RepoError::InvalidDocument {
                message: "chart load requires a repository document or URL".to_string(),
            }),
        }
    }

    /// Resolve a version constraint to a concrete tag
    ///
    /// Returns the original tag string so registries tagged `v1.2.3` keep
    /// their prefix. Pre-releases are not filtered out; an empty constraint
    /// takes the highest parseable version.
    fn resolve_tag(&self, reference: &str, constraint: &str) -> Result<String> {
        if Version::parse(constraint).is_ok() {
            return Ok(constraint.to_string());
        }

        let requirement = if constraint.is_empty() {
            None
        } else {
            Some(
                VersionReq::parse(constraint).map_err(|e| RepoError::InvalidConstraint {
                    name: reference.to_string(),
                    constraint: constraint.to_string(),
                    message: e.to_string(),
                })?,
            )
        };

        self.config.ctx.check()?;
        let tags = self.config.clients.oci.list_tags(reference)?;
        tags.iter()
            .filter_map(|tag| {
                let version = Version::parse(tag.trim_start_matches('v')).ok()?;
                match &requirement {
                    Some(req) if !req.matches(&version) => None,
                    _ => Some((version, tag.clone())),
                }
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, tag)| tag)
            .ok_or_else(|| RepoError::NoMatchingVersion {
                name: reference.to_string(),
                constraint: constraint.to_string(),
                repo: reference.to_string(),
            })
    }
}

impl RepositoryLoader for OciChartLoader<'_> {
    fn load_repository_chart(
        &self,
        repo_doc: Option<&RepositoryDocument>,
        repo_url: Option<&str>,
        _parent: Option<&ChartContext<'_>>,
        chart_name: &str,
        version: &str,
    ) -> Result<Chart> {
        self.config.ctx.check()?;

        let raw_url = self.repository_url(repo_doc, repo_url)?;
        let normalized = normalize_url(&raw_url)?;
        tracing::debug!(
            repo = %normalized,
            name = chart_name,
            version,
            "loading chart from OCI registry"
        );

        let parsed = Url::parse(&normalized).map_err(|e| RepoError::InvalidRepositoryUrl {
            url: normalized.clone(),
            reason: e.to_string(),
        })?;
        let host = parsed.host_str().ok_or_else(|| RepoError::InvalidRepositoryUrl {
            url: normalized.clone(),
            reason: "missing registry host".to_string(),
        })?;

        let credentials = self.config.credentials.find_for_repo(&parsed)?;
        let auth = RegistryAuth::from_credentials(host, credentials);
        self.config.clients.oci.login(host, &auth)?;

        let reference = format!(
            "{}/{}",
            normalized.trim_start_matches("oci://").trim_end_matches('/'),
            chart_name
        );
        let tag = self.resolve_tag(&reference, version)?;

        let fingerprint = chart_fingerprint(&normalized, chart_name, &tag);
        if let Some(cache) = self.config.cache {
            if let Some(chart) = cache.get(&fingerprint) {
                tracing::debug!(repo = %normalized, name = chart_name, "chart cache hit");
                return Ok(chart);
            }
        }

        self.config.ctx.check()?;
        let archive = self.config.clients.oci.pull(&reference, &tag)?;
        let mut chart = load_archive(&archive[..]).map_err(|e| RepoError::ChartLoad {
            name: chart_name.to_string(),
            version: tag.clone(),
            repo: normalized.clone(),
            source: e,
        })?;

        load_chart_dependencies(self.config, &mut chart, None)?;

        if let Some(cache) = self.config.cache {
            cache.insert(fingerprint, chart.clone());
        }

        tracing::debug!(
            repo = %normalized,
            name = chart_name,
            version = %tag,
            "finished loading chart"
        );
        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ChartCache;
    use crate::credentials::Credentials;
    use crate::transport::{
        CommandGitClientFactory, GetterRegistry, GitClientFactory, OciRegistryClient,
    };
    use fluxpand_core::CancellationToken;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    struct FakeRegistry {
        tags: Vec<String>,
        pulls: Mutex<Vec<(String, String)>>,
        archive: Vec<u8>,
    }

    impl OciRegistryClient for FakeRegistry {
        fn login(&self, _host: &str, _auth: &RegistryAuth) -> Result<()> {
            Ok(())
        }

        fn list_tags(&self, _reference: &str) -> Result<Vec<String>> {
            Ok(self.tags.clone())
        }

        fn pull(&self, reference: &str, tag: &str) -> Result<Vec<u8>> {
            self.pulls
                .lock()
                .unwrap()
                .push((reference.to_string(), tag.to_string()));
            Ok(self.archive.clone())
        }
    }

    fn chart_archive(name: &str, version: &str) -> Vec<u8> {
        use flate2::{write::GzEncoder, Compression};
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let chart_yaml = format!("apiVersion: v2\nname: {}\nversion: {}\n", name, version);
        let files = [
            (format!("{}/Chart.yaml", name), chart_yaml),
            (
                format!("{}/templates/cm.yaml", name),
                "kind: ConfigMap\n".to_string(),
            ),
        ];
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    struct Harness {
        token: CancellationToken,
        credentials: Credentials,
        clients: crate::loader::Clients,
        cache: ChartCache,
    }

    impl Harness {
        fn new(registry: Arc<FakeRegistry>) -> Self {
            Self {
                token: CancellationToken::new(),
                credentials: Credentials::new(),
                clients: crate::loader::Clients {
                    getters: GetterRegistry::new(),
                    git: Arc::new(CommandGitClientFactory) as Arc<dyn GitClientFactory>,
                    oci: registry,
                },
                cache: ChartCache::new(),
            }
        }

        fn config(&self, with_cache: bool) -> LoaderConfig<'_> {
            LoaderConfig {
                ctx: &self.token,
                cache_root: Path::new("/tmp"),
                cache: with_cache.then_some(&self.cache),
                credentials: &self.credentials,
                clients: &self.clients,
            }
        }
    }

    #[test]
    fn test_exact_version_skips_tag_listing() {
        let registry = Arc::new(FakeRegistry {
            tags: vec![],
            pulls: Mutex::new(vec![]),
            archive: chart_archive("app", "1.2.3"),
        });
        let harness = Harness::new(registry.clone());

        let loader = OciChartLoader::new(harness.config(false));
        let chart = loader
            .load_repository_chart(None, Some("oci://ghcr.io/org/charts"), None, "app", "1.2.3")
            .unwrap();

        assert_eq!(chart.name(), "app");
        let pulls = registry.pulls.lock().unwrap();
        assert_eq!(pulls.as_slice(), &[("ghcr.io/org/charts/app".to_string(), "1.2.3".to_string())]);
    }

    #[test]
    fn test_constraint_selects_highest_tag() {
        let registry = Arc::new(FakeRegistry {
            tags: vec![
                "v1.0.0".to_string(),
                "v1.2.0".to_string(),
                "v2.0.0".to_string(),
                "not-a-version".to_string(),
            ],
            pulls: Mutex::new(vec![]),
            archive: chart_archive("app", "1.2.0"),
        });
        let harness = Harness::new(registry.clone());

        let loader = OciChartLoader::new(harness.config(false));
        loader
            .load_repository_chart(None, Some("oci://ghcr.io/org/charts"), None, "app", "^1.0")
            .unwrap();

        // The original tag string is preserved.
        let pulls = registry.pulls.lock().unwrap();
        assert_eq!(pulls[0].1, "v1.2.0");
    }

    #[test]
    fn test_empty_constraint_takes_highest() {
        let registry = Arc::new(FakeRegistry {
            tags: vec!["0.9.0".to_string(), "1.0.0-rc.1".to_string(), "0.8.0".to_string()],
            pulls: Mutex::new(vec![]),
            archive: chart_archive("app", "1.0.0-rc.1"),
        });
        let harness = Harness::new(registry.clone());

        let loader = OciChartLoader::new(harness.config(false));
        loader
            .load_repository_chart(None, Some("oci://ghcr.io/org/charts"), None, "app", "")
            .unwrap();

        // Highest parseable semver wins, pre-release or not.
        let pulls = registry.pulls.lock().unwrap();
        assert_eq!(pulls[0].1, "1.0.0-rc.1");
    }

    #[test]
    fn test_cache_avoids_second_pull() {
        let registry = Arc::new(FakeRegistry {
            tags: vec![],
            pulls: Mutex::new(vec![]),
            archive: chart_archive("app", "1.2.3"),
        });
        let harness = Harness::new(registry.clone());

        let loader = OciChartLoader::new(harness.config(true));
        for _ in 0..2 {
            loader
                .load_repository_chart(None, Some("oci://ghcr.io/org/charts"), None, "app", "1.2.3")
                .unwrap();
        }
        assert_eq!(registry.pulls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_matching_tag() {
        let registry = Arc::new(FakeRegistry {
            tags: vec!["0.1.0".to_string()],
            pulls: Mutex::new(vec![]),
            archive: vec![],
        });
        let harness = Harness::new(registry);

        let loader = OciChartLoader::new(harness.config(false));
        let err = loader
            .load_repository_chart(None, Some("oci://ghcr.io/org/charts"), None, "app", ">=1.0.0")
            .unwrap_err();
        assert!(matches!(err, RepoError::NoMatchingVersion { .. }));
    }
}
