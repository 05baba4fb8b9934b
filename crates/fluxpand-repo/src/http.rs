//! HTTP chart index loader
//!
//! Traditional Helm-style repositories: an `index.yaml` describing chart
//! entries, plus tar+gzip archives downloaded from the URLs the index lists.

use url::Url;

use fluxpand_core::{load_archive, Chart};

use crate::cache::chart_fingerprint;
use crate::error::{RepoError, Result};
use crate::index::RepositoryIndex;
use crate::loader::{load_chart_dependencies, ChartContext, LoaderConfig, RepositoryLoader};
use crate::source::{RepositoryDocument, RepositorySpec};
use crate::urlnorm::normalize_url;

pub struct HttpChartLoader<'a> {
    config: LoaderConfig<'a>,
}

impl<'a> HttpChartLoader<'a> {
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
                RepositorySpec::Helm(spec) => Ok(spec.url.clone()),
                _ => Err(RepoError::InvalidDocument {
                    message: format!("{} is not a HelmRepository", doc.identity()),
                }),
            },
            (None, Some(url)) => Ok(url.to_string()),
            (None, None) => Err(RepoError::InvalidDocument {
                message: "chart load requires a repository document or URL".to_string(),
            }),
        }
    }
}

impl RepositoryLoader for HttpChartLoader<'_> {
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
            "loading chart from Helm repository"
        );

        let credentials = self.config.credentials.find_for_url(&normalized)?;

        let index_url = format!("{}index.yaml", normalized);
        let getter = self.config.clients.getters.by_url(&index_url)?;
        let index_bytes = getter.get(&index_url, credentials)?;
        let index =
            RepositoryIndex::from_bytes(&index_bytes).map_err(|e| RepoError::IndexParse {
                url: normalized.clone(),
                message: e.to_string(),
            })?;

        let entry = index.find(chart_name, version, &normalized)?;

        let fingerprint = chart_fingerprint(&normalized, chart_name, &entry.version);
        if let Some(cache) = self.config.cache {
            if let Some(chart) = cache.get(&fingerprint) {
                tracing::debug!(repo = %normalized, name = chart_name, "chart cache hit");
                return Ok(chart);
            }
        }

        let archive_url = entry
            .download_url()
            .ok_or_else(|| RepoError::ChartNotFound {
                name: chart_name.to_string(),
                repo: normalized.clone(),
            })?;
        let resolved_url = resolve_archive_url(&normalized, archive_url)?;

        self.config.ctx.check()?;
        let getter = self.config.clients.getters.by_url(&resolved_url)?;
        let archive = getter.get(&resolved_url, credentials)?;

        if let Some(expected) = &entry.digest {
            let actual = sha256_digest(&archive);
            if !digest_matches(expected, &actual) {
                return Err(RepoError::IntegrityCheckFailed {
                    name: chart_name.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let mut chart = load_archive(&archive[..]).map_err(|e| RepoError::ChartLoad {
            name: chart_name.to_string(),
            version: entry.version.clone(),
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
            version = %chart.version(),
            "finished loading chart"
        );
        Ok(chart)
    }
}

/// Resolve an archive URL from the index against the repository URL
fn resolve_archive_url(repo_url: &str, archive_url: &str) -> Result<String> {
    let base = Url::parse(repo_url).map_err(|e| RepoError::InvalidRepositoryUrl {
        url: repo_url.to_string(),
        reason: e.to_string(),
    })?;
    let resolved = base
        .join(archive_url)
        .map_err(|e| RepoError::InvalidRepositoryUrl {
            url: archive_url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(resolved.to_string())
}

fn sha256_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

fn digest_matches(expected: &str, actual: &str) -> bool {
    let normalize = |s: &str| s.trim().to_lowercase().replace("sha256:", "");
    normalize(expected) == normalize(actual)
}
