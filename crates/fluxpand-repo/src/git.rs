//! Git clone loader
//!
//! Clones the referenced repository once per run into the cache root and
//! loads charts from directories within the clone. Relative-path
//! dependencies reuse the parent clone through a [`ChartContext`] instead of
//! cloning again.

use std::path::Path;
use std::time::Duration;
use url::Url;

use fluxpand_core::{Chart, CoreError};

use crate::cache::git_chart_fingerprint;
use crate::credentials::rewrite_ssh_to_https;
use crate::error::{RepoError, Result};
use crate::loader::{load_chart_dependencies, ChartContext, LoaderConfig, RepositoryLoader};
use crate::source::{GitRepositorySpec, RepositoryDocument};
use crate::transport::{AuthOptions, CheckoutStrategy, CloneConfig};
use crate::urlnorm::repo_cache_path;

const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GitChartLoader<'a> {
    config: LoaderConfig<'a>,
}

impl<'a> GitChartLoader<'a> {
    pub fn new(config: LoaderConfig<'a>) -> Self {
        Self { config }
    }

    /// Load a chart from an already-cloned parent repository
    fn load_from_parent(
        &self,
        parent: &ChartContext<'_>,
        chart_name: &str,
    ) -> Result<Chart> {
        let chart_dir = parent.local_repo_path.join(chart_name);
        let repo = parent
            .repo_doc
            .map(|d| d.identity())
            .unwrap_or_else(|| parent.local_repo_path.display().to_string());
        let mut chart = self.load_chart_dir(&chart_dir, chart_name, &repo)?;

        let context = ChartContext {
            local_repo_path: parent.local_repo_path,
            chart_name: chart_name.to_string(),
            loader: self,
            repo_doc: parent.repo_doc,
        };
        load_chart_dependencies(self.config, &mut chart, Some(&context))?;
        Ok(chart)
    }

    /// Clone (if needed) and load a chart from the repository
    fn load_from_repository(
        &self,
        repo_doc: Option<&RepositoryDocument>,
        spec: &GitRepositorySpec,
        chart_name: &str,
    ) -> Result<Chart> {
        let repo_url = spec.url.clone();
        tracing::debug!(repo = %repo_url, name = chart_name, "loading chart from Git repository");

        let parsed = Url::parse(&repo_url).map_err(|e| RepoError::InvalidRepositoryUrl {
            url: repo_url.clone(),
            reason: e.to_string(),
        })?;
        let credentials = self.config.credentials.find_for_repo(&parsed)?;

        // CI pipelines that only hold HTTPS tokens clone over HTTPS even
        // when the document names an SSH URL.
        let (clone_url, parsed) = match credentials.and_then(|c| rewrite_ssh_to_https(&parsed, c))
        {
            Some(rewritten) => (rewritten.to_string(), rewritten),
            None => (repo_url.clone(), parsed),
        };

        let fingerprint =
            git_chart_fingerprint(&clone_url, chart_name, spec.reference.as_ref());
        if let Some(cache) = self.config.cache {
            if let Some(chart) = cache.get(&fingerprint) {
                tracing::debug!(repo = %clone_url, name = chart_name, "chart cache hit");
                return Ok(chart);
            }
        }

        let auth = AuthOptions::new(&parsed, credentials)?;
        let repo_path = repo_cache_path(self.config.cache_root, &clone_url)?;

        if !repo_path.exists() {
            self.clone_repository(&clone_url, &repo_path, &auth, spec)?;
        }

        let chart_dir = repo_path.join(chart_name);
        let mut chart = self.load_chart_dir(&chart_dir, chart_name, &repo_url)?;

        let context = ChartContext {
            local_repo_path: &repo_path,
            chart_name: chart_name.to_string(),
            loader: self,
            repo_doc,
        };
        load_chart_dependencies(self.config, &mut chart, Some(&context))?;

        if let Some(cache) = self.config.cache {
            cache.insert(fingerprint, chart.clone());
        }

        tracing::debug!(
            repo = %clone_url,
            name = chart_name,
            version = %chart.version(),
            "finished loading chart"
        );
        Ok(chart)
    }

    fn clone_repository(
        &self,
        clone_url: &str,
        repo_path: &Path,
        auth: &AuthOptions,
        spec: &GitRepositorySpec,
    ) -> Result<()> {
        let timeout = spec.timeout.unwrap_or(DEFAULT_CLONE_TIMEOUT);
        let clone_ctx = self.config.ctx.child_with_timeout(timeout);

        let client = self.config.clients.git.create(repo_path, auth)?;
        let clone_config = CloneConfig {
            shallow: true,
            single_branch: true,
            checkout: CheckoutStrategy::from_reference(spec.reference.as_ref()),
        };
        let commit = client.clone_repository(&clone_ctx, clone_url, &clone_config)?;
        tracing::debug!(repo = clone_url, commit = %commit.hash, "cloned repository");
        Ok(())
    }

    fn load_chart_dir(
        &self,
        chart_dir: &Path,
        chart_name: &str,
        repo_url: &str,
    ) -> Result<Chart> {
        self.config.ctx.check()?;
        Chart::load_dir(chart_dir).map_err(|e| match e {
            CoreError::Cancelled => RepoError::Core(CoreError::Cancelled),
            other => RepoError::ChartLoad {
                name: chart_name.to_string(),
                version: String::new(),
                repo: repo_url.to_string(),
                source: other,
            },
        })
    }
}

impl RepositoryLoader for GitChartLoader<'_> {
    fn load_repository_chart(
        &self,
        repo_doc: Option<&RepositoryDocument>,
        repo_url: Option<&str>,
        parent: Option<&ChartContext<'_>>,
        chart_name: &str,
        _version: &str,
    ) -> Result<Chart> {
        self.config.ctx.check()?;

        if let Some(parent) = parent {
            return self.load_from_parent(parent, chart_name);
        }

        match (repo_doc, repo_url) {
            (Some(doc), _) => {
                let spec = doc.git_spec()?.clone();
                self.load_from_repository(repo_doc, &spec, chart_name)
            }
            (None, Some(url)) => {
                // URL-driven loads (git dependencies of remote charts) have
                // no document; clone with defaults.
                let spec = GitRepositorySpec {
                    url: url.to_string(),
                    reference: None,
                    timeout: None,
                };
                self.load_from_repository(None, &spec, chart_name)
            }
            (None, None) => Err(RepoError::InvalidDocument {
                message: "chart load requires a repository document or URL".to_string(),
            }),
        }
    }
}
