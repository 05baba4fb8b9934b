//! Repository loader interface, backend selection, and dependency loading

use std::path::Path;
use std::sync::Arc;
use url::Url;

use fluxpand_core::{CancellationToken, Chart};

use crate::cache::ChartCache;
use crate::credentials::Credentials;
use crate::error::{RepoError, Result};
use crate::git::GitChartLoader;
use crate::http::HttpChartLoader;
use crate::oci::OciChartLoader;
use crate::source::{RepositoryDocument, RepositorySpec};
use crate::transport::{
    CommandGitClientFactory, GetterRegistry, GitClientFactory, HttpOciRegistryClient,
    OciRegistryClient,
};
use crate::urlnorm::normalize_url;

/// The operation every backend implements
///
/// Exactly one of `repo_doc` (document-driven, at the top of a release) or
/// `repo_url` (URL-driven, for transitively-followed dependencies) is
/// provided. `parent` is supplied only while resolving dependencies within
/// the same local tree.
pub trait RepositoryLoader {
    fn load_repository_chart(
        &self,
        repo_doc: Option<&RepositoryDocument>,
        repo_url: Option<&str>,
        parent: Option<&ChartContext<'_>>,
        chart_name: &str,
        version: &str,
    ) -> Result<Chart>;
}

/// Context for relative-path dependency resolution within a local clone
///
/// The loader back-reference is non-owning; dependency trees form a DAG, so
/// the relation can never become cyclic across charts.
pub struct ChartContext<'a> {
    /// Root of the cloned repository on disk
    pub local_repo_path: &'a Path,

    /// Chart path within the repository
    pub chart_name: String,

    /// The loader that produced this context
    pub loader: &'a dyn RepositoryLoader,

    /// The originating repository document, when the load was document-driven
    pub repo_doc: Option<&'a RepositoryDocument>,
}

/// Injected transport clients
pub struct Clients {
    pub getters: GetterRegistry,
    pub git: Arc<dyn GitClientFactory>,
    pub oci: Arc<dyn OciRegistryClient>,
}

impl Clients {
    /// Production wiring: reqwest getter, `git` CLI, OCI v2 over HTTP
    pub fn with_defaults() -> Result<Self> {
        Ok(Self {
            getters: GetterRegistry::with_defaults()?,
            git: Arc::new(CommandGitClientFactory),
            oci: Arc::new(HttpOciRegistryClient::new()?),
        })
    }
}

/// Shared state handed to every loader
#[derive(Clone, Copy)]
pub struct LoaderConfig<'a> {
    pub ctx: &'a CancellationToken,
    pub cache_root: &'a Path,
    pub cache: Option<&'a ChartCache>,
    pub credentials: &'a Credentials,
    pub clients: &'a Clients,
}

/// Select a loader for a repository document
pub fn loader_for_document<'a>(
    doc: &RepositoryDocument,
    config: LoaderConfig<'a>,
) -> Box<dyn RepositoryLoader + 'a> {
    match &doc.spec {
        RepositorySpec::Helm(spec) if spec.repo_type.as_deref() == Some("oci") => {
            Box::new(OciChartLoader::new(config))
        }
        RepositorySpec::Helm(_) => Box::new(HttpChartLoader::new(config)),
        RepositorySpec::Git(_) => Box::new(GitChartLoader::new(config)),
        RepositorySpec::Oci(_) => Box::new(OciChartLoader::new(config)),
    }
}

/// Select a loader for a bare repository URL (dependency resolution)
pub fn loader_for_url<'a>(
    repo_url: &str,
    config: LoaderConfig<'a>,
) -> Result<Box<dyn RepositoryLoader + 'a>> {
    let parsed = Url::parse(repo_url).map_err(|e| RepoError::InvalidRepositoryUrl {
        url: repo_url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {
            if parsed.username() == "git" {
                Ok(Box::new(GitChartLoader::new(config)))
            } else {
                Ok(Box::new(HttpChartLoader::new(config)))
            }
        }
        "ssh" => Ok(Box::new(GitChartLoader::new(config))),
        "oci" => Ok(Box::new(OciChartLoader::new(config))),
        _ => Err(RepoError::UnknownRepositoryType {
            url: repo_url.to_string(),
        }),
    }
}

/// Where a dependency repository points
enum DependencyRoute {
    /// Relative or file path within the parent's local tree
    Local(String),
    /// Remote repository URL
    Remote(String),
}

/// Classify a normalized dependency repository
///
/// `file://` URLs and bare relative paths resolve within the parent clone. A
/// URL whose host parses as `..` is a relative path in disguise
/// (`file://../sibling`) and is folded back into one.
fn route_dependency(repo_url: &str) -> DependencyRoute {
    match Url::parse(repo_url) {
        Ok(parsed) if parsed.host_str() == Some("..") => {
            let path = parsed.path().trim_start_matches('/');
            DependencyRoute::Local(format!("../{}", path))
        }
        Ok(parsed) if parsed.scheme() == "file" => {
            DependencyRoute::Local(parsed.path().to_string())
        }
        Ok(_) => DependencyRoute::Remote(repo_url.to_string()),
        Err(_) => DependencyRoute::Local(repo_url.to_string()),
    }
}

/// Join a chart path with a dependency's relative path
///
/// Absolute paths replace the parent path; `.` and `..` segments are
/// resolved lexically, matching what a filesystem join would produce inside
/// the clone.
pub fn join_chart_path(parent: &str, relative: &str) -> String {
    let relative = relative.trim_end_matches('/');
    if relative.starts_with('/') {
        return relative.trim_start_matches('/').to_string();
    }

    let mut segments: Vec<&str> = parent
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Load every declared dependency of a just-loaded chart
///
/// Bundled subcharts (empty repository) are already embedded and are
/// skipped, as is any dependency a subchart of the same name already
/// satisfies.
pub fn load_chart_dependencies(
    config: LoaderConfig<'_>,
    chart: &mut Chart,
    parent: Option<&ChartContext<'_>>,
) -> Result<()> {
    let dependencies = chart.metadata.dependencies.clone();
    let parent_name = chart.name().to_string();

    for dependency in dependencies {
        if dependency.repository.is_empty() {
            // Bundled subchart; not addressable outside the parent chart.
            continue;
        }
        if chart.subcharts.iter().any(|c| c.name() == dependency.name) {
            continue;
        }

        let repo_url = normalize_url(&dependency.repository)?;
        let wrap = |source: RepoError| RepoError::DependencyLoad {
            name: dependency.name.clone(),
            version: dependency.version.clone(),
            repo: repo_url.clone(),
            parent: parent_name.clone(),
            source: Box::new(source),
        };

        let subchart = match route_dependency(&repo_url) {
            DependencyRoute::Local(path) => {
                let parent_context = parent.ok_or_else(|| {
                    RepoError::RelativeDependencyWithoutContext { path: path.clone() }
                })?;
                let chart_path = join_chart_path(&parent_context.chart_name, &path);
                parent_context
                    .loader
                    .load_repository_chart(
                        parent_context.repo_doc,
                        None,
                        Some(parent_context),
                        &chart_path,
                        &dependency.version,
                    )
                    .map_err(wrap)?
            }
            DependencyRoute::Remote(url) => {
                let loader = loader_for_url(&url, config).map_err(wrap)?;
                loader
                    .load_repository_chart(None, Some(&url), None, &dependency.name, &dependency.version)
                    .map_err(wrap)?
            }
        };
        chart.add_subchart(subchart);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_chart_path() {
        assert_eq!(
            join_chart_path("charts/test-chart", "../dependency-chart/"),
            "charts/dependency-chart"
        );
        assert_eq!(join_chart_path("charts/app", "sub"), "charts/app/sub");
        assert_eq!(join_chart_path("charts/app", "/other/chart"), "other/chart");
        assert_eq!(join_chart_path("a/b/c", "../../d"), "a/d");
    }

    #[test]
    fn test_route_dependency() {
        assert!(matches!(
            route_dependency("../dependency-chart/"),
            DependencyRoute::Local(path) if path == "../dependency-chart/"
        ));
        assert!(matches!(
            route_dependency("https://charts.example.com/stable/"),
            DependencyRoute::Remote(_)
        ));
        assert!(matches!(
            route_dependency("file:///charts/dep/"),
            DependencyRoute::Local(path) if path == "/charts/dep/"
        ));
    }

    #[test]
    fn test_route_dependency_dotdot_host() {
        // file://../dep parses with ".." as the host; it is really a
        // relative path.
        if let Ok(parsed) = Url::parse("file://../dep/") {
            if parsed.host_str() == Some("..") {
                assert!(matches!(
                    route_dependency("file://../dep/"),
                    DependencyRoute::Local(path) if path == "../dep/"
                ));
            }
        }
    }

    #[test]
    fn test_loader_for_url_selection() {
        let token = CancellationToken::new();
        let credentials = Credentials::new();
        let clients = Clients {
            getters: GetterRegistry::new(),
            git: Arc::new(CommandGitClientFactory),
            oci: Arc::new(HttpOciRegistryClient::new().unwrap()),
        };
        let config = LoaderConfig {
            ctx: &token,
            cache_root: Path::new("/tmp"),
            cache: None,
            credentials: &credentials,
            clients: &clients,
        };

        assert!(loader_for_url("https://charts.example.com/", config).is_ok());
        assert!(loader_for_url("ssh://git@host/repo.git", config).is_ok());
        assert!(loader_for_url("oci://ghcr.io/org/charts", config).is_ok());
        assert!(matches!(
            loader_for_url("ftp://host/", config),
            Err(RepoError::UnknownRepositoryType { .. })
        ));
    }
}
