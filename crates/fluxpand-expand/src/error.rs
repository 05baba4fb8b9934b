//! Expansion pipeline errors
//!
//! Every error is annotated on the way up: transport and chart failures
//! carry repository and chart identity from the loader layer, and the
//! pipeline wraps them with the release they belong to. Nothing is retried;
//! the first fatal error terminates the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("unable to parse input document {index}: {message}")]
    InputParse { index: usize, message: String },

    #[error("unable to decode HelmRelease {namespace}/{name}: {message}")]
    InvalidRelease {
        namespace: String,
        name: String,
        message: String,
    },

    #[error("missing chart repository for Helm release {namespace}/{name}")]
    MissingRepository { namespace: String, name: String },

    #[error("unable to expand Helm release {namespace}/{name}: {source}")]
    ReleaseExpansion {
        namespace: String,
        name: String,
        #[source]
        source: Box<ExpandError>,
    },

    #[error("unable to load chart for {repo}: {source}")]
    ChartLoad {
        repo: String,
        #[source]
        source: fluxpand_repo::RepoError,
    },

    #[error("unable to render chart {chart}/{version}: {source}")]
    Render {
        chart: String,
        version: String,
        #[source]
        source: fluxpand_engine::EngineError,
    },

    #[error("unable to parse manifest {key}: {message}")]
    ManifestParse { key: String, message: String },

    #[error(transparent)]
    Repo(#[from] fluxpand_repo::RepoError),

    #[error(transparent)]
    Core(#[from] fluxpand_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExpandError {
    /// Wrap an error with the release it belongs to
    pub fn for_release(namespace: &str, name: &str, source: ExpandError) -> Self {
        Self::ReleaseExpansion {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExpandError>;
