//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration ============
    #[error("invalid repository URL {url}: {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("unknown kind {kind} for repository {namespace}/{name}")]
    UnknownRepositoryKind {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("unknown type for repository URL {url}")]
    UnknownRepositoryType { url: String },

    #[error("invalid repository document: {message}")]
    InvalidDocument { message: String },

    // ============ Authentication ============
    #[error("invalid '{transport}' auth option: {message}")]
    InvalidAuth { transport: String, message: String },

    #[error("unable to parse configured repository URL {url}: {reason}")]
    InvalidCredentialUrl { url: String, reason: String },

    // ============ Transport ============
    #[error("request to {url} failed with status {status}")]
    HttpStatus { status: u16, url: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("no getter registered for scheme {scheme}")]
    UnknownScheme { scheme: String },

    #[error("unable to clone Git repository {url}: {message}")]
    GitClone { url: String, message: String },

    #[error("OCI registry error for {reference}: {message}")]
    Oci { reference: String, message: String },

    // ============ Index / version resolution ============
    #[error("unable to parse index for repository {url}: {message}")]
    IndexParse { url: String, message: String },

    #[error("chart {name} not found in repository {repo}")]
    ChartNotFound { name: String, repo: String },

    #[error("no chart version for {name} matches {constraint:?} in repository {repo}")]
    NoMatchingVersion {
        name: String,
        constraint: String,
        repo: String,
    },

    #[error("invalid version constraint {constraint:?} for chart {name}: {message}")]
    InvalidConstraint {
        name: String,
        constraint: String,
        message: String,
    },

    #[error("integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    // ============ Chart loading ============
    #[error("unable to load chart {name}/{version} in {repo}: {source}")]
    ChartLoad {
        name: String,
        version: String,
        repo: String,
        #[source]
        source: fluxpand_core::CoreError,
    },

    #[error("unable to load chart {name}/{version} from {repo} (a dependency of {parent}): {source}")]
    DependencyLoad {
        name: String,
        version: String,
        repo: String,
        parent: String,
        #[source]
        source: Box<RepoError>,
    },

    #[error("relative dependency {path} requires a locally cloned parent repository")]
    RelativeDependencyWithoutContext { path: String },

    // ============ Passthrough ============
    #[error(transparent)]
    Core(#[from] fluxpand_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;
