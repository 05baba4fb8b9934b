//! Repository loaders for fluxpand
//!
//! Three interchangeable backends fetch charts from the sources a Flux
//! `HelmRelease` can reference:
//!
//! - **HTTP chart index** (`HelmRepository`): `index.yaml` plus tar+gzip
//!   archives
//! - **OCI registry** (`OCIRepository`, or `HelmRepository` with
//!   `spec.type: oci`): tag listing and artifact pull
//! - **Git clone** (`GitRepository`): shallow single-branch clone, chart
//!   loaded from a directory, relative-path dependencies resolved within the
//!   same clone
//!
//! All network and process I/O goes through narrow client traits
//! ([`transport`]) so tests can substitute recording fakes.

pub mod cache;
pub mod credentials;
pub mod error;
pub mod git;
pub mod http;
pub mod index;
pub mod loader;
pub mod oci;
pub mod source;
pub mod transport;
pub mod urlnorm;

pub use cache::{chart_fingerprint, git_chart_fingerprint, ChartCache};
pub use credentials::{rewrite_ssh_to_https, Credentials, RepositoryCreds};
pub use error::{RepoError, Result};
pub use index::{ChartEntry, RepositoryIndex};
pub use loader::{
    load_chart_dependencies, loader_for_document, loader_for_url, ChartContext, Clients,
    LoaderConfig, RepositoryLoader,
};
pub use source::{
    GitReference, GitRepositorySpec, HelmRepositorySpec, OciRepositorySpec, RepositoryDocument,
    RepositorySpec,
};
pub use transport::{
    AuthOptions, CheckoutStrategy, CloneConfig, CommandGitClientFactory, Getter, GetterRegistry,
    GitClient, GitClientFactory, GitCommit, HttpOciRegistryClient, OciRegistryClient,
    RegistryAuth, ReqwestGetter,
};
pub use urlnorm::{normalize_url, repo_cache_path};
