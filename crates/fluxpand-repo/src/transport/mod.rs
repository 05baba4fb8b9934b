//! Pluggable transport clients
//!
//! The loaders never talk to the network directly; they go through these
//! narrow traits. Production wiring installs the reqwest-based getter, the
//! `git` CLI client, and the OCI v2 client; tests install recording fakes.

mod getter;
mod gitclient;
mod ociclient;

pub use getter::{Getter, GetterRegistry, ReqwestGetter};
pub use gitclient::{
    AuthOptions, CheckoutStrategy, CloneConfig, CommandGitClientFactory, GitClient,
    GitClientFactory, GitCommit,
};
pub use ociclient::{HttpOciRegistryClient, OciRegistryClient, RegistryAuth};
