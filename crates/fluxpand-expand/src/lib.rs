//! HelmRelease expansion pipeline
//!
//! Two passes over a multi-document YAML stream:
//!
//! 1. **Pairing** finds every `HelmRelease` and resolves the repository
//!    document it references. An unresolved reference fails the run.
//! 2. **Expansion** fetches the referenced chart through the matching
//!    backend, renders it against coalesced values, and appends the
//!    generated manifests to the stream — namespaced, tagged with a
//!    `# Source:` comment, and stably sorted.
//!
//! Input documents pass through verbatim; generated documents follow them.

pub mod document;
pub mod error;
pub mod pipeline;
pub mod release;
pub mod render;

pub use document::{split_documents, write_stream, Document};
pub use error::{ExpandError, Result};
pub use pipeline::{ExpandOptions, Expander};
pub use release::HelmRelease;
pub use render::GeneratedDocument;
