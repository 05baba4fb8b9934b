//! Core chart model for fluxpand
//!
//! This crate holds everything the expansion pipeline and the repository
//! loaders share:
//!
//! - **Chart model**: metadata, dependency declarations, template files,
//!   loading from directories and tar+gzip archives
//! - **Values**: deep merge and Helm-style coalescing with subchart scoping
//! - **Render context**: release identity and cluster capabilities
//! - **Document accessors**: kind/group/name/namespace helpers over parsed
//!   YAML documents

pub mod archive;
pub mod cancel;
pub mod chart;
pub mod context;
pub mod docmeta;
pub mod error;
pub mod values;

pub use archive::load_archive;
pub use cancel::CancellationToken;
pub use chart::{Chart, ChartFile, ChartMetadata, DependencySpec, TemplateFile};
pub use context::{Capabilities, ChartInfo, KubeVersion, ReleaseInfo, TemplateContext};
pub use error::{CoreError, Result};
pub use values::{coalesce_values, deep_merge, values_from_yaml};
