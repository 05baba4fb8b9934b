//! Chart template engine for fluxpand
//!
//! Renders a resolved chart tree against coalesced values using MiniJinja
//! with Helm-style filters. Rendering walks the chart and its subcharts,
//! scoping values per dependency, and returns a manifest map keyed by
//! template path (`chart/templates/file.yaml`,
//! `chart/charts/dep/templates/file.yaml`).

pub mod engine;
pub mod error;
pub mod filters;

pub use engine::Engine;
pub use error::{EngineError, Result};
