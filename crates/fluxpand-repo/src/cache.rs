//! In-memory chart cache
//!
//! Lives for one run when caching is enabled. Fingerprints encode every
//! dimension that could produce a different chart, so a repository is
//! downloaded or cloned at most once per run for a given fingerprint.

use std::cell::RefCell;
use std::collections::HashMap;

use fluxpand_core::Chart;

use crate::source::GitReference;

/// Unambiguous field separator for fingerprints
const SEPARATOR: char = '\u{1f}';

/// Fingerprint for HTTP and OCI charts: normalized URL, chart name, and the
/// resolved concrete version
pub fn chart_fingerprint(repo_url: &str, name: &str, version: &str) -> String {
    [repo_url, name, version].join(&SEPARATOR.to_string())
}

/// Fingerprint for Git charts: URL, chart path, and every checkout field,
/// included even when empty
pub fn git_chart_fingerprint(
    repo_url: &str,
    chart_path: &str,
    reference: Option<&GitReference>,
) -> String {
    let empty = GitReference::default();
    let reference = reference.unwrap_or(&empty);
    [
        repo_url,
        chart_path,
        reference.branch.as_deref().unwrap_or_default(),
        reference.tag.as_deref().unwrap_or_default(),
        reference.semver.as_deref().unwrap_or_default(),
        reference.name.as_deref().unwrap_or_default(),
        reference.commit.as_deref().unwrap_or_default(),
    ]
    .join(&SEPARATOR.to_string())
}

/// Chart cache keyed by fingerprint
///
/// Single-threaded by design; lookups hand out clones so renders can prune
/// subcharts without touching the cached tree.
#[derive(Debug, Default)]
pub struct ChartCache {
    charts: RefCell<HashMap<String, Chart>>,
}

impl ChartCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &str) -> Option<Chart> {
        self.charts.borrow().get(fingerprint).cloned()
    }

    pub fn insert(&self, fingerprint: String, chart: Chart) {
        self.charts.borrow_mut().insert(fingerprint, chart);
    }

    pub fn len(&self) -> usize {
        self.charts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.borrow().is_empty()
    }
}
