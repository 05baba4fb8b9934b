//! Repository URL normalization and clone path derivation

use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{RepoError, Result};

/// Normalize a chart repository URL
///
/// OCI URLs lose trailing slashes; everything else ends with exactly one.
/// URLs are only ever compared after this transform. Bare relative paths
/// (dependency repositories like `../sibling-chart`) do not parse as
/// absolute URLs and are trailing-slash normalized as-is.
pub fn normalize_url(repository_url: &str) -> Result<String> {
    if repository_url.is_empty() {
        return Ok(String::new());
    }

    let mut url = match Url::parse(repository_url) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Ok(format!("{}/", repository_url.trim_end_matches('/')));
        }
        Err(e) => {
            return Err(RepoError::InvalidRepositoryUrl {
                url: repository_url.to_string(),
                reason: e.to_string(),
            });
        }
    };

    if url.scheme() == "oci" {
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);
    } else {
        let path = format!("{}/", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }
    Ok(url.to_string())
}

/// Derive the on-disk location for a repository under the run's cache root
///
/// The directory name is the host, with the URL path appended after a dash
/// when present (`example.com-charts-stable`).
pub fn repo_cache_path(cache_root: &Path, repo_url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(repo_url).map_err(|e| RepoError::InvalidRepositoryUrl {
        url: repo_url.to_string(),
        reason: e.to_string(),
    })?;

    let host = parsed.host_str().unwrap_or_default();
    let path = parsed.path().trim_matches('/');
    let dir = if path.is_empty() {
        host.to_string()
    } else {
        format!("{}-{}", host, path.replace('/', "-"))
    };
    Ok(cache_root.join(dir))
}
