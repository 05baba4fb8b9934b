//! Scheme-keyed HTTP getters

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::credentials::RepositoryCreds;
use crate::error::{RepoError, Result};

/// A blocking byte fetcher for one URL scheme
pub trait Getter: std::fmt::Debug {
    fn get(&self, url: &str, credentials: Option<&RepositoryCreds>) -> Result<Vec<u8>>;
}

/// Getters keyed by URL scheme
pub struct GetterRegistry {
    getters: HashMap<String, Arc<dyn Getter>>,
}

impl GetterRegistry {
    pub fn new() -> Self {
        Self {
            getters: HashMap::new(),
        }
    }

    /// Registry with the default `http`/`https` getter installed
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        let getter: Arc<dyn Getter> = Arc::new(ReqwestGetter::new()?);
        registry.register("http", getter.clone());
        registry.register("https", getter);
        Ok(registry)
    }

    pub fn register(&mut self, scheme: &str, getter: Arc<dyn Getter>) {
        self.getters.insert(scheme.to_string(), getter);
    }

    pub fn by_scheme(&self, scheme: &str) -> Result<&dyn Getter> {
        self.getters
            .get(scheme)
            .map(|g| g.as_ref())
            .ok_or_else(|| RepoError::UnknownScheme {
                scheme: scheme.to_string(),
            })
    }

    pub fn by_url(&self, url: &str) -> Result<&dyn Getter> {
        let parsed = Url::parse(url).map_err(|e| RepoError::InvalidRepositoryUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.by_scheme(parsed.scheme())
    }
}

impl Default for GetterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Default getter over blocking reqwest
#[derive(Debug)]
pub struct ReqwestGetter {
    client: reqwest::blocking::Client,
}

impl ReqwestGetter {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RepoError::Network {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl Getter for ReqwestGetter {
    fn get(&self, url: &str, credentials: Option<&RepositoryCreds>) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);

        if let Some(creds) = credentials {
            if let (Some(username), Some(password)) = (creds.get("username"), creds.get("password"))
            {
                request = request.basic_auth(username, Some(password));
            } else if let Some(token) = creds.get("token") {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().map_err(|e| RepoError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().map_err(|e| RepoError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
