//! OCI registry client interface and the default HTTP implementation

use base64::Engine as _;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::credentials::RepositoryCreds;
use crate::error::{RepoError, Result};

/// Media types for Helm charts stored in OCI registries
pub mod media_types {
    /// Helm chart config
    pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
    /// Helm chart content layer (tar+gzip)
    pub const HELM_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
}

/// Registry authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAuth {
    Anonymous,
    Basic { username: String, password: String },
}

impl RegistryAuth {
    /// Derive registry auth from stored credentials
    ///
    /// ECR hosts exchange a session token for `AWS`/token basic auth; other
    /// registries use username/password or a plain token, falling back to
    /// anonymous access.
    pub fn from_credentials(host: &str, creds: Option<&RepositoryCreds>) -> Self {
        let Some(creds) = creds else {
            return Self::Anonymous;
        };
        if let (Some(username), Some(password)) = (creds.get("username"), creds.get("password")) {
            return Self::Basic {
                username: username.to_string(),
                password: password.to_string(),
            };
        }
        if let Some(token) = creds.get("token") {
            let username = if is_ecr_host(host) { "AWS" } else { "" };
            return Self::Basic {
                username: username.to_string(),
                password: token.to_string(),
            };
        }
        Self::Anonymous
    }

    fn header(&self) -> Option<String> {
        match self {
            Self::Anonymous => None,
            Self::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                Some(format!("Basic {}", encoded))
            }
        }
    }
}

/// AWS Elastic Container Registry hosts
fn is_ecr_host(host: &str) -> bool {
    host.contains(".dkr.ecr.") && host.ends_with(".amazonaws.com")
}

/// The registry operations the OCI loader depends on
pub trait OciRegistryClient {
    /// Register authentication for a registry host
    fn login(&self, host: &str, auth: &RegistryAuth) -> Result<()>;

    /// List tags for `reference` (`host/path/chart`)
    fn list_tags(&self, reference: &str) -> Result<Vec<String>>;

    /// Pull the chart archive for `reference` at `tag`
    fn pull(&self, reference: &str, tag: &str) -> Result<Vec<u8>>;
}

/// Default OCI v2 client over blocking reqwest
pub struct HttpOciRegistryClient {
    client: reqwest::blocking::Client,
    auth_headers: Mutex<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    layers: Vec<Descriptor>,
}

#[derive(Deserialize)]
struct Descriptor {
    #[serde(rename = "mediaType", default)]
    media_type: String,
    #[serde(default)]
    digest: String,
}

impl HttpOciRegistryClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RepoError::Network {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            auth_headers: Mutex::new(HashMap::new()),
        })
    }

    fn split_reference(reference: &str) -> Result<(&str, &str)> {
        reference
            .split_once('/')
            .ok_or_else(|| RepoError::Oci {
                reference: reference.to_string(),
                message: "reference has no registry host".to_string(),
            })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        host: &str,
        url: &str,
        accept: Option<&str>,
        reference: &str,
    ) -> Result<T> {
        let bytes = self.get_bytes(host, url, accept, reference)?;
        serde_json::from_slice(&bytes).map_err(|e| RepoError::Oci {
            reference: reference.to_string(),
            message: format!("invalid registry response from {}: {}", url, e),
        })
    }

    fn get_bytes(
        &self,
        host: &str,
        url: &str,
        accept: Option<&str>,
        reference: &str,
    ) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header("Accept", accept);
        }
        if let Some(header) = self.auth_headers.lock().unwrap().get(host) {
            request = request.header("Authorization", header.clone());
        }

        let response = request.send().map_err(|e| RepoError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::Oci {
                reference: reference.to_string(),
                message: format!("request to {} failed with status {}", url, status.as_u16()),
            });
        }
        let bytes = response.bytes().map_err(|e| RepoError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

impl OciRegistryClient for HttpOciRegistryClient {
    fn login(&self, host: &str, auth: &RegistryAuth) -> Result<()> {
        let mut headers = self.auth_headers.lock().unwrap();
        match auth.header() {
            Some(header) => {
                headers.insert(host.to_string(), header);
            }
            None => {
                headers.remove(host);
            }
        }
        Ok(())
    }

    fn list_tags(&self, reference: &str) -> Result<Vec<String>> {
        let (host, path) = Self::split_reference(reference)?;
        let url = format!("https://{}/v2/{}/tags/list", host, path);
        let list: TagList = self.get_json(host, &url, None, reference)?;
        Ok(list.tags)
    }

    fn pull(&self, reference: &str, tag: &str) -> Result<Vec<u8>> {
        let (host, path) = Self::split_reference(reference)?;

        let manifest_url = format!("https://{}/v2/{}/manifests/{}", host, path, tag);
        let manifest: Manifest = self.get_json(
            host,
            &manifest_url,
            Some("application/vnd.oci.image.manifest.v1+json"),
            reference,
        )?;

        let layer = manifest
            .layers
            .iter()
            .find(|l| l.media_type == media_types::HELM_CONTENT)
            .ok_or_else(|| RepoError::Oci {
                reference: reference.to_string(),
                message: "no chart content layer found in manifest".to_string(),
            })?;

        let blob_url = format!("https://{}/v2/{}/blobs/{}", host, path, layer.digest);
        self.get_bytes(host, &blob_url, None, reference)
    }
}
