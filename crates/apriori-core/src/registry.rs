//! Upstream registry abstraction and the goproxy-protocol HTTP client.
//!
//! The pipeline talks to an upstream through the [`Registry`] /
//! [`ModuleHandle`] traits: one handle per module path, able to list
//! versions and fetch the three per-version artifacts. [`GoProxyClient`]
//! implements the traits over the goproxy GET protocol
//! (`/{module}/@v/list`, `@v/{version}.info`, `.mod`, `.zip`).

use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No provider can serve the requested module path.
    #[error("no provider for module {path}")]
    NoProvider { path: String },

    /// The upstream has no such module or version.
    #[error("module {path}@{version} not found upstream")]
    NotFound { path: String, version: String },

    /// Network failure.
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected upstream response status.
    #[error("upstream returned status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Malformed upstream payload.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

/// Revision descriptor for a specific module version.
///
/// Field names match the goproxy `.info` JSON payload, which is also the
/// shape embedded in generated apriori files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevInfo {
    /// Canonical version string.
    #[serde(rename = "Version")]
    pub version: String,
    /// Commit timestamp of the revision.
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,
}

/// A versioned-module provider bound to one module path.
///
/// Handles are short-lived: requested per module path and dropped after the
/// artifacts are fetched. Callers own returned archive readers and must
/// ensure they are dropped on every exit path.
pub trait ModuleHandle {
    /// List the available versions for this module.
    fn versions(&self) -> Result<Vec<String>, RegistryError>;

    /// Fetch the revision descriptor for `version`.
    fn stat(&self, version: &str) -> Result<RevInfo, RegistryError>;

    /// Fetch the raw go.mod bytes for `version`.
    fn go_mod(&self, version: &str) -> Result<Vec<u8>, RegistryError>;

    /// Open the source archive for `version` as a byte stream.
    fn zip(&self, version: &str) -> Result<Box<dyn Read + Send>, RegistryError>;
}

/// A source of module handles.
pub trait Registry: Send + Sync {
    /// Obtain a handle for `path`.
    fn module(&self, path: &str) -> Result<Box<dyn ModuleHandle>, RegistryError>;
}

/// Encode a module path for use in goproxy URLs.
///
/// The protocol forbids uppercase in paths; each uppercase letter is encoded
/// as `!` followed by its lowercase form (`github.com/Azure` →
/// `github.com/!azure`).
#[must_use]
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Decode a module path from its goproxy URL form.
///
/// Inverse of [`escape_path`]: `!a` decodes to `A`. Returns `None` if a `!`
/// is not followed by a lowercase letter.
#[must_use]
pub fn unescape_path(escaped: &str) -> Option<String> {
    let mut path = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '!' {
            match chars.next() {
                Some(next) if next.is_ascii_lowercase() => path.push(next.to_ascii_uppercase()),
                _ => return None,
            }
        } else {
            path.push(c);
        }
    }
    Some(path)
}

/// Client for an upstream goproxy (e.g. `https://proxy.golang.org`).
#[derive(Clone)]
pub struct GoProxyClient {
    base_url: String,
    http_client: reqwest::blocking::Client,
}

impl GoProxyClient {
    /// Create a client for the proxy at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RegistryError> {
        let http_client = reqwest::blocking::Client::builder()
            .user_agent(concat!("apriori/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            base_url,
            http_client,
        })
    }

    fn get(&self, url: &str, path: &str, version: &str) -> Result<reqwest::blocking::Response, RegistryError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .map_err(|e| RegistryError::Network(e.to_string()))?;
        let status = response.status();
        // Gone (410) is what proxy.golang.org reports for unknown versions.
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(RegistryError::NotFound {
                path: path.to_string(),
                version: version.to_string(),
            });
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Registry for GoProxyClient {
    fn module(&self, path: &str) -> Result<Box<dyn ModuleHandle>, RegistryError> {
        if path.is_empty() {
            return Err(RegistryError::NoProvider {
                path: path.to_string(),
            });
        }
        Ok(Box::new(GoProxyModule {
            base: format!("{}/{}", self.base_url, escape_path(path)),
            path: path.to_string(),
            client: self.clone(),
        }))
    }
}

struct GoProxyModule {
    base: String,
    path: String,
    client: GoProxyClient,
}

impl ModuleHandle for GoProxyModule {
    fn versions(&self) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/@v/list", self.base);
        let body = self
            .client
            .get(&url, &self.path, "")?
            .text()
            .map_err(|e| RegistryError::Decode(e.to_string()))?;
        Ok(body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn stat(&self, version: &str) -> Result<RevInfo, RegistryError> {
        let url = format!("{}/@v/{version}.info", self.base);
        self.client
            .get(&url, &self.path, version)?
            .json()
            .map_err(|e| RegistryError::Decode(e.to_string()))
    }

    fn go_mod(&self, version: &str) -> Result<Vec<u8>, RegistryError> {
        let url = format!("{}/@v/{version}.mod", self.base);
        self.client
            .get(&url, &self.path, version)?
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| RegistryError::Network(e.to_string()))
    }

    fn zip(&self, version: &str) -> Result<Box<dyn Read + Send>, RegistryError> {
        let url = format!("{}/@v/{version}.zip", self.base);
        let response = self.client.get(&url, &self.path, version)?;
        Ok(Box::new(response))
    }
}
