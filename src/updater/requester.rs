//! The fetch capability.
//!
//! The updater reaches the network through exactly one seam: a value that
//! maps a URL to response bytes. Tests substitute a recording fake; the
//! default is a plain HTTP GET.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

/// One-method fetch capability.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Fetch `url` and return the full response body.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Default requester: HTTP GET with the embedding process's lifetime.
///
/// Owns its [`reqwest::Client`]; there is no process-wide client and no
/// global state. Timeouts and TLS configuration are whatever the client
/// was built with.
pub struct HttpRequester {
    client: reqwest::Client,
}

impl HttpRequester {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequester {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Requester for HttpRequester {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("bad http status from {url}: {status}");
        }

        Ok(response
            .bytes()
            .await
            .with_context(|| format!("failed to read response body from {url}"))?
            .to_vec())
    }
}
