//! HTTP facade (component C2): direct-upload PUTs and any plain request/
//! response calls the agent needs outside the control channel, built on
//! `reqwest` with an optional SOCKS proxy per [`crate::config::TransportConfig`].

use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::TransportConfig;
use crate::error::{AgentError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(config: &TransportConfig) -> Result<HttpClient> {
        let mut builder = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .use_rustls_tls();

        if let Some(proxy_url) = &config.socks_proxy {
            let proxy = reqwest::Proxy::all(proxy_url.clone())
                .map_err(AgentError::Http)?;
            builder = builder.proxy(proxy);
        }

        let inner = builder.build().map_err(AgentError::Http)?;
        Ok(HttpClient { inner })
    }

    /// Upload `body` to a pre-signed direct-upload URL with the headers the
    /// cloud returned alongside it (spec §7).
    pub async fn put(
        &self,
        url: &Url,
        headers: &std::collections::HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<()> {
        self.put_checked(url, headers, body).await.map_err(|e| match e {
            PutError::Status(s) => AgentError::Transport(format!("direct upload PUT failed: {s}")),
            PutError::Transport(msg) => AgentError::Transport(msg),
        })
    }

    /// Like [`HttpClient::put`] but preserves the HTTP status so callers can
    /// tell a fatal 4xx from a retryable 5xx/408/429 (spec §4.8 step 2c).
    pub async fn put_checked(
        &self,
        url: &Url,
        headers: &std::collections::HashMap<String, String>,
        body: Vec<u8>,
    ) -> std::result::Result<(), PutError> {
        let mut req = self.inner.put(url.clone()).body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(|e| PutError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(PutError::Status(resp.status()))
        }
    }

    /// Fetch a resource, returning raw bytes. Used for firmware/preview URLs
    /// pushed by the cloud (spec §6 supplemented commands).
    pub async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let resp = self.inner.get(url.clone()).send().await.map_err(AgentError::Http)?;
        if resp.status() != StatusCode::OK {
            return Err(AgentError::Transport(format!(
                "GET {url} failed: {}",
                resp.status()
            )));
        }
        Ok(resp.bytes().await.map_err(AgentError::Http)?.to_vec())
    }
}

#[derive(Debug)]
pub enum PutError {
    Status(StatusCode),
    Transport(String),
}

impl PutError {
    /// 4xx other than 408/429 can never succeed on retry (spec §4.8 step 2c).
    pub fn is_fatal(&self) -> bool {
        match self {
            PutError::Status(s) => {
                s.is_client_error() && *s != StatusCode::REQUEST_TIMEOUT && *s != StatusCode::TOO_MANY_REQUESTS
            }
            PutError::Transport(_) => false,
        }
    }
}
