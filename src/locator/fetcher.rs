//! HTTP access behind a trait
//!
//! The locator never talks to reqwest directly; it goes through
//! `AssetFetcher` so unit tests can inject fakes with call counting.
//! `probe` is the lightweight existence check (HEAD), `fetch` the full
//! download. Timeouts map to the same failure path as a non-2xx response.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::errors::{AppError, ResolveError};

/// Hard cap on download size; anything larger is not a unit asset.
const MAX_DOWNLOAD_BYTES: usize = 10 * 1024 * 1024;

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Bounded-timeout existence check.
    async fn probe(&self, url: &str) -> Result<(), ResolveError>;

    /// Full download of the payload bytes.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResolveError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    probe_timeout: Duration,
    download_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            probe_timeout: Duration::from_secs(http.probe_timeout_secs),
            download_timeout: Duration::from_secs(http.download_timeout_secs),
        })
    }

    fn classify(url: &str, err: reqwest::Error) -> ResolveError {
        if let Some(status) = err.status() {
            ResolveError::rejected(url, status.as_u16())
        } else {
            // Timeouts, connection refused, DNS failures
            ResolveError::unreachable(url)
        }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn probe(&self, url: &str) -> Result<(), ResolveError> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ResolveError::rejected(url, response.status().as_u16()))
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        if !response.status().is_success() {
            return Err(ResolveError::rejected(url, response.status().as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|_| ResolveError::unreachable(url))?;

        if bytes.len() > MAX_DOWNLOAD_BYTES {
            return Err(ResolveError::invalid_payload(
                url,
                format!("payload too large: {} bytes", bytes.len()),
            ));
        }

        Ok(bytes.to_vec())
    }
}
