// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The network capability used by the `fetch` adapters.

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use thiserror::Error;

use crate::config::NetworkConfig;
use crate::errors::{BridgeError, BridgeResult};
use crate::net::objects::{RequestCredentials, RequestMode};

/// An outgoing request, detached from the host object that described it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub credentials: RequestCredentials,
    pub mode: RequestMode,
}

/// A fully received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request never produced a response.
    #[error("network request failed: {0}")]
    Network(String),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Performs network requests for the module.
///
/// Futures are polled on the single-threaded event loop that owns the
/// store, so implementations need not be `Send`.
#[async_trait(?Send)]
pub trait Fetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;

    fn name(&self) -> &'static str;
}

/// The default [`Fetcher`], backed by a shared `reqwest` client.
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(config: &NetworkConfig) -> BridgeResult<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("validation-bridge/{}", env!("CARGO_PKG_VERSION")));
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .build()
            .map_err(|e| BridgeError::ValidationError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        tracing::debug!(
            "Sending {} {} (mode={}, credentials={})",
            request.method,
            request.url,
            request.mode.as_str(),
            request.credentials.as_str()
        );

        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?
            .to_vec();

        Ok(FetchResponse {
            status,
            url,
            headers,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_config() {
        let config = NetworkConfig {
            timeout_seconds: 5,
            user_agent: Some("tests/1.0".to_string()),
        };
        let fetcher = ReqwestFetcher::new(&config).unwrap();
        assert_eq!(fetcher.name(), "reqwest");
    }

    #[test]
    fn test_fetch_error_text() {
        let err = FetchError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "network request failed: connection refused");
    }
}
