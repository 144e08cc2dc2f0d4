//! HTTP token fetcher.
//!
//! Issues `GET <url>` against the issuing endpoint. The endpoint only
//! answers AJAX requests, so every request carries
//! `X-Requested-With: XMLHttpRequest`.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::time::Duration;

use super::{FetchRequest, TokenFetcher};
use crate::document::IssuedToken;
use crate::error::FetchError;

/// Header carrying the token field's wrap parameter
pub const WRAP_HEADER: &str = "X-Ftoken-Wrap";

/// Body returned by the issuing endpoint; extra keys are ignored
#[derive(Debug, Deserialize)]
struct TokenResponse {
    name: String,
    value: String,
}

/// Parses an issuing endpoint response body
pub fn parse_token_response(body: &[u8]) -> Result<IssuedToken, FetchError> {
    let response: TokenResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    if response.value.trim().is_empty() {
        return Err(FetchError::Decode("empty token value".to_string()));
    }

    Ok(IssuedToken {
        name: response.name,
        value: response.value,
    })
}

/// Token fetcher backed by reqwest
pub struct HttpTokenFetcher {
    client: reqwest::Client,
}

impl HttpTokenFetcher {
    /// Creates a new fetcher with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wraps an already configured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenFetcher for HttpTokenFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<IssuedToken, FetchError> {
        let mut builder = self
            .client
            .get(&request.url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(ACCEPT, "application/json");

        if !request.wrap.is_empty() {
            builder = builder.header(WRAP_HEADER, &request.wrap);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        parse_token_response(&body)
    }
}
