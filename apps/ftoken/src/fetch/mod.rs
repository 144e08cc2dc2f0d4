//! Token fetch collaborator.
//!
//! The renewal state machine only decides *what* to request; a
//! [`TokenFetcher`] performs the request. The controller runs each fetch on
//! its own task and feeds the outcome back through the event queue.

pub mod http;

use async_trait::async_trait;

use crate::document::IssuedToken;
use crate::error::FetchError;

pub use http::HttpTokenFetcher;

/// A token request for one token field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub token_field_id: String,
    /// Fully built issuing URL
    pub url: String,
    /// Wrap parameter of the token field
    pub wrap: String,
}

/// Trait for token fetchers
///
/// Implementations own transport concerns (timeouts, retries, headers).
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<IssuedToken, FetchError>;
}
