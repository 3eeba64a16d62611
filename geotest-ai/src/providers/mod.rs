//! LLM provider clients
//!
//! One [`ProviderClient`] per vendor, all sharing:
//! - [`retry::retry_with_backoff`] for the attempt loop
//! - [`vendor::VendorAdapter`] for request/response shapes
//! - [`mock`] for synthetic results when no live call is possible
//! - [`transport::ProviderTransport`] for the actual HTTP POST

pub mod client;
pub mod mock;
pub mod prompts;
pub mod retry;
pub mod transport;
pub mod vendor;

pub use client::ProviderClient;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use transport::{HttpTransport, ProviderTransport};
pub use vendor::{VendorAdapter, VendorRequest};

use thiserror::Error;

/// Provider call errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("API error {0}: {1}")]
    Http(u16, String),

    /// Response arrived but did not carry the expected structure
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Structural problems with the payload (as opposed to transport failures)
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProviderError::Malformed(_))
    }
}
