//! Supporting services for the analysis pipeline

pub mod content_fetcher;
pub mod credential_validator;
pub mod response_cache;
pub mod visibility_probe;

pub use content_fetcher::ContentFetcher;
pub use credential_validator::{CredentialValidator, ReadinessReport, ValidationResult};
pub use response_cache::ResponseCache;
pub use visibility_probe::{VisibilityProbe, VisibilityReport, VisibilityResult};
