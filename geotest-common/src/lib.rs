//! # GeoTest Common Library
//!
//! Shared code for the GeoTest services:
//! - Error types
//! - Configuration loading (TOML + environment)
//! - Event types and the EventBus used for SSE progress streaming

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
