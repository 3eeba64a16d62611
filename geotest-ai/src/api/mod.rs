//! HTTP API handlers for geotest-ai
//!
//! REST endpoints for analysis and readiness, plus an SSE stream of
//! per-provider progress.

pub mod analyze;
pub mod health;
pub mod sse;

pub use analyze::analysis_routes;
pub use health::health_routes;
pub use sse::analysis_event_stream;
