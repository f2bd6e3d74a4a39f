//! Middleware for the room coordinator.
//!
//! # Components
//!
//! - `auth` - Authentication middleware for protected routes
//! - `http_metrics` - HTTP metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
