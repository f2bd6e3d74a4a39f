//! Room Coordinator Service Library
//!
//! Matches authenticated users into small video-chat rooms:
//!
//! - Places each user in the oldest room with space, or provisions a new one
//! - Enforces one room per user and a hard room capacity
//! - Signs room-scoped participant tokens for the video service
//!
//! # Architecture
//!
//! The coordinator follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! Room state changes go through single-record optimistic transactions, so
//! no request holds a lock across external calls.
//!
//! # Modules
//!
//! - `auth` - Identity verification and token issuance
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics
//! - `models` - Room model and API types
//! - `observability` - Prometheus metrics
//! - `repositories` - Room registry backends
//! - `routes` - Axum router setup
//! - `services` - Matchmaking, leaving and room provisioning

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
