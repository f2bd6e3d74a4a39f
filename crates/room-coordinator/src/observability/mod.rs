//! Observability module for the room coordinator.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
