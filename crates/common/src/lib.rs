//! Utilities shared across the room coordinator workspace.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, key lookup, iat validation)
pub mod jwt;
