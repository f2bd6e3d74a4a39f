//! # Room Coordinator Test Utilities
//!
//! Shared test utilities for the room coordinator.
//!
//! This crate provides:
//! - Server test harness (`TestRoomServer` for E2E tests, `build_test_app`
//!   for in-process router tests)
//! - RSA identity-provider fixture (`TestIdentityProvider`)
//! - Registry wrappers for concurrency tests (`YieldingRegistry`,
//!   `ConflictRegistry`)
//! - Registry invariant assertions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestRoomServer::spawn().await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .post(format!("{}/join-randomroom", server.url()))
//!         .bearer_auth("alice")
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     assert_registry_consistent(server.registry().as_ref()).await;
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod identity;
pub mod registries;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::*;
pub use identity::*;
pub use registries::*;
pub use server_harness::*;
