//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`] types. The room coordinator keeps its signing
//! secret and API key in [`SecretString`]; structs holding them can derive
//! `Debug` and still print `[REDACTED]`.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SigningConfig {
//!     access_key: String,
//!     secret: SecretString,
//! }
//!
//! let config = SigningConfig {
//!     access_key: "app-access-key".to_string(),
//!     secret: SecretString::from("hmac-secret"),
//! };
//!
//! assert!(!format!("{config:?}").contains("hmac-secret"));
//! assert_eq!(config.secret.expose_secret(), "hmac-secret");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
