//! Authentication and token issuance.
//!
//! - [`jwt`]: verifies identity-provider ID tokens against a JWKS
//! - [`issuer`]: signs access tokens for the video API
//! - [`claims`]: claim sets for both directions

pub mod claims;
pub mod issuer;
pub mod jwks;
pub mod jwt;

pub use claims::{AccessClaims, AuthenticatedUser, ClaimsError};
pub use issuer::{Hs256TokenIssuer, TokenIssuer};
pub use jwks::JwksClient;
pub use jwt::{IdentityVerifier, JwtIdentityVerifier};
