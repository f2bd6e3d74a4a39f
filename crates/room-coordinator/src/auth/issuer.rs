//! Access token issuance.
//!
//! Signs [`AccessClaims`] with HS256 using the app secret. Every token gets
//! `iat`, `nbf`, `exp` and a random `jti` on top of the claim set.

use crate::auth::claims::AccessClaims;
use crate::errors::RoomError;
use common::jwt::unix_now;
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

/// Default token lifetime (24 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Signs claim sets into bearer tokens.
pub trait TokenIssuer: Send + Sync {
    /// Sign `claims` into an opaque token string.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::ExternalService` if the claims are incomplete or
    /// signing fails.
    fn issue(&self, claims: &AccessClaims) -> Result<String, RoomError>;
}

/// HS256 token issuer.
pub struct Hs256TokenIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl Hs256TokenIssuer {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.expose_secret().as_bytes()),
            ttl,
        }
    }
}

impl TokenIssuer for Hs256TokenIssuer {
    #[instrument(skip_all, name = "rc.auth.issue_token", fields(kind = claims.kind()))]
    fn issue(&self, claims: &AccessClaims) -> Result<String, RoomError> {
        claims.validate().map_err(|e| {
            tracing::error!(target: "rc.auth.issuer", error = %e, "Refusing to sign incomplete claims");
            RoomError::ExternalService(format!("Token generation failed: {e}"))
        })?;

        let mut payload = serde_json::to_value(claims).map_err(|e| {
            tracing::error!(target: "rc.auth.issuer", error = %e, "Failed to serialize claims");
            RoomError::ExternalService("Token generation failed".to_string())
        })?;

        let now = unix_now();
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        if let Value::Object(map) = &mut payload {
            map.insert("iat".to_string(), Value::from(now));
            map.insert("nbf".to_string(), Value::from(now));
            map.insert("exp".to_string(), Value::from(now.saturating_add(ttl_secs)));
            map.insert(
                "jti".to_string(),
                Value::from(uuid::Uuid::new_v4().to_string()),
            );
        }

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "rc.auth.issuer", error = %e, "Failed to sign token");
            RoomError::ExternalService("Token generation failed".to_string())
        })
    }
}
