//! Identity token verification.
//!
//! Validates identity-provider ID tokens (RS256) against the provider's
//! JWKS and returns the verified user id.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 with RSA keys of at least 2048 bits is accepted
//! - `aud` must equal the project id and `iss` the project's issuer URL
//! - Expiration and issued-at claims are validated with clock skew tolerance
//! - Generic error messages prevent information leakage

use crate::auth::claims::{AuthenticatedUser, IdentityClaims};
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::RoomError;
use common::jwt::{decode_jwk_component, extract_kid, validate_iat};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Issuer URL prefix for identity tokens; the project id is appended.
pub const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Minimum RSA modulus length in bytes (2048 bits).
const MIN_RSA_MODULUS_BYTES: usize = 256;

/// Longest accepted user id.
const MAX_USER_ID_LEN: usize = 128;

/// Turns a bearer credential into a verified user.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::Auth` for any invalid credential and
    /// `RoomError::ExternalService` if the identity provider is unreachable.
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, RoomError>;
}

fn invalid_token() -> RoomError {
    RoomError::Auth("Invalid token".to_string())
}

/// JWKS-backed RS256 identity verifier.
pub struct JwtIdentityVerifier {
    jwks_client: Arc<JwksClient>,
    project_id: String,
    clock_skew: Duration,
}

impl JwtIdentityVerifier {
    /// Create a verifier expecting tokens issued for `project_id`.
    pub fn new(jwks_client: Arc<JwksClient>, project_id: String, clock_skew: Duration) -> Self {
        Self {
            jwks_client,
            project_id,
            clock_skew,
        }
    }

    fn issuer(&self) -> String {
        format!("{ISSUER_PREFIX}{}", self.project_id)
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    /// # Security Checks
    ///
    /// 1. Size check and `kid` extraction
    /// 2. Public key lookup in the JWKS
    /// 3. RS256 signature, `exp`, `aud` and `iss`
    /// 4. `iat` with clock skew tolerance
    /// 5. Non-empty, bounded `sub`
    #[instrument(skip_all, name = "rc.auth.verify_identity")]
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, RoomError> {
        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "rc.auth.jwt", error = ?e, "Token kid extraction failed");
            invalid_token()
        })?;

        let jwk = self.jwks_client.get_key(&kid).await?;

        let claims = verify_token(token, &jwk, &self.project_id, &self.issuer())?;

        if let Err(e) = validate_iat(claims.iat, self.clock_skew) {
            tracing::debug!(target: "rc.auth.jwt", error = ?e, "Token iat validation failed");
            return Err(invalid_token());
        }

        if claims.sub.is_empty() || claims.sub.len() > MAX_USER_ID_LEN {
            tracing::debug!(target: "rc.auth.jwt", sub_len = claims.sub.len(), "Token subject rejected");
            return Err(invalid_token());
        }

        tracing::debug!(target: "rc.auth.jwt", "Token validated successfully");
        Ok(AuthenticatedUser {
            user_id: claims.sub,
        })
    }
}

/// Verify the JWT signature against `jwk` and extract the claims.
fn verify_token(
    token: &str,
    jwk: &Jwk,
    audience: &str,
    issuer: &str,
) -> Result<IdentityClaims, RoomError> {
    if jwk.kty != "RSA" {
        tracing::warn!(target: "rc.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(invalid_token());
    }
    if let Some(alg) = &jwk.alg {
        if alg != "RS256" {
            tracing::warn!(target: "rc.auth.jwt", alg = %alg, "Unexpected JWK algorithm");
            return Err(invalid_token());
        }
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::error!(target: "rc.auth.jwt", kid = %jwk.kid, "JWK missing RSA components");
        return Err(invalid_token());
    };

    let modulus = decode_jwk_component(n).map_err(|err| {
        tracing::error!(target: "rc.auth.jwt", error = %err, "Invalid RSA modulus encoding");
        invalid_token()
    })?;
    // A leading zero byte does not count towards the key size
    let modulus_len = modulus.iter().skip_while(|b| **b == 0).count();
    if modulus_len < MIN_RSA_MODULUS_BYTES {
        tracing::warn!(target: "rc.auth.jwt", kid = %jwk.kid, modulus_len, "RSA key too short");
        return Err(invalid_token());
    }

    let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
        tracing::error!(target: "rc.auth.jwt", error = %err, "Invalid RSA public key");
        invalid_token()
    })?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    validation.set_audience(&[audience]);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

    let token_data = decode::<IdentityClaims>(token, &decoding_key, &validation).map_err(|err| {
        tracing::debug!(target: "rc.auth.jwt", error = %err, "Token verification failed");
        invalid_token()
    })?;

    Ok(token_data.claims)
}

/// Mock identity verifiers for testing.
pub mod mock {
    use super::*;
    use std::collections::HashMap;

    /// Verifier backed by a fixed token table.
    pub struct StaticIdentityVerifier {
        tokens: HashMap<String, String>,
        token_is_user: bool,
    }

    impl StaticIdentityVerifier {
        /// Accept exactly the given `(token, user_id)` pairs.
        pub fn with_tokens<I, T, U>(tokens: I) -> Self
        where
            I: IntoIterator<Item = (T, U)>,
            T: Into<String>,
            U: Into<String>,
        {
            Self {
                tokens: tokens
                    .into_iter()
                    .map(|(t, u)| (t.into(), u.into()))
                    .collect(),
                token_is_user: false,
            }
        }

        /// Accept any non-empty token and use it as the user id.
        pub fn token_is_user() -> Self {
            Self {
                tokens: HashMap::new(),
                token_is_user: true,
            }
        }
    }

    #[async_trait::async_trait]
    impl IdentityVerifier for StaticIdentityVerifier {
        async fn verify(&self, token: &str) -> Result<AuthenticatedUser, RoomError> {
            if let Some(user_id) = self.tokens.get(token) {
                return Ok(AuthenticatedUser {
                    user_id: user_id.clone(),
                });
            }
            if self.token_is_user && !token.is_empty() {
                return Ok(AuthenticatedUser {
                    user_id: token.to_string(),
                });
            }
            Err(invalid_token())
        }
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const AUDIENCE: &str = "roulette-test";

    fn fake_token() -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT","kid":"test-key"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            r#"{"sub":"u1","aud":"roulette-test","iss":"https://securetoken.google.com/roulette-test","exp":9999999999,"iat":1700000000}"#,
        );
        format!("{header}.{payload}.fake_signature")
    }

    fn rsa_jwk(n: Option<String>, alg: Option<&str>) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: "test-key".to_string(),
            n,
            e: Some("AQAB".to_string()),
            alg: alg.map(ToString::to_string),
            key_use: Some("sig".to_string()),
        }
    }

    fn long_modulus() -> String {
        URL_SAFE_NO_PAD.encode([0xC5_u8; 256])
    }

    fn issuer() -> String {
        format!("{ISSUER_PREFIX}{AUDIENCE}")
    }

    #[test]
    fn test_rejects_non_rsa_key_type() {
        let mut jwk = rsa_jwk(Some(long_modulus()), Some("RS256"));
        jwk.kty = "OKP".to_string();

        let err = verify_token(&fake_token(), &jwk, AUDIENCE, &issuer()).unwrap_err();
        assert!(matches!(err, RoomError::Auth(msg) if msg == "Invalid token"));
    }

    #[test]
    fn test_rejects_non_rs256_algorithm() {
        let jwk = rsa_jwk(Some(long_modulus()), Some("HS256"));
        let result = verify_token(&fake_token(), &jwk, AUDIENCE, &issuer());
        assert!(matches!(result, Err(RoomError::Auth(_))));
    }

    #[test]
    fn test_rejects_missing_modulus() {
        let jwk = rsa_jwk(None, Some("RS256"));
        let result = verify_token(&fake_token(), &jwk, AUDIENCE, &issuer());
        assert!(matches!(result, Err(RoomError::Auth(_))));
    }

    #[test]
    fn test_rejects_short_modulus() {
        // 1024-bit key
        let jwk = rsa_jwk(Some(URL_SAFE_NO_PAD.encode([0xC5_u8; 128])), Some("RS256"));
        let result = verify_token(&fake_token(), &jwk, AUDIENCE, &issuer());
        assert!(matches!(result, Err(RoomError::Auth(_))));
    }

    #[test]
    fn test_rejects_invalid_modulus_encoding() {
        let jwk = rsa_jwk(Some("!!!not-base64!!!".to_string()), Some("RS256"));
        let result = verify_token(&fake_token(), &jwk, AUDIENCE, &issuer());
        assert!(matches!(result, Err(RoomError::Auth(_))));
    }

    #[test]
    fn test_bad_signature_fails_after_key_checks() {
        // Key passes JWK checks; the fake signature does not verify
        let jwk = rsa_jwk(Some(long_modulus()), None);
        let result = verify_token(&fake_token(), &jwk, AUDIENCE, &issuer());
        assert!(matches!(result, Err(RoomError::Auth(_))));
    }

    #[test]
    fn test_verifier_issuer_uses_project_id() {
        let verifier = JwtIdentityVerifier::new(
            Arc::new(JwksClient::new("http://localhost/jwks".to_string())),
            "my-project".to_string(),
            Duration::from_secs(300),
        );
        assert_eq!(verifier.issuer(), "https://securetoken.google.com/my-project");
    }

    #[tokio::test]
    async fn test_verify_rejects_malformed_token_before_fetch() {
        // Unroutable JWKS URL: a fetch would surface as ExternalService
        let verifier = JwtIdentityVerifier::new(
            Arc::new(JwksClient::new("http://127.0.0.1:9/jwks".to_string())),
            AUDIENCE.to_string(),
            Duration::from_secs(300),
        );

        let result = verifier.verify("not-a-jwt").await;
        assert!(matches!(result, Err(RoomError::Auth(_))));
    }
}
