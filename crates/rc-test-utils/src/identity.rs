//! Identity-provider fixture.
//!
//! A fixed 2048-bit RSA key pair that mints RS256 ID tokens and serves the
//! matching JWKS document, for exercising the real JWKS verifier against a
//! mock HTTP endpoint.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

/// PKCS#1 private key of the test identity provider.
const IDENTITY_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/identity_rsa.pem");

/// Base64url modulus of [`IDENTITY_PRIVATE_KEY_PEM`].
const IDENTITY_MODULUS: &str = "vr508-LBrQLl5Q9XQhiDNIonTgwfA9WfhV60CD8W0jVqWoysuXsX733wimJcEuYRS6rpACsKuu5liXQqnM0Tnjlgt5uVClkP_I7IFUb3YCnTNtc1ORZauVx38dudvisD2L9qyQk0zYrAxVGdeHcrK7F7M4AWjqBsZdbT5nJt6taUH4q3sq9M6qBYZsLOC2Cbo-1WnvM3-Y6WjZeKuSMJqUaLWzXzLevzQIVcLqnuodz17Mx0P9taiYwizLWvoG8F9heFSC3pN2lvfHpzs2N5FyLis6l15ERaZzwbv1Za7DGyID4MCHECufWEwQNi-rNcyy40HznRxY_cY9XBwyRjSQ";

/// Base64url public exponent (65537).
const IDENTITY_EXPONENT: &str = "AQAB";

/// Issuer prefix used by the identity provider.
const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Test identity provider.
pub struct TestIdentityProvider {
    kid: String,
    project_id: String,
    encoding_key: EncodingKey,
}

impl TestIdentityProvider {
    /// Provider for `project_id` publishing its key under `kid`.
    pub fn new(kid: &str, project_id: &str) -> Self {
        let encoding_key = EncodingKey::from_rsa_pem(IDENTITY_PRIVATE_KEY_PEM.as_bytes())
            .expect("fixture key must parse");
        Self {
            kid: kid.to_string(),
            project_id: project_id.to_string(),
            encoding_key,
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn issuer(&self) -> String {
        format!("{ISSUER_PREFIX}{}", self.project_id)
    }

    /// JWKS document containing the provider's public key.
    pub fn jwks(&self) -> Value {
        json!({
            "keys": [{
                "kty": "RSA",
                "kid": self.kid,
                "alg": "RS256",
                "use": "sig",
                "n": IDENTITY_MODULUS,
                "e": IDENTITY_EXPONENT,
            }]
        })
    }

    /// Claims of a valid ID token for `sub`, issued now.
    pub fn claims_for(&self, sub: &str) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "sub": sub,
            "aud": self.project_id,
            "iss": self.issuer(),
            "iat": now,
            "exp": now + 3600,
            "auth_time": now,
        })
    }

    /// Mint a valid ID token for `sub`.
    pub fn mint(&self, sub: &str) -> String {
        self.mint_claims(&self.claims_for(sub))
    }

    /// Sign arbitrary claims with the provider key and `kid` header.
    pub fn mint_claims(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key).expect("fixture signing must succeed")
    }
}
