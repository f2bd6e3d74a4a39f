//! Claim sets.
//!
//! - [`IdentityClaims`]: payload of an identity-provider ID token
//! - [`AuthenticatedUser`]: the verified caller, stored in request extensions
//! - [`AccessClaims`]: claim sets this service signs for the video API
//!
//! User identifiers are redacted in Debug output to keep them out of logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Claim set version expected by the video API.
pub const ACCESS_TOKEN_VERSION: u8 = 2;

/// Role granted to every participant.
pub const DEFAULT_PARTICIPANT_ROLE: &str = "host";

/// Permission set granted to every participant.
pub const DEFAULT_PARTICIPANT_PERMISSIONS: [&str; 3] = ["audio", "video", "chat"];

/// Payload of an identity-provider ID token.
#[derive(Clone, Deserialize)]
pub struct IdentityClaims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: String,

    /// Audience (identity project id).
    pub aud: String,

    /// Issuer.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Email, when the sign-in method provides one - redacted in Debug output.
    #[serde(default)]
    pub email: Option<String>,
}

impl fmt::Debug for IdentityClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClaims")
            .field("sub", &"[REDACTED]")
            .field("aud", &self.aud)
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The caller of a request, as established by the identity verifier.
///
/// Inserted into request extensions by the auth middleware; each request
/// gets its own value.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("user_id", &"[REDACTED]")
            .finish()
    }
}

/// A claim set is missing a required value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    #[error("claim `{0}` is required")]
    MissingField(&'static str),
}

/// Claim sets signed by the token issuer.
///
/// Serialized with a `type` tag: `management` or `app`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum AccessClaims {
    /// Authorizes calls to the room API. Not tied to a participant.
    #[serde(rename = "management")]
    Management(ManagementClaims),

    /// Scopes a token to one user's membership in one room.
    #[serde(rename = "app")]
    Participant(ParticipantClaims),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagementClaims {
    pub access_key: String,
    pub version: u8,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantClaims {
    pub access_key: String,
    pub room_id: String,
    /// Redacted in Debug output.
    pub user_id: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub version: u8,
}

impl fmt::Debug for ParticipantClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantClaims")
            .field("access_key", &self.access_key)
            .field("room_id", &self.room_id)
            .field("user_id", &"[REDACTED]")
            .field("role", &self.role)
            .field("permissions", &self.permissions)
            .field("version", &self.version)
            .finish()
    }
}

impl AccessClaims {
    /// Management claim set for `access_key`.
    pub fn management(access_key: impl Into<String>) -> Self {
        AccessClaims::Management(ManagementClaims {
            access_key: access_key.into(),
            version: ACCESS_TOKEN_VERSION,
        })
    }

    /// Participant claim set with the default role and permissions.
    pub fn participant(
        access_key: impl Into<String>,
        room_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        AccessClaims::Participant(ParticipantClaims {
            access_key: access_key.into(),
            room_id: room_id.into(),
            user_id: user_id.into(),
            role: DEFAULT_PARTICIPANT_ROLE.to_string(),
            permissions: DEFAULT_PARTICIPANT_PERMISSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            version: ACCESS_TOKEN_VERSION,
        })
    }

    /// Claim set kind, as used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AccessClaims::Management(_) => "management",
            AccessClaims::Participant(_) => "app",
        }
    }

    /// Check that every required value is present.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::MissingField` naming the first empty claim.
    pub fn validate(&self) -> Result<(), ClaimsError> {
        fn require(value: &str, name: &'static str) -> Result<(), ClaimsError> {
            if value.trim().is_empty() {
                Err(ClaimsError::MissingField(name))
            } else {
                Ok(())
            }
        }

        match self {
            AccessClaims::Management(claims) => require(&claims.access_key, "access_key"),
            AccessClaims::Participant(claims) => {
                require(&claims.access_key, "access_key")?;
                require(&claims.room_id, "room_id")?;
                require(&claims.user_id, "user_id")?;
                require(&claims.role, "role")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_claims_debug_redacts_sub_and_email() {
        let claims: IdentityClaims = serde_json::from_str(
            r#"{"sub":"firebase-uid-123","aud":"proj","iss":"https://securetoken.google.com/proj",
                "exp":2000000000,"iat":1700000000,"email":"someone@example.com"}"#,
        )
        .unwrap();

        let debug_str = format!("{claims:?}");
        assert!(!debug_str.contains("firebase-uid-123"));
        assert!(!debug_str.contains("someone@example.com"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_authenticated_user_debug_redacts_user_id() {
        let user = AuthenticatedUser {
            user_id: "uid-secret".to_string(),
        };
        assert!(!format!("{user:?}").contains("uid-secret"));
    }

    #[test]
    fn test_management_claims_serialize_with_type_tag() {
        let json = serde_json::to_value(AccessClaims::management("key-1")).unwrap();

        assert_eq!(json["type"], "management");
        assert_eq!(json["access_key"], "key-1");
        assert_eq!(json["version"], 2);
    }

    #[test]
    fn test_participant_claims_serialize_with_app_tag() {
        let json =
            serde_json::to_value(AccessClaims::participant("key-1", "room-1", "u1")).unwrap();

        assert_eq!(json["type"], "app");
        assert_eq!(json["room_id"], "room-1");
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["role"], "host");
        assert_eq!(
            json["permissions"],
            serde_json::json!(["audio", "video", "chat"])
        );
        assert_eq!(json["version"], 2);
    }

    #[test]
    fn test_participant_claims_debug_redacts_user_id() {
        let claims = AccessClaims::participant("key-1", "room-1", "uid-secret");
        let debug_str = format!("{claims:?}");
        assert!(!debug_str.contains("uid-secret"));
        assert!(debug_str.contains("room-1"));
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        assert!(AccessClaims::management("key").validate().is_ok());
        assert_eq!(
            AccessClaims::management("").validate(),
            Err(ClaimsError::MissingField("access_key"))
        );
        assert_eq!(
            AccessClaims::participant("key", " ", "u1").validate(),
            Err(ClaimsError::MissingField("room_id"))
        );
        assert_eq!(
            AccessClaims::participant("key", "room-1", "").validate(),
            Err(ClaimsError::MissingField("user_id"))
        );
    }
}
