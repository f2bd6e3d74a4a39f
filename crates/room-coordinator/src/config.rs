//! Room coordinator configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use crate::models::DEFAULT_ROOM_CAPACITY;
use crate::services::matchmaker::DEFAULT_MAX_CONFLICT_RETRIES;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default listen host.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default service-account credential path.
pub const DEFAULT_SERVICE_ACCOUNT_PATH: &str = "/etc/secrets/service.json";

/// Default room API base URL.
pub const DEFAULT_ROOM_API_URL: &str = "https://api.100ms.live/v2";

/// Default identity-provider JWKS endpoint.
pub const DEFAULT_IDENTITY_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Default issued token lifetime in seconds (24 hours).
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 86_400;

/// Upper bound for `MAX_CONFLICT_RETRIES`.
pub const MAX_CONFLICT_RETRIES_LIMIT: u32 = 100;

/// Room coordinator configuration.
///
/// Loaded from environment variables with sensible defaults.
/// The signing secret and database URL are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// HS256 signing secret for issued tokens.
    pub app_secret: SecretString,

    /// Access key placed in every issued claim set.
    pub app_access_key: String,

    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Path of the service-account JSON credential.
    pub service_account_path: String,

    /// Room API base URL.
    pub room_api_url: String,

    /// Room template sent with provisioning requests, if any.
    pub room_template_id: Option<String>,

    /// Identity-provider JWKS endpoint.
    pub identity_jwks_url: String,

    /// Expected `aud` of identity tokens, also the issuer suffix.
    pub identity_project_id: String,

    /// PostgreSQL connection URL. `None` selects the in-memory registry.
    pub database_url: Option<String>,

    /// Participants per room.
    pub room_capacity: u32,

    /// Commit retries per room before giving up.
    pub max_conflict_retries: u32,

    /// Lifetime of issued tokens in seconds.
    pub token_ttl_seconds: u64,

    /// JWT clock skew tolerance in seconds for identity token `iat`.
    pub jwt_clock_skew_seconds: i64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_secret", &"[REDACTED]")
            .field("app_access_key", &self.app_access_key)
            .field("bind_address", &self.bind_address)
            .field("service_account_path", &self.service_account_path)
            .field("room_api_url", &self.room_api_url)
            .field("room_template_id", &self.room_template_id)
            .field("identity_jwks_url", &self.identity_jwks_url)
            .field("identity_project_id", &self.identity_project_id)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("room_capacity", &self.room_capacity)
            .field("max_conflict_retries", &self.max_conflict_retries)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid port configuration: {0}")]
    InvalidPort(String),

    #[error("Invalid room capacity configuration: {0}")]
    InvalidRoomCapacity(String),

    #[error("Invalid conflict retry configuration: {0}")]
    InvalidConflictRetries(String),

    #[error("Invalid token TTL configuration: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid service account credential: {0}")]
    ServiceAccount(String),
}

/// The part of a service-account credential we use.
#[derive(Debug, Deserialize)]
struct ServiceAccount {
    project_id: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let app_secret = SecretString::from(required(vars, "APP_SECRET")?);
        let app_access_key = required(vars, "APP_ACCESS_KEY")?;

        let port = match optional(vars, "PORT") {
            Some(value_str) => value_str.parse::<u16>().map_err(|e| {
                ConfigError::InvalidPort(format!(
                    "PORT must be a valid port number, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_PORT,
        };

        let bind_host =
            optional(vars, "BIND_HOST").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());
        let bind_address = format!("{bind_host}:{port}");

        let service_account_path =
            optional(vars, "SERVICE_ACCOUNT_PATH")
                .unwrap_or_else(|| DEFAULT_SERVICE_ACCOUNT_PATH.to_string());

        let room_api_url =
            optional(vars, "ROOM_API_URL").unwrap_or_else(|| DEFAULT_ROOM_API_URL.to_string());

        let room_template_id = optional(vars, "HMS_TEMPLATE_ID");

        let identity_jwks_url =
            optional(vars, "IDENTITY_JWKS_URL")
                .unwrap_or_else(|| DEFAULT_IDENTITY_JWKS_URL.to_string());

        // Explicit project id wins; otherwise it comes from the credential
        let identity_project_id = match optional(vars, "IDENTITY_PROJECT_ID") {
            Some(project_id) => project_id,
            None => load_service_account_project(&service_account_path)?,
        };

        let database_url = optional(vars, "DATABASE_URL");

        let room_capacity = parse_positive(vars, "ROOM_CAPACITY", DEFAULT_ROOM_CAPACITY)
            .map_err(ConfigError::InvalidRoomCapacity)?;

        let max_conflict_retries =
            parse_positive(vars, "MAX_CONFLICT_RETRIES", DEFAULT_MAX_CONFLICT_RETRIES)
                .map_err(ConfigError::InvalidConflictRetries)?;
        if max_conflict_retries > MAX_CONFLICT_RETRIES_LIMIT {
            return Err(ConfigError::InvalidConflictRetries(format!(
                "MAX_CONFLICT_RETRIES must not exceed {MAX_CONFLICT_RETRIES_LIMIT}, got {max_conflict_retries}"
            )));
        }

        let token_ttl_seconds = parse_positive(vars, "TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS)
            .map_err(ConfigError::InvalidTokenTtl)?;

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) =
            optional(vars, "JWT_CLOCK_SKEW_SECONDS")
        {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            let max = i64::try_from(MAX_CLOCK_SKEW.as_secs()).unwrap_or(i64::MAX);
            if value > max {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    max, value
                )));
            }

            value
        } else {
            i64::try_from(DEFAULT_CLOCK_SKEW.as_secs()).unwrap_or(i64::MAX)
        };

        Ok(Config {
            app_secret,
            app_access_key,
            bind_address,
            service_account_path,
            room_api_url,
            room_template_id,
            identity_jwks_url,
            identity_project_id,
            database_url,
            room_capacity,
            max_conflict_retries,
            token_ttl_seconds,
            jwt_clock_skew_seconds,
        })
    }
}

/// A variable that must be present and non-blank.
fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    optional(vars, name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// A variable that counts as unset when blank.
fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn parse_positive<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let Some(value_str) = optional(vars, name) else {
        return Ok(default);
    };

    let value: T = value_str.parse().map_err(|e| {
        format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        )
    })?;

    if value <= T::default() {
        return Err(format!("{name} must be greater than 0"));
    }

    Ok(value)
}

fn load_service_account_project(path: &str) -> Result<String, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ServiceAccount(format!(
            "cannot read {path} (set IDENTITY_PROJECT_ID to skip it): {e}"
        ))
    })?;

    let account: ServiceAccount = serde_json::from_str(&contents)
        .map_err(|e| ConfigError::ServiceAccount(format!("cannot parse {path}: {e}")))?;

    if account.project_id.trim().is_empty() {
        return Err(ConfigError::ServiceAccount(format!(
            "{path} has an empty project_id"
        )));
    }

    Ok(account.project_id)
}
