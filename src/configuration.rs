use chrono::Duration;
use config::ConfigError;

use crate::auth::{Lifetimes, RotationPolicy, TokenType};
use crate::clock::aware_utcnow;
use crate::error::BackendError;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub jwt: JwtSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

/// Token signing and lifetime settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    pub signing_key: String,
    #[serde(default)]
    pub verifying_key: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub leeway: u64,                          // seconds
    #[serde(default = "default_access_lifetime")]
    pub access_token_lifetime: i64,           // seconds (e.g., 300 for 5 minutes)
    #[serde(default = "default_refresh_lifetime")]
    pub refresh_token_lifetime: i64,          // seconds (e.g., 86400 for 1 day)
    #[serde(default = "default_access_lifetime")]
    pub sliding_token_lifetime: i64,
    #[serde(default = "default_refresh_lifetime")]
    pub sliding_token_refresh_lifetime: i64,
    #[serde(default)]
    pub rotate_refresh_tokens: bool,
    #[serde(default)]
    pub blacklist_after_rotation: bool,
}

impl JwtSettings {
    /// HS256 settings with default lifetimes
    pub fn with_signing_key(signing_key: impl Into<String>) -> Self {
        Self {
            algorithm: default_algorithm(),
            signing_key: signing_key.into(),
            verifying_key: None,
            issuer: None,
            audience: None,
            leeway: 0,
            access_token_lifetime: default_access_lifetime(),
            refresh_token_lifetime: default_refresh_lifetime(),
            sliding_token_lifetime: default_access_lifetime(),
            sliding_token_refresh_lifetime: default_refresh_lifetime(),
            rotate_refresh_tokens: false,
            blacklist_after_rotation: false,
        }
    }

    /// Token lifetimes as durations
    ///
    /// # Errors
    /// Returns error if a lifetime is negative or an expiry computed from it
    /// would not be representable
    pub fn lifetimes(&self) -> Result<Lifetimes, BackendError> {
        Ok(Lifetimes {
            access: lifetime("access_token_lifetime", self.access_token_lifetime)?,
            refresh: lifetime("refresh_token_lifetime", self.refresh_token_lifetime)?,
            sliding: lifetime("sliding_token_lifetime", self.sliding_token_lifetime)?,
            sliding_refresh: lifetime(
                "sliding_token_refresh_lifetime",
                self.sliding_token_refresh_lifetime,
            )?,
        })
    }

    /// Clock skew tolerance as a duration
    ///
    /// # Errors
    /// Returns error if `now - leeway` would not be representable
    pub fn leeway(&self) -> Result<Duration, BackendError> {
        let seconds = i64::try_from(self.leeway)
            .map_err(|_| BackendError::InvalidDuration("leeway", "out of range".to_string()))?;
        let leeway = Duration::try_seconds(seconds)
            .ok_or_else(|| BackendError::InvalidDuration("leeway", "out of range".to_string()))?;

        if aware_utcnow().checked_sub_signed(leeway).is_none() {
            return Err(BackendError::InvalidDuration("leeway", "out of range".to_string()));
        }
        Ok(leeway)
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            rotate_refresh_tokens: self.rotate_refresh_tokens,
            blacklist_after_rotation: self.blacklist_after_rotation,
        }
    }
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("algorithm", &self.algorithm)
            .field("signing_key", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .finish_non_exhaustive()
    }
}

/// Bearer authentication settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct AuthSettings {
    #[serde(default = "default_header_types")]
    pub header_types: Vec<String>,
    #[serde(default = "default_token_types")]
    pub token_types: Vec<TokenType>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            header_types: default_header_types(),
            token_types: default_token_types(),
        }
    }
}

fn lifetime(name: &'static str, seconds: i64) -> Result<Duration, BackendError> {
    if seconds < 0 {
        return Err(BackendError::InvalidDuration(name, "must not be negative".to_string()));
    }
    let lifetime = Duration::try_seconds(seconds)
        .ok_or_else(|| BackendError::InvalidDuration(name, "out of range".to_string()))?;

    if aware_utcnow().checked_add_signed(lifetime).is_none() {
        return Err(BackendError::InvalidDuration(name, "out of range".to_string()));
    }
    Ok(lifetime)
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_lifetime() -> i64 {
    5 * 60
}

fn default_refresh_lifetime() -> i64 {
    24 * 60 * 60
}

fn default_header_types() -> Vec<String> {
    vec!["Bearer".to_string()]
}

fn default_token_types() -> Vec<TokenType> {
    vec![TokenType::Access]
}

/// Load settings from `configuration.{yaml,toml,json}` and `APP__*` environment variables
///
/// e.g. `APP__JWT__SIGNING_KEY` overrides `jwt.signing_key`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
