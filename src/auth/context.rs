/// Token context
///
/// Everything a token needs besides its claims: the backend that signs it,
/// per-type lifetimes, the clock, and the optional blacklist collaborator.
/// Built once at startup and shared by `Arc` between requests.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::auth::backend::TokenBackend;
use crate::auth::blacklist::BlacklistStore;
use crate::clock::{Clock, SystemClock};
use crate::configuration::JwtSettings;
use crate::error::BackendError;

/// How long each token type stays valid after issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub sliding: Duration,
    pub sliding_refresh: Duration,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(5),
            refresh: Duration::days(1),
            sliding: Duration::minutes(5),
            sliding_refresh: Duration::days(1),
        }
    }
}

/// What happens to a refresh token when it is exchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Issue a new refresh token alongside the access token
    pub rotate_refresh_tokens: bool,
    /// Blacklist the exchanged refresh token (needs a blacklist store)
    pub blacklist_after_rotation: bool,
}

pub struct TokenContext {
    backend: TokenBackend,
    lifetimes: Lifetimes,
    rotation: RotationPolicy,
    clock: Arc<dyn Clock>,
    blacklist: Option<Arc<dyn BlacklistStore>>,
}

impl TokenContext {
    pub fn new(backend: TokenBackend) -> Self {
        Self {
            backend,
            lifetimes: Lifetimes::default(),
            rotation: RotationPolicy::default(),
            clock: Arc::new(SystemClock),
            blacklist: None,
        }
    }

    /// Build a context from configuration
    ///
    /// # Errors
    /// Returns error if the configured algorithm, keys, lifetimes or leeway
    /// are unusable
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, BackendError> {
        let backend = TokenBackend::new(
            &settings.algorithm,
            Some(settings.signing_key.as_str()),
            settings.verifying_key.as_deref(),
            settings.issuer.clone(),
            settings.audience.clone(),
            settings.leeway()?,
        )?;

        Ok(Self::new(backend)
            .with_lifetimes(settings.lifetimes()?)
            .with_rotation(settings.rotation_policy()))
    }

    pub fn with_lifetimes(mut self, lifetimes: Lifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }

    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    /// Replace the clock for both the context and its backend
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.backend = self.backend.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_blacklist(mut self, blacklist: Arc<dyn BlacklistStore>) -> Self {
        self.blacklist = Some(blacklist);
        self
    }

    pub fn backend(&self) -> &TokenBackend {
        &self.backend
    }

    pub fn lifetimes(&self) -> &Lifetimes {
        &self.lifetimes
    }

    pub fn rotation(&self) -> RotationPolicy {
        self.rotation
    }

    pub fn blacklist(&self) -> Option<&dyn BlacklistStore> {
        self.blacklist.as_deref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl fmt::Debug for TokenContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenContext")
            .field("backend", &self.backend)
            .field("lifetimes", &self.lifetimes)
            .field("rotation", &self.rotation)
            .field("clock", &self.clock)
            .field("blacklist", &self.blacklist.is_some())
            .finish()
    }
}
