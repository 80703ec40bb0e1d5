/// Token blacklist collaborator
///
/// Refresh and sliding tokens can be revoked before they expire. The crate
/// does not store revocations itself: the embedding service plugs in a
/// `BlacklistStore` (database table, cache, ...) through `TokenContext`.
///
/// Stores are keyed by `jti`. Revocation records only need to live until the
/// token's own `expires_at` has passed.

use chrono::{DateTime, Utc};

use crate::auth::identity::UserId;

/// A token the service has issued and may later revoke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutstandingToken {
    pub jti: String,
    pub user_id: Option<UserId>,
    /// Encoded token as handed to the client
    pub token: String,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

pub trait BlacklistStore: Send + Sync {
    /// Whether a token with this jti has been revoked
    fn is_blacklisted(&self, jti: &str) -> bool;

    /// Remember an issued token. Recording the same jti twice keeps the first record.
    fn record_outstanding(&self, token: OutstandingToken);

    /// Revoke a token, recording it as outstanding first if it was never seen.
    ///
    /// Returns `false` when the jti was already blacklisted.
    fn blacklist(&self, token: OutstandingToken) -> bool;
}
