/// Session flows
///
/// The operations behind login, refresh, verify and logout endpoints. Each
/// takes encoded strings in and hands encoded strings back; routing and
/// request parsing stay with the embedding service.
///
/// Refresh rotation follows `RotationPolicy`:
/// - without rotation the refresh token is reused until it expires
/// - with rotation a new refresh token (new `jti`, `exp`, `iat`) is issued
/// - with blacklisting the exchanged refresh token can no longer be used

use std::sync::Arc;

use serde::Serialize;

use crate::auth::claims::{EXP_CLAIM, IAT_CLAIM, REFRESH_EXP_CLAIM};
use crate::auth::context::TokenContext;
use crate::auth::identity::Identity;
use crate::auth::tokens::{RefreshToken, SlidingToken, UntypedToken};
use crate::error::TokenError;

/// Tokens handed out at login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Result of exchanging a refresh token
#[derive(Debug, Clone, Serialize)]
pub struct RefreshedPair {
    pub access: String,
    /// Present only when refresh tokens are rotated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// Issue a refresh token and its access token for a user
///
/// # Errors
/// Returns error if either token cannot be signed
pub fn obtain_pair<U: Identity>(context: &Arc<TokenContext>, user: &U) -> Result<TokenPair, TokenError> {
    let refresh = RefreshToken::for_user(context, user)?;
    let access = refresh.access_token();

    Ok(TokenPair {
        refresh: refresh.encode().map_err(TokenError::Encoding)?,
        access: access.encode().map_err(TokenError::Encoding)?,
    })
}

/// Issue a sliding token for a user
pub fn obtain_sliding<U: Identity>(context: &Arc<TokenContext>, user: &U) -> Result<String, TokenError> {
    SlidingToken::for_user(context, user)?
        .encode()
        .map_err(TokenError::Encoding)
}

/// Exchange a refresh token for a new access token
///
/// # Errors
/// Returns error if the refresh token fails verification, or if rotation
/// needs the blacklist store and none is configured
pub fn refresh_pair(context: &Arc<TokenContext>, raw_refresh: &str) -> Result<RefreshedPair, TokenError> {
    let mut refresh = RefreshToken::from_encoded(context, raw_refresh, true)?;
    let access = refresh
        .access_token()
        .encode()
        .map_err(TokenError::Encoding)?;

    let rotation = context.rotation();
    if !rotation.rotate_refresh_tokens {
        return Ok(RefreshedPair {
            access,
            refresh: None,
        });
    }

    if rotation.blacklist_after_rotation {
        refresh.blacklist()?;
    }

    refresh.set_jti();
    refresh.set_exp(EXP_CLAIM, None, None);
    refresh.set_iat(IAT_CLAIM, None);

    let rotated = refresh.encode().map_err(TokenError::Encoding)?;
    if context.blacklist().is_some() {
        refresh.outstand()?;
    }

    tracing::info!(jti = ?refresh.claims().jti(), "Refresh token rotated");
    Ok(RefreshedPair {
        access,
        refresh: Some(rotated),
    })
}

/// Extend a sliding token while its refresh window is open
///
/// # Errors
/// Returns error if the token fails verification or `refresh_exp` has passed
pub fn refresh_sliding(context: &Arc<TokenContext>, raw_sliding: &str) -> Result<String, TokenError> {
    let mut token = SlidingToken::from_encoded(context, raw_sliding, true)?;
    token.check_exp(REFRESH_EXP_CLAIM, None)?;

    token.set_exp(EXP_CLAIM, None, None);
    token.set_iat(IAT_CLAIM, None);
    token.encode().map_err(TokenError::Encoding)
}

/// Check signature, expiry and revocation of any token type
pub fn verify(context: &Arc<TokenContext>, raw: &str) -> Result<(), TokenError> {
    let token = UntypedToken::from_encoded(context, raw, true)?;

    if let (Some(store), Some(jti)) = (context.blacklist(), token.claims().jti()) {
        if store.is_blacklisted(jti) {
            return Err(TokenError::Blacklisted);
        }
    }
    Ok(())
}

/// Revoke a refresh token (logout)
///
/// Returns `false` if it was already revoked.
pub fn revoke(context: &Arc<TokenContext>, raw_refresh: &str) -> Result<bool, TokenError> {
    RefreshToken::from_encoded(context, raw_refresh, true)?.blacklist()
}
