/// Token lifecycle
///
/// `Token<K>` wraps a claim set and knows how to build, verify and re-encode
/// it. The kind marker `K` fixes the type tag, the lifetime and the
/// type-check step:
///
/// | kind      | `token_type` | lifetime                    |
/// |-----------|--------------|-----------------------------|
/// | `Access`  | `access`     | `Lifetimes::access`         |
/// | `Refresh` | `refresh`    | `Lifetimes::refresh`        |
/// | `Sliding` | `sliding`    | `Lifetimes::sliding`        |
/// | `Untyped` | `untyped`    | zero, type is never checked |
///
/// A token is either fresh (claims stamped from the context clock) or
/// decoded from a string, in which case it is verified unless asked not to.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::blacklist::OutstandingToken;
use crate::auth::claims::{
    ClaimSet, EXP_CLAIM, IAT_CLAIM, JTI_CLAIM, REFRESH_EXP_CLAIM, TOKEN_TYPE_CLAIM,
    USER_ID_CLAIM,
};
use crate::auth::context::{Lifetimes, TokenContext};
use crate::auth::identity::{Identity, UserId};
use crate::clock::{datetime_from_claim, datetime_to_epoch};
use crate::error::{BackendError, TokenError};

/// Claims a derived access token never inherits from its refresh token
const NO_COPY_CLAIMS: [&str; 3] = [TOKEN_TYPE_CLAIM, EXP_CLAIM, JTI_CLAIM];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
    Sliding,
    Untyped,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::Sliding => "sliding",
            TokenType::Untyped => "untyped",
        }
    }

    /// Name reported in authentication diagnostics
    pub fn class_name(&self) -> &'static str {
        match self {
            TokenType::Access => "AccessToken",
            TokenType::Refresh => "RefreshToken",
            TokenType::Sliding => "SlidingToken",
            TokenType::Untyped => "UntypedToken",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown token type '{0}'")]
pub struct UnknownTokenType(pub String);

impl FromStr for TokenType {
    type Err = UnknownTokenType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenType::Access),
            "refresh" => Ok(TokenType::Refresh),
            "sliding" => Ok(TokenType::Sliding),
            "untyped" => Ok(TokenType::Untyped),
            other => Err(UnknownTokenType(other.to_string())),
        }
    }
}

/// Per-kind behaviour of a token
pub trait TokenKind: fmt::Debug + Clone + Send + Sync + 'static {
    const TOKEN_TYPE: TokenType;

    /// Whether verification consults the blacklist store
    const USES_BLACKLIST: bool = false;

    fn lifetime(lifetimes: &Lifetimes) -> Duration;

    /// Ensures the `token_type` claim is present and matches this kind
    fn verify_token_type(claims: &ClaimSet) -> Result<(), TokenError> {
        let token_type = claims
            .get(TOKEN_TYPE_CLAIM)
            .ok_or(TokenError::MissingType)?;

        if token_type.as_str() != Some(Self::TOKEN_TYPE.as_str()) {
            return Err(TokenError::WrongType);
        }
        Ok(())
    }

    /// Extra claims stamped on fresh tokens
    fn init_fresh(_token: &mut Token<Self>) {}
}

#[derive(Debug, Clone, Copy)]
pub struct Access;

#[derive(Debug, Clone, Copy)]
pub struct Refresh;

#[derive(Debug, Clone, Copy)]
pub struct Sliding;

#[derive(Debug, Clone, Copy)]
pub struct Untyped;

impl TokenKind for Access {
    const TOKEN_TYPE: TokenType = TokenType::Access;

    fn lifetime(lifetimes: &Lifetimes) -> Duration {
        lifetimes.access
    }
}

impl TokenKind for Refresh {
    const TOKEN_TYPE: TokenType = TokenType::Refresh;
    const USES_BLACKLIST: bool = true;

    fn lifetime(lifetimes: &Lifetimes) -> Duration {
        lifetimes.refresh
    }
}

impl TokenKind for Sliding {
    const TOKEN_TYPE: TokenType = TokenType::Sliding;
    const USES_BLACKLIST: bool = true;

    fn lifetime(lifetimes: &Lifetimes) -> Duration {
        lifetimes.sliding
    }

    fn init_fresh(token: &mut Token<Self>) {
        let window = token.context.lifetimes().sliding_refresh;
        token.set_exp(REFRESH_EXP_CLAIM, None, Some(window));
    }
}

impl TokenKind for Untyped {
    const TOKEN_TYPE: TokenType = TokenType::Untyped;

    fn lifetime(_lifetimes: &Lifetimes) -> Duration {
        Duration::zero()
    }

    // Used for signature and expiry checks that do not care about intent
    fn verify_token_type(_claims: &ClaimSet) -> Result<(), TokenError> {
        Ok(())
    }
}

pub type AccessToken = Token<Access>;
pub type RefreshToken = Token<Refresh>;
pub type SlidingToken = Token<Sliding>;
pub type UntypedToken = Token<Untyped>;

#[derive(Clone)]
pub struct Token<K: TokenKind> {
    claims: ClaimSet,
    /// Instant of construction or decoding; all relative timestamps anchor here
    current_time: DateTime<Utc>,
    context: Arc<TokenContext>,
    kind: PhantomData<K>,
}

impl<K: TokenKind> Token<K> {
    /// Build a fresh token with `token_type`, `exp`, `iat` and `jti` set
    pub fn new(context: &Arc<TokenContext>) -> Self {
        let mut token = Self {
            claims: ClaimSet::new(),
            current_time: context.now(),
            context: Arc::clone(context),
            kind: PhantomData,
        };

        token.claims.insert(TOKEN_TYPE_CLAIM, K::TOKEN_TYPE.as_str());
        token.set_exp(EXP_CLAIM, None, None);
        token.set_iat(IAT_CLAIM, None);
        token.set_jti();
        K::init_fresh(&mut token);
        token
    }

    /// Rebuild a token from its encoded form
    ///
    /// # Errors
    /// Returns `TokenError::Invalid` if the backend rejects the string, or the
    /// first failing verification step when `verify` is set
    pub fn from_encoded(
        context: &Arc<TokenContext>,
        encoded: &str,
        verify: bool,
    ) -> Result<Self, TokenError> {
        let current_time = context.now();
        let claims = context.backend().decode(encoded, verify).map_err(|e| {
            tracing::debug!(error = %e, token_type = %K::TOKEN_TYPE, "Token decoding failed");
            TokenError::Invalid
        })?;

        let token = Self {
            claims,
            current_time,
            context: Arc::clone(context),
            kind: PhantomData,
        };

        if verify {
            token.verify()?;
        }
        Ok(token)
    }

    /// Issue a token for a user, recording it as outstanding where tracked
    ///
    /// # Errors
    /// Returns error only if recording the outstanding token fails to encode
    pub fn for_user<U: Identity>(context: &Arc<TokenContext>, user: &U) -> Result<Self, TokenError> {
        let user_id = user.id();
        let mut token = Self::new(context);
        token.insert(USER_ID_CLAIM, user_id.to_claim());

        if K::USES_BLACKLIST && context.blacklist().is_some() {
            token.outstand()?;
        }

        tracing::debug!(user_id = %user_id, token_type = %K::TOKEN_TYPE, "Token issued");
        Ok(token)
    }

    /// Checks not covered by signature verification
    pub fn verify(&self) -> Result<(), TokenError> {
        // exp is optional per RFC 7519 but a session token without one never dies
        self.check_exp(EXP_CLAIM, None)?;

        if !self.claims.contains_key(JTI_CLAIM) {
            return Err(TokenError::MissingId);
        }

        K::verify_token_type(&self.claims)?;

        if K::USES_BLACKLIST {
            self.check_blacklist()?;
        }
        Ok(())
    }

    pub fn verify_token_type(&self) -> Result<(), TokenError> {
        K::verify_token_type(&self.claims)
    }

    /// Fails if the timestamp in `claim` is at or before `current_time - leeway`
    ///
    /// `current_time` defaults to the token's own construction instant.
    pub fn check_exp(
        &self,
        claim: &str,
        current_time: Option<DateTime<Utc>>,
    ) -> Result<(), TokenError> {
        let current_time = current_time.unwrap_or(self.current_time);
        let value = self
            .claims
            .get(claim)
            .ok_or_else(|| TokenError::MissingClaim(claim.to_string()))?;
        let claim_time = datetime_from_claim(value)
            .ok_or_else(|| TokenError::InvalidClaim(claim.to_string()))?;

        let expired = current_time
            .checked_sub_signed(self.context.backend().leeway())
            .is_some_and(|edge| claim_time <= edge);
        if expired {
            return Err(TokenError::Expired(claim.to_string()));
        }
        Ok(())
    }

    fn check_blacklist(&self) -> Result<(), TokenError> {
        let Some(store) = self.context.blacklist() else {
            return Ok(());
        };
        let jti = self.claims.jti().ok_or(TokenError::MissingId)?;

        if store.is_blacklisted(jti) {
            tracing::warn!(jti = %jti, token_type = %K::TOKEN_TYPE, "Blacklisted token presented");
            return Err(TokenError::Blacklisted);
        }
        Ok(())
    }

    /// Sets a new `jti` (UUID v4 as 32 hex characters)
    pub fn set_jti(&mut self) {
        self.claims
            .insert(JTI_CLAIM, Uuid::new_v4().simple().to_string());
    }

    /// Sets `claim` to `from_time + lifetime`, defaulting to the token's own
    /// construction instant and lifetime
    ///
    /// Saturates at the latest representable instant.
    pub fn set_exp(
        &mut self,
        claim: &str,
        from_time: Option<DateTime<Utc>>,
        lifetime: Option<Duration>,
    ) {
        let from_time = from_time.unwrap_or(self.current_time);
        let lifetime = lifetime.unwrap_or_else(|| self.lifetime());
        let expires_at = from_time
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.claims.insert(claim, datetime_to_epoch(expires_at));
    }

    pub fn set_iat(&mut self, claim: &str, at_time: Option<DateTime<Utc>>) {
        let at_time = at_time.unwrap_or(self.current_time);
        self.claims.insert(claim, datetime_to_epoch(at_time));
    }

    /// Sign the current claims; reflects every mutation made so far
    pub fn encode(&self) -> Result<String, BackendError> {
        self.context.backend().encode(&self.claims)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.claims.get(key).unwrap_or(default)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.claims.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.claims.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.claims.contains_key(key)
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.current_time
    }

    pub fn token_type(&self) -> TokenType {
        K::TOKEN_TYPE
    }

    pub fn lifetime(&self) -> Duration {
        K::lifetime(self.context.lifetimes())
    }

    pub fn context(&self) -> &Arc<TokenContext> {
        &self.context
    }

    /// Record this token with the blacklist store without revoking it
    pub fn outstand(&self) -> Result<(), TokenError> {
        let store = self
            .context
            .blacklist()
            .ok_or(TokenError::BlacklistUnavailable)?;
        store.record_outstanding(self.outstanding_record()?);
        Ok(())
    }

    /// Revoke this token
    ///
    /// Returns `false` if it was already blacklisted.
    pub fn blacklist(&self) -> Result<bool, TokenError> {
        let store = self
            .context
            .blacklist()
            .ok_or(TokenError::BlacklistUnavailable)?;
        let record = self.outstanding_record()?;
        let jti = record.jti.clone();

        let newly_blacklisted = store.blacklist(record);
        tracing::info!(jti = %jti, token_type = %K::TOKEN_TYPE, newly_blacklisted, "Token blacklisted");
        Ok(newly_blacklisted)
    }

    fn outstanding_record(&self) -> Result<OutstandingToken, TokenError> {
        let jti = self.claims.jti().ok_or(TokenError::MissingId)?.to_string();
        let expires_at = self
            .claims
            .get(EXP_CLAIM)
            .ok_or_else(|| TokenError::MissingClaim(EXP_CLAIM.to_string()))
            .and_then(|exp| {
                datetime_from_claim(exp).ok_or_else(|| TokenError::InvalidClaim(EXP_CLAIM.to_string()))
            })?;
        let token = self.encode().map_err(TokenError::Encoding)?;

        Ok(OutstandingToken {
            jti,
            user_id: self.claims.user_id().and_then(UserId::from_claim),
            token,
            created_at: self.claims.get(IAT_CLAIM).and_then(datetime_from_claim),
            expires_at,
        })
    }
}

impl Token<Refresh> {
    /// Access token derived from this refresh token
    ///
    /// Its `exp` is anchored at this token's construction instant so a pair
    /// issued together expires on the same schedule. Every claim except
    /// `token_type`, `exp` and `jti` is copied over.
    pub fn access_token(&self) -> AccessToken {
        let mut access = AccessToken::new(&self.context);
        access.set_exp(EXP_CLAIM, Some(self.current_time), None);

        for (claim, value) in self.claims.iter() {
            if NO_COPY_CLAIMS.contains(&claim.as_str()) {
                continue;
            }
            access.insert(claim.clone(), value.clone());
        }
        access
    }
}

impl<K: TokenKind> fmt::Debug for Token<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::TOKEN_TYPE.class_name())
            .field("claims", &self.claims)
            .field("current_time", &self.current_time)
            .finish()
    }
}

/// A verified token of whichever type the authenticator accepted
#[derive(Debug, Clone)]
pub enum ValidatedToken {
    Access(AccessToken),
    Refresh(RefreshToken),
    Sliding(SlidingToken),
    Untyped(UntypedToken),
}

impl ValidatedToken {
    /// Decode and verify `encoded` as the given token type
    pub fn from_encoded(
        context: &Arc<TokenContext>,
        token_type: TokenType,
        encoded: &str,
    ) -> Result<Self, TokenError> {
        match token_type {
            TokenType::Access => Token::from_encoded(context, encoded, true).map(Self::Access),
            TokenType::Refresh => Token::from_encoded(context, encoded, true).map(Self::Refresh),
            TokenType::Sliding => Token::from_encoded(context, encoded, true).map(Self::Sliding),
            TokenType::Untyped => Token::from_encoded(context, encoded, true).map(Self::Untyped),
        }
    }

    pub fn token_type(&self) -> TokenType {
        match self {
            ValidatedToken::Access(_) => TokenType::Access,
            ValidatedToken::Refresh(_) => TokenType::Refresh,
            ValidatedToken::Sliding(_) => TokenType::Sliding,
            ValidatedToken::Untyped(_) => TokenType::Untyped,
        }
    }

    pub fn claims(&self) -> &ClaimSet {
        match self {
            ValidatedToken::Access(token) => token.claims(),
            ValidatedToken::Refresh(token) => token.claims(),
            ValidatedToken::Sliding(token) => token.claims(),
            ValidatedToken::Untyped(token) => token.claims(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.claims().get(key)
    }
}
