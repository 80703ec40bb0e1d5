/// Authentication module
///
/// Token signing and verification, the token type hierarchy, bearer
/// authentication and the session flows built on top of them.

mod authenticator;
mod backend;
mod blacklist;
mod claims;
mod context;
mod identity;
mod tokens;

pub mod session;

pub use authenticator::Authenticator;
pub use backend::TokenBackend;
pub use blacklist::{BlacklistStore, OutstandingToken};
pub use claims::{
    ClaimSet, AUD_CLAIM, EXP_CLAIM, IAT_CLAIM, ISS_CLAIM, JTI_CLAIM, NBF_CLAIM,
    REFRESH_EXP_CLAIM, TOKEN_TYPE_CLAIM, USER_ID_CLAIM,
};
pub use context::{Lifetimes, RotationPolicy, TokenContext};
pub use identity::{Identity, IdentityStore, UserId};
pub use tokens::{
    Access, AccessToken, Refresh, RefreshToken, Sliding, SlidingToken, Token, TokenKind,
    TokenType, UnknownTokenType, Untyped, UntypedToken, ValidatedToken,
};
