//! Session token lifecycle
//!
//! Signed, self-contained tokens for stateless API authentication: issue
//! refresh/access pairs or sliding tokens, verify them on every request,
//! rotate and revoke them through an optional blacklist.
//!
//! ```ignore
//! let settings = get_configuration()?;
//! let context = Arc::new(TokenContext::from_settings(&settings.jwt)?);
//! let pair = session::obtain_pair(&context, &user)?;
//!
//! let authenticator = Authenticator::from_settings(context, users, &settings.auth);
//! App::new().wrap(AuthMiddleware::new(authenticator))
//! ```

pub mod auth;
pub mod clock;
pub mod configuration;
pub mod error;
pub mod middleware;
pub mod telemetry;

pub use auth::{
    AccessToken, Authenticator, RefreshToken, SlidingToken, Token, TokenContext, TokenType,
    UntypedToken, ValidatedToken,
};
pub use error::{AuthError, BackendError, TokenError};
