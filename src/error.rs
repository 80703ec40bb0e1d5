/// Error Handling Module
///
/// Three layers, innermost first:
/// 1. `BackendError` - signing/verification of the encoded string
/// 2. `TokenError` - semantic validation of a decoded claim set
/// 3. `AuthError` - request authentication (header, token candidates, identity)
///
/// Only `AuthError` is turned into an HTTP response. Backend detail never leaves
/// the process; it is logged at debug level where it is swallowed.

use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::TokenType;

/// ============================================================================
/// 1. BACKEND ERRORS
/// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("unrecognized algorithm type '{0}'")]
    InvalidAlgorithm(String),
    #[error("failed to parse {0} key: {1}")]
    KeyParse(&'static str, String),
    #[error("invalid {0}: {1}")]
    InvalidDuration(&'static str, String),
    #[error("no signing key configured")]
    MissingSigningKey,
    #[error("no verifying key configured")]
    MissingVerifyingKey,
    #[error("token is invalid: {0}")]
    Invalid(String),
    #[error("token signature has expired")]
    Expired,
    #[error("token is not yet valid")]
    Immature,
    #[error("failed to encode token: {0}")]
    Encode(String),
}

/// ============================================================================
/// 2. TOKEN ERRORS
/// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token is invalid or expired")]
    Invalid,
    #[error("Token has no '{0}' claim")]
    MissingClaim(String),
    #[error("Token '{0}' claim is not a valid timestamp")]
    InvalidClaim(String),
    #[error("Token '{0}' claim has expired")]
    Expired(String),
    #[error("Token has no id")]
    MissingId,
    #[error("Token has no type")]
    MissingType,
    #[error("Token has wrong type")]
    WrongType,
    #[error("Token is blacklisted")]
    Blacklisted,
    #[error("Token blacklist is not configured")]
    BlacklistUnavailable,
    #[error("Token could not be encoded")]
    Encoding(#[source] BackendError),
}

/// ============================================================================
/// 3. AUTHENTICATION ERRORS
/// ============================================================================

/// Why one candidate token type rejected the credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenFailure {
    pub token_class: &'static str,
    pub token_type: TokenType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header must contain two space-delimited values")]
    BadAuthorizationHeader,
    #[error("Given token not valid for any token type")]
    InvalidToken { messages: Vec<TokenFailure> },
    #[error("Token contained no recognizable user identification")]
    MissingUserId,
    #[error("User not found")]
    UserNotFound,
    #[error("User is inactive")]
    UserInactive,
    #[error("Authentication credentials were not provided")]
    NotAuthenticated,
}

impl AuthError {
    /// Machine-readable code carried in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::BadAuthorizationHeader => "bad_authorization_header",
            AuthError::InvalidToken { .. } | AuthError::MissingUserId => "token_not_valid",
            AuthError::UserNotFound => "user_not_found",
            AuthError::UserInactive => "user_inactive",
            AuthError::NotAuthenticated => "not_authenticated",
        }
    }

    /// True for failures of the token itself, false for header or identity problems
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, AuthError::InvalidToken { .. } | AuthError::MissingUserId)
    }
}

// ============================================================================
// HTTP RESPONSE MAPPING
// ============================================================================

/// Challenge sent with every 401 produced by this crate
pub const WWW_AUTHENTICATE: &str = "Bearer realm=\"api\"";

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<TokenFailure>,
}

impl From<&AuthError> for ErrorResponse {
    fn from(err: &AuthError) -> Self {
        let messages = match err {
            AuthError::InvalidToken { messages } => messages.clone(),
            _ => Vec::new(),
        };
        Self {
            detail: err.to_string(),
            code: err.code(),
            messages,
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header((header::WWW_AUTHENTICATE, WWW_AUTHENTICATE))
            .json(ErrorResponse::from(self))
    }
}
