/// Bearer authentication
///
/// Turns an `Authorization: <Scheme> <token>` header into a verified token and
/// the user it names. A request without a usable credential is anonymous
/// (`Ok(None)`), which is different from a credential that fails.

use std::sync::Arc;

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::auth::claims::USER_ID_CLAIM;
use crate::auth::context::TokenContext;
use crate::auth::identity::{Identity, IdentityStore, UserId};
use crate::auth::tokens::{TokenType, ValidatedToken};
use crate::configuration::AuthSettings;
use crate::error::{AuthError, TokenError, TokenFailure};

const REALM: &str = "api";

pub struct Authenticator<S> {
    context: Arc<TokenContext>,
    store: S,
    header_types: Vec<String>,
    token_types: Vec<TokenType>,
}

impl<S: IdentityStore> Authenticator<S> {
    /// Accepts `Bearer` access tokens
    pub fn new(context: Arc<TokenContext>, store: S) -> Self {
        Self {
            context,
            store,
            header_types: vec!["Bearer".to_string()],
            token_types: vec![TokenType::Access],
        }
    }

    pub fn from_settings(context: Arc<TokenContext>, store: S, settings: &AuthSettings) -> Self {
        Self::new(context, store)
            .with_header_types(settings.header_types.clone())
            .with_token_types(settings.token_types.clone())
    }

    pub fn with_header_types(mut self, header_types: Vec<String>) -> Self {
        self.header_types = header_types;
        self
    }

    /// Token types to try, in order
    pub fn with_token_types(mut self, token_types: Vec<TokenType>) -> Self {
        self.token_types = token_types;
        self
    }

    pub fn context(&self) -> &Arc<TokenContext> {
        &self.context
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Value for the `WWW-Authenticate` header of a 401 response
    pub fn authenticate_header(&self) -> String {
        let scheme = self
            .header_types
            .first()
            .map(String::as_str)
            .unwrap_or("Bearer");
        format!("{} realm=\"{}\"", scheme, REALM)
    }

    /// Raw `Authorization` header, if present
    pub fn extract_header<'a>(&self, headers: &'a HeaderMap) -> Option<&'a [u8]> {
        headers.get(AUTHORIZATION).map(|value| value.as_bytes())
    }

    /// Pull the token out of an `Authorization` value
    ///
    /// Returns `None` when the header is empty, uses another scheme, or carries
    /// the scheme alone.
    ///
    /// # Errors
    /// Returns `BadAuthorizationHeader` when there are more than two parts
    pub fn extract_raw_token<'a>(&self, header: &'a [u8]) -> Result<Option<&'a [u8]>, AuthError> {
        let parts: Vec<&[u8]> = header
            .split(u8::is_ascii_whitespace)
            .filter(|part| !part.is_empty())
            .collect();

        let Some(scheme) = parts.first() else {
            return Ok(None);
        };
        if !self
            .header_types
            .iter()
            .any(|accepted| accepted.as_bytes() == *scheme)
        {
            return Ok(None);
        }

        match parts.as_slice() {
            [_] => Ok(None),
            [_, token] => Ok(Some(*token)),
            _ => {
                tracing::warn!(parts = parts.len(), "Malformed Authorization header");
                Err(AuthError::BadAuthorizationHeader)
            }
        }
    }

    /// Verify the token against each accepted type in turn
    ///
    /// # Errors
    /// Returns `InvalidToken` listing why every type rejected it
    pub fn validate(&self, raw_token: &[u8]) -> Result<ValidatedToken, AuthError> {
        let encoded = std::str::from_utf8(raw_token).ok();
        let mut messages = Vec::with_capacity(self.token_types.len());

        for &token_type in &self.token_types {
            let result = match encoded {
                Some(encoded) => ValidatedToken::from_encoded(&self.context, token_type, encoded),
                None => Err(TokenError::Invalid),
            };

            match result {
                Ok(token) => {
                    tracing::debug!(token_type = %token_type, "Token validated successfully");
                    return Ok(token);
                }
                Err(e) => messages.push(TokenFailure {
                    token_class: token_type.class_name(),
                    token_type,
                    message: e.to_string(),
                }),
            }
        }

        tracing::warn!(?messages, "Token not valid for any accepted type");
        Err(AuthError::InvalidToken { messages })
    }

    /// Look up the user named by the token's `user_id` claim
    pub fn resolve_user(&self, token: &ValidatedToken) -> Result<S::User, AuthError> {
        let user_id = token
            .get(USER_ID_CLAIM)
            .and_then(UserId::from_claim)
            .ok_or(AuthError::MissingUserId)?;

        let user = self.store.find_by_id(&user_id).ok_or_else(|| {
            tracing::warn!(user_id = %user_id, "Token names an unknown user");
            AuthError::UserNotFound
        })?;

        if !user.is_active() {
            tracing::warn!(user_id = %user_id, "Token names an inactive user");
            return Err(AuthError::UserInactive);
        }
        Ok(user)
    }

    /// Authenticate a request from its headers
    ///
    /// `Ok(None)` means no credential was offered and the request proceeds
    /// anonymously.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<(S::User, ValidatedToken)>, AuthError> {
        let Some(header) = self.extract_header(headers) else {
            return Ok(None);
        };
        let Some(raw_token) = self.extract_raw_token(header)? else {
            return Ok(None);
        };

        let token = self.validate(raw_token)?;
        let user = self.resolve_user(&token)?;

        tracing::debug!(user_id = %user.id(), token_type = %token.token_type(), "Request authenticated");
        Ok(Some((user, token)))
    }
}
