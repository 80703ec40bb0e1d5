/// Bearer Authentication Middleware
///
/// Runs the `Authenticator` on every request. A verified user and token are
/// injected into request extensions as `Authenticated<U>`; requests without a
/// credential pass through anonymously. A credential that fails is answered
/// with 401 before the route handler runs.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    http::header::{HeaderValue, WWW_AUTHENTICATE},
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{Authenticator, IdentityStore, ValidatedToken};
use crate::error::AuthError;

/// The user and token behind an authenticated request
#[derive(Debug, Clone)]
pub struct Authenticated<U> {
    pub user: U,
    pub token: ValidatedToken,
}

/// Extracting `Authenticated<U>` in a handler makes the route require a credential
impl<U: Clone + 'static> FromRequest for Authenticated<U> {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let extensions = req.extensions();
        let authenticated = extensions.get::<Authenticated<U>>().cloned();
        let challenge = extensions.get::<Challenge>().map(|c| c.0.as_str());

        let result =
            authenticated.ok_or_else(|| unauthorized(AuthError::NotAuthenticated, challenge));
        ready(result)
    }
}

/// `WWW-Authenticate` value of the authenticator that saw the request
#[derive(Debug, Clone)]
struct Challenge(String);

/// 401 for `err`, carrying `challenge` when one is known
fn unauthorized(err: AuthError, challenge: Option<&str>) -> Error {
    let mut response = err.error_response();
    if let Some(value) = challenge.and_then(|c| HeaderValue::from_str(c).ok()) {
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    }
    InternalError::from_response(err, response).into()
}

pub struct AuthMiddleware<S> {
    authenticator: Arc<Authenticator<S>>,
}

impl<S> AuthMiddleware<S> {
    pub fn new(authenticator: Authenticator<S>) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }

    pub fn from_shared(authenticator: Arc<Authenticator<S>>) -> Self {
        Self { authenticator }
    }
}

impl<Srv, B, S> Transform<Srv, ServiceRequest> for AuthMiddleware<S>
where
    Srv: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    Srv::Future: 'static,
    B: 'static,
    S: IdentityStore + 'static,
    S::User: Clone + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<Srv, S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: Srv) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            authenticator: self.authenticator.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<Srv, S> {
    service: Rc<Srv>,
    authenticator: Arc<Authenticator<S>>,
}

impl<Srv, B, S> Service<ServiceRequest> for AuthMiddlewareService<Srv, S>
where
    Srv: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    Srv::Future: 'static,
    B: 'static,
    S: IdentityStore + 'static,
    S::User: Clone + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let challenge = self.authenticator.authenticate_header();

        match self.authenticator.authenticate(req.headers()) {
            Ok(Some((user, token))) => {
                req.extensions_mut().insert(Authenticated { user, token });
            }
            Ok(None) => {
                tracing::debug!(path = %req.path(), "No credentials, proceeding anonymously");
            }
            Err(e) => {
                tracing::warn!(path = %req.path(), code = e.code(), "Authentication failed: {}", e);
                let err = unauthorized(e, Some(&challenge));
                return Box::pin(async move { Err(err) });
            }
        }
        req.extensions_mut().insert(Challenge(challenge));

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
