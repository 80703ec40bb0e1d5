/// Middleware module
///
/// Bearer authentication for actix-web applications.

mod auth_middleware;

pub use auth_middleware::{AuthMiddleware, Authenticated};
