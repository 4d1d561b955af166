//! Authentication middleware for protected routes

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use super::auth::{bearer_token, JwtAuth};

/// Authenticated principal, stored in request extensions for handlers.
#[derive(Debug, Clone)]
pub struct Principal(pub String);

/// Auth state shared across requests
#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtAuth>,
}

impl AuthState {
    pub fn new(secret: &str) -> Self {
        Self {
            jwt: Arc::new(JwtAuth::new(secret)),
        }
    }
}

/// Reject requests without a valid bearer token; on success the principal
/// is available to handlers via extensions.
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = bearer_token(header_value).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let claims = state
        .jwt
        .verify(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(Principal(claims.sub));

    Ok(next.run(request).await)
}
