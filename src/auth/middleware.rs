//! Authentication Middleware
//! Mission: Gate every non-public request on a valid bearer token

use crate::auth::{
    jwt::{JwtHandler, TokenError},
    models::AuthenticatedUser,
};
use crate::error::json_error;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Paths served without a token.
pub const PUBLIC_PATHS: &[&str] = &["/user/login", "/user/register", "/health"];

/// Path prefixes served without a token (API documentation).
pub const PUBLIC_PREFIXES: &[&str] = &["/swagger/"];

/// Middleware state: the token verifier plus the allow-list.
pub struct AuthGate {
    jwt: Arc<JwtHandler>,
    public_paths: Vec<String>,
    public_prefixes: Vec<String>,
}

impl AuthGate {
    pub fn new(jwt: Arc<JwtHandler>) -> Self {
        Self {
            jwt,
            public_paths: PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
            public_prefixes: PUBLIC_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
            || self.public_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Validate the request's credential and return the identity it carries.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, GateRejection> {
        let token = bearer_token(headers)?;
        let user_id = self.jwt.verify(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            GateRejection::Token(e)
        })?;
        Ok(AuthenticatedUser { user_id })
    }
}

/// Auth middleware that validates JWT tokens
pub async fn auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateRejection> {
    if gate.is_public(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let user = gate.authenticate(req.headers())?;

    // Single typed slot read back by the AuthenticatedUser extractor
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GateRejection> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(GateRejection::MissingCredential)?
        .to_str()
        .map_err(|_| GateRejection::MalformedHeader)?;

    if value.trim().is_empty() {
        return Err(GateRejection::MissingCredential);
    }

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(GateRejection::MalformedHeader),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(GateRejection::Unbound)
    }
}

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MissingCredential,
    MalformedHeader,
    Token(TokenError),
    /// A handler asked for an identity on a route the gate did not authenticate.
    Unbound,
}

impl GateRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            GateRejection::MissingCredential => "Missing authorization token",
            GateRejection::MalformedHeader => {
                "Invalid authorization format. Use: Bearer {token}"
            }
            GateRejection::Token(TokenError::Expired) => "Token expired",
            GateRejection::Token(TokenError::InvalidSignature) => "Invalid token signature",
            GateRejection::Token(_) => "Malformed token",
            GateRejection::Unbound => "Authentication required",
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        json_error(StatusCode::UNAUTHORIZED, self.reason())
    }
}
