//! Authentication API Endpoints
//! Mission: Provide registration, login and current-user endpoints

use crate::auth::{
    models::{
        AuthenticatedUser, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
        UserResponse,
    },
    service::{AuthError, AuthService},
};
use crate::error::json_error;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
}

impl AuthState {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }
}

/// Register endpoint - POST /user/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthApiError> {
    let service = state.service.clone();
    let user = run_blocking(move || {
        service.register(&payload.username, &payload.email, &payload.password)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "success".to_string(),
            user: UserResponse::from_user(&user),
        }),
    ))
}

/// Login endpoint - POST /user/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let service = state.service.clone();
    let issued = run_blocking(move || service.login(&payload.email, &payload.password)).await?;

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_in: issued.expires_in,
    }))
}

/// Get current user info - GET /user/me
pub async fn get_current_user(
    State(state): State<AuthState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AuthApiError> {
    let account = state
        .service
        .current_user(user.user_id)
        .map_err(|e| match e {
            AuthError::NoSuchUser => AuthApiError::UserNotFound,
            other => other.into(),
        })?;

    Ok(Json(UserResponse::from_user(&account)))
}

/// bcrypt is CPU-bound; keep it off the request workers.
async fn run_blocking<T, F>(f: F) -> Result<T, AuthApiError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("Auth task failed: {}", e);
            AuthApiError::InternalError
        })?
        .map_err(AuthApiError::from)
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    Validation(&'static str),
    UserAlreadyExists,
    UserNotFound,
    InternalError,
}

impl From<AuthError> for AuthApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AuthApiError::Validation(msg),
            AuthError::AlreadyExists => AuthApiError::UserAlreadyExists,
            // One message for both so responses do not reveal which emails exist
            AuthError::NoSuchUser | AuthError::BadPassword => AuthApiError::InvalidCredentials,
            other => {
                error!("Auth request failed: {:?}", other);
                AuthApiError::InternalError
            }
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            AuthApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthApiError::UserAlreadyExists => {
                (StatusCode::CONFLICT, "User with this email already exists")
            }
            AuthApiError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        json_error(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    #[test]
    fn test_login_failures_share_one_response() {
        let no_user = AuthApiError::from(AuthError::NoSuchUser);
        let bad_password = AuthApiError::from(AuthError::BadPassword);

        assert!(matches!(no_user, AuthApiError::InvalidCredentials));
        assert!(matches!(bad_password, AuthApiError::InvalidCredentials));
        assert_eq!(no_user.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_auth_api_error_responses() {
        let conflict = AuthApiError::from(AuthError::AlreadyExists).into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let invalid = AuthApiError::from(AuthError::Validation("bad")).into_response();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let not_found = AuthApiError::UserNotFound.into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_storage_faults_are_sanitized() {
        let err = AuthError::Storage(StoreError::Backend("disk I/O error at /var/db".into()));
        let api = AuthApiError::from(err);
        assert!(matches!(api, AuthApiError::InternalError));
        assert_eq!(
            api.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
