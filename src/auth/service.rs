//! Auth Service
//! Mission: Register credentials and exchange them for session tokens

use crate::auth::{
    jwt::{IssuedToken, JwtHandler, TokenError},
    models::User,
    user_store::UserStore,
};
use crate::storage::StoreError;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// bcrypt work factor bounds accepted by the hasher.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// bcrypt ignores input past 72 bytes, so longer passwords are refused.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("user with this email already exists")]
    AlreadyExists,
    #[error("no such user")]
    NoSuchUser,
    #[error("wrong password")]
    BadPassword,
    #[error("storage failure")]
    Storage(#[source] StoreError),
    #[error("token failure")]
    Token(#[from] TokenError),
    #[error("password hashing failed")]
    Hashing(#[from] bcrypt::BcryptError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AuthError::AlreadyExists,
            other => AuthError::Storage(other),
        }
    }
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: Arc<JwtHandler>,
    bcrypt_cost: u32,
    // Verified against when the email is unknown so both login failures cost the same.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt: Arc<JwtHandler>,
        bcrypt_cost: u32,
    ) -> Result<Self, AuthError> {
        let dummy_hash = bcrypt::hash(Uuid::new_v4().to_string(), bcrypt_cost)?;
        Ok(Self {
            users,
            jwt,
            bcrypt_cost,
            dummy_hash,
        })
    }

    /// Create an account. The raw password is hashed before it leaves this function.
    pub fn register(
        &self,
        username: &str,
        email: &str,
        raw_password: &str,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        let email = normalize_email(email);

        if username.is_empty() || email.is_empty() || raw_password.is_empty() {
            return Err(AuthError::Validation(
                "Email, username and password are required",
            ));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation("Email address is invalid"));
        }
        if raw_password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::Validation("Password must be at most 72 bytes"));
        }

        if self.users.get_by_email(&email)?.is_some() {
            debug!("Registration rejected, email already taken");
            return Err(AuthError::AlreadyExists);
        }

        let password_hash = bcrypt::hash(raw_password, self.bcrypt_cost)?;

        let user = self.users.create(User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email,
            password_hash,
            created_at: Utc::now(),
        })?;

        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Check credentials and issue a token.
    pub fn login(&self, email: &str, raw_password: &str) -> Result<IssuedToken, AuthError> {
        let email = normalize_email(email);

        let Some(user) = self.users.get_by_email(&email)? else {
            let _ = bcrypt::verify(raw_password, &self.dummy_hash);
            warn!("Failed login attempt: unknown email");
            return Err(AuthError::NoSuchUser);
        };

        if !bcrypt::verify(raw_password, &user.password_hash)? {
            warn!("Failed login attempt for user {}", user.id);
            return Err(AuthError::BadPassword);
        }

        let issued = self.jwt.issue(user.id)?;
        info!("Login successful: {} ({})", user.username, user.id);
        Ok(issued)
    }

    /// Resolve an authenticated identity to its account.
    pub fn current_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users.get_by_id(user_id).map_err(|e| match e {
            StoreError::NotFound => AuthError::NoSuchUser,
            other => AuthError::Storage(other),
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
