//! JWT Token Handler
//! Mission: Issue and verify signed, time-bound session tokens

use crate::auth::models::Claims;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Default token lifetime.
pub const DEFAULT_VALIDITY_HOURS: i64 = 72;

/// Why a token was refused (or could not be produced).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("failed to sign token")]
    Signing,
}

/// A freshly signed token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64, // seconds
}

/// JWT Handler for token operations.
///
/// Keys are derived once from the signing secret; the secret itself is not
/// retained. Shared across requests behind an `Arc`.
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl JwtHandler {
    /// Create a handler issuing tokens valid for [`DEFAULT_VALIDITY_HOURS`].
    pub fn new(secret: &SecretString) -> Self {
        Self::with_validity(secret, Duration::hours(DEFAULT_VALIDITY_HOURS))
    }

    pub fn with_validity(secret: &SecretString, validity: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // exp is enforced in verify_at without leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            validity: validity.max(Duration::seconds(1)),
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign a token carrying `user_id` that expires after the validity window.
    pub fn issue(&self, user_id: Uuid) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.validity)
            .ok_or(TokenError::Signing)?;

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )
        .map_err(|_| TokenError::Signing)?;

        debug!(
            "Issued token for user {}, expires in {}h",
            user_id,
            self.validity.num_hours()
        );

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: self.validity.num_seconds(),
        })
    }

    /// Verify signature and expiry, returning the embedded identity.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub(crate) fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            },
        )?;

        if now.timestamp() >= decoded.claims.exp {
            return Err(TokenError::Expired);
        }

        Uuid::parse_str(&decoded.claims.sub).map_err(|_| TokenError::Malformed)
    }
}
