//! Authentication Module
//! Mission: Credentials, session tokens and the request gate

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod service;
pub mod user_store;

pub use api::AuthState;
pub use jwt::{JwtHandler, TokenError};
pub use middleware::{auth_middleware, AuthGate};
pub use models::AuthenticatedUser;
pub use service::{AuthError, AuthService};
pub use user_store::{MemoryUserStore, SqliteUserStore, UserStore};
