//! User Storage
//! Mission: Persist user accounts behind one interface, in memory or in SQLite

use crate::auth::models::User;
use crate::storage::{format_ts, open_sqlite, parse_ts, parse_uuid, StoreError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Credential store. Implementations must be safe to share across requests.
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with [`StoreError::Conflict`] if the email is taken.
    fn create(&self, user: User) -> Result<User, StoreError>;

    /// Look up by email. `Ok(None)` means no such user.
    fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look up by id. Fails with [`StoreError::NotFound`] if absent.
    fn get_by_id(&self, id: Uuid) -> Result<User, StoreError>;
}

/// In-memory user store.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    fn create(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.lock();
        if users.values().any(|u| u.email == user.email) || users.contains_key(&user.id) {
            return Err(StoreError::Conflict);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.users.lock().get(&id).cloned().ok_or(StoreError::NotFound)
    }
}

/// User storage with SQLite backend
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    /// Open (or create) the database and initialize the schema.
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = open_sqlite(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        info!("User store ready at {}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        let id: String = row.get(0)?;
        let created_at: String = row.get(4)?;
        Ok(User {
            id: parse_uuid(0, &id)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: parse_ts(4, &created_at)?,
        })
    }
}

impl UserStore for SqliteUserStore {
    fn create(&self, user: User) -> Result<User, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.username,
                user.email,
                user.password_hash,
                format_ts(&user.created_at),
            ],
        )?;
        Ok(user)
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, username, email, password_hash, created_at
                 FROM users WHERE email = ?1",
                params![email],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let conn = self.conn.lock();
        let user = conn.query_row(
            "SELECT id, username, email, password_hash, created_at
             FROM users WHERE id = ?1",
            params![id.to_string()],
            Self::row_to_user,
        )?;
        Ok(user)
    }
}
