//! StudyNote API Library
//!
//! Personal study notes behind bearer-token authentication.
//! The binary in main.rs only parses config and calls `server::serve`.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notes;
pub mod server;
pub mod storage;
