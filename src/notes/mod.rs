//! Notes Module
//! Mission: Personal notes, visible only to the user who wrote them

pub mod api;
pub mod guard;
pub mod models;
pub mod service;
pub mod store;

pub use api::NoteState;
pub use models::Note;
pub use service::{NoteError, NoteService};
pub use store::{MemoryNoteStore, NoteStore, SqliteNoteStore};
