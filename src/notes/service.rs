//! Note Service
//! Mission: Note CRUD for the authenticated owner, nobody else

use crate::notes::{guard::ensure_owner, models::Note, store::NoteStore};
use crate::storage::StoreError;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("note not found")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("storage failure")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for NoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => NoteError::NotFound,
            other => NoteError::Storage(other),
        }
    }
}

pub struct NoteService {
    notes: Arc<dyn NoteStore>,
}

impl NoteService {
    pub fn new(notes: Arc<dyn NoteStore>) -> Self {
        Self { notes }
    }

    pub fn create(&self, owner_id: Uuid, title: &str, content: &str) -> Result<Note, NoteError> {
        if title.trim().is_empty() {
            return Err(NoteError::Validation("title is required"));
        }

        let now = Utc::now();
        let note = self.notes.create(Note {
            id: Uuid::new_v4(),
            owner_id,
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        })?;

        info!("Note {} created by {}", note.id, owner_id);
        Ok(note)
    }

    pub fn list(&self, owner_id: Uuid) -> Result<Vec<Note>, NoteError> {
        Ok(self.notes.list_by_owner(owner_id)?)
    }

    pub fn get(&self, owner_id: Uuid, note_id: Uuid) -> Result<Note, NoteError> {
        self.owned(owner_id, note_id)
    }

    pub fn update(
        &self,
        owner_id: Uuid,
        note_id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Note, NoteError> {
        let mut note = self.owned(owner_id, note_id)?;

        if title.trim().is_empty() {
            return Err(NoteError::Validation("title is required"));
        }
        if content.trim().is_empty() {
            return Err(NoteError::Validation("content is required"));
        }

        note.title = title.to_string();
        note.content = content.to_string();
        note.updated_at = Utc::now();

        let updated = self.notes.update(&note)?;
        debug!("Note {} updated by {}", note_id, owner_id);
        Ok(updated)
    }

    pub fn delete(&self, owner_id: Uuid, note_id: Uuid) -> Result<(), NoteError> {
        self.owned(owner_id, note_id)?;
        self.notes.delete(note_id)?;
        info!("Note {} deleted by {}", note_id, owner_id);
        Ok(())
    }

    fn owned(&self, owner_id: Uuid, note_id: Uuid) -> Result<Note, NoteError> {
        let note = self.notes.get(note_id)?;
        ensure_owner(note, owner_id).map_err(|e| {
            debug!("User {} denied access to note {}", owner_id, note_id);
            e
        })
    }
}
