//! Ownership check applied to every note-scoped operation.

use crate::notes::{models::Note, service::NoteError};
use uuid::Uuid;

/// Pass the note through only if `user_id` owns it.
pub fn ensure_owner(note: Note, user_id: Uuid) -> Result<Note, NoteError> {
    if note.owner_id != user_id {
        return Err(NoteError::AccessDenied);
    }
    Ok(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note_owned_by(owner_id: Uuid) -> Note {
        Note {
            id: Uuid::new_v4(),
            owner_id,
            title: "t".to_string(),
            content: "c".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_passes() {
        let owner = Uuid::new_v4();
        let note = note_owned_by(owner);
        assert_eq!(ensure_owner(note.clone(), owner).unwrap(), note);
    }

    #[test]
    fn test_stranger_denied() {
        let note = note_owned_by(Uuid::new_v4());
        assert!(matches!(
            ensure_owner(note, Uuid::new_v4()),
            Err(NoteError::AccessDenied)
        ));
    }
}
