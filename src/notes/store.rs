//! Note Storage
//! Mission: Persist notes behind one interface, in memory or in SQLite

use crate::notes::models::Note;
use crate::storage::{format_ts, open_sqlite, parse_ts, parse_uuid, StoreError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Note store. Ownership is enforced by the caller, not here.
pub trait NoteStore: Send + Sync {
    fn create(&self, note: Note) -> Result<Note, StoreError>;

    /// Fails with [`StoreError::NotFound`] if absent.
    fn get(&self, id: Uuid) -> Result<Note, StoreError>;

    /// All notes owned by `owner_id`, oldest first.
    fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Note>, StoreError>;

    /// Write title, content and updated timestamp. The stored owner is kept.
    fn update(&self, note: &Note) -> Result<Note, StoreError>;

    fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// In-memory note store.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: Mutex<HashMap<Uuid, Note>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoteStore for MemoryNoteStore {
    fn create(&self, note: Note) -> Result<Note, StoreError> {
        let mut notes = self.notes.lock();
        if notes.contains_key(&note.id) {
            return Err(StoreError::Conflict);
        }
        notes.insert(note.id, note.clone());
        Ok(note)
    }

    fn get(&self, id: Uuid) -> Result<Note, StoreError> {
        self.notes.lock().get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Note>, StoreError> {
        let notes = self.notes.lock();
        let mut owned: Vec<Note> = notes
            .values()
            .filter(|n| n.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(owned)
    }

    fn update(&self, note: &Note) -> Result<Note, StoreError> {
        let mut notes = self.notes.lock();
        let stored = notes.get_mut(&note.id).ok_or(StoreError::NotFound)?;
        stored.title = note.title.clone();
        stored.content = note.content.clone();
        stored.updated_at = note.updated_at;
        Ok(stored.clone())
    }

    fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.notes
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

/// Note storage with SQLite backend
pub struct SqliteNoteStore {
    conn: Mutex<Connection>,
}

impl SqliteNoteStore {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = open_sqlite(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_notes_owner_created ON notes(owner_id, created_at ASC)",
            [],
        )?;

        info!("Note store ready at {}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_note(row: &Row<'_>) -> rusqlite::Result<Note> {
        let id: String = row.get(0)?;
        let owner_id: String = row.get(1)?;
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;
        Ok(Note {
            id: parse_uuid(0, &id)?,
            owner_id: parse_uuid(1, &owner_id)?,
            title: row.get(2)?,
            content: row.get(3)?,
            created_at: parse_ts(4, &created_at)?,
            updated_at: parse_ts(5, &updated_at)?,
        })
    }

    fn get_locked(conn: &Connection, id: Uuid) -> Result<Note, StoreError> {
        let note = conn.query_row(
            "SELECT id, owner_id, title, content, created_at, updated_at
             FROM notes WHERE id = ?1",
            params![id.to_string()],
            Self::row_to_note,
        )?;
        Ok(note)
    }
}

impl NoteStore for SqliteNoteStore {
    fn create(&self, note: Note) -> Result<Note, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO notes (id, owner_id, title, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                note.id.to_string(),
                note.owner_id.to_string(),
                note.title,
                note.content,
                format_ts(&note.created_at),
                format_ts(&note.updated_at),
            ],
        )?;
        Ok(note)
    }

    fn get(&self, id: Uuid) -> Result<Note, StoreError> {
        let conn = self.conn.lock();
        Self::get_locked(&conn, id)
    }

    fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Note>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, title, content, created_at, updated_at
             FROM notes WHERE owner_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let notes = stmt
            .query_map(params![owner_id.to_string()], Self::row_to_note)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    fn update(&self, note: &Note) -> Result<Note, StoreError> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "UPDATE notes SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                note.title,
                note.content,
                format_ts(&note.updated_at),
                note.id.to_string(),
            ],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        Self::get_locked(&conn, note.id)
    }

    fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let rows_affected =
            conn.execute("DELETE FROM notes WHERE id = ?1", params![id.to_string()])?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::NamedTempFile;

    fn note(owner_id: Uuid, title: &str, offset_secs: i64) -> Note {
        let ts = Utc::now() + Duration::seconds(offset_secs);
        Note {
            id: Uuid::new_v4(),
            owner_id,
            title: title.to_string(),
            content: format!("{title} body"),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn check_store_contract(store: &dyn NoteStore) {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let second = store.create(note(alice, "second", 10)).unwrap();
        let first = store.create(note(alice, "first", 0)).unwrap();
        store.create(note(bob, "bob's", 5)).unwrap();

        let fetched = store.get(first.id).unwrap();
        assert_eq!(fetched.title, "first");
        assert_eq!(fetched.owner_id, alice);

        // Listing is scoped by owner and ordered by creation
        let listed = store.list_by_owner(alice).unwrap();
        let titles: Vec<&str> = listed.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
        assert!(store.list_by_owner(Uuid::new_v4()).unwrap().is_empty());

        // Update never moves ownership
        let mut edited = second.clone();
        edited.owner_id = bob;
        edited.title = "second (edited)".to_string();
        edited.updated_at = second.updated_at + Duration::seconds(30);
        let updated = store.update(&edited).unwrap();
        assert_eq!(updated.owner_id, alice);
        assert_eq!(updated.title, "second (edited)");
        assert_eq!(store.list_by_owner(bob).unwrap().len(), 1);

        store.delete(first.id).unwrap();
        assert!(matches!(store.get(first.id), Err(StoreError::NotFound)));
        assert!(matches!(store.delete(first.id), Err(StoreError::NotFound)));

        let ghost = note(alice, "ghost", 0);
        assert!(matches!(store.update(&ghost), Err(StoreError::NotFound)));
    }

    /// Writers race on one note while also creating their own; the shared
    /// note must end up as exactly one writer's full update.
    fn check_concurrent_access(store: &dyn NoteStore) {
        const WRITERS: usize = 8;
        const ROUNDS: usize = 25;

        let owner = Uuid::new_v4();
        let shared = store.create(note(owner, "shared", 0)).unwrap();

        std::thread::scope(|scope| {
            for writer in 0..WRITERS {
                let shared = shared.clone();
                scope.spawn(move || {
                    for round in 0..ROUNDS {
                        let mut edit = shared.clone();
                        edit.title = format!("w{writer}-r{round}");
                        edit.content = format!("w{writer}-r{round} body");
                        edit.updated_at = Utc::now();
                        store.update(&edit).unwrap();

                        if round % 5 == 0 {
                            store.create(note(owner, "extra", round as i64)).unwrap();
                        }
                    }
                });
            }
        });

        let last = store.get(shared.id).unwrap();
        assert_eq!(last.owner_id, owner);
        assert_eq!(
            last.created_at.timestamp_micros(),
            shared.created_at.timestamp_micros()
        );
        assert_eq!(last.content, format!("{} body", last.title));
        assert!(last.title.ends_with(&format!("-r{}", ROUNDS - 1)));

        let listed = store.list_by_owner(owner).unwrap();
        assert_eq!(listed.len(), 1 + WRITERS * ROUNDS / 5);
        assert_eq!(listed.iter().filter(|n| n.id == shared.id).count(), 1);
    }

    #[test]
    fn test_memory_store_contract() {
        check_store_contract(&MemoryNoteStore::new());
    }

    #[test]
    fn test_sqlite_store_contract() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteNoteStore::open(temp_file.path().to_str().unwrap()).unwrap();
        check_store_contract(&store);
    }

    #[test]
    fn test_memory_store_concurrent_writers() {
        check_concurrent_access(&MemoryNoteStore::new());
    }

    #[test]
    fn test_sqlite_store_concurrent_writers() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteNoteStore::open(temp_file.path().to_str().unwrap()).unwrap();
        check_concurrent_access(&store);
    }
}
