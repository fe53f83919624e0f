//! Persistent chunk index in a single SQLite file.
//!
//! Two tables: `notes` (path → last indexed mtime) and `chunks` (heading,
//! ordinal, text and embedding blob per chunk). Every mutation touching one
//! note runs in its own transaction, so readers see either the old or the new
//! chunk set of a note, never a mix.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};

use crate::chunks::Chunk;
use crate::embedding::{decode_embedding, encode_embedding, DecodeError};

/// File name of the index database inside the index directory.
pub const INDEX_FILE_NAME: &str = "index.sqlite";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS notes (
    note_path TEXT PRIMARY KEY,
    note_modified INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note_path TEXT NOT NULL,
    heading TEXT,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    FOREIGN KEY(note_path) REFERENCES notes(note_path) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chunks_note_path ON chunks(note_path);
"#;

/// A chunk as read back from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub id: i64,
    pub note_path: String,
    pub heading: String,
    pub index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// SQLite-backed chunk index. The connection is shared behind a mutex; every
/// method is a short synchronous critical section.
#[derive(Debug)]
pub struct IndexStore {
    conn: Mutex<Connection>,
}

impl IndexStore {
    /// Open (or create) the index at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::CreateDir(parent.to_path_buf(), e))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init(conn)
    }

    /// In-memory index, for tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a transaction open:
        // rusqlite rolls back on drop.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All indexed notes with their last indexed mtime.
    pub fn indexed_notes(&self) -> Result<HashMap<String, i64>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT note_path, note_modified FROM notes")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Insert or update a note's mtime without touching its chunks.
    pub fn upsert_note(&self, path: &str, modified: i64) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO notes (note_path, note_modified) VALUES (?1, ?2)
             ON CONFLICT(note_path) DO UPDATE SET note_modified = excluded.note_modified",
            params![path, modified],
        )?;
        Ok(())
    }

    /// Delete a note and all its chunks.
    pub fn delete_note(&self, path: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE note_path = ?1", params![path])?;
        tx.execute("DELETE FROM notes WHERE note_path = ?1", params![path])?;
        tx.commit()?;
        Ok(())
    }

    /// Replace all chunks of a note and record its mtime, in one transaction.
    /// `chunks` and `embeddings` are paired by position.
    pub fn replace_note_chunks(
        &self,
        path: &str,
        modified: i64,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Mismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE note_path = ?1", params![path])?;
        tx.execute(
            "INSERT INTO notes (note_path, note_modified) VALUES (?1, ?2)
             ON CONFLICT(note_path) DO UPDATE SET note_modified = excluded.note_modified",
            params![path, modified],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (note_path, heading, chunk_index, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                stmt.execute(params![
                    path,
                    chunk.heading,
                    chunk.index as i64,
                    chunk.text,
                    encode_embedding(embedding),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Every stored chunk with its decoded embedding, in insertion order.
    /// Fails on the first blob that does not decode.
    pub fn all_chunks(&self) -> Result<Vec<StoredChunk>, StoreError> {
        self.read_chunks(
            "SELECT id, note_path, heading, chunk_index, content, embedding
             FROM chunks ORDER BY id",
            [],
        )
    }

    /// Chunks of one note ordered by their index.
    pub fn note_chunks(&self, path: &str) -> Result<Vec<StoredChunk>, StoreError> {
        self.read_chunks(
            "SELECT id, note_path, heading, chunk_index, content, embedding
             FROM chunks WHERE note_path = ?1 ORDER BY chunk_index",
            params![path],
        )
    }

    fn read_chunks(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<StoredChunk>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(args)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(5)?;
            let chunk_index: i64 = row.get(3)?;
            out.push(StoredChunk {
                id: row.get(0)?,
                note_path: row.get(1)?,
                heading: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                index: chunk_index as usize,
                text: row.get(4)?,
                embedding: decode_embedding(&blob)?,
            });
        }
        Ok(out)
    }

    pub fn note_count(&self) -> Result<usize, StoreError> {
        self.count("SELECT COUNT(*) FROM notes")
    }

    pub fn chunk_count(&self) -> Result<usize, StoreError> {
        self.count("SELECT COUNT(*) FROM chunks")
    }

    fn count(&self, sql: &str) -> Result<usize, StoreError> {
        let n: i64 = self.conn().query_row(sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<(), StoreError> {
        self.conn().execute_batch(sql)?;
        Ok(())
    }
}

/// Path of the index database for a notes root.
pub fn index_path(notes_root: &Path) -> PathBuf {
    notes_root
        .join(crate::notes::INDEX_DIR_NAME)
        .join(INDEX_FILE_NAME)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create index directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{chunks} chunks but {embeddings} embeddings")]
    Mismatch { chunks: usize, embeddings: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(heading: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            heading: heading.to_string(),
            index,
            text: text.to_string(),
        }
    }

    #[test]
    fn replace_then_read_back() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .replace_note_chunks(
                "a.md",
                10,
                &[chunk("", 0, "intro"), chunk("H", 1, "body")],
                &[vec![1.0, 0.0], vec![0.5, -0.5]],
            )
            .unwrap();

        assert_eq!(store.indexed_notes().unwrap().get("a.md"), Some(&10));
        let chunks = store.all_chunks().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].heading, "H");
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].text, "body");
        assert_eq!(chunks[1].embedding, vec![0.5, -0.5]);
    }

    #[test]
    fn replace_drops_previous_chunks() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .replace_note_chunks(
                "a.md",
                1,
                &[chunk("", 0, "old"), chunk("", 1, "old2")],
                &[vec![1.0], vec![2.0]],
            )
            .unwrap();
        store
            .replace_note_chunks("a.md", 2, &[chunk("", 0, "new")], &[vec![3.0]])
            .unwrap();

        let texts: Vec<String> = store
            .note_chunks("a.md")
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["new"]);
        assert_eq!(store.indexed_notes().unwrap()["a.md"], 2);
    }

    #[test]
    fn mismatched_replace_keeps_old_state() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .replace_note_chunks("a.md", 1, &[chunk("", 0, "old")], &[vec![1.0]])
            .unwrap();
        let err = store
            .replace_note_chunks("a.md", 2, &[chunk("", 0, "new")], &[])
            .unwrap_err();
        assert!(matches!(err, StoreError::Mismatch { chunks: 1, embeddings: 0 }));
        assert_eq!(store.note_chunks("a.md").unwrap()[0].text, "old");
        assert_eq!(store.indexed_notes().unwrap()["a.md"], 1);
    }

    #[test]
    fn note_without_chunks_keeps_row() {
        let store = IndexStore::open_in_memory().unwrap();
        store.replace_note_chunks("empty.md", 7, &[], &[]).unwrap();
        assert_eq!(store.note_count().unwrap(), 1);
        assert_eq!(store.chunk_count().unwrap(), 0);
    }

    #[test]
    fn delete_cascades_to_chunks() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .replace_note_chunks("a.md", 1, &[chunk("", 0, "a")], &[vec![1.0]])
            .unwrap();
        store
            .replace_note_chunks("b.md", 1, &[chunk("", 0, "b")], &[vec![1.0]])
            .unwrap();
        store.delete_note("a.md").unwrap();

        assert_eq!(store.note_count().unwrap(), 1);
        let chunks = store.all_chunks().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].note_path, "b.md");
    }

    #[test]
    fn upsert_note_overwrites_mtime() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert_note("a.md", 1).unwrap();
        store.upsert_note("a.md", 5).unwrap();
        assert_eq!(store.indexed_notes().unwrap()["a.md"], 5);
        assert_eq!(store.note_count().unwrap(), 1);
    }

    #[test]
    fn corrupt_blob_is_a_decode_error() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert_note("a.md", 1).unwrap();
        store
            .execute_raw(
                "INSERT INTO chunks (note_path, heading, chunk_index, content, embedding)
                 VALUES ('a.md', '', 0, 'x', X'000000')",
            )
            .unwrap();
        assert!(matches!(
            store.all_chunks(),
            Err(StoreError::Decode(DecodeError::Length(3)))
        ));
    }

    #[test]
    fn open_creates_index_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = index_path(dir.path());
        let store = IndexStore::open(&path).unwrap();
        store.upsert_note("a.md", 1).unwrap();
        drop(store);

        let reopened = IndexStore::open(&path).unwrap();
        assert_eq!(reopened.indexed_notes().unwrap()["a.md"], 1);
    }
}
