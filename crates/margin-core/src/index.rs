//! Index sync: scan → diff against the store → chunk → embed → replace.
//!
//! There is no watcher. [`NoteIndex::reconcile`] brings the store in line with
//! the notes folder on demand, and every query runs it first.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::chunks::{chunk_note, Chunk};
use crate::config::IndexSettings;
use crate::notes::{note_abs_path, scan_notes, NoteFile, ScanError};
use crate::provider::{EmbeddingProvider, ProviderError};
use crate::store::{index_path, IndexStore, StoreError};

/// The chunk index for one notes folder.
///
/// Owns the store and the provider handle. Reconciliation passes are
/// serialized by an internal lock; reads after a pass run concurrently.
pub struct NoteIndex {
    root: PathBuf,
    store: IndexStore,
    provider: Arc<dyn EmbeddingProvider>,
    settings: IndexSettings,
    sync_lock: Mutex<()>,
}

/// What one reconciliation pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub scanned: usize,
    pub unchanged: usize,
    pub reindexed: usize,
    pub removed: usize,
    /// Chunks sent to the provider across all reindexed notes.
    pub embedded_chunks: usize,
}

impl NoteIndex {
    pub fn new(
        root: impl Into<PathBuf>,
        store: IndexStore,
        provider: Arc<dyn EmbeddingProvider>,
        settings: IndexSettings,
    ) -> Self {
        Self {
            root: root.into(),
            store,
            provider,
            settings,
            sync_lock: Mutex::new(()),
        }
    }

    /// Open the index stored under `root` (see [`index_path`]).
    pub fn open(
        root: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
        settings: IndexSettings,
    ) -> Result<Self, IndexError> {
        let root = root.into();
        let store = IndexStore::open(&index_path(&root))?;
        Ok(Self::new(root, store, provider, settings))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub(crate) fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Bring the store in line with the notes folder.
    ///
    /// Unchanged notes (same mtime) are skipped, new and changed notes are
    /// re-chunked and re-embedded, and notes gone from disk are deleted. Any
    /// error aborts the pass; notes already replaced earlier in the pass stay
    /// committed.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Result<SyncReport, IndexError> {
        let _guard = self.sync_lock.lock().await;

        let notes = scan_notes(&self.root)?;
        let mut stored = self.store.indexed_notes()?;
        let mut report = SyncReport {
            scanned: notes.len(),
            ..SyncReport::default()
        };

        for note in &notes {
            if stored.remove(&note.path) == Some(note.modified) {
                report.unchanged += 1;
                continue;
            }
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            report.embedded_chunks += self.reindex_note(note, cancel).await?;
            report.reindexed += 1;
        }

        for path in stored.keys() {
            self.store.delete_note(path)?;
            tracing::debug!(note = %path, "removed from index");
            report.removed += 1;
        }

        tracing::info!(
            scanned = report.scanned,
            unchanged = report.unchanged,
            reindexed = report.reindexed,
            removed = report.removed,
            "index reconciled"
        );
        Ok(report)
    }

    /// Re-chunk and re-embed one note, then swap its chunks in. Returns the
    /// number of chunks written.
    async fn reindex_note(&self, note: &NoteFile, cancel: &CancellationToken) -> Result<usize, IndexError> {
        let abs = note_abs_path(&self.root, &note.path);
        let bytes = std::fs::read(&abs).map_err(|source| IndexError::Read { path: abs, source })?;
        let body = String::from_utf8_lossy(&bytes);

        let chunks: Vec<Chunk> = chunk_note(&body, self.settings.chunk_char_limit)
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .collect();

        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.call_provider(cancel, self.provider.embed(&texts)).await?;
            if embeddings.len() != chunks.len() {
                tracing::warn!(
                    note = %note.path,
                    expected = chunks.len(),
                    actual = embeddings.len(),
                    "embedding count mismatch"
                );
                return Err(IndexError::EmbeddingCountMismatch {
                    path: note.path.clone(),
                    expected: chunks.len(),
                    actual: embeddings.len(),
                });
            }
            embeddings
        };

        self.store
            .replace_note_chunks(&note.path, note.modified, &chunks, &embeddings)?;
        tracing::debug!(note = %note.path, chunks = chunks.len(), "reindexed");
        Ok(chunks.len())
    }

    /// Runs a provider call bounded by the cancel token and the request timeout.
    pub(crate) async fn call_provider<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, IndexError> {
        let timeout = self.settings.request_timeout();
        let bounded = async {
            if timeout.is_zero() {
                return Ok(call.await);
            }
            tokio::time::timeout(timeout, call).await
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IndexError::Cancelled),
            res = bounded => match res {
                Ok(r) => r.map_err(IndexError::from),
                Err(_) => Err(IndexError::TimedOut(timeout)),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("embedding error: {0}")]
    Provider(#[from] ProviderError),
    #[error("embedding count mismatch for {path}: {expected} chunks, {actual} embeddings")]
    EmbeddingCountMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },
    #[error("provider returned no embedding for the query")]
    EmptyQueryEmbedding,
    #[error("cancelled")]
    Cancelled,
    #[error("provider call timed out after {0:?}")]
    TimedOut(Duration),
}
