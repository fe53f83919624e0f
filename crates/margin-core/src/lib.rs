//! All backend logic independent of how the app is run.
//!
//! User notes live in a folder they choose. margin keeps its chunk index in a
//! SQLite file under `.margin/` inside that folder and its config in its own
//! app data directory (see [app_data]). The index is brought up to date on
//! every query; nothing watches the folder.

pub mod app_data;
pub mod chunks;
pub mod config;
pub mod embedding;
pub mod index;
pub mod notes;
pub mod ollama;
pub mod prompt;
pub mod provider;
pub mod query;
pub mod store;

pub use app_data::app_data_dir;
pub use chunks::{chunk_note, Chunk, DEFAULT_MAX_CHARS};
pub use config::{get_notes_root, load_config, set_notes_root, Config, ConfigError, IndexSettings};
pub use embedding::{cosine_similarity, decode_embedding, encode_embedding, DecodeError};
pub use index::{IndexError, NoteIndex, SyncReport};
pub use notes::{scan_notes, NoteFile, ScanError, INDEX_DIR_NAME};
pub use ollama::OllamaClient;
pub use prompt::{build_prompt, snippet, Answer, Source};
pub use provider::{EmbeddingProvider, ProviderError};
pub use query::{rank, Match};
pub use store::{index_path, IndexStore, StoreError, StoredChunk};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "margin-core ready"
}
