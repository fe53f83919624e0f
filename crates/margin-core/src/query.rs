//! Similarity search over every stored chunk.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::embedding::cosine_similarity;
use crate::index::{IndexError, NoteIndex};
use crate::store::StoredChunk;

/// A chunk ranked against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub note_path: String,
    pub heading: String,
    pub text: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f64,
}

impl NoteIndex {
    /// Reconcile, embed `text`, and return the best matching chunks.
    ///
    /// At most `top_k` matches are returned when it is positive; otherwise
    /// every chunk is returned, ranked.
    pub async fn query(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<Match>, IndexError> {
        self.query_top(text, self.settings().top_k, cancel).await
    }

    /// [`NoteIndex::query`] with an explicit limit.
    pub async fn query_top(
        &self,
        text: &str,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Match>, IndexError> {
        self.reconcile(cancel).await?;

        let input = [text.to_string()];
        let query_vec = self
            .call_provider(cancel, self.provider().embed(&input))
            .await?
            .into_iter()
            .next()
            .ok_or(IndexError::EmptyQueryEmbedding)?;

        let chunks = self.store().all_chunks()?;
        let matches = rank(&query_vec, chunks, top_k);
        tracing::debug!(matches = matches.len(), "query ranked");
        Ok(matches)
    }
}

/// Score every chunk against `query` and keep the best `top_k` (all if 0).
///
/// The sort is stable, so equal scores keep the order of `chunks`. Scores
/// are compared with `total_cmp`, so a stray NaN cannot break the ordering.
pub fn rank(query: &[f32], chunks: Vec<StoredChunk>, top_k: usize) -> Vec<Match> {
    let mut matches: Vec<Match> = chunks
        .into_iter()
        .map(|c| Match {
            score: cosine_similarity(query, &c.embedding),
            note_path: c.note_path,
            heading: c.heading,
            text: c.text,
        })
        .collect();
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    if top_k > 0 {
        matches.truncate(top_k);
    }
    matches
}
