//! Embedding vectors: the on-disk blob format and cosine similarity.
//!
//! A stored embedding is the raw concatenation of little-endian `f32` values,
//! four bytes per dimension, with no header. The dimension is implied by the
//! blob length.

/// Encode an embedding into its blob form.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a blob produced by [`encode_embedding`].
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::Length(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns exactly `0.0` when either vector is empty, the lengths differ,
/// either vector has zero magnitude, or a component is NaN or infinite.
/// Accumulates in `f64`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid embedding blob: {0} bytes is not a multiple of 4")]
    Length(usize),
}
