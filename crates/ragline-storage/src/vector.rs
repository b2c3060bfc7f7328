// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding encoding and brute-force similarity ranking.

use ragline_core::{Chunk, Embedding, RaglineError, ScoredChunk};

/// Encodes a vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decodes little-endian f32 bytes. Trailing bytes that do not form a full
/// `f32` are an error.
pub fn blob_to_vec(blob: &[u8]) -> Result<Vec<f32>, RaglineError> {
    if blob.len() % 4 != 0 {
        return Err(RaglineError::Internal(format!(
            "embedding blob of {} bytes is not a whole number of f32 values",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Scores every candidate against `query` and keeps the `top_k` best,
/// highest similarity first. Candidates of a different dimensionality are
/// an error rather than silently skipped.
pub fn rank<I>(query: &Embedding, candidates: I, top_k: usize) -> Result<Vec<ScoredChunk>, RaglineError>
where
    I: IntoIterator<Item = (Chunk, Embedding)>,
{
    let mut scored = candidates
        .into_iter()
        .map(|(chunk, embedding)| {
            let score = query.cosine_similarity(&embedding)?;
            Ok(ScoredChunk { chunk, score })
        })
        .collect::<Result<Vec<_>, RaglineError>>()?;
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    Ok(scored)
}
