//! docqa-vector
//!
//! Knowledge store implementations behind [`docqa_core::traits::Store`]:
//! - [`LanceStore`]: LanceDB table on local disk, survives restarts
//! - [`MemoryStore`]: brute-force cosine search in memory
//! - [`SharedStore`]: cloneable handle serialising writers over any store

pub mod memory;
pub mod schema;
pub mod shared;
pub mod store;
pub mod table;

use std::cmp::Ordering;

use docqa_core::types::{Chunk, ScoredChunk};
use docqa_core::{Error, Result};

pub use memory::MemoryStore;
pub use shared::SharedStore;
pub use store::LanceStore;

/// Checks an `add` batch and returns the common embedding width, if any rows.
pub(crate) fn check_batch(chunks: &[Chunk], embeddings: &[Vec<f32>], fixed: Option<usize>) -> Result<Option<usize>> {
    if chunks.len() != embeddings.len() {
        return Err(Error::DimensionMismatch { expected: chunks.len(), actual: embeddings.len() });
    }
    let Some(first) = embeddings.first() else {
        return Ok(None);
    };
    let dim = fixed.unwrap_or(first.len());
    if dim == 0 {
        return Err(Error::InvalidArgument("embeddings must not be empty vectors".into()));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
        return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
    }
    Ok(Some(dim))
}

pub(crate) fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidArgument("k must be at least 1".into()));
    }
    Ok(())
}

/// Best score first, earlier insert first among equals; keeps `k`.
pub(crate) fn rank(mut hits: Vec<(ScoredChunk, i64)>, k: usize) -> Vec<ScoredChunk> {
    hits.sort_by(|(a, sa), (b, sb)| {
        b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then(sa.cmp(sb))
    });
    hits.into_iter().take(k).map(|(hit, _)| hit).collect()
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
