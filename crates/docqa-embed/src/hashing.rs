use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};

/// Signed feature hashing over lowercase alphanumeric tokens, L2-normalised.
///
/// Texts sharing words get a positive cosine similarity; there is no notion of
/// synonyms. Text without any token embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("hashing embedder needs a dimension above 0".into()));
        }
        Ok(Self { dim, id: format!("hashing:xxh64:d{dim}") })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += if h >> 63 == 0 { 1.0 } else { -1.0 };
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn zero_dim_is_rejected() {
        assert!(matches!(HashingEmbedder::new(0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let e = HashingEmbedder::new(256).unwrap();
        let a = e.vectorize("Hello, World!");
        let b = e.vectorize("hello world");
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn no_tokens_gives_zero_vector() {
        let e = HashingEmbedder::new(16).unwrap();
        assert!(e.vectorize("  ...  ").iter().all(|x| *x == 0.0));
    }
}
