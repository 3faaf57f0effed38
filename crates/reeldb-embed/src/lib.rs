use anyhow::{bail, Result};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::info;
use twox_hash::XxHash64;

use reeldb_core::config::EmbeddingSettings;
pub use reeldb_core::traits::Embedder;

pub mod pool;

pub use pool::{EmbeddingPool, PoolOptions};

/// Deterministic bag-of-words embedder.
///
/// Each lowercased, punctuation-free word is hashed with xxhash64 into one of
/// `dim` buckets; the sum is L2-normalized. Texts sharing words get positive
/// cosine similarity, which is enough for offline runs and tests.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hash:xxh64:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 {
            return v;
        }
        for word in text.split_whitespace() {
            let word: String = word.chars().filter(|c| !c.is_ascii_punctuation()).flat_map(char::to_lowercase).collect();
            if word.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            word.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let weight = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += weight;
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

impl Embedder for HashEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Resolve the configured embedding model. Only `hash` ships in-tree; other
/// providers plug in through the `Embedder` trait.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    match settings.model.as_str() {
        "hash" => {
            info!(dim = settings.dim, "using hash embedder");
            Ok(Arc::new(HashEmbedder::new(settings.dim)))
        }
        other => bail!("unknown embedding model '{other}' (available: hash)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn vectors_are_unit_length_and_deterministic() {
        let e = HashEmbedder::new(64);
        let a = e.embed("A bear finds honey").unwrap();
        let b = e.embed("A bear finds honey").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
        assert_eq!(e.id(), "hash:xxh64:d64");
    }

    #[test]
    fn shared_words_score_higher_than_disjoint_ones() {
        let e = HashEmbedder::new(256);
        let q = e.embed("bear honey").unwrap();
        let near = e.embed("The Bear loves honey.").unwrap();
        let far = e.embed("dog chases ball").unwrap();
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[test]
    fn empty_text_is_the_zero_vector() {
        let v = HashEmbedder::new(8).embed("  ...  ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn unknown_model_is_rejected() {
        let settings = EmbeddingSettings { model: "bge-m3".into(), ..EmbeddingSettings::default() };
        assert!(get_default_embedder(&settings).is_err());
        let settings = EmbeddingSettings::default();
        assert_eq!(get_default_embedder(&settings).unwrap().dim(), 384);
    }
}
