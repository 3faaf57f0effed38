use serde::{Deserialize, Serialize};
use tracing::debug;

use reeldb_core::config::CacheValidation;
use reeldb_core::error::{Error, Result};
use reeldb_core::store::{get_bincode, get_json, put_bincode, put_json, Store};
use reeldb_core::types::ChunkMetadata;

use crate::index::Granularity;

pub const CHUNK_EMBEDDINGS_ARTIFACT: &str = "chunk_embeddings.bin";
pub const CHUNK_METADATA_ARTIFACT: &str = "chunk_metadata.json";
pub const DOCUMENT_EMBEDDINGS_ARTIFACT: &str = "movie_embeddings.bin";
pub const DOCUMENT_METADATA_ARTIFACT: &str = "movie_metadata.json";

/// Sidecar describing an embedding matrix. Row `i` of the matrix belongs to `chunks[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub chunks: Vec<ChunkMetadata>,
    pub total_chunks: usize,
    pub dim: usize,
    pub embedder_id: String,
    pub granularity: Granularity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// The embedding matrix and its metadata are written and read as a pair.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactPair {
    pub embeddings: &'static str,
    pub metadata: &'static str,
}

impl ArtifactPair {
    pub fn for_granularity(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Document => Self { embeddings: DOCUMENT_EMBEDDINGS_ARTIFACT, metadata: DOCUMENT_METADATA_ARTIFACT },
            Granularity::Chunked { .. } => Self { embeddings: CHUNK_EMBEDDINGS_ARTIFACT, metadata: CHUNK_METADATA_ARTIFACT },
        }
    }
}

/// blake3 over the embedded texts, length-prefixed so boundaries count.
pub fn content_checksum(texts: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for text in texts {
        hasher.update(&(text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

pub fn save(store: &dyn Store, pair: ArtifactPair, embeddings: &[Vec<f32>], metadata: &EmbeddingMetadata) -> Result<()> {
    put_bincode(store, pair.embeddings, &embeddings)?;
    put_json(store, pair.metadata, metadata)?;
    debug!(embeddings = pair.embeddings, metadata = pair.metadata, rows = embeddings.len(), "embedding pair saved");
    Ok(())
}

pub fn load(store: &dyn Store, pair: ArtifactPair) -> Result<(Vec<Vec<f32>>, EmbeddingMetadata)> {
    let metadata: EmbeddingMetadata = get_json(store, pair.metadata)?;
    let embeddings: Vec<Vec<f32>> = get_bincode(store, pair.embeddings)?;
    if embeddings.len() != metadata.chunks.len() || metadata.total_chunks != metadata.chunks.len() {
        return Err(Error::cache_unavailable(
            pair.embeddings,
            format!("{} rows for {} chunks", embeddings.len(), metadata.chunks.len()),
        ));
    }
    if let Some(bad) = embeddings.iter().position(|v| v.len() != metadata.dim) {
        return Err(Error::cache_unavailable(pair.embeddings, format!("row {bad} does not have dimension {}", metadata.dim)));
    }
    Ok((embeddings, metadata))
}

/// Why a loaded pair cannot serve the current catalog, or `None` if it can.
pub fn staleness(
    metadata: &EmbeddingMetadata,
    expected_count: usize,
    expected_dim: usize,
    checksum: Option<&str>,
    validation: CacheValidation,
) -> Option<String> {
    if metadata.total_chunks != expected_count {
        return Some(format!("cached {} embeddings, catalog needs {expected_count}", metadata.total_chunks));
    }
    if metadata.dim != expected_dim {
        return Some(format!("cached dimension {}, embedder produces {expected_dim}", metadata.dim));
    }
    if validation == CacheValidation::Checksum && metadata.checksum.as_deref() != checksum {
        return Some("content checksum changed".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(count: usize, dim: usize, checksum: Option<&str>) -> EmbeddingMetadata {
        EmbeddingMetadata {
            chunks: (0..count).map(|i| ChunkMetadata { document_id: i as u64, chunk_index: 0, total_chunks: 1 }).collect(),
            total_chunks: count,
            dim,
            embedder_id: "hash:xxh64:d4".into(),
            granularity: Granularity::Document,
            checksum: checksum.map(str::to_string),
        }
    }

    #[test]
    fn count_only_ignores_content() {
        let m = metadata(3, 4, Some("old"));
        assert_eq!(staleness(&m, 3, 4, Some("new"), CacheValidation::CountOnly), None);
        assert!(staleness(&m, 3, 4, Some("new"), CacheValidation::Checksum).is_some());
        assert!(staleness(&m, 2, 4, Some("old"), CacheValidation::CountOnly).is_some());
        assert!(staleness(&m, 3, 8, Some("old"), CacheValidation::CountOnly).is_some());
    }

    #[test]
    fn checksum_depends_on_boundaries() {
        let a = content_checksum(&["ab".into(), "c".into()]);
        let b = content_checksum(&["a".into(), "bc".into()]);
        assert_ne!(a, b);
        assert_eq!(a, content_checksum(&["ab".into(), "c".into()]));
    }
}
