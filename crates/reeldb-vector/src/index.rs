use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use reeldb_core::config::{CacheValidation, GranularitySetting, Settings};
use reeldb_core::error::{Error, Result};
use reeldb_core::store::Store;
use reeldb_core::types::{excerpt, ChunkMetadata, DocId, Document, ResultMetadata, ScoredResult};
use reeldb_embed::{Embedder, EmbeddingPool};

use crate::cache::{self, ArtifactPair, EmbeddingMetadata};
use crate::chunker::ChunkStrategy;
use crate::similarity::cosine_similarity;

pub const DEFAULT_EXCERPT_CHARS: usize = 100;

/// What one embedding row stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Granularity {
    /// One row per document, embedding `"{title}: {description}"`.
    Document,
    /// One row per sentence window of the description.
    Chunked { max_sentences: usize, overlap: usize },
}

impl Granularity {
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.embedding.granularity {
            GranularitySetting::Document => Self::Document,
            GranularitySetting::Chunked => Self::Chunked {
                max_sentences: settings.chunking.max_chunk_sentences,
                overlap: settings.chunking.overlap_sentences,
            },
        }
    }
}

/// How `load_or_create` obtained its embeddings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingsOutcome {
    Loaded,
    Rebuilt { reason: String },
}

/// Embedding store plus cosine search, parameterized by [`Granularity`].
pub struct SemanticIndex {
    pool: EmbeddingPool,
    store: Arc<dyn Store>,
    granularity: Granularity,
    validation: CacheValidation,
    excerpt_chars: usize,
    embeddings: Vec<Vec<f32>>,
    chunks: Vec<ChunkMetadata>,
    docmap: BTreeMap<DocId, Document>,
}

impl SemanticIndex {
    pub fn new(pool: EmbeddingPool, store: Arc<dyn Store>, granularity: Granularity) -> Self {
        Self {
            pool,
            store,
            granularity,
            validation: CacheValidation::CountOnly,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            embeddings: Vec::new(),
            chunks: Vec::new(),
            docmap: BTreeMap::new(),
        }
    }

    pub fn with_validation(mut self, validation: CacheValidation) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars;
        self
    }

    pub fn granularity(&self) -> Granularity { self.granularity }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { self.pool.embedder() }

    pub fn artifacts(&self) -> ArtifactPair { ArtifactPair::for_granularity(self.granularity) }

    /// Number of embedded rows (chunks, or documents in `Document` mode).
    pub fn len(&self) -> usize { self.embeddings.len() }

    pub fn is_empty(&self) -> bool { self.embeddings.is_empty() }

    pub fn chunks(&self) -> &[ChunkMetadata] { &self.chunks }

    pub fn embeddings(&self) -> &[Vec<f32>] { &self.embeddings }

    pub fn dim(&self) -> Option<usize> { self.embeddings.first().map(Vec::len) }

    /// Texts to embed and their row metadata, in catalog order. A repeated
    /// document id keeps its first occurrence only.
    pub fn plan(&self, documents: &[Document]) -> Result<(Vec<String>, Vec<ChunkMetadata>)> {
        let mut texts = Vec::new();
        let mut metadata = Vec::new();
        let mut seen = HashSet::with_capacity(documents.len());
        let unique = documents.iter().filter(|doc| {
            let first = seen.insert(doc.id);
            if !first {
                warn!(document_id = doc.id, title = %doc.title, "duplicate document id; keeping the first");
            }
            first
        });
        match self.granularity {
            Granularity::Document => {
                for doc in unique {
                    texts.push(doc.semantic_text());
                    metadata.push(ChunkMetadata { document_id: doc.id, chunk_index: 0, total_chunks: 1 });
                }
            }
            Granularity::Chunked { max_sentences, overlap } => {
                let strategy = ChunkStrategy::Sentences { max_sentences, overlap };
                for doc in unique {
                    if doc.description.trim().is_empty() {
                        continue;
                    }
                    let pieces = strategy.chunk(&doc.description)?;
                    let total_chunks = pieces.len();
                    for (chunk_index, piece) in pieces.into_iter().enumerate() {
                        texts.push(piece);
                        metadata.push(ChunkMetadata { document_id: doc.id, chunk_index, total_chunks });
                    }
                }
            }
        }
        Ok((texts, metadata))
    }

    /// Embed every planned text and persist the pair. Nothing is stored or
    /// swapped in unless every embedding succeeded.
    pub async fn build(&mut self, documents: &[Document]) -> Result<()> {
        let (texts, chunks) = self.plan(documents)?;
        self.build_planned(documents, texts, chunks).await
    }

    async fn build_planned(&mut self, documents: &[Document], texts: Vec<String>, chunks: Vec<ChunkMetadata>) -> Result<()> {
        let start = Instant::now();
        let checksum = (self.validation == CacheValidation::Checksum).then(|| cache::content_checksum(&texts));
        let embeddings = self.pool.embed_all(texts).await?;
        let embedder = self.pool.embedder();
        let metadata = EmbeddingMetadata {
            total_chunks: chunks.len(),
            chunks,
            dim: embedder.dim(),
            embedder_id: embedder.id().to_string(),
            granularity: self.granularity,
            checksum,
        };
        cache::save(self.store.as_ref(), self.artifacts(), &embeddings, &metadata)?;
        info!(
            rows = embeddings.len(),
            dim = metadata.dim,
            granularity = ?self.granularity,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "semantic index built"
        );
        self.install(documents, embeddings, metadata.chunks);
        Ok(())
    }

    /// Load the persisted pair without validating it against `documents`.
    pub fn load(&mut self, documents: &[Document]) -> Result<()> {
        let (embeddings, metadata) = cache::load(self.store.as_ref(), self.artifacts())?;
        self.install(documents, embeddings, metadata.chunks);
        Ok(())
    }

    /// Load the cached pair when it still fits the catalog; otherwise rebuild
    /// both artifacts.
    pub async fn load_or_create(&mut self, documents: &[Document]) -> Result<EmbeddingsOutcome> {
        let (texts, chunks) = self.plan(documents)?;
        let pair = self.artifacts();
        let reason = match cache::load(self.store.as_ref(), pair) {
            Ok((embeddings, metadata)) => {
                let checksum = (self.validation == CacheValidation::Checksum).then(|| cache::content_checksum(&texts));
                let dim = self.pool.embedder().dim();
                match cache::staleness(&metadata, chunks.len(), dim, checksum.as_deref(), self.validation) {
                    None => {
                        if metadata.embedder_id != self.pool.embedder().id() {
                            warn!(cached = %metadata.embedder_id, current = self.pool.embedder().id(), "embeddings were produced by another embedder");
                        }
                        self.install(documents, embeddings, metadata.chunks);
                        info!(rows = self.len(), artifact = pair.embeddings, "semantic index loaded from cache");
                        return Ok(EmbeddingsOutcome::Loaded);
                    }
                    Some(reason) => reason,
                }
            }
            Err(e) if e.is_cache_unavailable() => e.to_string(),
            Err(e) => return Err(e),
        };
        warn!(artifact = pair.embeddings, %reason, "semantic cache unusable; rebuilding");
        self.build_planned(documents, texts, chunks).await?;
        Ok(EmbeddingsOutcome::Rebuilt { reason })
    }

    fn install(&mut self, documents: &[Document], embeddings: Vec<Vec<f32>>, chunks: Vec<ChunkMetadata>) {
        self.embeddings = embeddings;
        self.chunks = chunks;
        let mut docmap = BTreeMap::new();
        for doc in documents {
            docmap.entry(doc.id).or_insert_with(|| doc.clone());
        }
        self.docmap = docmap;
    }

    /// Embed arbitrary text through the pool, so a hung provider surfaces as a
    /// retryable timeout instead of blocking the caller.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidQuery("no input text provided".into()));
        }
        self.pool.embed_one(text).await
    }

    /// Rank documents by their best-matching row. Ties keep catalog row order.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredResult>> {
        if query.trim().is_empty() || limit == 0 || self.embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_query(query).await?;
        if let Some(dim) = self.dim() {
            if query_vec.len() != dim {
                return Err(Error::embedding(
                    format!("query embedding has dimension {}, index has {dim}", query_vec.len()),
                    false,
                ));
            }
        }

        let mut order: Vec<DocId> = Vec::new();
        let mut best: HashMap<DocId, (f64, ChunkMetadata)> = HashMap::new();
        for (row, meta) in self.embeddings.iter().zip(&self.chunks) {
            let score = cosine_similarity(&query_vec, row);
            match best.get_mut(&meta.document_id) {
                Some(entry) if score > entry.0 => *entry = (score, *meta),
                Some(_) => {}
                None => {
                    order.push(meta.document_id);
                    best.insert(meta.document_id, (score, *meta));
                }
            }
        }

        let mut ranked: Vec<(DocId, f64, ChunkMetadata)> =
            order.iter().filter_map(|id| best.get(id).map(|(s, m)| (*id, *s, *m))).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let results: Vec<ScoredResult> = ranked
            .into_iter()
            .filter_map(|(id, score, meta)| {
                let Some(doc) = self.docmap.get(&id) else {
                    debug!(doc_id = id, "embedded document missing from catalog");
                    return None;
                };
                Some(ScoredResult {
                    id,
                    title: doc.title.clone(),
                    document: excerpt(&doc.description, self.excerpt_chars),
                    score,
                    metadata: ResultMetadata::Semantic { best_chunk: meta.chunk_index, total_chunks: meta.total_chunks },
                })
            })
            .take(limit)
            .collect();
        debug!(rows = self.embeddings.len(), returned = results.len(), "semantic search");
        Ok(results)
    }
}
