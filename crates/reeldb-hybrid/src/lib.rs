use std::time::Instant;

use tracing::{debug, info};

use reeldb_core::config::SearchSettings;
use reeldb_core::error::Result;
use reeldb_core::types::{Document, ScoredResult};
use reeldb_text::LexicalIndex;
use reeldb_vector::SemanticIndex;

pub mod eval;
pub mod fusion;

pub use fusion::{
    hybrid_score, normalize_scores, rrf_fuse, rrf_score, weighted_fuse, FusionMethod, DEFAULT_ALPHA, DEFAULT_RRF_K,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridOptions {
    /// Each sub-search fetches `limit * over_fetch` candidates before fusion.
    pub over_fetch: usize,
    /// Decimal places kept in returned scores.
    pub score_precision: u32,
}

impl Default for HybridOptions {
    fn default() -> Self { Self { over_fetch: 500, score_precision: 4 } }
}

impl From<&SearchSettings> for HybridOptions {
    fn from(s: &SearchSettings) -> Self { Self { over_fetch: s.over_fetch, score_precision: s.score_precision } }
}

/// Lexical + semantic retrieval over one catalog, fused per query.
pub struct HybridSearch {
    lexical: LexicalIndex,
    semantic: SemanticIndex,
    options: HybridOptions,
}

impl HybridSearch {
    /// Load both indexes from their stores, rebuilding whatever is missing or stale.
    pub async fn open(
        documents: &[Document],
        mut lexical: LexicalIndex,
        mut semantic: SemanticIndex,
        options: HybridOptions,
    ) -> Result<Self> {
        let start = Instant::now();
        let lexical_outcome = lexical.load_or_build(documents)?;
        let semantic_outcome = semantic.load_or_create(documents).await?;
        info!(
            documents = documents.len(),
            lexical = ?lexical_outcome,
            semantic = ?semantic_outcome,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "hybrid search ready"
        );
        Ok(Self { lexical, semantic, options })
    }

    pub fn lexical(&self) -> &LexicalIndex { &self.lexical }

    pub fn semantic(&self) -> &SemanticIndex { &self.semantic }

    pub fn options(&self) -> HybridOptions { self.options }

    pub fn candidate_limit(&self, limit: usize) -> usize {
        limit.saturating_mul(self.options.over_fetch.max(1))
    }

    pub async fn search(&self, query: &str, method: FusionMethod, limit: usize) -> Result<Vec<ScoredResult>> {
        method.validate()?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let fetch = self.candidate_limit(limit);
        let lexical = self.lexical.search(query, fetch);
        let semantic = self.semantic.search(query, fetch).await?;
        let mut fused = method.fuse(&lexical, &semantic)?;
        fused.truncate(limit);
        debug!(
            query,
            ?method,
            lexical = lexical.len(),
            semantic = semantic.len(),
            returned = fused.len(),
            "hybrid search"
        );
        let precision = self.options.score_precision;
        Ok(fused.into_iter().map(|r| r.rounded(precision)).collect())
    }

    pub async fn weighted_search(&self, query: &str, alpha: f64, limit: usize) -> Result<Vec<ScoredResult>> {
        self.search(query, FusionMethod::Weighted { alpha }, limit).await
    }

    pub async fn rrf_search(&self, query: &str, k: f64, limit: usize) -> Result<Vec<ScoredResult>> {
        self.search(query, FusionMethod::Rrf { k }, limit).await
    }
}
