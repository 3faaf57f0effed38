//! Domain types shared by the lexical, semantic and fusion layers.

use serde::{Deserialize, Serialize};

pub type DocId = u64;

/// A catalog record. Read-only to every index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Document {
    pub fn new(id: DocId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id, title: title.into(), description: description.into() }
    }

    /// Text fed to the lexical index: title and description joined by a space.
    pub fn lexical_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Text embedded when a whole document is one semantic unit.
    pub fn semantic_text(&self) -> String {
        format!("{}: {}", self.title, self.description)
    }
}

/// Position of one embedded span within its source document.
///
/// - `document_id`: the owning `Document::id`
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: DocId,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Method-specific extras attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ResultMetadata {
    /// `matched_terms` counts distinct query tokens present in the document.
    Lexical { matched_terms: usize },
    /// `best_chunk` is the chunk that produced the document's maximum similarity.
    Semantic { best_chunk: usize, total_chunks: usize },
    /// Per-source scores after min-max normalization.
    Weighted { bm25_score: f64, semantic_score: f64 },
    /// 1-based ranks; `None` when the document was absent from that list.
    Rrf { bm25_rank: Option<usize>, semantic_rank: Option<usize> },
}

/// The surface returned by every search path. Higher `score` is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub id: DocId,
    pub title: String,
    pub document: String,
    pub score: f64,
    pub metadata: ResultMetadata,
}

impl ScoredResult {
    /// Round `score` (and any normalized scores in the metadata) to `precision` decimals.
    pub fn rounded(mut self, precision: u32) -> Self {
        self.score = round_to(self.score, precision);
        if let ResultMetadata::Weighted { bm25_score, semantic_score } = &mut self.metadata {
            *bm25_score = round_to(*bm25_score, precision);
            *semantic_score = round_to(*semantic_score, precision);
        }
        self
    }
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(precision).unwrap_or(i32::MAX).min(15));
    (value * factor).round() / factor
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo wörld", 4), "héll");
        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt("", 3), "");
    }

    #[test]
    fn rounding_touches_weighted_metadata() {
        let r = ScoredResult {
            id: 1,
            title: "t".into(),
            document: "d".into(),
            score: 0.123_456,
            metadata: ResultMetadata::Weighted { bm25_score: 0.987_654, semantic_score: 0.5 },
        }
        .rounded(3);
        assert_eq!(r.score, 0.123);
        assert_eq!(r.metadata, ResultMetadata::Weighted { bm25_score: 0.988, semantic_score: 0.5 });
    }

    #[test]
    fn metadata_serializes_with_method_tag() {
        let json = serde_json::to_value(ResultMetadata::Rrf { bm25_rank: Some(1), semantic_rank: None }).unwrap();
        assert_eq!(json["method"], "rrf");
        assert_eq!(json["bm25_rank"], 1);
        assert!(json["semantic_rank"].is_null());
    }
}
