//! Term-weighting formulas. Pure functions over corpus statistics.

use reeldb_core::config::Bm25Settings;

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: BM25_K1, b: BM25_B } }
}

impl From<Bm25Settings> for Bm25Params {
    fn from(s: Bm25Settings) -> Self { Self { k1: s.k1, b: s.b } }
}

/// Smoothed IDF: `ln((N + 1) / (df + 1))`. Finite for unseen terms.
pub fn idf(total_docs: usize, doc_freq: usize) -> f64 {
    ((total_docs as f64 + 1.0) / (doc_freq as f64 + 1.0)).ln()
}

/// Okapi IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`. Never clamped.
pub fn bm25_idf(total_docs: usize, doc_freq: usize) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Saturating term frequency with length normalization.
/// Returns 0 when the corpus has no length (empty index).
pub fn bm25_tf(tf: u32, doc_len: usize, avg_doc_len: f64, params: Bm25Params) -> f64 {
    if tf == 0 || avg_doc_len <= 0.0 {
        return 0.0;
    }
    let tf = f64::from(tf);
    let length_norm = 1.0 - params.b + params.b * (doc_len as f64 / avg_doc_len);
    (tf * (params.k1 + 1.0)) / (tf + params.k1 * length_norm)
}
