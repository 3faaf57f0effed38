//! Combining a lexical and a semantic ranked list into one.
//!
//! Both strategies visit candidates lexical-first, then semantic, and sort
//! stably, so equal fused scores keep that first-seen order.

use std::collections::HashMap;

use reeldb_core::error::{Error, Result};
use reeldb_core::types::{DocId, ResultMetadata, ScoredResult};

pub const DEFAULT_RRF_K: f64 = 60.0;
pub const DEFAULT_ALPHA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionMethod {
    /// `alpha * bm25_norm + (1 - alpha) * semantic_norm`.
    Weighted { alpha: f64 },
    /// Reciprocal rank fusion with smoothing constant `k`.
    Rrf { k: f64 },
}

impl Default for FusionMethod {
    fn default() -> Self { Self::Rrf { k: DEFAULT_RRF_K } }
}

impl FusionMethod {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Weighted { alpha } if !(0.0..=1.0).contains(&alpha) => {
                Err(Error::InvalidConfiguration(format!("alpha must be within [0, 1], got {alpha}")))
            }
            Self::Rrf { k } if !k.is_finite() || k < 0.0 => {
                Err(Error::InvalidConfiguration(format!("rrf k must be a finite non-negative number, got {k}")))
            }
            _ => Ok(()),
        }
    }

    pub fn fuse(&self, lexical: &[ScoredResult], semantic: &[ScoredResult]) -> Result<Vec<ScoredResult>> {
        match *self {
            Self::Weighted { alpha } => weighted_fuse(lexical, semantic, alpha),
            Self::Rrf { k } => rrf_fuse(lexical, semantic, k),
        }
    }
}

/// Min-max normalize to `[0, 1]`. A constant list maps to all `1.0`.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    let Some(first) = scores.first() else { return Vec::new() };
    let (min, max) = scores.iter().fold((*first, *first), |(lo, hi), s| (lo.min(*s), hi.max(*s)));
    if min == max {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

pub fn hybrid_score(bm25_score: f64, semantic_score: f64, alpha: f64) -> f64 {
    alpha * bm25_score + (1.0 - alpha) * semantic_score
}

/// Contribution of a 1-based `rank`.
pub fn rrf_score(rank: usize, k: f64) -> f64 {
    1.0 / (rank as f64 + k)
}

struct Candidate<'a> {
    source: &'a ScoredResult,
    lexical: Option<(usize, f64)>,
    semantic: Option<(usize, f64)>,
}

/// Candidates in first-seen order with each source's best (rank, normalized score).
fn collect<'a>(lexical: &'a [ScoredResult], semantic: &'a [ScoredResult]) -> Vec<Candidate<'a>> {
    let mut order: Vec<Candidate<'a>> = Vec::new();
    let mut slots: HashMap<DocId, usize> = HashMap::new();
    for (is_lexical, list) in [(true, lexical), (false, semantic)] {
        let normalized = normalize_scores(&list.iter().map(|r| r.score).collect::<Vec<_>>());
        for (i, (result, norm)) in list.iter().zip(normalized).enumerate() {
            let slot = *slots.entry(result.id).or_insert_with(|| {
                order.push(Candidate { source: result, lexical: None, semantic: None });
                order.len() - 1
            });
            let entry = if is_lexical { &mut order[slot].lexical } else { &mut order[slot].semantic };
            // A repeated id keeps its first rank and its best score.
            match entry {
                Some((_, best)) => *best = best.max(norm),
                None => *entry = Some((i + 1, norm)),
            }
        }
    }
    order
}

fn finish(mut fused: Vec<ScoredResult>) -> Vec<ScoredResult> {
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused
}

pub fn weighted_fuse(lexical: &[ScoredResult], semantic: &[ScoredResult], alpha: f64) -> Result<Vec<ScoredResult>> {
    FusionMethod::Weighted { alpha }.validate()?;
    let fused = collect(lexical, semantic)
        .into_iter()
        .map(|c| {
            let bm25_score = c.lexical.map_or(0.0, |(_, s)| s);
            let semantic_score = c.semantic.map_or(0.0, |(_, s)| s);
            ScoredResult {
                id: c.source.id,
                title: c.source.title.clone(),
                document: c.source.document.clone(),
                score: hybrid_score(bm25_score, semantic_score, alpha),
                metadata: ResultMetadata::Weighted { bm25_score, semantic_score },
            }
        })
        .collect();
    Ok(finish(fused))
}

pub fn rrf_fuse(lexical: &[ScoredResult], semantic: &[ScoredResult], k: f64) -> Result<Vec<ScoredResult>> {
    FusionMethod::Rrf { k }.validate()?;
    let fused = collect(lexical, semantic)
        .into_iter()
        .map(|c| {
            let bm25_rank = c.lexical.map(|(rank, _)| rank);
            let semantic_rank = c.semantic.map(|(rank, _)| rank);
            let score = bm25_rank.map_or(0.0, |r| rrf_score(r, k)) + semantic_rank.map_or(0.0, |r| rrf_score(r, k));
            ScoredResult {
                id: c.source.id,
                title: c.source.title.clone(),
                document: c.source.document.clone(),
                score,
                metadata: ResultMetadata::Rrf { bm25_rank, semantic_rank },
            }
        })
        .collect();
    Ok(finish(fused))
}
