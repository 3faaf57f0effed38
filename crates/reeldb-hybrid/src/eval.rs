//! Precision@k against a hand-labelled query set.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use reeldb_core::error::Result;

use crate::{FusionMethod, HybridSearch};

/// `{"test_cases": [{"query": "...", "relevant_docs": ["Title", ...]}]}`
#[derive(Debug, Clone, Deserialize)]
pub struct GoldenDataset {
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub query: String,
    /// Relevant documents, by title.
    pub relevant_docs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryEvaluation {
    pub query: String,
    pub precision: f64,
    pub retrieved: Vec<String>,
    pub relevant: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub test_cases_count: usize,
    pub limit: usize,
    pub mean_precision: f64,
    pub results: Vec<QueryEvaluation>,
}

pub fn load_golden_dataset(path: &Path) -> anyhow::Result<GoldenDataset> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read golden dataset {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse golden dataset {}", path.display()))
}

/// Share of the top `k` retrieved titles that are relevant. The denominator
/// is always `k`, so short result lists are penalized.
pub fn precision_at_k(retrieved: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let hits = retrieved.iter().take(k).filter(|title| relevant.contains(*title)).count();
    hits as f64 / k as f64
}

pub async fn evaluate(search: &HybridSearch, dataset: &GoldenDataset, method: FusionMethod, limit: usize) -> Result<EvaluationReport> {
    let mut results = Vec::with_capacity(dataset.test_cases.len());
    for case in &dataset.test_cases {
        let relevant: HashSet<String> = case.relevant_docs.iter().cloned().collect();
        let retrieved: Vec<String> = search
            .search(&case.query, method, limit)
            .await?
            .into_iter()
            .map(|r| r.title)
            .filter(|title| !title.is_empty())
            .collect();
        let precision = precision_at_k(&retrieved, &relevant, limit);
        let mut relevant: Vec<String> = relevant.into_iter().collect();
        relevant.sort();
        results.push(QueryEvaluation { query: case.query.clone(), precision, retrieved, relevant });
    }
    let mean_precision = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.precision).sum::<f64>() / results.len() as f64
    };
    info!(test_cases = results.len(), limit, mean_precision, "evaluation complete");
    Ok(EvaluationReport { test_cases_count: dataset.test_cases.len(), limit, mean_precision, results })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_uses_k_as_denominator() {
        let relevant: HashSet<String> = ["Jaws".to_string(), "Alien".to_string()].into_iter().collect();
        let retrieved = vec!["Jaws".to_string(), "Heat".to_string()];
        assert_eq!(precision_at_k(&retrieved, &relevant, 5), 0.2);
        assert_eq!(precision_at_k(&retrieved, &relevant, 1), 1.0);
        assert_eq!(precision_at_k(&retrieved, &relevant, 0), 0.0);
    }
}
