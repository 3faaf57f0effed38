//! reeldb-text search
//!
//! BM25 ranking over a built `LexicalIndex`, plus a plain title keyword match.
use std::collections::HashMap;

use tracing::debug;

use reeldb_core::types::{DocId, ResultMetadata, ScoredResult};

use crate::bm25;
use crate::index::LexicalIndex;

impl LexicalIndex {
    /// Rank documents by summed BM25 over the query's tokens.
    ///
    /// Repeated query tokens contribute once per occurrence; `matched_terms`
    /// counts distinct tokens. Ties keep first-seen order: query-token order,
    /// then ascending document id within a posting list.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredResult> {
        let tokens = self.normalizer.tokenize(query);
        if tokens.is_empty() || limit == 0 {
            return Vec::new();
        }

        let total_docs = self.len();
        let mut order: Vec<DocId> = Vec::new();
        let mut scores: HashMap<DocId, (f64, usize)> = HashMap::new();
        for (i, token) in tokens.iter().enumerate() {
            let Some(posting) = self.postings.get(token) else { continue };
            let first_occurrence = tokens.iter().position(|t| t == token) == Some(i);
            let idf = bm25::bm25_idf(total_docs, posting.len());
            for &doc_id in posting {
                let tf = bm25::bm25_tf(self.raw_tf(doc_id, token), self.doc_len(doc_id), self.avg_doc_len, self.params);
                let entry = scores.entry(doc_id).or_insert_with(|| {
                    order.push(doc_id);
                    (0.0, 0)
                });
                entry.0 += tf * idf;
                if first_occurrence {
                    entry.1 += 1;
                }
            }
        }

        let mut ranked: Vec<(DocId, f64, usize)> =
            order.iter().filter_map(|id| scores.get(id).map(|(score, matched)| (*id, *score, *matched))).collect();
        // Stable: equal scores keep first-seen order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(limit);
        debug!(query, tokens = tokens.len(), candidates = order.len(), returned = ranked.len(), "bm25 search");

        ranked
            .into_iter()
            .filter_map(|(id, score, matched_terms)| {
                let doc = self.document(id)?;
                Some(ScoredResult {
                    id,
                    title: doc.title.clone(),
                    document: doc.description.clone(),
                    score,
                    metadata: ResultMetadata::Lexical { matched_terms },
                })
            })
            .collect()
    }

    /// Documents whose normalized title contains any query token as a
    /// substring, in ascending id order. Every hit scores 1.0.
    pub fn title_search(&self, query: &str, limit: usize) -> Vec<ScoredResult> {
        let query_tokens = self.normalizer.tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        self.docmap
            .values()
            .filter_map(|doc| {
                let title_tokens = self.normalizer.tokenize(&doc.title);
                let matched_terms = query_tokens
                    .iter()
                    .filter(|q| title_tokens.iter().any(|t| t.contains(q.as_str())))
                    .count();
                (matched_terms > 0).then(|| ScoredResult {
                    id: doc.id,
                    title: doc.title.clone(),
                    document: doc.description.clone(),
                    score: 1.0,
                    metadata: ResultMetadata::Lexical { matched_terms },
                })
            })
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reeldb_core::store::MemoryStore;
    use reeldb_core::types::Document;

    use crate::normalizer::Normalizer;
    use crate::LexicalIndex;

    fn index(docs: &[Document]) -> LexicalIndex {
        let mut idx = LexicalIndex::new(Arc::new(Normalizer::english()), Arc::new(MemoryStore::new()));
        idx.build(docs);
        idx
    }

    #[test]
    fn matched_terms_counts_distinct_tokens() {
        let idx = index(&[Document::new(1, "Bear", "a bear in the woods")]);
        let results = idx.search("bear bear woods", 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata, reeldb_core::types::ResultMetadata::Lexical { matched_terms: 2 });
    }

    #[test]
    fn title_search_matches_substrings() {
        let idx = index(&[
            Document::new(1, "Paddington", "a bear from peru"),
            Document::new(2, "Jaws", "a shark"),
            Document::new(3, "Paddington 2", "the bear returns"),
        ]);
        let ids: Vec<_> = idx.title_search("padding", 10).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(idx.title_search("padding", 1).len(), 1);
        assert!(idx.title_search("the", 10).is_empty());
    }
}
