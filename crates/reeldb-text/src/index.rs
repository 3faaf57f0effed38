use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use reeldb_core::error::{Error, Result};
use reeldb_core::store::{get_bincode, put_bincode, Store};
use reeldb_core::types::{DocId, Document};

use crate::bm25::{self, Bm25Params};
use crate::normalizer::Normalizer;

pub const INDEX_ARTIFACT: &str = "index.bin";
pub const TERM_FREQUENCIES_ARTIFACT: &str = "term_frequencies.bin";
pub const DOC_LENGTHS_ARTIFACT: &str = "doc_lengths.bin";
pub const DOCMAP_ARTIFACT: &str = "docmap.bin";

pub const LEXICAL_ARTIFACTS: [&str; 4] =
    [INDEX_ARTIFACT, TERM_FREQUENCIES_ARTIFACT, DOC_LENGTHS_ARTIFACT, DOCMAP_ARTIFACT];

pub(crate) type Postings = HashMap<String, BTreeSet<DocId>>;
pub(crate) type TermFrequencies = HashMap<DocId, HashMap<String, u32>>;
pub(crate) type DocLengths = HashMap<DocId, usize>;
pub(crate) type DocMap = BTreeMap<DocId, Document>;

/// How `load_or_build` obtained the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Built from the catalog; only the listed artifacts were rewritten.
    Rebuilt { rewritten: Vec<String> },
}

/// Inverted index with per-document term frequencies and BM25 scoring.
///
/// Lifecycle: `build` (from the catalog) → `save` → `load` → read-only queries.
/// Queries take `&self` and are safe to share across threads.
pub struct LexicalIndex {
    pub(crate) normalizer: Arc<Normalizer>,
    store: Arc<dyn Store>,
    pub(crate) params: Bm25Params,
    pub(crate) postings: Postings,
    pub(crate) term_frequencies: TermFrequencies,
    pub(crate) doc_lengths: DocLengths,
    pub(crate) docmap: DocMap,
    pub(crate) avg_doc_len: f64,
}

impl LexicalIndex {
    pub fn new(normalizer: Arc<Normalizer>, store: Arc<dyn Store>) -> Self {
        Self {
            normalizer,
            store,
            params: Bm25Params::default(),
            postings: HashMap::new(),
            term_frequencies: HashMap::new(),
            doc_lengths: HashMap::new(),
            docmap: BTreeMap::new(),
            avg_doc_len: 0.0,
        }
    }

    pub fn with_params(mut self, params: Bm25Params) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> Bm25Params { self.params }

    /// Replace the index with one built from `documents`.
    pub fn build(&mut self, documents: &[Document]) {
        let start = Instant::now();
        self.postings.clear();
        self.term_frequencies.clear();
        self.doc_lengths.clear();
        self.docmap.clear();
        for doc in documents {
            if self.docmap.contains_key(&doc.id) {
                warn!(doc_id = doc.id, "duplicate document id in catalog; keeping the first");
                continue;
            }
            self.add_document(doc);
        }
        self.avg_doc_len = average_length(&self.doc_lengths);
        info!(
            documents = self.docmap.len(),
            terms = self.postings.len(),
            avg_doc_len = self.avg_doc_len,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "lexical index built"
        );
    }

    fn add_document(&mut self, doc: &Document) {
        let tokens = self.normalizer.tokenize(&doc.lexical_text());
        let counts = self.term_frequencies.entry(doc.id).or_default();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
            self.postings.entry(token.clone()).or_default().insert(doc.id);
        }
        self.doc_lengths.insert(doc.id, tokens.len());
        self.docmap.insert(doc.id, doc.clone());
    }

    pub fn save(&self) -> Result<()> {
        self.save_artifacts(&LEXICAL_ARTIFACTS)
    }

    /// Persist only the named artifacts; unknown names are rejected.
    pub fn save_artifacts<S: AsRef<str>>(&self, artifacts: &[S]) -> Result<()> {
        let store = self.store.as_ref();
        for artifact in artifacts {
            match artifact.as_ref() {
                INDEX_ARTIFACT => put_bincode(store, INDEX_ARTIFACT, &self.postings)?,
                TERM_FREQUENCIES_ARTIFACT => put_bincode(store, TERM_FREQUENCIES_ARTIFACT, &self.term_frequencies)?,
                DOC_LENGTHS_ARTIFACT => put_bincode(store, DOC_LENGTHS_ARTIFACT, &self.doc_lengths)?,
                DOCMAP_ARTIFACT => put_bincode(store, DOCMAP_ARTIFACT, &self.docmap)?,
                other => return Err(Error::InvalidConfiguration(format!("unknown lexical artifact '{other}'"))),
            }
            debug!(artifact = artifact.as_ref(), "lexical artifact saved");
        }
        Ok(())
    }

    /// Restore every artifact. On any failure the in-memory index is untouched
    /// and the error names the artifact.
    pub fn load(&mut self) -> Result<()> {
        let store = self.store.as_ref();
        let postings: Postings = get_bincode(store, INDEX_ARTIFACT)?;
        let term_frequencies: TermFrequencies = get_bincode(store, TERM_FREQUENCIES_ARTIFACT)?;
        let doc_lengths: DocLengths = get_bincode(store, DOC_LENGTHS_ARTIFACT)?;
        let docmap: DocMap = get_bincode(store, DOCMAP_ARTIFACT)?;
        check_consistency(&doc_lengths, &docmap)?;
        self.install(postings, term_frequencies, doc_lengths, docmap);
        info!(documents = self.docmap.len(), terms = self.postings.len(), "lexical index loaded");
        Ok(())
    }

    /// Load what is cached; rebuild from `documents` when any artifact is
    /// unavailable or the set is inconsistent. After a rebuild every artifact
    /// that is missing or differs from the rebuilt index is rewritten, so the
    /// store never mixes two generations.
    pub fn load_or_build(&mut self, documents: &[Document]) -> Result<LoadOutcome> {
        let mut missing = Vec::new();
        let postings = self.try_artifact::<Postings>(INDEX_ARTIFACT, &mut missing)?;
        let term_frequencies = self.try_artifact::<TermFrequencies>(TERM_FREQUENCIES_ARTIFACT, &mut missing)?;
        let doc_lengths = self.try_artifact::<DocLengths>(DOC_LENGTHS_ARTIFACT, &mut missing)?;
        let docmap = self.try_artifact::<DocMap>(DOCMAP_ARTIFACT, &mut missing)?;

        if !missing.is_empty() {
            warn!(missing = ?missing, "lexical cache incomplete; rebuilding from catalog");
        }
        let consistent = match (&doc_lengths, &docmap) {
            (Some(dl), Some(dm)) => match check_consistency(dl, dm) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "lexical cache inconsistent; rebuilding");
                    false
                }
            },
            _ => false,
        };
        let (postings, term_frequencies, doc_lengths, docmap) = match (postings, term_frequencies, doc_lengths, docmap) {
            (Some(p), Some(tf), Some(dl), Some(dm)) if consistent => {
                self.install(p, tf, dl, dm);
                info!(documents = self.docmap.len(), "lexical index loaded from cache");
                return Ok(LoadOutcome::Loaded);
            }
            cached => cached,
        };

        self.build(documents);
        let current = [
            (INDEX_ARTIFACT, postings.as_ref() == Some(&self.postings)),
            (TERM_FREQUENCIES_ARTIFACT, term_frequencies.as_ref() == Some(&self.term_frequencies)),
            (DOC_LENGTHS_ARTIFACT, doc_lengths.as_ref() == Some(&self.doc_lengths)),
            (DOCMAP_ARTIFACT, docmap.as_ref() == Some(&self.docmap)),
        ];
        let rewritten: Vec<String> =
            current.iter().filter(|(_, same)| !same).map(|(artifact, _)| (*artifact).to_string()).collect();
        self.save_artifacts(&rewritten)?;
        Ok(LoadOutcome::Rebuilt { rewritten })
    }

    fn try_artifact<T: DeserializeOwned + Serialize>(&self, artifact: &str, missing: &mut Vec<String>) -> Result<Option<T>> {
        match get_bincode::<T>(self.store.as_ref(), artifact) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_cache_unavailable() => {
                debug!(artifact, error = %e, "lexical artifact unavailable");
                missing.push(artifact.to_string());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn install(&mut self, postings: Postings, term_frequencies: TermFrequencies, doc_lengths: DocLengths, docmap: DocMap) {
        self.postings = postings;
        self.term_frequencies = term_frequencies;
        self.doc_lengths = doc_lengths;
        self.docmap = docmap;
        self.avg_doc_len = average_length(&self.doc_lengths);
    }

    pub fn len(&self) -> usize { self.docmap.len() }

    pub fn is_empty(&self) -> bool { self.docmap.is_empty() }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> { self.docmap.get(&doc_id) }

    pub fn avg_doc_len(&self) -> f64 { self.avg_doc_len }

    pub fn doc_len(&self, doc_id: DocId) -> usize { self.doc_lengths.get(&doc_id).copied().unwrap_or(0) }

    pub fn normalizer(&self) -> &Normalizer { &self.normalizer }

    /// Sorted ids of documents containing `term`.
    pub fn documents_for(&self, term: &str) -> Result<Vec<DocId>> {
        let token = self.normalizer.single_token(term)?;
        Ok(self.postings.get(&token).map(|ids| ids.iter().copied().collect()).unwrap_or_default())
    }

    pub(crate) fn raw_tf(&self, doc_id: DocId, token: &str) -> u32 {
        self.term_frequencies.get(&doc_id).and_then(|counts| counts.get(token)).copied().unwrap_or(0)
    }

    pub(crate) fn raw_df(&self, token: &str) -> usize {
        self.postings.get(token).map_or(0, BTreeSet::len)
    }

    pub fn term_frequency(&self, doc_id: DocId, term: &str) -> Result<u32> {
        let token = self.normalizer.single_token(term)?;
        Ok(self.raw_tf(doc_id, &token))
    }

    pub fn document_frequency(&self, term: &str) -> Result<usize> {
        let token = self.normalizer.single_token(term)?;
        Ok(self.raw_df(&token))
    }

    pub fn idf(&self, term: &str) -> Result<f64> {
        let token = self.normalizer.single_token(term)?;
        Ok(bm25::idf(self.len(), self.raw_df(&token)))
    }

    pub fn tfidf(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let token = self.normalizer.single_token(term)?;
        Ok(f64::from(self.raw_tf(doc_id, &token)) * bm25::idf(self.len(), self.raw_df(&token)))
    }

    pub fn bm25_idf(&self, term: &str) -> Result<f64> {
        let token = self.normalizer.single_token(term)?;
        Ok(bm25::bm25_idf(self.len(), self.raw_df(&token)))
    }

    pub fn bm25_tf(&self, doc_id: DocId, term: &str, k1: f64, b: f64) -> Result<f64> {
        let token = self.normalizer.single_token(term)?;
        Ok(bm25::bm25_tf(self.raw_tf(doc_id, &token), self.doc_len(doc_id), self.avg_doc_len, Bm25Params { k1, b }))
    }

    pub fn bm25_score(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let token = self.normalizer.single_token(term)?;
        Ok(self.token_score(doc_id, &token))
    }

    pub(crate) fn token_score(&self, doc_id: DocId, token: &str) -> f64 {
        let tf = bm25::bm25_tf(self.raw_tf(doc_id, token), self.doc_len(doc_id), self.avg_doc_len, self.params);
        tf * bm25::bm25_idf(self.len(), self.raw_df(token))
    }
}

fn average_length(doc_lengths: &DocLengths) -> f64 {
    if doc_lengths.is_empty() {
        return 0.0;
    }
    doc_lengths.values().sum::<usize>() as f64 / doc_lengths.len() as f64
}

fn check_consistency(doc_lengths: &DocLengths, docmap: &DocMap) -> Result<()> {
    if doc_lengths.len() != docmap.len() {
        return Err(Error::cache_unavailable(
            DOC_LENGTHS_ARTIFACT,
            format!("{} lengths for {} documents", doc_lengths.len(), docmap.len()),
        ));
    }
    Ok(())
}
