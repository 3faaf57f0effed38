use std::sync::Arc;

use reeldb_core::error::Error;
use reeldb_core::store::{FsStore, MemoryStore, Store};
use reeldb_core::types::Document;
use reeldb_text::index::{DOCMAP_ARTIFACT, DOC_LENGTHS_ARTIFACT, INDEX_ARTIFACT, TERM_FREQUENCIES_ARTIFACT};
use reeldb_text::{Bm25Params, LexicalIndex, LoadOutcome, Normalizer, LEXICAL_ARTIFACTS};
use tempfile::TempDir;

fn catalog() -> Vec<Document> {
    vec![
        Document::new(1, "Bear Movie", "A bear finds honey in the forest"),
        Document::new(2, "Space Bear", "An astronaut bear floats in space"),
        Document::new(3, "Dog Tale", "A dog chases a ball"),
    ]
}

fn built(store: Arc<dyn Store>) -> LexicalIndex {
    let mut index = LexicalIndex::new(Arc::new(Normalizer::english()), store);
    index.build(&catalog());
    index
}

#[test]
fn tokenization_is_a_fixed_point_on_normalized_text() {
    let n = Normalizer::english();
    let inputs = [
        "The Bears wander into the FOREST, looking for honey!",
        "The bear is being chased",
        "being", "doing", "having", "hers", "ours", "yours", "theirs", "ups", "ins", "outs", "offs", "ifs", "cans",
        "bears", "chased", "wandering", "forests",
    ];
    for input in inputs {
        let once = n.tokenize(input);
        let twice = n.tokenize(&once.join(" "));
        assert_eq!(once, twice, "{input:?}");
    }
    assert_eq!(
        n.tokenize("The Bears wander into the FOREST, looking for honey!"),
        vec!["bear", "wander", "forest", "look", "honey"]
    );
    assert_eq!(n.tokenize("The bear is being chased"), vec!["bear", "chase"]);
    assert!(n.tokenize("being doing hers").is_empty());
}

#[test]
fn absent_terms_have_zero_frequency() {
    let index = built(Arc::new(MemoryStore::new()));
    for doc in catalog() {
        assert_eq!(index.term_frequency(doc.id, "submarine").unwrap(), 0);
    }
    assert_eq!(index.term_frequency(3, "bear").unwrap(), 0);
    assert_eq!(index.term_frequency(1, "bears").unwrap(), 2);
    assert_eq!(index.term_frequency(999, "bear").unwrap(), 0);
}

#[test]
fn idf_never_negative_and_common_terms_still_score() {
    let index = built(Arc::new(MemoryStore::new()));
    for term in ["bear", "dog", "submarine", "space"] {
        assert!(index.idf(term).unwrap() >= 0.0, "{term}");
    }
    // "bear" occurs in two of three documents.
    let common = index.bm25_idf("bear").unwrap();
    assert!(common.is_finite());
    assert!(common < index.bm25_idf("dog").unwrap());
    assert!(index.bm25_score(1, "bear").unwrap().is_finite());
}

#[test]
fn single_term_operations_reject_multi_token_input() {
    let index = built(Arc::new(MemoryStore::new()));
    assert!(matches!(index.idf("space bear"), Err(Error::InvalidQuery(_))));
    assert!(matches!(index.term_frequency(1, "the"), Err(Error::InvalidQuery(_))));
    assert!(matches!(index.bm25_tf(1, "", 1.5, 0.75), Err(Error::InvalidQuery(_))));
}

#[test]
fn documents_for_and_tfidf() {
    let index = built(Arc::new(MemoryStore::new()));
    assert_eq!(index.documents_for("Bear").unwrap(), vec![1, 2]);
    assert!(index.documents_for("submarine").unwrap().is_empty());
    let tfidf = index.tfidf(3, "dog").unwrap();
    assert!((tfidf - 2.0 * index.idf("dog").unwrap()).abs() < 1e-12);
}

#[test]
fn bm25_tf_uses_supplied_parameters() {
    let index = built(Arc::new(MemoryStore::new()));
    let default = index.bm25_tf(1, "bear", 1.5, 0.75).unwrap();
    let no_length_norm = index.bm25_tf(1, "bear", 1.5, 0.0).unwrap();
    // b = 0 makes the score depend on tf alone: 2 * 2.5 / (2 + 1.5).
    assert!((no_length_norm - 5.0 / 3.5).abs() < 1e-12);
    assert!(default > 0.0);
    assert_eq!(index.params(), Bm25Params::default());
}

#[test]
fn bear_query_returns_both_bear_movies() {
    let index = built(Arc::new(MemoryStore::new()));
    let results = index.search("bear", 5);
    let ids: Vec<_> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2], "tied scores keep ascending id order");
    assert!((results[0].score - results[1].score).abs() < 1e-12);
    assert_eq!(results[0].document, "A bear finds honey in the forest");
    assert_eq!(results[0].title, "Bear Movie");
}

#[test]
fn search_orders_by_score_and_truncates() {
    let index = built(Arc::new(MemoryStore::new()));
    let results = index.search("space bear", 5);
    assert_eq!(results[0].id, 2);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(index.search("space bear", 1).len(), 1);
    assert!(index.search("space bear", 0).is_empty());
}

#[test]
fn empty_or_stopword_queries_return_nothing() {
    let index = built(Arc::new(MemoryStore::new()));
    assert!(index.search("", 5).is_empty());
    assert!(index.search("the a in", 5).is_empty());
    assert!(index.search("submarine", 5).is_empty());
}

#[test]
fn load_from_empty_store_is_cache_unavailable_and_leaves_index_intact() {
    let mut index = built(Arc::new(MemoryStore::new()));
    match index.load() {
        Err(Error::CacheUnavailable { artifact, .. }) => assert_eq!(artifact, INDEX_ARTIFACT),
        other => panic!("expected CacheUnavailable, got {other:?}"),
    }
    assert_eq!(index.len(), 3);
    assert_eq!(index.search("dog", 5).len(), 1);
}

#[test]
fn deleting_the_cache_forces_a_rebuild_with_identical_results() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn Store> = Arc::new(FsStore::new(tmp.path().join("cache")).unwrap());
    let original = built(store.clone());
    original.save().unwrap();
    let before = original.search("bear forest", 5);

    for artifact in LEXICAL_ARTIFACTS {
        store.remove(artifact).unwrap();
    }
    let mut fresh = LexicalIndex::new(Arc::new(Normalizer::english()), store.clone());
    assert!(fresh.load().unwrap_err().is_cache_unavailable());

    fresh.build(&catalog());
    fresh.save().unwrap();

    let mut reloaded = LexicalIndex::new(Arc::new(Normalizer::english()), store);
    reloaded.load().expect("load after rebuild");
    assert_eq!(reloaded.search("bear forest", 5), before);
    assert_eq!(reloaded.avg_doc_len(), original.avg_doc_len());
}

#[test]
fn load_or_build_rewrites_only_missing_artifacts_for_an_unchanged_catalog() {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn Store> = store.clone();

    let mut first = LexicalIndex::new(Arc::new(Normalizer::english()), dyn_store.clone());
    let outcome = first.load_or_build(&catalog()).unwrap();
    assert_eq!(outcome, LoadOutcome::Rebuilt { rewritten: LEXICAL_ARTIFACTS.iter().map(|s| s.to_string()).collect() });
    assert_eq!(store.keys().len(), 4);

    store.remove(DOCMAP_ARTIFACT).unwrap();
    let mut second = LexicalIndex::new(Arc::new(Normalizer::english()), dyn_store.clone());
    assert_eq!(
        second.load_or_build(&catalog()).unwrap(),
        LoadOutcome::Rebuilt { rewritten: vec![DOCMAP_ARTIFACT.to_string()] }
    );

    let mut third = LexicalIndex::new(Arc::new(Normalizer::english()), dyn_store);
    assert_eq!(third.load_or_build(&catalog()).unwrap(), LoadOutcome::Loaded);
    assert_eq!(third.search("dog", 5), first.search("dog", 5));
}

#[test]
fn corrupt_artifact_triggers_rebuild() {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn Store> = store.clone();
    built(dyn_store.clone()).save().unwrap();
    store.write(INDEX_ARTIFACT, b"garbage").unwrap();

    let mut index = LexicalIndex::new(Arc::new(Normalizer::english()), dyn_store);
    let outcome = index.load_or_build(&catalog()).unwrap();
    assert_eq!(outcome, LoadOutcome::Rebuilt { rewritten: vec![INDEX_ARTIFACT.to_string()] });
    assert_eq!(index.documents_for("honey").unwrap(), vec![1]);
}

#[test]
fn partial_cache_from_an_older_catalog_is_replaced_not_merged() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn Store> = Arc::new(FsStore::new(tmp.path()).unwrap());
    let old = vec![
        Document::new(1, "Bear Movie", "A bear finds honey in the forest"),
        Document::new(2, "Dog Tale", "A dog chases a ball"),
    ];
    let new = vec![
        Document::new(1, "Shark Movie", "A shark eats a boat"),
        Document::new(2, "Cat Tale", "A cat chases a mouse"),
    ];
    let mut first = LexicalIndex::new(Arc::new(Normalizer::english()), store.clone());
    first.build(&old);
    first.save().unwrap();
    store.remove(DOCMAP_ARTIFACT).unwrap();

    let mut rebuilt = LexicalIndex::new(Arc::new(Normalizer::english()), store.clone());
    let LoadOutcome::Rebuilt { rewritten } = rebuilt.load_or_build(&new).unwrap() else {
        panic!("expected a rebuild");
    };
    for artifact in [INDEX_ARTIFACT, TERM_FREQUENCIES_ARTIFACT, DOC_LENGTHS_ARTIFACT, DOCMAP_ARTIFACT] {
        assert!(rewritten.contains(&artifact.to_string()), "{artifact} not rewritten: {rewritten:?}");
    }

    let mut reloaded = LexicalIndex::new(Arc::new(Normalizer::english()), store);
    assert_eq!(reloaded.load_or_build(&new).unwrap(), LoadOutcome::Loaded);
    assert_eq!(reloaded.search("shark", 5), rebuilt.search("shark", 5));
    assert_eq!(reloaded.search("shark", 5)[0].title, "Shark Movie");
    assert!(reloaded.search("bear", 5).is_empty());
}
