//! Deterministic text normalization shared by indexing and querying.
//!
//! Pipeline (fixed order): lowercase → strip ASCII punctuation → split on
//! whitespace → drop empty tokens → drop stopwords → English stemming.
//! Index build and query parsing must go through the same `Normalizer`.

use tantivy::tokenizer::{Language, Stemmer, StopWordFilter, TextAnalyzer, TokenStream, WhitespaceTokenizer};

use reeldb_core::catalog::DEFAULT_STOPWORDS;
use reeldb_core::error::{Error, Result};

#[derive(Clone)]
pub struct Normalizer {
    analyzer: TextAnalyzer,
    stopword_count: usize,
}

impl Normalizer {
    /// Build a normalizer around a fixed stopword set. Stopwords go through the
    /// same lowercase/punctuation pass as text so `"Don't"` filters `dont`.
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words: Vec<String> = stopwords
            .into_iter()
            .flat_map(|w| preprocess(w.as_ref()).split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .collect();
        words.sort();
        words.dedup();
        let stopword_count = words.len();
        let analyzer = TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(StopWordFilter::remove(words))
            .filter(Stemmer::new(Language::English))
            .build();
        Self { analyzer, stopword_count }
    }

    pub fn english() -> Self {
        Self::new(DEFAULT_STOPWORDS.iter().copied())
    }

    pub fn stopword_count(&self) -> usize { self.stopword_count }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let cleaned = preprocess(text);
        // `token_stream` needs `&mut`; analyzers are cheap to clone.
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(&cleaned);
        let mut tokens = Vec::new();
        while stream.advance() {
            let token = &stream.token().text;
            if !token.is_empty() {
                tokens.push(token.clone());
            }
        }
        tokens
    }

    /// Normalize a term that must map to exactly one token.
    pub fn single_token(&self, term: &str) -> Result<String> {
        let mut tokens = self.tokenize(term);
        match tokens.len() {
            1 => Ok(tokens.remove(0)),
            n => Err(Error::InvalidQuery(format!("'{term}' must normalize to exactly one token, got {n}"))),
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self { Self::english() }
}

/// Lowercase, drop ASCII punctuation, fold any Unicode whitespace to a space.
fn preprocess(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_is_stripped_not_split() {
        let n = Normalizer::new(Vec::<String>::new());
        assert_eq!(n.tokenize("Hello, World!"), vec!["hello", "world"]);
        assert_eq!(n.tokenize("don't"), vec!["dont"]);
    }

    #[test]
    fn stopwords_removed_before_stemming() {
        let n = Normalizer::new(["the", "in"]);
        assert_eq!(n.tokenize("The bears in THE forest"), vec!["bear", "forest"]);
    }

    #[test]
    fn stopword_entries_are_normalized() {
        let n = Normalizer::new(["Don't"]);
        assert!(n.tokenize("dont DON'T").is_empty());
        assert_eq!(n.stopword_count(), 1);
    }

    #[test]
    fn empty_and_punctuation_only_inputs() {
        let n = Normalizer::english();
        assert!(n.tokenize("").is_empty());
        assert!(n.tokenize("   \t\n").is_empty());
        assert!(n.tokenize("...---!!!").is_empty());
    }

    #[test]
    fn single_token_rejects_zero_or_many() {
        let n = Normalizer::english();
        assert_eq!(n.single_token("Bears").unwrap(), "bear");
        assert!(matches!(n.single_token("the"), Err(Error::InvalidQuery(_))));
        assert!(matches!(n.single_token("space bear"), Err(Error::InvalidQuery(_))));
    }
}
