use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::types::Document;

/// Built-in English stopwords, used when no stopword file is configured.
///
/// Includes inflected forms (`being`, `hers`, `ups`, ...) whose stems are
/// themselves stopwords, so normalizing already-normalized text drops nothing.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "ain", "all", "alls", "am", "an", "and", "ands", "any",
    "are", "aren", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "buts", "by", "can", "cans", "could", "couldn", "couldn't", "d", "did", "didn", "didn't", "do", "does",
    "doesn", "doesn't", "doing", "don", "don't", "down", "downs", "during", "each", "few", "for", "from",
    "further", "had", "hadn", "hadn't", "has", "hasn", "hasn't", "have", "haven", "haven't", "haves", "having",
    "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "hows", "i", "if", "ifs", "in", "ins",
    "into", "is", "isn", "isn't", "it", "it's", "its", "itself", "just", "ll", "m", "ma", "may", "mays", "me",
    "might", "mightn", "mightn't", "more", "most", "must", "musts", "mustn", "mustn't", "my", "myself", "needn",
    "needn't", "no", "nor", "not", "now", "o", "of", "off", "offs", "on", "once", "only", "ons", "or", "other",
    "our", "ours", "ourselves", "out", "outs", "over", "overs", "own", "re", "s", "same", "shall", "shan",
    "shan't", "she", "she's", "should", "should've", "shouldn", "shouldn't", "so", "some", "such", "t", "than",
    "that", "that'll", "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "ups", "ve", "very", "was", "wasn", "wasn't", "we",
    "were", "weren", "weren't", "what", "when", "where", "which", "while", "who", "whom", "whose", "why", "whys",
    "will", "wills", "with", "won", "won't", "would", "wouldn", "wouldn't", "y", "you", "you'd", "you'll",
    "you're", "you've", "your", "yours", "yourself", "yourselves",
];

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    movies: Vec<Document>,
}

/// Load the movie catalog: `{"movies": [{"id", "title", "description"}, ...]}`.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let content = read_file_content(path)?;
    let catalog: CatalogFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
    info!(path = %path.display(), documents = catalog.movies.len(), "catalog loaded");
    Ok(catalog.movies)
}

/// One stopword per line; blank lines are ignored.
pub fn load_stopwords(path: &Path) -> Result<Vec<String>> {
    let content = read_file_content(path)?;
    Ok(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}

pub fn default_stopwords() -> Vec<String> {
    DEFAULT_STOPWORDS.iter().map(|s| (*s).to_string()).collect()
}

fn read_file_content(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).to_string()),
    }
}
