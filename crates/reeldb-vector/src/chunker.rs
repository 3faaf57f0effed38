//! Splitting long text into overlapping passages for embedding.

use once_cell::sync::Lazy;
use regex::Regex;

use reeldb_core::error::{Error, Result};

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Windows of `size` words; later windows also carry the `overlap` words before them.
    FixedSize { size: usize, overlap: usize },
    /// Windows of `max_sentences` sentences stepping by `max_sentences - overlap`.
    Sentences { max_sentences: usize, overlap: usize },
}

impl ChunkStrategy {
    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        match *self {
            Self::FixedSize { size, overlap } => fixed_size_chunks(text, size, overlap),
            Self::Sentences { max_sentences, overlap } => sentence_chunks(text, max_sentences, overlap),
        }
    }
}

fn check_window(what: &str, size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::InvalidConfiguration(format!("{what} must be positive")));
    }
    if overlap >= size {
        return Err(Error::InvalidConfiguration(format!("overlap {overlap} must be smaller than {what} {size}")));
    }
    Ok(())
}

pub fn fixed_size_chunks(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    check_window("chunk size", size, overlap)?;
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::with_capacity(words.len() / size + 1);
    let mut start = 0;
    while start < words.len() {
        let from = start.saturating_sub(overlap);
        let to = (start + size).min(words.len());
        chunks.push(words[from..to].join(" "));
        start += size;
    }
    Ok(chunks)
}

/// Split on `.`, `!` or `?` followed by whitespace, keeping the punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in SENTENCE_END.find_iter(text) {
        // The terminator is a single ASCII byte.
        let sentence = text[last..m.start() + 1].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        last = m.end();
    }
    let tail = text[last..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// The final window always reaches the last sentence; a text shorter than one
/// window yields exactly one chunk.
pub fn sentence_chunks(text: &str, max_sentences: usize, overlap: usize) -> Result<Vec<String>> {
    check_window("max chunk sentences", max_sentences, overlap)?;
    let sentences = split_sentences(text);
    let step = max_sentences - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < sentences.len() {
        let end = (start + max_sentences).min(sentences.len());
        chunks.push(sentences[start..end].join(" "));
        if end == sentences.len() {
            break;
        }
        start += step;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_size_prepends_overlap_words() {
        let chunks = fixed_size_chunks("a b c d e f g", 3, 1).unwrap();
        assert_eq!(chunks, vec!["a b c", "c d e f", "f g"]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(fixed_size_chunks("just two", 200, 1).unwrap(), vec!["just two"]);
        assert_eq!(sentence_chunks("No terminator here", 4, 1).unwrap(), vec!["No terminator here"]);
    }

    #[test]
    fn sentences_keep_their_punctuation() {
        assert_eq!(split_sentences("One. Two!  Three? Four"), vec!["One.", "Two!", "Three?", "Four"]);
        assert_eq!(split_sentences("Dr.Who is here."), vec!["Dr.Who is here."]);
    }

    #[test]
    fn sentence_windows_step_by_size_minus_overlap() {
        let text = "S1. S2. S3. S4. S5. S6.";
        let chunks = sentence_chunks(text, 4, 1).unwrap();
        assert_eq!(chunks, vec!["S1. S2. S3. S4.", "S4. S5. S6."]);
        let chunks = sentence_chunks(text, 2, 0).unwrap();
        assert_eq!(chunks, vec!["S1. S2.", "S3. S4.", "S5. S6."]);
    }

    #[test]
    fn single_sentence_with_overlap_is_kept() {
        assert_eq!(sentence_chunks("Only one.", 4, 1).unwrap(), vec!["Only one."]);
    }

    #[test]
    fn blank_input_has_no_chunks() {
        assert!(fixed_size_chunks("  \n\t ", 5, 0).unwrap().is_empty());
        assert!(sentence_chunks("", 4, 1).unwrap().is_empty());
    }

    #[test]
    fn non_positive_steps_are_rejected() {
        assert!(matches!(fixed_size_chunks("a b", 0, 0), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(sentence_chunks("a. b.", 2, 2), Err(Error::InvalidConfiguration(_))));
        let strategy = ChunkStrategy::Sentences { max_sentences: 1, overlap: 1 };
        assert!(strategy.chunk("anything").is_err());
    }
}
