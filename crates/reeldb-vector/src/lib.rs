//! reeldb-vector
//!
//! Chunking, the persisted embedding pair and cosine search over it.
pub mod cache;
pub mod chunker;
pub mod index;
pub mod similarity;

pub use chunker::{fixed_size_chunks, sentence_chunks, split_sentences, ChunkStrategy};
pub use index::{EmbeddingsOutcome, Granularity, SemanticIndex};
pub use similarity::cosine_similarity;
