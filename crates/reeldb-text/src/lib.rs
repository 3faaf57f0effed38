pub mod bm25;
pub mod index;
pub mod normalizer;
pub mod search;

pub use bm25::Bm25Params;
pub use index::{LexicalIndex, LoadOutcome, LEXICAL_ARTIFACTS};
pub use normalizer::Normalizer;
