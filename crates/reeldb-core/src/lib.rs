//! reeldb-core
//!
//! Shared domain types, the error taxonomy, configuration, artifact storage and
//! the embedding boundary used by the text, vector and hybrid crates.

pub mod catalog;
pub mod config;
pub mod error;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
