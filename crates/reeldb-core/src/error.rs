use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A term or query normalized to the wrong number of tokens.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A persisted artifact is missing or unreadable. Callers recover by rebuilding.
    #[error("Cache artifact '{artifact}' unavailable: {reason}")]
    CacheUnavailable { artifact: String, reason: String },

    #[error("Embedding capability failed: {message}")]
    EmbeddingCapability { message: String, retryable: bool },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    pub fn cache_unavailable(artifact: impl Into<String>, reason: impl ToString) -> Self {
        Self::CacheUnavailable { artifact: artifact.into(), reason: reason.to_string() }
    }

    pub fn embedding(message: impl Into<String>, retryable: bool) -> Self {
        Self::EmbeddingCapability { message: message.into(), retryable }
    }

    pub fn is_cache_unavailable(&self) -> bool {
        matches!(self, Self::CacheUnavailable { .. })
    }

    /// Only embedding failures are ever worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingCapability { retryable: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
