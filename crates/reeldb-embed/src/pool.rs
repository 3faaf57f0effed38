use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{stream, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use reeldb_core::config::EmbeddingSettings;
use reeldb_core::error::{Error, Result};
use reeldb_core::traits::Embedder;

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Batches in flight at once.
    pub concurrency: usize,
    pub batch_size: usize,
    /// Attempts per text once its batch failed with a retryable error.
    pub max_retries: usize,
    /// Linear backoff step: attempt `n` waits `n * backoff`.
    pub backoff: Duration,
    /// Upper bound on a single embedder call.
    pub timeout: Duration,
    pub show_progress: bool,
}

impl Default for PoolOptions {
    fn default() -> Self { Self::from(&EmbeddingSettings::default()) }
}

impl From<&EmbeddingSettings> for PoolOptions {
    fn from(s: &EmbeddingSettings) -> Self {
        Self {
            concurrency: s.concurrency,
            batch_size: s.batch_size,
            max_retries: s.max_retries,
            backoff: Duration::from_millis(s.retry_backoff_ms),
            timeout: Duration::from_millis(s.timeout_ms),
            show_progress: s.show_progress,
        }
    }
}

/// Fans batches of texts out to an `Embedder` with bounded concurrency.
///
/// Output order always matches input order. Each call runs on the blocking
/// pool under a timeout. Batches that already succeeded are never re-embedded;
/// non-retryable failures abort the whole run.
pub struct EmbeddingPool {
    embedder: Arc<dyn Embedder>,
    options: PoolOptions,
}

impl EmbeddingPool {
    pub fn new(embedder: Arc<dyn Embedder>, options: PoolOptions) -> Self {
        Self { embedder, options }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    pub fn options(&self) -> &PoolOptions { &self.options }

    pub async fn embed_all(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let total = texts.len();
        let batch_size = self.options.batch_size.max(1);
        let concurrency = self.options.concurrency.max(1);
        let batches: Vec<Vec<String>> = texts.chunks(batch_size).map(<[String]>::to_vec).collect();
        let batch_count = batches.len();
        let pb = self.progress_bar(total as u64);

        let embedded: Vec<Vec<Vec<f32>>> = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| {
                let pb = pb.clone();
                async move {
                    let len = batch.len() as u64;
                    let vectors = self.embed_batch(index, batch).await?;
                    pb.inc(len);
                    Ok::<_, Error>(vectors)
                }
            })
            .buffered(concurrency)
            .try_collect()
            .await?;
        pb.finish_and_clear();

        let vectors: Vec<Vec<f32>> = embedded.into_iter().flatten().collect();
        info!(
            embedder = self.embedder.id(),
            texts = total,
            batches = batch_count,
            concurrency,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "embedding run complete"
        );
        Ok(vectors)
    }

    /// Embed a single text (a query) with the same blocking-pool, timeout and
    /// shape checks as a batch. No retries: the caller sees the retryable error.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.call(vec![text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::embedding("embedder returned no vector", false))
    }

    /// One call for the whole batch; on a retryable failure fall back to
    /// embedding its texts one at a time, each with bounded retries.
    async fn embed_batch(&self, index: usize, batch: Vec<String>) -> Result<Vec<Vec<f32>>> {
        match self.call(batch.clone()).await {
            Ok(vectors) => Ok(vectors),
            Err(e) if e.is_retryable() && self.options.max_retries > 0 => {
                warn!(batch = index, texts = batch.len(), error = %e, "embedding batch failed; retrying per text");
                let mut vectors = Vec::with_capacity(batch.len());
                for text in batch {
                    vectors.push(self.embed_one_with_retry(index, text).await?);
                }
                Ok(vectors)
            }
            Err(e) => Err(e),
        }
    }

    async fn embed_one_with_retry(&self, index: usize, text: String) -> Result<Vec<f32>> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let delay = self.options.backoff.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX));
            tokio::time::sleep(delay).await;
            match self.call(vec![text.clone()]).await {
                Ok(mut vectors) => {
                    return vectors.pop().ok_or_else(|| Error::embedding("embedder returned no vector", false));
                }
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    warn!(batch = index, attempt, delay_ms = delay.as_millis() as u64, error = %e, "embedding retry failed");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call(&self, batch: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let expected = batch.len();
        let task = tokio::task::spawn_blocking(move || embedder.embed_batch(&batch));
        let vectors = match tokio::time::timeout(self.options.timeout, task).await {
            Err(_) => return Err(Error::embedding(format!("batch timed out after {:?}", self.options.timeout), true)),
            Ok(Err(join)) => return Err(Error::embedding(format!("embedding task failed: {join}"), false)),
            Ok(Ok(Err(e))) => return Err(Error::embedding(format!("{e:#}"), true)),
            Ok(Ok(Ok(vectors))) => vectors,
        };
        check_vectors(&vectors, expected, self.embedder.dim())?;
        debug!(texts = expected, "batch embedded");
        Ok(vectors)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} texts ({percent}%)")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// A provider that answers with the wrong shape will keep doing so; these
/// failures are never retried.
fn check_vectors(vectors: &[Vec<f32>], expected: usize, dim: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::embedding(format!("expected {expected} vectors, got {}", vectors.len()), false));
    }
    for (i, v) in vectors.iter().enumerate() {
        if v.is_empty() {
            return Err(Error::embedding(format!("vector {i} is empty"), false));
        }
        if v.len() != dim {
            return Err(Error::embedding(format!("vector {i} has dimension {}, expected {dim}", v.len()), false));
        }
    }
    Ok(())
}
