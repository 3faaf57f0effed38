//! `reeldb` command-line front end.
//!
//! ```bash
//! reeldb build
//! reeldb bm25search "space bear" --limit 3
//! reeldb rrf-search "bear in the woods" --k 60
//! RUST_LOG=debug reeldb weighted-search "dog" --alpha 0.3 --json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reeldb_core::catalog::{default_stopwords, load_documents, load_stopwords};
use reeldb_core::config::{Config, Settings};
use reeldb_core::store::{FsStore, Store};
use reeldb_core::types::{DocId, Document, ScoredResult};
use reeldb_embed::{get_default_embedder, EmbeddingPool, PoolOptions};
use reeldb_hybrid::eval::{evaluate, load_golden_dataset};
use reeldb_hybrid::{normalize_scores, FusionMethod, HybridOptions, HybridSearch};
use reeldb_text::{Bm25Params, LexicalIndex, Normalizer};
use reeldb_vector::{ChunkStrategy, Granularity, SemanticIndex};

/// Hybrid keyword + semantic search over a movie catalog.
#[derive(Parser, Debug)]
#[command(name = "reeldb", version, about)]
struct Cli {
    /// Catalog JSON (overrides `data.catalog_path`)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Artifact cache directory (overrides `data.cache_dir`)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the lexical index and embeddings from the catalog
    Build,
    /// Title keyword search
    Search {
        query: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Raw term frequency of a term in a document
    Tf { doc_id: DocId, term: String },
    /// Smoothed inverse document frequency
    Idf { term: String },
    /// tf * idf
    Tfidf { doc_id: DocId, term: String },
    /// Okapi BM25 inverse document frequency
    Bm25idf { term: String },
    /// Saturated, length-normalized BM25 term frequency
    Bm25tf {
        doc_id: DocId,
        term: String,
        #[arg(long)]
        k1: Option<f64>,
        #[arg(long)]
        b: Option<f64>,
    },
    /// Full BM25 ranking
    Bm25search {
        query: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fixed-size word chunks of a text
    Chunk {
        text: String,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Sentence-window chunks of a text
    SemanticChunk {
        text: String,
        #[arg(long)]
        max_chunk_size: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Load the embeddings, building them if missing or stale
    EmbedChunks,
    /// Report on the persisted embeddings without rebuilding
    VerifyEmbeddings,
    /// Semantic search over the embedded chunks
    SearchChunks {
        query: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Embed a single text and print its vector summary
    EmbedText { text: String },
    /// Min-max normalize a list of scores
    Normalize {
        #[arg(allow_negative_numbers = true, num_args = 0..)]
        scores: Vec<f64>,
    },
    /// Weighted hybrid search
    WeightedSearch {
        query: String,
        #[arg(long)]
        alpha: Option<f64>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Reciprocal rank fusion hybrid search
    RrfSearch {
        query: String,
        #[arg(long)]
        k: Option<f64>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Precision@k of RRF search over a golden dataset
    Evaluate {
        #[arg(long)]
        golden: Option<PathBuf>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long)]
        k: Option<f64>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

/// Resolved settings plus the handles every subcommand shares.
struct App {
    settings: Settings,
    catalog: PathBuf,
    store: Arc<dyn Store>,
    json: bool,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let settings = Config::load().context("Error loading config")?.settings()?;
        let catalog = cli.catalog.clone().unwrap_or_else(|| settings.data.catalog());
        let cache = cli.cache_dir.clone().unwrap_or_else(|| settings.data.cache());
        let store: Arc<dyn Store> = Arc::new(FsStore::new(&cache)?);
        info!(catalog = %catalog.display(), cache = %cache.display(), "configuration resolved");
        Ok(Self { settings, catalog, store, json: cli.json })
    }

    fn documents(&self) -> Result<Vec<Document>> {
        load_documents(&self.catalog)
    }

    fn normalizer(&self) -> Result<Arc<Normalizer>> {
        let stopwords = match self.settings.data.stopwords() {
            Some(path) => load_stopwords(&path)?,
            None => default_stopwords(),
        };
        Ok(Arc::new(Normalizer::new(stopwords)))
    }

    fn lexical_index(&self) -> Result<LexicalIndex> {
        Ok(LexicalIndex::new(self.normalizer()?, self.store.clone()).with_params(Bm25Params::from(self.settings.bm25)))
    }

    fn lexical(&self, documents: &[Document]) -> Result<LexicalIndex> {
        let mut index = self.lexical_index()?;
        index.load_or_build(documents)?;
        Ok(index)
    }

    fn semantic_index(&self) -> Result<SemanticIndex> {
        let embedding = &self.settings.embedding;
        let pool = EmbeddingPool::new(get_default_embedder(embedding)?, PoolOptions::from(embedding));
        Ok(SemanticIndex::new(pool, self.store.clone(), Granularity::from_settings(&self.settings))
            .with_validation(embedding.validation)
            .with_excerpt_chars(self.settings.search.excerpt_chars))
    }

    async fn semantic(&self, documents: &[Document]) -> Result<SemanticIndex> {
        let mut index = self.semantic_index()?;
        index.load_or_create(documents).await?;
        Ok(index)
    }

    async fn hybrid(&self) -> Result<HybridSearch> {
        let documents = self.documents()?;
        let search = HybridSearch::open(
            &documents,
            self.lexical_index()?,
            self.semantic_index()?,
            HybridOptions::from(&self.settings.search),
        )
        .await?;
        Ok(search)
    }

    fn limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.settings.search.default_limit)
    }

    fn print_value<T: Serialize + std::fmt::Display>(&self, label: &str, value: T) -> Result<()> {
        if self.json {
            let mut object = serde_json::Map::new();
            object.insert(label.to_string(), serde_json::to_value(&value)?);
            println!("{}", serde_json::to_string_pretty(&object)?);
        } else {
            println!("{label}: {value}");
        }
        Ok(())
    }

    fn print_lines(&self, lines: &[String]) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(lines)?);
        } else {
            for (i, line) in lines.iter().enumerate() {
                println!("{}. {line}", i + 1);
            }
        }
        Ok(())
    }

    fn print_results(&self, results: &[ScoredResult]) -> Result<()> {
        let precision = self.settings.search.score_precision;
        let results: Vec<ScoredResult> = results.iter().cloned().map(|r| r.rounded(precision)).collect();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }
        if results.is_empty() {
            println!("No results.");
        }
        for (i, r) in results.iter().enumerate() {
            println!("{}. {} (id {}) score {}", i + 1, r.title, r.id, r.score);
            println!("   {}", serde_json::to_string(&r.metadata)?);
            if !r.document.is_empty() {
                println!("   {}", r.document);
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let app = App::new(&cli)?;

    match cli.command {
        Command::Build => {
            let documents = app.documents()?;
            let mut lexical = app.lexical_index()?;
            lexical.build(&documents);
            lexical.save()?;
            let mut semantic = app.semantic_index()?;
            semantic.build(&documents).await?;
            println!("Built lexical index ({} documents) and {} embeddings", lexical.len(), semantic.len());
        }
        Command::Search { query, limit } => {
            let index = app.lexical(&app.documents()?)?;
            app.print_results(&index.title_search(&query, app.limit(limit)))?;
        }
        Command::Tf { doc_id, term } => {
            let index = app.lexical(&app.documents()?)?;
            app.print_value("tf", index.term_frequency(doc_id, &term)?)?;
        }
        Command::Idf { term } => {
            let index = app.lexical(&app.documents()?)?;
            app.print_value("idf", index.idf(&term)?)?;
        }
        Command::Tfidf { doc_id, term } => {
            let index = app.lexical(&app.documents()?)?;
            app.print_value("tfidf", index.tfidf(doc_id, &term)?)?;
        }
        Command::Bm25idf { term } => {
            let index = app.lexical(&app.documents()?)?;
            app.print_value("bm25_idf", index.bm25_idf(&term)?)?;
        }
        Command::Bm25tf { doc_id, term, k1, b } => {
            let index = app.lexical(&app.documents()?)?;
            let params = index.params();
            let score = index.bm25_tf(doc_id, &term, k1.unwrap_or(params.k1), b.unwrap_or(params.b))?;
            app.print_value("bm25_tf", score)?;
        }
        Command::Bm25search { query, limit } => {
            let index = app.lexical(&app.documents()?)?;
            app.print_results(&index.search(&query, app.limit(limit)))?;
        }
        Command::Chunk { text, chunk_size, overlap } => {
            let chunking = app.settings.chunking;
            let strategy = ChunkStrategy::FixedSize {
                size: chunk_size.unwrap_or(chunking.chunk_size),
                overlap: overlap.unwrap_or(chunking.overlap),
            };
            let chunks = strategy.chunk(&text)?;
            app.print_lines(&chunks)?;
        }
        Command::SemanticChunk { text, max_chunk_size, overlap } => {
            let chunking = app.settings.chunking;
            let strategy = ChunkStrategy::Sentences {
                max_sentences: max_chunk_size.unwrap_or(chunking.max_chunk_sentences),
                overlap: overlap.unwrap_or(chunking.overlap_sentences),
            };
            let chunks = strategy.chunk(&text)?;
            app.print_lines(&chunks)?;
        }
        Command::EmbedChunks => {
            let index = app.semantic(&app.documents()?).await?;
            app.print_value("embeddings", index.len())?;
        }
        Command::VerifyEmbeddings => {
            let documents = app.documents()?;
            let mut index = app.semantic_index()?;
            index.load(&documents)?;
            let (planned, _) = index.plan(&documents)?;
            let report = serde_json::json!({
                "artifact": index.artifacts().embeddings,
                "granularity": index.granularity(),
                "rows": index.len(),
                "expected_rows": planned.len(),
                "dim": index.dim(),
                "embedder": index.embedder().id(),
            });
            if app.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Artifact:   {}", index.artifacts().embeddings);
                println!("Rows:       {} (catalog needs {})", index.len(), planned.len());
                println!("Dimension:  {}", index.dim().map_or_else(|| "-".to_string(), |d| d.to_string()));
                println!("Embedder:   {}", index.embedder().id());
            }
        }
        Command::SearchChunks { query, limit } => {
            let index = app.semantic(&app.documents()?).await?;
            app.print_results(&index.search(&query, app.limit(limit)).await?)?;
        }
        Command::EmbedText { text } => {
            let index = app.semantic_index()?;
            let vector = index.embed_query(&text).await?;
            if app.json {
                println!("{}", serde_json::to_string(&vector)?);
            } else {
                let head: Vec<String> = vector.iter().take(3).map(|v| format!("{v:.6}")).collect();
                println!("Text: {text}");
                println!("First 3 dimensions: [{}]", head.join(", "));
                println!("Dimensions: {}", vector.len());
            }
        }
        Command::Normalize { scores } => {
            let normalized = normalize_scores(&scores);
            if app.json {
                println!("{}", serde_json::to_string(&normalized)?);
            } else {
                for score in normalized {
                    println!("* {score:.4}");
                }
            }
        }
        Command::WeightedSearch { query, alpha, limit } => {
            let search = app.hybrid().await?;
            let alpha = alpha.unwrap_or(app.settings.search.alpha);
            app.print_results(&search.search(&query, FusionMethod::Weighted { alpha }, app.limit(limit)).await?)?;
        }
        Command::RrfSearch { query, k, limit } => {
            let search = app.hybrid().await?;
            let k = k.unwrap_or(app.settings.search.rrf_k);
            app.print_results(&search.search(&query, FusionMethod::Rrf { k }, app.limit(limit)).await?)?;
        }
        Command::Evaluate { golden, limit, k } => {
            let path = golden.unwrap_or_else(|| app.settings.data.golden_dataset());
            let dataset = load_golden_dataset(&path)?;
            let search = app.hybrid().await?;
            let k = k.unwrap_or(app.settings.search.rrf_k);
            let report = evaluate(&search, &dataset, FusionMethod::Rrf { k }, app.limit(limit)).await?;
            if app.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Total test cases: {}", report.test_cases_count);
                println!("Precision@{} (mean): {:.4}", report.limit, report.mean_precision);
                for r in &report.results {
                    println!();
                    println!("- Query: {}", r.query);
                    println!("  Precision@{}: {:.4}", report.limit, r.precision);
                    println!("  Retrieved: {}", r.retrieved.join(", "));
                    println!("  Relevant: {}", r.relevant.join(", "));
                }
            }
        }
    }
    Ok(())
}
