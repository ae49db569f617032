mod documents;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use documents::{discover_documents, read_document_text, source_name};
use kb_search_core::generators::huggingface::{DEFAULT_HUGGINGFACE_ENDPOINT, DEFAULT_HUGGINGFACE_MODEL};
use kb_search_core::generators::openai::{DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL};
use kb_search_core::{
    DocumentInput, GenerationBackend, GenerationParams, HashingEmbedder, HuggingFaceGenerator,
    IngestionReport, KnowledgeBase, OpenAiGenerator, RagOptions, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kb-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the knowledge base snapshot
    #[arg(long, env = "INDEX_DIR", default_value = "kb_index")]
    index_dir: PathBuf,

    /// Target chunk size in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 500)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 50)]
    chunk_overlap: usize,

    /// Embedding dimension; must match the snapshot being loaded
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Generation backend used for answer synthesis
    #[arg(long, env = "LLM_PROVIDER", value_enum, default_value_t = Provider::None)]
    llm_provider: Provider,

    /// Chat model used with the OpenAI backend
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    llm_model: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_ENDPOINT)]
    openai_base_url: String,

    /// HuggingFace inference API key
    #[arg(long, env = "HUGGINGFACE_API_KEY", hide_env_values = true)]
    huggingface_api_key: Option<String>,

    /// HuggingFace model id
    #[arg(long, env = "HUGGINGFACE_MODEL", default_value = DEFAULT_HUGGINGFACE_MODEL)]
    huggingface_model: String,

    /// HuggingFace inference base URL
    #[arg(long, env = "HUGGINGFACE_BASE_URL", default_value = DEFAULT_HUGGINGFACE_ENDPOINT)]
    huggingface_base_url: String,

    /// Upper bound on generated tokens
    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = 500)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Seconds to wait for the generation backend before falling back
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 30)]
    generation_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Provider {
    None,
    Openai,
    Huggingface,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest PDF/TXT files or folders into the knowledge base.
    Ingest {
        /// File or folder to ingest; folders are searched recursively.
        #[arg(long = "path", required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer a question from the knowledge base with cited sources.
    Query {
        /// Question to answer
        #[arg(long)]
        query: String,
        /// Number of chunks to retrieve.
        #[arg(long, env = "TOP_K_RESULTS", default_value_t = 3)]
        top_k: usize,
    },
    /// List indexed document sources.
    Documents,
    /// Remove every document from the knowledge base.
    Clear,
    /// Show chunk count and active backend.
    Status,
}

impl Cli {
    fn rag_options(&self) -> RagOptions {
        RagOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            generation: GenerationParams {
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            },
            generation_timeout: Duration::from_secs(self.generation_timeout_secs),
            ..RagOptions::default()
        }
    }

    /// Picks the backend once. A provider without its API key runs without generation.
    fn generation_backend(&self) -> anyhow::Result<GenerationBackend> {
        let backend = match self.llm_provider {
            Provider::None => GenerationBackend::NoBackend,
            Provider::Openai => match non_blank(&self.openai_api_key) {
                Some(key) => GenerationBackend::configured(OpenAiGenerator::with_endpoint(
                    &self.openai_base_url,
                    key,
                    &self.llm_model,
                )?),
                None => {
                    warn!("OPENAI_API_KEY not set, answers use the extractive fallback");
                    GenerationBackend::NoBackend
                }
            },
            Provider::Huggingface => match non_blank(&self.huggingface_api_key) {
                Some(key) => GenerationBackend::configured(HuggingFaceGenerator::with_endpoint(
                    &self.huggingface_base_url,
                    key,
                    &self.huggingface_model,
                )?),
                None => {
                    warn!("HUGGINGFACE_API_KEY not set, answers use the extractive fallback");
                    GenerationBackend::NoBackend
                }
            },
        };
        Ok(backend)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = Arc::new(HashingEmbedder::with_dimensions(cli.embedding_dimensions));
    let kb = KnowledgeBase::new(embedder, cli.generation_backend()?, cli.rag_options())?;
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        backend = kb.backend().name(),
        "kb-search boot"
    );

    kb.load_snapshot(&cli.index_dir).await?;

    match cli.command {
        Command::Ingest { paths } => {
            let mut reports = Vec::new();
            let mut inputs = Vec::new();

            for path in paths.iter().flat_map(|path| discover_documents(path)) {
                let source = source_name(&path);
                match read_document_text(&path) {
                    Ok(text) => inputs.push(DocumentInput::new(source, text)),
                    Err(error) => {
                        warn!(path = %path.display(), %error, "skipped document");
                        reports.push(IngestionReport::failed(source, format!("{error:#}")));
                    }
                }
            }

            reports.extend(kb.ingest_batch(&inputs).await);
            for report in &reports {
                match &report.error {
                    Some(error) => println!("{}: error: {error}", report.source),
                    None => println!("{}: {} chunks", report.source, report.chunks_added),
                }
            }

            kb.save_snapshot(&cli.index_dir).await?;
            println!(
                "processed {} file(s), {} chunks indexed at {}",
                reports.len(),
                kb.document_count().await,
                Utc::now().to_rfc3339()
            );
        }
        Command::Query { query, top_k } => {
            let answer = kb.answer(&query, top_k).await?;

            println!("query: {}", answer.query);
            println!("answer:\n{}", answer.answer);
            for source in answer.sources {
                println!(
                    "[{}#{}] distance={:.4}",
                    source.source, source.sequence_index, source.distance
                );
                println!("  preview: {}", source.preview);
            }
        }
        Command::Documents => {
            let sources = kb.list_sources().await;
            println!("total_documents: {}", sources.len());
            for source in sources {
                println!("  {source}");
            }
        }
        Command::Clear => {
            kb.clear_all().await;
            kb.save_snapshot(&cli.index_dir).await?;
            println!("knowledge base cleared, documents_remaining: 0");
        }
        Command::Status => {
            println!("chunks_indexed: {}", kb.document_count().await);
            println!("backend: {}", kb.backend().name());
            println!("dimension: {}", kb.dimension());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn provider_without_key_falls_back_to_no_backend() {
        let cli = parse(&[
            "kb-search",
            "--llm-provider",
            "openai",
            "--openai-api-key",
            "  ",
            "status",
        ]);
        let backend = cli.generation_backend().unwrap();
        assert!(matches!(backend, GenerationBackend::NoBackend));
    }

    #[test]
    fn provider_with_key_is_configured() {
        let cli = parse(&[
            "kb-search",
            "--llm-provider",
            "huggingface",
            "--huggingface-api-key",
            "hf_test",
            "status",
        ]);
        let backend = cli.generation_backend().unwrap();
        assert_eq!(backend.name(), "huggingface");
    }

    #[test]
    fn options_follow_flags() {
        let cli = parse(&[
            "kb-search",
            "--chunk-size",
            "200",
            "--chunk-overlap",
            "20",
            "--generation-timeout-secs",
            "5",
            "query",
            "--query",
            "pumps?",
        ]);
        let options = cli.rag_options();
        assert_eq!(options.chunk_size, 200);
        assert_eq!(options.chunk_overlap, 20);
        assert_eq!(options.generation_timeout, Duration::from_secs(5));
    }
}
