//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ragchat::openai::ZHIPU_BASE_URL;

/// Chat with a local document collection.
#[derive(Parser, Debug)]
#[command(name = "ragchat", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Directory for timestamped log files. Logs go to stderr only when unset.
    #[arg(long, global = true, value_name = "DIR", env = "RAGCHAT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load, split and embed a directory of documents into the vector store
    Ingest(IngestArgs),

    /// Start an interactive question-answering session
    Chat(ChatArgs),
}

/// Settings shared by both subcommands.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// API key of the OpenAI-compatible provider
    #[arg(long, global = true, env = "ZHIPUAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, global = true, env = "RAGCHAT_BASE_URL", default_value = ZHIPU_BASE_URL)]
    pub base_url: String,

    /// Embedding model used for documents and questions
    #[arg(long, global = true, env = "RAGCHAT_EMBEDDING_MODEL", default_value = "embedding-3")]
    pub embedding_model: String,

    /// Vector store collection holding the knowledge base
    #[arg(long, global = true, default_value = ragchat::DEFAULT_COLLECTION)]
    pub collection: String,

    /// Directory of the persisted vector store
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "RAGCHAT_PERSIST_DIRECTORY",
        default_value = "data_base/vector_db"
    )]
    pub persist_directory: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Directory of PDF, Markdown, text and DOCX files
    #[arg(long, value_name = "DIR", default_value = "data_base/knowledge_db")]
    pub source: PathBuf,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = 500)]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value_t = 50)]
    pub chunk_overlap: usize,

    /// Chunks embedded per provider request
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Chat model identifier
    #[arg(long, env = "RAGCHAT_MODEL", default_value = "glm-4-plus")]
    pub model: String,

    /// Sampling temperature in [0, 1]
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Chunks retrieved per question, in [1, 10]
    #[arg(long, default_value_t = 4)]
    pub top_k: usize,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_defaults() {
        let cli = Cli::try_parse_from(["ragchat", "chat", "--api-key", "k"]).unwrap();
        let Commands::Chat(args) = cli.command else {
            panic!("expected chat subcommand");
        };
        assert_eq!(args.model, "glm-4-plus");
        assert_eq!(args.top_k, 4);
        assert_eq!(cli.provider.collection, "knowledge_base");
    }

    #[test]
    fn ingest_accepts_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ragchat",
            "ingest",
            "--source",
            "docs",
            "--persist-directory",
            "/tmp/db",
            "--chunk-size",
            "300",
        ])
        .unwrap();
        let Commands::Ingest(args) = cli.command else {
            panic!("expected ingest subcommand");
        };
        assert_eq!(args.source, PathBuf::from("docs"));
        assert_eq!(args.chunk_size, 300);
        assert_eq!(cli.provider.persist_directory, PathBuf::from("/tmp/db"));
    }
}
