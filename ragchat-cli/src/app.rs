//! Wiring of providers, stores and pipelines for each subcommand.

use std::sync::Arc;

use anyhow::{Context, bail};
use ragchat::openai::{OpenAIChatModel, OpenAIConfig, OpenAIEmbeddingProvider};
use ragchat::{
    ChatSession, ConversationalQa, FileVectorStore, IngestConfig, IngestionPipeline,
    PipelineConfig, RagError,
};
use tracing::info;

use crate::cli::{ChatArgs, Cli, Commands, IngestArgs, ProviderArgs};
use crate::repl;

/// Execute the parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Ingest(args) => ingest(&cli.provider, args).await,
        Commands::Chat(args) => chat(&cli.provider, args).await,
    }
}

fn provider_config(provider: &ProviderArgs) -> anyhow::Result<OpenAIConfig> {
    let Some(api_key) = provider.api_key.as_deref() else {
        bail!("no API key: set ZHIPUAI_API_KEY (for example in .env) or pass --api-key");
    };
    Ok(OpenAIConfig::compatible(api_key, provider.base_url.as_str())?)
}

fn embedder(provider: &ProviderArgs, config: &OpenAIConfig) -> Arc<OpenAIEmbeddingProvider> {
    Arc::new(OpenAIEmbeddingProvider::new(config.clone()).with_model(&provider.embedding_model))
}

async fn open_store(provider: &ProviderArgs) -> anyhow::Result<Arc<FileVectorStore>> {
    let store = FileVectorStore::open(&provider.persist_directory).await.with_context(|| {
        format!("failed to open vector store at {}", provider.persist_directory.display())
    })?;
    Ok(Arc::new(store))
}

async fn ingest(provider: &ProviderArgs, args: IngestArgs) -> anyhow::Result<()> {
    let openai = provider_config(provider)?;
    let config = IngestConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .embed_batch_size(args.batch_size)
        .build()?;

    let pipeline = IngestionPipeline::builder()
        .config(config)
        .embedding_provider(embedder(provider, &openai))
        .vector_store(open_store(provider).await?)
        .build()?;

    info!(source = %args.source.display(), collection = %provider.collection, "starting ingestion");
    match pipeline.run(&provider.collection, &args.source).await {
        Ok(report) => {
            println!(
                "Ingested {} document(s) as {} chunk(s) into '{}' at {}.",
                report.documents,
                report.chunks,
                provider.collection,
                provider.persist_directory.display()
            );
            Ok(())
        }
        Err(e @ RagError::EmptyCorpus(_)) => {
            Err(anyhow::Error::new(e).context("nothing to ingest"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn chat(provider: &ProviderArgs, args: ChatArgs) -> anyhow::Result<()> {
    let openai = provider_config(provider)?;
    let config = PipelineConfig::builder()
        .model_name(args.model)
        .temperature(args.temperature)
        .top_k(args.top_k)
        .persist_directory(provider.persist_directory.clone())
        .build()?;

    let store = open_store(provider).await?;
    if store.len(&provider.collection).await.is_none() {
        bail!(
            "collection '{}' not found in {}; run `ragchat ingest` first",
            provider.collection,
            provider.persist_directory.display()
        );
    }

    let qa = ConversationalQa::builder()
        .embedding_provider(embedder(provider, &openai))
        .vector_store(store)
        .chat_model(Arc::new(OpenAIChatModel::new(&openai)))
        .collection(provider.collection.as_str())
        .build()?;

    info!(model = %config.model_name, top_k = config.top_k, "starting chat session");
    let mut session = ChatSession::new(Arc::new(qa), config);
    repl::run(&mut session).await
}
