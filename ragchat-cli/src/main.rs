use clap::Parser;
use ragchat_cli::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = ragchat_cli::logging::init(cli.log_dir.as_deref())?;

    ragchat_cli::app::run(cli).await
}
