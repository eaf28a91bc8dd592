// src/main.rs — xeerchat entry point

use clap::Parser;
use std::sync::Arc;

use xeerchat::backend::HttpBackend;
use xeerchat::cli::{AppContext, Cli, Commands};
use xeerchat::infra::config::Config;
use xeerchat::infra::logger;
use xeerchat::infra::state::StateStore;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG / XEERCHAT_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let mut config = if let Some(ref path) = cli.config {
        let mut config = Config::load_from(std::path::Path::new(path))?;
        config.apply_env();
        config
    } else {
        Config::load()?
    };
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    tracing::debug!("Using server {}", config.server.base_url);

    let backend = HttpBackend::new(config.server.base_url.clone())
        .with_legacy_timeout(config.server.legacy_timeout());
    let mut ctx = AppContext::new(
        config,
        Arc::new(backend),
        StateStore::open_default(),
        cli.model,
        cli.quiet,
    );

    match cli.command {
        None | Some(Commands::Chat) => xeerchat::cli::chat::run_chat(&mut ctx).await,
        Some(Commands::Ask {
            message,
            no_stream,
            conversation,
        }) => {
            let message = message.join(" ");
            xeerchat::cli::ask::run_ask(&mut ctx, &message, no_stream, conversation).await
        }
        Some(Commands::Conversations { action }) => {
            xeerchat::cli::conversations::run_conversations(&ctx, action).await
        }
        Some(Commands::Models) => xeerchat::cli::models::run_models(&ctx).await,
        Some(Commands::Usage { watch }) => xeerchat::cli::usage::run_usage(&ctx, watch).await,
    }
}
