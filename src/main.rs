use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use joinwarden::approver::JoinRequestApprover;
use joinwarden::config::Config;
use joinwarden::ingress::{TelegramApi, TelegramClient};
use joinwarden::polling::BotService;
use joinwarden::registry::ChannelRegistry;
use joinwarden::wizard::SetupWizard;

#[derive(Parser)]
#[command(name = "joinwarden")]
#[command(author, version, about = "Approves Telegram join requests for connected channels")]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "JOINWARDEN_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Approve every join request without a channel registry
    #[arg(long)]
    open_gate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;
    config.validate(cli.open_gate)?;

    let token = config
        .telegram
        .bot_token
        .clone()
        .context("missing bot token")?;

    let registry = if cli.open_gate {
        info!("running in open-gate mode: every join request will be approved");
        None
    } else {
        let path = config
            .registry
            .db_path
            .as_deref()
            .context("missing channel registry path")?;
        let registry = ChannelRegistry::open(Path::new(path))
            .with_context(|| format!("failed to open channel registry at {}", path))?;
        info!(path, "channel registry opened");
        Some(registry)
    };

    let api: Arc<dyn TelegramApi> = Arc::new(TelegramClient::new(token));

    let me = api
        .get_me()
        .await
        .context("failed to identify bot (check TELEGRAM_BOT_TOKEN)")?;
    info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or("-"),
        "authenticated with Telegram"
    );

    let wizard = registry.clone().map(|registry| {
        SetupWizard::new(
            Arc::clone(&api),
            registry,
            me.id,
            Duration::from_secs(config.wizard.session_ttl_secs),
        )
    });
    let approver = JoinRequestApprover::new(Arc::clone(&api), registry);

    let service = BotService::new(
        api,
        approver,
        wizard,
        me.username.clone(),
        config.telegram.poll_timeout,
    );
    service.run().await;

    Ok(())
}
