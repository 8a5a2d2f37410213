mod config;
mod discord;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use dsbridge_db::{Database, RetryPolicy};
use dsbridge_moderation::{BannedWords, ModerationFilter};
use dsbridge_relay::{
    BackendLink, BackendRelay, ChatGateway, GatewayRelay, Supervisor, WsConnector, run_gateway_events,
};

use config::BridgeConfig;
use discord::{BotIdentity, DiscordRest, GatewayListener};

/// Gateway events waiting for the relay. The listener blocks when full.
const GATEWAY_EVENT_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dsbridge=debug,dsbridge_relay=debug,dsbridge_db=info,dsbridge_moderation=info".into()
            }),
        )
        .init();

    // Config
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let banned = match &config.banned_words_file {
        Some(path) => BannedWords::load_or_empty(path),
        None => BannedWords::default(),
    };
    let filter = Arc::new(ModerationFilter::new(
        &banned,
        config.allowed_email_domain.as_deref(),
    )?);

    let identity = BotIdentity::default();
    let gateway: Arc<dyn ChatGateway> =
        Arc::new(DiscordRest::new(config.discord_token.clone(), identity.clone())?);
    let link = BackendLink::new();
    let policy = RetryPolicy::default();

    // Gateway context: Discord events -> store -> backend
    let gateway_db = Database::open(&config.db_path)?;
    let to_backend = GatewayRelay::new(gateway_db, gateway.clone(), link.clone(), filter)
        .with_retry_policy(policy);
    let (events_tx, events_rx) = mpsc::channel(GATEWAY_EVENT_QUEUE);
    let listener = GatewayListener::new(
        config.discord_token.clone(),
        identity,
        events_tx,
        config.reconnect_interval,
    );
    let handlers = to_backend.handlers();
    let gateway_task = tokio::spawn(async move {
        tokio::join!(listener.run(), run_gateway_events(events_rx, handlers));
    });

    // Backend context: supervisor + backend events -> Discord
    let backend_db = Database::open(&config.db_path)?;
    let to_gateway = BackendRelay::new(backend_db, gateway, link.clone()).with_retry_policy(policy);
    let connector = Arc::new(WsConnector::new(config.backend_url(), config.namespace.clone()));
    let supervisor = Supervisor::new(connector, config.secret.clone(), link, to_gateway.handler())
        .with_reconnect_interval(config.reconnect_interval);
    let backend_task = tokio::spawn(supervisor.run());

    info!(
        "dsbridge {} relaying {} via namespace {}",
        env!("CARGO_PKG_VERSION"),
        config.backend_url(),
        config.namespace
    );

    tokio::select! {
        result = gateway_task => {
            if let Err(e) = result {
                error!("Gateway task ended: {}", e);
            }
        }
        result = backend_task => {
            if let Err(e) = result {
                error!("Backend task ended: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
