use std::sync::Arc;
use std::time::Duration;

use salvo::Listener;
use salvo::conn::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

use gatehouse_app::app::router;
use gatehouse_core::config::{Settings, TokenStoreKind, load_config};
use gatehouse_db::db::{MemoryStore, Seed};
use gatehouse_service::auth::{MemoryTokenStore, TokenStore};
use gatehouse_service::bootstrap::build_services;
use gatehouse_service::mail::{ChannelMailer, MailMessage};

async fn open_store(settings: &Settings) -> anyhow::Result<MemoryStore> {
    match &settings.bootstrap.seed_file {
        Some(path) => {
            let seed = Seed::from_file(path).await?;
            tracing::info!(seed_file = %path, "Seeding in-memory store");
            Ok(MemoryStore::seeded(seed).await?)
        }
        None => {
            tracing::warn!("No seed file configured; only the root identity can sign in");
            Ok(MemoryStore::new())
        }
    }
}

#[cfg(feature = "redis")]
async fn redis_token_store(settings: &Settings) -> anyhow::Result<Arc<dyn TokenStore>> {
    use gatehouse_service::auth::token_store::RedisTokenStore;

    let url = settings
        .auth
        .redis_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("auth.redis_url is required for the redis token store"))?;
    let store = RedisTokenStore::connect(url, &settings.auth.redis_key_prefix).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
#[expect(clippy::unused_async, reason = "matches the signature of the redis variant")]
async fn redis_token_store(_settings: &Settings) -> anyhow::Result<Arc<dyn TokenStore>> {
    anyhow::bail!("auth.store = \"redis\" requires building with the `redis` feature")
}

async fn token_store(settings: &Settings) -> anyhow::Result<Arc<dyn TokenStore>> {
    match settings.auth.store {
        TokenStoreKind::Memory => {
            let store = Arc::new(MemoryTokenStore::new());
            store.spawn_cleanup(Duration::from_secs(settings.auth.cleanup_interval_secs));
            Ok(store)
        }
        TokenStoreKind::Redis => redis_token_store(settings).await,
    }
}

/// Mail transport is external; outgoing messages are logged.
fn spawn_mail_drain(mut receiver: UnboundedReceiver<MailMessage>) {
    tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            tracing::info!(
                from = %message.from,
                to = %message.to,
                subject = %message.subject,
                "Outgoing mail"
            );
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting gatehouse");

    let config = load_config()?;

    tracing::info!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    let store = Arc::new(open_store(&config).await?);
    let tokens = token_store(&config).await?;
    let (mailer, mail_receiver) = ChannelMailer::channel();
    spawn_mail_drain(mail_receiver);

    let services = build_services(&config, store, tokens, Arc::new(mailer)).await?;

    let bind_addr = config.server.bind_addr();
    let acceptor = TcpListener::new(bind_addr.clone()).bind().await;

    let router = router(&services, config.casbin.enable);

    tracing::info!("Server listening on {bind_addr}");

    salvo::Server::new(acceptor).serve(router).await;

    Ok(())
}
