use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campushub_server::{
    build_router,
    config::Config,
    db::Database,
    handlers::ws::ChangeFeed,
    services::{
        mailer::LogMailer, matcher::MatchingService, oauth::OAuthClient, storage::MediaStore,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campushub_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let media = MediaStore::new(&config.media_path);
    media.init().await?;

    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;

    if config.matcher.api_key.is_none() {
        tracing::warn!("MATCHER_API_KEY is not set; smart matching requests will fail");
    }
    let matcher = MatchingService::from_config(&config.matcher)?;
    let identity = OAuthClient::new(&config.oauth, &config.public_url)?;

    let state = AppState {
        db,
        config: config.clone(),
        feed: ChangeFeed::new(),
        media,
        matcher,
        mailer: Arc::new(LogMailer),
        identity: Arc::new(identity),
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
