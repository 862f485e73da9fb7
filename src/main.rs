//! Tale Forge Back binary entrypoint wiring the webhook, the draft store, and the sweeper.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tale_forge_back::{
    config::AppConfig,
    routes,
    services::{
        roles::StaticAdmins,
        storage_supervisor, sweeper,
        transport::{DryRunTransport, TelegramTransport, Transport},
    },
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let transport: Arc<dyn Transport> = match config.bot_token.as_deref() {
        Some(token) => Arc::new(
            TelegramTransport::new(&config.telegram_api_url, token)
                .context("building bot API client")?,
        ),
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set; outbound messages are only logged");
            Arc::new(DryRunTransport::new())
        }
    };
    if config.admin_ids.is_empty() {
        warn!("no admin ids configured; nobody can author stories");
    }
    let roles = Arc::new(StaticAdmins::new(config.admin_ids.iter().copied()));

    let app_state = AppState::new(config, transport, roles);

    spawn_storage(app_state.clone());
    tokio::spawn(sweeper::run(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connect to MongoDB in the background, keeping the app degraded until it answers.
#[cfg(feature = "mongo-store")]
fn spawn_storage(state: SharedState) {
    use tale_forge_back::dao::{
        draft_store::{
            DraftStore,
            mongodb::{MongoConfig, MongoDraftStore},
        },
        storage::StorageError,
    };

    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoDraftStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn DraftStore>)
        }
    }));
}

/// Without a database backend, drafts live in process memory.
#[cfg(not(feature = "mongo-store"))]
fn spawn_storage(state: SharedState) {
    use tale_forge_back::dao::draft_store::{DraftStore, MemoryDraftStore};

    warn!("built without mongo-store; drafts are kept in memory only");
    tokio::spawn(storage_supervisor::run(state, || async {
        Ok(Arc::new(MemoryDraftStore::new()) as Arc<dyn DraftStore>)
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
