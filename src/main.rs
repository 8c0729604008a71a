//! Hotseat Back binary entrypoint wiring the store supervisor, REST routes and SSE streams.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotseat_back::{
    config::ServerSettings,
    dao::{
        remote_store::{Partition, RemoteStore, memory::MemoryStore},
        storage::StoreError,
    },
    routes,
    services::{
        auth::StaticAuth,
        config_sync,
        question_bank::{LocalQuestionBank, QuestionBank},
        sse_events, storage_supervisor,
    },
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = ServerSettings::from_env();
    let config = config_sync::current_app_config();

    let bank = match &settings.question_bank_path {
        Some(path) => LocalQuestionBank::load(path).context("loading question bank")?,
        None => {
            warn!("HOTSEAT_QUESTION_BANK_PATH not set; no question content available");
            LocalQuestionBank::default()
        }
    };
    let bank = Arc::new(bank);

    let app_state = AppState::new(
        config,
        bank.clone(),
        Arc::new(StaticAuth::new(settings.host_id.clone())),
    );

    sse_events::spawn_publishers(app_state.clone());
    spawn_store_supervisor(app_state.clone(), &settings, bank.as_ref()).await?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the supervisor on the realtime database when configured, on a seeded in-memory store
/// otherwise.
async fn spawn_store_supervisor(
    state: SharedState,
    settings: &ServerSettings,
    bank: &dyn QuestionBank,
) -> anyhow::Result<()> {
    #[cfg(feature = "firebase-store")]
    if let Some(url) = settings.database_url.clone() {
        use hotseat_back::dao::remote_store::firebase::{FirebaseConfig, FirebaseStore};

        let mut firebase = FirebaseConfig::new(url);
        if let Some(token) = settings.auth_token.clone() {
            firebase = firebase.with_auth_token(token);
        }
        info!(url = %firebase.database_url, "using realtime database store");
        tokio::spawn(storage_supervisor::run(state, move || {
            let firebase = firebase.clone();
            async move {
                let store = FirebaseStore::connect(firebase)
                    .await
                    .map_err(StoreError::from)?;
                Ok::<Arc<dyn RemoteStore>, StoreError>(Arc::new(store))
            }
        }));
        return Ok(());
    }

    #[cfg(not(feature = "firebase-store"))]
    if settings.database_url.is_some() {
        warn!("built without the `firebase-store` feature; ignoring FIREBASE_DATABASE_URL");
    }

    info!("no database configured; using the in-memory store");
    let store = MemoryStore::new();
    seed_memory_store(&store, settings, bank)
        .await
        .context("seeding in-memory store")?;
    let store: Arc<dyn RemoteStore> = Arc::new(store);
    tokio::spawn(storage_supervisor::run(state, move || {
        let store = store.clone();
        async move { Ok::<_, StoreError>(store) }
    }));
    Ok(())
}

/// Make a standalone server usable: allow the configured host and publish the local sets.
async fn seed_memory_store(
    store: &MemoryStore,
    settings: &ServerSettings,
    bank: &dyn QuestionBank,
) -> anyhow::Result<()> {
    if let Some(host) = &settings.host_id {
        store
            .write(Partition::AllowedHosts.path(), json!([host]))
            .await?;
    } else {
        warn!("HOTSEAT_HOST_ID not set; every host request will be rejected");
    }

    let sets: serde_json::Map<String, Value> = bank
        .sets_metadata()
        .into_iter()
        .map(|set| serde_json::to_value(&set).map(|value| (set.id, value)))
        .collect::<Result<_, _>>()?;
    if !sets.is_empty() {
        store
            .write(Partition::QuestionSets.path(), Value::Object(sets))
            .await?;
    }
    Ok(())
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
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
