use astro_site_backend::api::middleware::request_id::request_id_middleware;
use astro_site_backend::config::SiteConfig;
use astro_site_backend::infrastructure::{database, seed, storage};
use astro_site_backend::services::assets::AssetStore;
use astro_site_backend::services::cleanup::AssetCleaner;
use astro_site_backend::services::worker::BackgroundWorker;
use astro_site_backend::{AppState, create_app};
use axum::middleware::from_fn;
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Api,
    Worker,
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run
    #[arg(short, long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// Port for the API server (overrides PORT)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astro_site_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = SiteConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }

    info!("🚀 Starting Astro Site Backend [Mode: {:?}]...", args.mode);
    info!(
        "🛡️  Upload limit: {}MB, CORS origins: {:?}",
        config.max_upload_size / 1024 / 1024,
        config.allowed_origins
    );

    // 2. Common infrastructure
    let db = database::setup_database(&config).await?;
    seed::seed_admin(&db, &config).await?;
    let store = storage::setup_storage(&config).await?;
    let store: Arc<dyn AssetStore> = store;

    // 3. Shutdown channel and the cleanup queue every mode needs
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let (cleaner, cleaner_handle) = AssetCleaner::spawn(
        store.clone(),
        config.cleanup_max_attempts,
        shutdown_rx.clone(),
    );
    let mut handles = Vec::new();

    // 4. Orphan sweep worker
    if matches!(args.mode, Mode::Worker | Mode::All) {
        let worker = BackgroundWorker::new(
            db.clone(),
            store.clone(),
            cleaner.clone(),
            Duration::from_secs(config.orphan_grace_hours * 3600),
            Duration::from_secs(config.orphan_sweep_interval_secs),
            shutdown_rx.clone(),
        );
        handles.push(tokio::spawn(worker.run()));
        info!("👷 Worker service initialized.");
    }

    // 5. API server
    if matches!(args.mode, Mode::Api | Mode::All) {
        let port = config.port;
        let state = AppState::new(db.clone(), store.clone(), cleaner.clone(), config.clone());

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        // request_id runs first so the trace span sees the id
        let app = create_app(state)
            .layer(trace_layer)
            .layer(from_fn(request_id_middleware));
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", port);
        info!(
            "📖 Swagger UI documentation: http://localhost:{}/swagger-ui",
            port
        );

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for a signal, then stop everything
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down backend services...");
    for handle in handles {
        let _ = handle.await;
    }

    // The cleaner makes a final pass over its queue after the shutdown signal
    drop(cleaner);
    let _ = cleaner_handle.await;

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
