use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dietly::config::AppConfig;
use dietly::services::delivery::{DeliveryAdapter, LogDelivery};
use dietly::services::sweep::Sweeper;
use dietly::AppState;
use mimalloc::MiMalloc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dietly=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let pool = dietly::db::create_pool(&config.database_url, config.database_max_connections).await?;
    dietly::db::run_migrations(&pool).await?;

    let delivery: Arc<dyn DeliveryAdapter> = Arc::new(LogDelivery);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Sweeper::new(
        pool.clone(),
        delivery.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );
    let sweep_handle = tokio::spawn(sweeper.run(shutdown_rx));

    let cors = match config.frontend_url.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => CorsLayer::permissive(),
    };

    let state = AppState {
        db: pool,
        config: config.clone(),
        delivery,
    };

    let app = dietly::routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(host = %addr, "Starting dietly API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Let the sweep finish its current tick before the process exits.
    let _ = shutdown_tx.send(true);
    let _ = sweep_handle.await;

    Ok(())
}
