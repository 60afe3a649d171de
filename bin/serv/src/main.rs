use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use fleet_api::{config::ApiConfig, state::ApiState};
use tokio::{net::TcpListener, signal};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env()?;

    fleet_api::tracing::init_tracing(&config.env);

    let metrics_handle = fleet_api::metrics::init_metrics()?;

    let pool = fleet_db::create_pool(&config.database_url, config.db_max_connections).await?;
    fleet_db::ensure_db_and_migrate(&config.database_url, &pool).await?;
    tracing::info!("database ready");

    let state = ApiState::new(pool.clone(), config.retry_policy());

    let cors = fleet_api::middleware::cors::create_cors_layer(&config.parsed_allowed_origins());

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Metrics endpoint has its own state
    let metrics_app = Router::new()
        .route("/metrics", get(fleet_api::metrics::metrics_handler))
        .with_state(metrics_handle);

    let app = fleet_api::router::router()
        .with_state(state)
        .merge(metrics_app)
        .layer(cors)
        .layer(trace_layer)
        .layer(middleware::from_fn(fleet_api::metrics::track_metrics))
        .layer(middleware::from_fn(
            fleet_api::middleware::request_id::request_id_middleware,
        ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.env, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::warn!("received Ctrl+C, shutting down"),
        () = terminate => tracing::warn!("received SIGTERM, shutting down"),
    }
}
