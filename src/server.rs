//! Static file server for the web frontend and generated indexes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/indexes/*` | Files from `[data].index_dir` |
//! | `GET`  | `/*` | Files from `[server].web_root` |
//!
//! # CORS and caching
//!
//! All origins, methods, and headers are permitted. Every response carries
//! `Cache-Control: no-store, no-cache, must-revalidate` so a browser always
//! sees freshly rebuilt indexes.

use axum::{
    http::{header, HeaderValue},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;

const NO_STORE: &str = "no-store, no-cache, must-revalidate";

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the router: health check, index directory, then the web root as
/// the fallback.
pub fn router(config: &Config) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .nest_service("/indexes", ServeDir::new(&config.data.index_dir))
        .fallback_service(ServeDir::new(&config.server.web_root))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(NO_STORE),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already-bound listener until the process is stopped.
pub async fn serve(listener: TcpListener, config: &Config) -> anyhow::Result<()> {
    axum::serve(listener, router(config)).await?;
    Ok(())
}

/// Bind `[server].bind` and serve.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    if !config.server.web_root.is_dir() {
        warn!(
            "web root {} does not exist; only /health and /indexes will respond",
            config.server.web_root.display()
        );
    }
    if !config.data.index_dir.is_dir() {
        warn!(
            "index directory {} does not exist; run `umcp index` first",
            config.data.index_dir.display()
        );
    }

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("serving on http://{}", listener.local_addr()?);
    println!("Serving on http://{}", config.server.bind);
    serve(listener, config).await
}
