// rest/mod.rs — Public REST API server.
//
// Axum HTTP server exposing the task CRUD surface, plus a health probe.
//
// Endpoints:
//   GET    /tasks
//   POST   /tasks
//   PUT    /tasks/{id}
//   DELETE /tasks/{id}
//   GET    /health

pub mod routes;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, put};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx)?;

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Result<Router> {
    let cors = cors_layer(&ctx.config.cors_origin)?;

    Ok(Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/{id}",
            put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx))
}

/// Cross-origin policy: a single fixed origin with credentials, the four
/// CRUD methods plus preflight OPTIONS.
fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin: HeaderValue = origin.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}
