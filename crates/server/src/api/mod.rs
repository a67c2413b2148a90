//! HTTP surface.
//!
//! - `oauth2` - OAuth2 endpoints (/oauth2/*)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod health;
pub mod openapi;

pub use health::MISC_TAG;

use crate::AppResources;
use crate::oauth2;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Build the application router with all routes and middleware.
pub fn app(resources: &AppResources) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/oauth2", oauth2::router(resources.oauth2_state()))
        .routes(routes!(health::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(resources))]
pub async fn start_webserver(resources: AppResources) -> color_eyre::Result<()> {
    let router = app(&resources);
    let addr = resources.config.listen_addr.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
