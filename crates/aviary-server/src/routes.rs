//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use aviary_core::error::{AviaryError, Result};

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // The mobile client and local dashboards call from arbitrary origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let chat_routes = Router::new()
        .route("/chats", get(handlers::list_chats).post(handlers::create_chat))
        .route("/chats/{id}", delete(handlers::delete_chat))
        .route("/chats/{id}/messages", get(handlers::list_messages))
        .route("/chats/{id}/message", post(handlers::send_message));

    let metadata_routes = Router::new()
        .route("/bird-questions", get(handlers::bird_questions))
        .route("/bird-info", get(handlers::bird_info))
        .route("/scrape-bird-info", get(handlers::scrape_bird_info));

    let sighting_routes = Router::new()
        .route("/birds", get(handlers::list_birds).post(handlers::record_bird))
        .route("/birds/latest", get(handlers::latest_bird));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(chat_routes)
        .merge(metadata_routes)
        .merge(sighting_routes)
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn start_server(addr: &str, state: AppState) -> Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AviaryError::Network(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| AviaryError::Network(format!("Server error: {}", e)))?;

    Ok(())
}
