//! CRMDesk Web Server
//!
//! Axum-based REST API over a record store, with a WebSocket feed of
//! collection changes.

pub mod routes;
pub mod state;
pub mod websocket;

use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/{resource}",
            get(routes::records::list_records).post(routes::records::create_record),
        )
        .route("/{resource}/board", get(routes::board::get_board))
        .route("/{resource}/search", get(routes::search::search_records))
        .route("/{resource}/{id}", patch(routes::records::update_record))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server.
pub async fn run_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Web server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}
