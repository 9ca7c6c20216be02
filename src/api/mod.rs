//! HTTP and WebSocket surface
//!
//! # Endpoints
//!
//! - `GET /api/message` - Greeting
//! - `POST /api/hello` - Save a name (`{"name": ...}`)
//! - `GET /api/all` - Every stored record
//! - `PUT /api/update` - Rename by current name (`{"oldName": ..., "newName": ...}`)
//! - `DELETE /api/delete` - Delete every record
//! - `GET /ws` - WebSocket; receives the full record array after each write
//! - `GET /health` - Subscriber count and fan-out counters
//!
//! Every route allows cross-origin requests from any origin, and any
//! `OPTIONS` request is answered as a pre-flight with an empty body.

pub mod error;
pub mod routes;
pub mod state;

use axum::http::{header, Method};
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

pub use error::{ApiError, ErrorResponse, Result};
pub use state::{AppState, DEFAULT_GREETING};

/// Build the complete router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::ops::routes())
        .route("/ws", get(routes::live::subscribe))
        .nest("/api", routes::names::routes())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::DELETE,
            Method::PUT,
        ])
        .allow_headers([header::CONTENT_TYPE])
}
