//! Name routes
//!
//! The `/api/*` surface: greeting, add, list, rename, clear. Every mutating
//! route goes through [`AppState::mutate`], so a fresh snapshot is published
//! only after the store call and the read-back both succeed.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, Result};
use crate::api::state::AppState;
use crate::types::Record;

// =============================================================================
// Request / Response Types
// =============================================================================

/// `POST /api/hello` body
#[derive(Debug, Deserialize)]
pub struct AddNameRequest {
    pub name: String,
}

/// `PUT /api/update` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
}

/// `GET /api/message` response
#[derive(Debug, Serialize)]
pub struct GreetingResponse {
    pub text: String,
}

/// Acknowledgement for mutating routes
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    const SAVED: Self = Self {
        message: "Name saved successfully",
    };
    const UPDATED: Self = Self {
        message: "Name updated successfully",
    };
    const CLEARED: Self = Self {
        message: "All names deleted",
    };
}

// =============================================================================
// Routes
// =============================================================================

/// Routes nested under `/api`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/message", get(greeting).fallback(method_not_allowed))
        .route("/hello", post(add_name).fallback(method_not_allowed))
        .route("/all", get(list_names).fallback(method_not_allowed))
        .route("/update", put(rename).fallback(method_not_allowed))
        .route("/delete", delete(clear).fallback(method_not_allowed))
        .fallback(unknown_route)
}

async fn greeting(State(state): State<AppState>) -> Json<GreetingResponse> {
    Json(GreetingResponse {
        text: state.greeting().to_string(),
    })
}

async fn add_name(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<MessageResponse>> {
    let request: AddNameRequest = decode(body)?;

    let record = state
        .mutate(move |store| Ok(store.insert(&request.name)?))
        .await?;

    tracing::info!(id = %record.id, name = %record.name, "Name saved");

    Ok(Json(MessageResponse::SAVED))
}

async fn list_names(State(state): State<AppState>) -> Result<Json<Vec<Record>>> {
    let records = state.read(|store| store.list()).await?;
    Ok(Json(records))
}

async fn rename(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<MessageResponse>> {
    let request: RenameRequest = decode(body)?;

    let changed = state
        .mutate(move |store| {
            let changed = store.rename(&request.old_name, &request.new_name)?;
            if changed == 0 {
                return Err(ApiError::NotFound);
            }
            Ok(changed)
        })
        .await?;

    tracing::info!(changed = changed, "Name updated");

    Ok(Json(MessageResponse::UPDATED))
}

async fn clear(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    let removed = state.mutate(|store| Ok(store.clear()?)).await?;

    tracing::info!(removed = removed, "All names deleted");

    Ok(Json(MessageResponse::CLEARED))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn unknown_route() -> ApiError {
    ApiError::UnknownRoute
}

/// Decode a JSON body regardless of its declared content type.
///
/// A body that could not be read (over the size limit, connection reset)
/// is reported the same way as one that does not parse.
fn decode<T: DeserializeOwned>(body: std::result::Result<Bytes, BytesRejection>) -> Result<T> {
    let body = body.map_err(|e| ApiError::invalid(e.body_text()))?;
    serde_json::from_slice(&body).map_err(|e| ApiError::invalid(e.to_string()))
}
