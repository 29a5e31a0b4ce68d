use std::io::Cursor;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use gridkv_store::{Descriptor, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Content type used when an upload part or stored blob names none.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Run a blocking engine call off the async workers.
async fn blocking<T, F>(call: F) -> ServerResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let engine = state.engine();
    Json(json!({
        "name": "gridkv-server",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": engine.store().name(),
        "keyspace_root": state.keyspace_root(),
        "chunk_size": engine.config().chunk_size,
    }))
}

/// `POST /v1/blobs`: store every multipart part that carries a filename.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<(StatusCode, Json<Vec<Descriptor>>)> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::Upload(e.body_text()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::Upload(e.body_text()))?;
        parts.push((name, mime_type, data));
    }

    let engine = state.engine().clone();
    let created = blocking(move || {
        parts
            .into_iter()
            .map(|(name, mime_type, data)| {
                let length = data.len() as u64;
                engine.create(name, mime_type, length, Cursor::new(data))
            })
            .collect::<StoreResult<Vec<_>>>()
    })
    .await?;

    tracing::info!(count = created.len(), "upload complete");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /v1/blobs/:id`: the blob's bytes, typed with its stored mime type.
pub async fn download_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    let engine = state.engine().clone();
    let (descriptor, body) = blocking(move || {
        let descriptor = engine.find(&id)?;
        let mut body = Vec::new();
        engine.stream_id(&id, &mut body)?;
        Ok((descriptor, body))
    })
    .await?;

    let mime_type = if descriptor.mime_type.is_empty() {
        DEFAULT_MIME_TYPE.to_string()
    } else {
        descriptor.mime_type
    };
    Ok(([(header::CONTENT_TYPE, mime_type)], Bytes::from(body)).into_response())
}

/// `GET /v1/blobs/:id/meta`
pub async fn meta_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Descriptor>> {
    let engine = state.engine().clone();
    let descriptor = blocking(move || engine.find(&id)).await?;
    Ok(Json(descriptor))
}

/// `DELETE /v1/blobs/:id`
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    let engine = state.engine().clone();
    blocking(move || engine.destroy_id(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
