use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use gridkv_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed upload: {0}")]
    Upload(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Store(
                StoreError::InvalidIdentifier(_)
                | StoreError::MissingArgument(_)
                | StoreError::LengthMismatch { .. },
            )
            | ServerError::Upload(_) => StatusCode::BAD_REQUEST,
            ServerError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use gridkv_types::BlobId;

    #[test]
    fn client_errors_map_to_400() {
        let cases = [
            ServerError::from(StoreError::InvalidIdentifier("x".into())),
            ServerError::from(StoreError::MissingArgument("length")),
            ServerError::from(StoreError::LengthMismatch { expected: 10, actual: 3 }),
            ServerError::Upload("truncated body".into()),
        ];
        for e in cases {
            assert_eq!(e.status(), StatusCode::BAD_REQUEST, "{e}");
        }
    }

    #[test]
    fn not_found_maps_to_404() {
        let id = BlobId::parse("e64a919ef57c4481bcd5fba43f8efb9c").unwrap();
        assert_eq!(
            ServerError::from(StoreError::NotFound(id)).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn everything_else_maps_to_500() {
        assert_eq!(
            ServerError::from(StoreError::Codec("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::Internal("join".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
