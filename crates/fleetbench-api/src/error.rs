// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Error types for the agent API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// State store failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A create hit an existing item.
    #[error("State {0:?} already exists")]
    AlreadyExists(String),

    /// The id in the request path does not match the id in the body.
    #[error("State id mismatch: path says {path:?}, body says {body:?}")]
    IdMismatch { path: String, body: String },

    /// Another writer holds the store lock right now.
    #[error("State store is busy with a concurrent writer")]
    Busy,

    /// I/O against the backing directory failed.
    #[error("State store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An on-disk document failed to (de)serialize.
    #[error("State serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request-level failures mapped onto HTTP responses.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request body did not parse as any accepted payload shape.
    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::AlreadyExists(_)) | Self::Store(StoreError::Busy) => {
                StatusCode::CONFLICT
            }
            Self::Store(StoreError::IdMismatch { .. }) | Self::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable discriminator for the response body. Both
    /// conflict shapes answer 409; clients tell them apart by this code
    /// (a busy writer is worth retrying, an existing item is not).
    fn code(&self) -> &'static str {
        match self {
            Self::Store(StoreError::AlreadyExists(_)) => "already_exists",
            Self::Store(StoreError::Busy) => "busy",
            Self::Store(StoreError::IdMismatch { .. }) => "id_mismatch",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Store(_) => "internal",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = json!({ "error": self.to_string(), "code": self.code() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn conflict_bodies_carry_a_machine_readable_code() {
        let busy = ServiceError::Store(StoreError::Busy).into_response();
        assert_eq!(busy.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(busy).await["code"], "busy");

        let exists =
            ServiceError::Store(StoreError::AlreadyExists("marker".into())).into_response();
        assert_eq!(exists.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(exists).await["code"], "already_exists");
    }
}
