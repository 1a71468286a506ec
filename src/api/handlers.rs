//! Error type, response envelope, and the health handler.
//!
//! Every endpoint answers with the same JSON envelope: a `code` field
//! mirroring the HTTP status plus `data`/`message` on success or `error` on
//! failure. User-facing strings are French; logs stay English.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::AppState;

// ============================================================================
// Response envelope
// ============================================================================

/// `200` with a `data` payload.
pub fn ok<T: Serialize>(data: T) -> Response {
    envelope(StatusCode::OK, "data", serde_json::json!(data))
}

/// `201` with a `data` payload.
pub fn created<T: Serialize>(data: T) -> Response {
    envelope(StatusCode::CREATED, "data", serde_json::json!(data))
}

/// `200` with a human-readable `message` instead of a payload.
pub fn message(msg: impl Into<String>) -> Response {
    envelope(StatusCode::OK, "message", serde_json::json!(msg.into()))
}

fn envelope(status: StatusCode, key: &str, value: serde_json::Value) -> Response {
    let body = Json(serde_json::json!({
        "code": status.as_u16(),
        key: value,
    }));
    (status, body).into_response()
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                // The cause chain stays in the logs; clients get a generic
                // message with no internals.
                tracing::error!("internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Une erreur interne est survenue.".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "code": status.as_u16(),
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health check endpoint
///
/// Returns:
/// - 200 + `"ok"` when the store answers
/// - 503 + `"unhealthy"` when it does not
pub async fn health(State(state): State<AppState>) -> Response {
    match state.store.health_check().await {
        Ok(()) => envelope(StatusCode::OK, "data", serde_json::json!("ok")),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            envelope(
                StatusCode::SERVICE_UNAVAILABLE,
                "data",
                serde_json::json!("unhealthy"),
            )
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ok_envelope_carries_code_and_data() {
        let response = ok(serde_json::json!({"id": 7}));
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["id"], 7);
    }

    #[tokio::test]
    async fn created_envelope_uses_201() {
        let response = created(serde_json::json!([1, 2]));
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["code"], 201);
        assert_eq!(body["data"], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn message_envelope_has_no_data_key() {
        let response = message("Compte confirmé.");
        let body = body_json(response).await;
        assert_eq!(body["message"], "Compte confirmé.");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn error_envelope_mirrors_status() {
        let response = AppError::Forbidden("non".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["code"], 403);
        assert_eq!(body["error"], "non");
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let response = AppError::Internal(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Une erreur interne est survenue.");
        assert!(!body["error"].as_str().unwrap().contains("db"));
    }
}
