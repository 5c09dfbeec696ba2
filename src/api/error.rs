//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::interview::IntakeError;
use crate::models::InterviewStage;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("Session {session_id} not complete")]
    SessionNotComplete {
        session_id: Uuid,
        stage: InterviewStage,
    },
    #[error("Session ended: {0}")]
    SessionEnded(Uuid),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                format!("No consultation with id {id}"),
            ),
            ApiError::SessionNotComplete { stage, .. } => (
                StatusCode::CONFLICT,
                "SESSION_NOT_COMPLETE",
                format!("The interview is still at the {stage} stage"),
            ),
            ApiError::SessionEnded(_) => (
                StatusCode::GONE,
                "SESSION_ENDED",
                "This consultation has been ended".to_string(),
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::SessionNotFound(id) => ApiError::SessionNotFound(id),
            IntakeError::SessionNotComplete { session_id, stage } => {
                ApiError::SessionNotComplete { session_id, stage }
            }
            IntakeError::SessionTerminated(id) => ApiError::SessionEnded(id),
            IntakeError::InvalidInput(detail) => ApiError::BadRequest(detail),
            IntakeError::Store(e) => ApiError::Internal(e.to_string()),
            IntakeError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::SessionNotFound(Uuid::nil()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn not_complete_returns_409() {
        let response = ApiError::SessionNotComplete {
            session_id: Uuid::nil(),
            stage: InterviewStage::ReviewOfSystems,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "SESSION_NOT_COMPLETE");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("review_of_systems"));
    }

    #[tokio::test]
    async fn bad_request_returns_400() {
        let response = ApiError::BadRequest("Message cannot be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_returns_500() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        // Internal errors hide details from client
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn intake_errors_map_to_api_errors() {
        let id = Uuid::new_v4();
        let response = ApiError::from(IntakeError::SessionTerminated(id)).into_response();
        assert_eq!(response.status(), StatusCode::GONE);
        let response = ApiError::from(IntakeError::LockPoisoned).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response =
            ApiError::from(IntakeError::InvalidInput("no reason".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
