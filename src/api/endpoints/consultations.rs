//! Consultation endpoints.
//!
//! - `POST /api/consultations`: start a consultation
//! - `POST /api/consultations/:id/messages`: send a patient message
//! - `GET /api/consultations/:id/report`: report, once the interview is complete
//! - `POST /api/consultations/:id/urgency`: manual urgency override
//! - `DELETE /api/consultations/:id`: end the consultation
//!
//! The engine is synchronous and may wait on a language provider, so every
//! call runs on the blocking pool.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{
    ApiContext, CreateConsultationRequest, EndConsultationResponse, OverrideUrgencyRequest,
    SendMessageRequest, MAX_MESSAGE_BYTES,
};
use crate::interview::{InitializeResponse, TurnResponse};
use crate::models::UrgencyOverride;
use crate::pipeline::report::ConsultationReport;

/// `POST /api/consultations`
pub async fn create(
    State(ctx): State<ApiContext>,
    body: Option<Json<CreateConsultationRequest>>,
) -> Result<(StatusCode, Json<InitializeResponse>), ApiError> {
    let demographics = body.and_then(|Json(req)| req.demographics);
    let engine = ctx.engine.clone();
    let response = tokio::task::spawn_blocking(move || engine.initialize(demographics)).await??;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/consultations/:id/messages`
pub async fn send_message(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    if req.message.len() > MAX_MESSAGE_BYTES {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {MAX_MESSAGE_BYTES} bytes)"
        )));
    }

    let engine = ctx.engine.clone();
    let turn =
        tokio::task::spawn_blocking(move || engine.send_message(id, &req.message)).await??;
    Ok(Json(turn))
}

/// `GET /api/consultations/:id/report`
pub async fn report(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationReport>, ApiError> {
    let engine = ctx.engine.clone();
    let report = tokio::task::spawn_blocking(move || engine.get_report(id)).await??;
    Ok(Json(report))
}

/// `POST /api/consultations/:id/urgency`
pub async fn override_urgency(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<OverrideUrgencyRequest>,
) -> Result<Json<UrgencyOverride>, ApiError> {
    let engine = ctx.engine.clone();
    let record =
        tokio::task::spawn_blocking(move || engine.override_urgency(id, req.level, &req.reason))
            .await??;
    Ok(Json(record))
}

/// `DELETE /api/consultations/:id`
pub async fn end(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<EndConsultationResponse>, ApiError> {
    let engine = ctx.engine.clone();
    tokio::task::spawn_blocking(move || engine.end_session(id)).await??;
    Ok(Json(EndConsultationResponse {
        session_id: id,
        ended: true,
    }))
}
