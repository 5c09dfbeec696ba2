//! Shared types for the HTTP layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::interview::InterviewEngine;
use crate::models::{PatientDemographics, UrgencyLevel};

/// Patient messages longer than this are rejected outright; shorter ones are
/// still truncated by the engine's own input limit.
pub const MAX_MESSAGE_BYTES: usize = 8 * 1024;

/// Shared state for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub engine: Arc<InterviewEngine>,
}

impl ApiContext {
    pub fn new(engine: Arc<InterviewEngine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateConsultationRequest {
    #[serde(default)]
    pub demographics: Option<PatientDemographics>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OverrideUrgencyRequest {
    pub level: UrgencyLevel,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct EndConsultationResponse {
    pub session_id: uuid::Uuid,
    pub ended: bool,
}
