use serde::{Deserialize, Serialize};

use crate::models::PatternId;

/// Non-fatal condition raised while processing a turn. Surfaced to callers
/// alongside the response; never aborts the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnWarning {
    /// Normalization applied enough corrections that its output is doubtful.
    NormalizationUncertain { confidence: f32 },
    /// Two patterns claimed partially overlapping text; the lower-priority one was dropped.
    ExtractionAmbiguous {
        kept: PatternId,
        dropped: PatternId,
        text: String,
    },
    ProviderTimeout { after_ms: u64 },
    ProviderUnavailable { reason: String },
    /// Analysis failed; the verdict came from the raw-text red-flag scan only.
    DegradedAssessment { reason: String },
}

impl TurnWarning {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NormalizationUncertain { .. } => "normalization_uncertain",
            Self::ExtractionAmbiguous { .. } => "extraction_ambiguous",
            Self::ProviderTimeout { .. } => "provider_timeout",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::DegradedAssessment { .. } => "degraded_assessment",
        }
    }
}
