use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::MedicalContext;
use super::enums::{InterviewStage, Sex, TurnRole, UrgencyLevel};

/// Optional, possibly anonymous demographics supplied at session start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientDemographics {
    pub age_years: Option<u32>,
    /// For infants, where whole years are too coarse.
    pub age_months: Option<u32>,
    pub sex: Option<Sex>,
}

impl PatientDemographics {
    pub fn age_in_months(&self) -> Option<u32> {
        self.age_months
            .or_else(|| self.age_years.map(|y| y.saturating_mul(12)))
    }

    pub fn is_minor(&self) -> bool {
        self.age_in_months().is_some_and(|m| m < 18 * 12)
    }
}

/// One entry of the session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: TurnRole,
    pub content: String,
    pub stage: InterviewStage,
    pub urgency: UrgencyLevel,
    pub timestamp: DateTime<Utc>,
}

/// A single consultation. Owned exclusively by the interview engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationSession {
    pub id: Uuid,
    pub demographics: Option<PatientDemographics>,
    pub stage: InterviewStage,
    pub context: MedicalContext,
    pub transcript: Vec<TranscriptEntry>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Questions asked at the end of the previous turn.
    pub pending_questions: Vec<String>,
    /// Ended by the caller; kept only until the next sweep.
    #[serde(default)]
    pub terminated: bool,
}

impl ConsultationSession {
    pub fn new(demographics: Option<PatientDemographics>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            demographics,
            stage: InterviewStage::Greeting,
            context: MedicalContext::new(),
            transcript: Vec::new(),
            created_at: now,
            last_activity: now,
            pending_questions: Vec::new(),
            terminated: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn push_transcript(&mut self, role: TurnRole, content: &str) {
        self.transcript.push(TranscriptEntry {
            role,
            content: content.to_string(),
            stage: self.stage,
            urgency: self.context.urgency,
            timestamp: Utc::now(),
        });
    }

    /// Seconds since the last message was processed.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_greeting() {
        let s = ConsultationSession::new(None);
        assert_eq!(s.stage, InterviewStage::Greeting);
        assert_eq!(s.context.urgency, UrgencyLevel::Routine);
        assert!(s.transcript.is_empty());
    }

    #[test]
    fn age_in_months_prefers_explicit_months() {
        let infant = PatientDemographics {
            age_years: Some(0),
            age_months: Some(2),
            sex: None,
        };
        assert_eq!(infant.age_in_months(), Some(2));
        assert!(infant.is_minor());

        let adult = PatientDemographics {
            age_years: Some(54),
            ..Default::default()
        };
        assert_eq!(adult.age_in_months(), Some(648));
        assert!(!adult.is_minor());
    }
}
