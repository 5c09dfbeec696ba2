use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clinical::{CausalRelationship, ClinicalHypothesis};
use super::entity::{Entity, EntityId};
use super::enums::{str_enum, InterviewStage, UrgencyLevel};

str_enum!(
    /// The eight HPI dimensions tracked for completeness.
    HpiField {
        Onset => "onset",
        Location => "location",
        Duration => "duration",
        Character => "character",
        ModifyingFactors => "modifying_factors",
        Radiation => "radiation",
        Timing => "timing",
        Severity => "severity",
    }
);

impl HpiField {
    pub const ALL: [HpiField; 8] = [
        Self::Onset,
        Self::Location,
        Self::Duration,
        Self::Character,
        Self::ModifyingFactors,
        Self::Radiation,
        Self::Timing,
        Self::Severity,
    ];

    /// Patient-facing question used when this field is missing.
    pub fn question(&self) -> &'static str {
        match self {
            Self::Onset => "When did this start, and did it come on suddenly or gradually?",
            Self::Location => "Where exactly do you feel it?",
            Self::Duration => "How long has this been going on?",
            Self::Character => "How would you describe it: sharp, dull, burning, pressure-like, throbbing?",
            Self::ModifyingFactors => "Does anything make it better or worse, like movement, rest, food, or position?",
            Self::Radiation => "Does it spread or move anywhere else?",
            Self::Timing => "Is it constant, or does it come and go? Is it worse at a particular time of day?",
            Self::Severity => "On a scale from 0 to 10, how bad is it?",
        }
    }
}

/// History-of-present-illness fields accumulated over the session.
/// First value wins; later mentions are appended to the same field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HpiRecord {
    pub fields: BTreeMap<HpiField, Vec<String>>,
}

impl HpiRecord {
    pub fn record(&mut self, field: HpiField, value: &str) {
        let values = self.fields.entry(field).or_default();
        if !values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
            values.push(value.to_string());
        }
    }

    pub fn has(&self, field: HpiField) -> bool {
        self.fields.get(&field).is_some_and(|v| !v.is_empty())
    }

    pub fn filled_count(&self) -> usize {
        HpiField::ALL.iter().filter(|f| self.has(**f)).count()
    }

    pub fn missing(&self) -> Vec<HpiField> {
        HpiField::ALL
            .iter()
            .copied()
            .filter(|f| !self.has(*f))
            .collect()
    }

    pub fn get(&self, field: HpiField) -> Option<&[String]> {
        self.fields.get(&field).map(Vec::as_slice)
    }
}

/// Review-of-systems answers by body system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewOfSystems {
    pub positives: BTreeMap<String, Vec<String>>,
    pub negatives: BTreeMap<String, Vec<String>>,
    /// Whether the patient answered the review-of-systems question at all.
    pub answered: bool,
}

impl ReviewOfSystems {
    pub fn record_positive(&mut self, system: &str, finding: &str) {
        push_unique(self.positives.entry(system.to_string()).or_default(), finding);
    }

    pub fn record_negative(&mut self, system: &str, finding: &str) {
        push_unique(self.negatives.entry(system.to_string()).or_default(), finding);
    }

    pub fn is_empty(&self) -> bool {
        self.positives.is_empty() && self.negatives.is_empty()
    }
}

/// Free-text answers for the history stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryAnswers {
    pub past_medical_history: Vec<String>,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
    pub social_history: Vec<String>,
    pub family_history: Vec<String>,
}

/// A red flag raised at some point in the session, kept for the report and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlagRecord {
    pub rule_id: String,
    pub description: String,
    pub level: UrgencyLevel,
    pub turn: usize,
    pub raised_at: DateTime<Utc>,
}

/// An explicit, audited change of the running urgency level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgencyOverride {
    pub from: UrgencyLevel,
    pub to: UrgencyLevel,
    pub reason: String,
    pub applied_at: DateTime<Utc>,
}

/// Session-scoped, append-only aggregate of everything learned so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalContext {
    /// Indexed by `EntityId`: `entities[id.0].id == id`.
    pub entities: Vec<Entity>,
    pub relationships: Vec<CausalRelationship>,
    /// Latest ranking; re-derived every turn.
    pub hypotheses: Vec<ClinicalHypothesis>,
    pub red_flags: Vec<RedFlagRecord>,
    pub urgency: UrgencyLevel,
    pub overrides: Vec<UrgencyOverride>,
    /// Entity count when the last override was applied. Evidence below this
    /// mark cannot re-raise a syndrome on its own.
    #[serde(default)]
    pub override_watermark: usize,
    pub chief_complaint: Option<String>,
    pub hpi: HpiRecord,
    pub review_of_systems: ReviewOfSystems,
    pub history: HistoryAnswers,
    /// Findings the patient explicitly denied.
    pub negated_findings: Vec<String>,
    pub contextual_significance: f32,
    pub turns: usize,
    /// Last stage whose requirements were met; `Completed` once the interview ended.
    pub completed_stage: Option<InterviewStage>,
}

impl MedicalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id the turn arena should allocate from.
    pub fn next_entity_id(&self) -> usize {
        self.entities.len()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0).filter(|e| e.id == id)
    }

    pub fn symptoms(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_symptom())
    }

    pub fn has_symptom(&self) -> bool {
        self.symptoms().next().is_some()
    }

    /// Raise the running urgency. Never lowers it.
    pub fn escalate(&mut self, level: UrgencyLevel) -> UrgencyLevel {
        if level > self.urgency {
            self.urgency = level;
        }
        self.urgency
    }

    /// The only path that can lower the running urgency.
    pub fn apply_override(&mut self, to: UrgencyLevel, reason: &str) -> UrgencyOverride {
        let record = UrgencyOverride {
            from: self.urgency,
            to,
            reason: reason.to_string(),
            applied_at: Utc::now(),
        };
        self.urgency = to;
        self.override_watermark = self.entities.len();
        self.overrides.push(record.clone());
        record
    }

    pub fn record_red_flag(&mut self, rule_id: &str, description: &str, level: UrgencyLevel) {
        let already = self
            .red_flags
            .iter()
            .any(|r| r.rule_id == rule_id && r.description == description);
        if already {
            return;
        }
        self.red_flags.push(RedFlagRecord {
            rule_id: rule_id.to_string(),
            description: description.to_string(),
            level,
            turn: self.turns,
            raised_at: Utc::now(),
        });
    }

    pub fn record_negated(&mut self, finding: &str) {
        push_unique(&mut self.negated_findings, finding);
    }

    pub fn is_completed(&self) -> bool {
        self.completed_stage == Some(InterviewStage::Completed)
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        values.push(value.to_string());
    }
}
