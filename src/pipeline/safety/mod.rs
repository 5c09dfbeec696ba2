//! Emergency risk assessment.
//!
//! Always local and deterministic. The verdict for a turn is the highest level
//! among its trigger signals, and the session's running level never drops
//! except through an explicit override.

pub mod escalation;
pub mod red_flags;

use serde::{Deserialize, Serialize};

use super::arena::EvidenceView;
use super::intent::{ClassifiedIntent, IntentKind};
use super::reasoning::SyndromeMatch;
use crate::models::enums::str_enum;
use crate::models::{ClinicalSignificance, ModelError, PatientDemographics, UrgencyLevel};

/// An emergency-concern intent at or above this confidence counts as a signal.
const EMERGENCY_INTENT_MIN: f32 = 0.7;

str_enum!(
    /// What raised a trigger signal.
    TriggerSource {
        RedFlag => "red_flag",
        Syndrome => "syndrome",
        Entity => "entity",
        Relationship => "relationship",
        Demographic => "demographic",
        Intent => "intent",
        Degraded => "degraded",
    }
);

/// One reason behind an urgency verdict, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSignal {
    pub source: TriggerSource,
    pub rule_id: String,
    pub description: String,
    pub level: UrgencyLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Session level after this turn: max(turn verdict, previous level).
    pub urgency: UrgencyLevel,
    /// Verdict from this turn's signals alone.
    pub turn_level: UrgencyLevel,
    pub triggers: Vec<TriggerSignal>,
    /// The session level went up this turn.
    pub escalated: bool,
}

impl RiskAssessment {
    pub fn is_emergency(&self) -> bool {
        self.urgency == UrgencyLevel::Emergency
    }

    pub fn turn_is_emergency(&self) -> bool {
        self.turn_level == UrgencyLevel::Emergency
    }
}

pub struct AssessmentInput<'a> {
    /// Sanitized patient text before normalization.
    pub raw_text: &'a str,
    /// The whole sanitized message when `raw_text` was cut to the length limit.
    pub untruncated_text: Option<&'a str>,
    pub normalized_text: &'a str,
    pub view: EvidenceView<'a>,
    pub syndromes: &'a [SyndromeMatch],
    pub intents: &'a [ClassifiedIntent],
    pub demographics: Option<&'a PatientDemographics>,
}

/// Assess one turn against the session's running level.
pub fn assess(input: &AssessmentInput<'_>, running: UrgencyLevel) -> RiskAssessment {
    let scan_text = input.untruncated_text.unwrap_or(input.raw_text);
    let mut triggers = text_signals(scan_text, input.normalized_text);

    let labels: Vec<String> = input
        .view
        .turn_entities()
        .iter()
        .map(|e| e.label().to_lowercase())
        .collect();
    push_unique(
        &mut triggers,
        escalation::check_escalation(scan_text, &labels, input.demographics),
    );

    // After an override, old evidence alone cannot re-raise a syndrome.
    let watermark = input.view.context.override_watermark;
    for m in input
        .syndromes
        .iter()
        .filter(|m| m.meets_emergency_threshold())
        .filter(|m| m.supporting.iter().any(|id| id.0 >= watermark))
    {
        triggers.push(TriggerSignal {
            source: TriggerSource::Syndrome,
            rule_id: m.syndrome.id.to_string(),
            description: format!(
                "{} pattern at {:.0}%",
                m.syndrome.condition,
                m.probability * 100.0
            ),
            level: UrgencyLevel::Emergency,
        });
    }

    for entity in input.view.turn_entities() {
        if let Some(level) = elevated(entity.significance) {
            triggers.push(TriggerSignal {
                source: TriggerSource::Entity,
                rule_id: entity.id.to_string(),
                description: entity.label().to_string(),
                level,
            });
        }
    }

    for rel in input.view.arena.relationships() {
        if let Some(level) = elevated(rel.significance) {
            triggers.push(TriggerSignal {
                source: TriggerSource::Relationship,
                rule_id: format!("{}->{}", rel.cause, rel.effect),
                description: rel.mechanism.clone(),
                level,
            });
        }
    }

    for intent in input.intents {
        if intent.kind == IntentKind::EmergencyConcern && intent.confidence >= EMERGENCY_INTENT_MIN {
            triggers.push(TriggerSignal {
                source: TriggerSource::Intent,
                rule_id: intent.kind.as_str().to_string(),
                description: "Patient expressed an emergency concern".to_string(),
                level: UrgencyLevel::Emergency,
            });
        }
    }

    verdict(triggers, running)
}

/// Verdict when analysis failed upstream. Only the raw-text red-flag scan and
/// the demographic rules run; the result is never below Urgent.
pub fn assess_degraded(
    raw_text: &str,
    demographics: Option<&PatientDemographics>,
    running: UrgencyLevel,
    reason: &str,
) -> RiskAssessment {
    let mut triggers = red_flags::scan(raw_text);
    push_unique(
        &mut triggers,
        escalation::check_escalation(raw_text, &[], demographics),
    );
    triggers.push(TriggerSignal {
        source: TriggerSource::Degraded,
        rule_id: "DEGRADED".to_string(),
        description: format!("Insufficient information: {reason}"),
        level: UrgencyLevel::Urgent,
    });
    verdict(triggers, running)
}

fn text_signals(raw: &str, normalized: &str) -> Vec<TriggerSignal> {
    let mut signals = red_flags::scan(raw);
    if normalized != raw {
        push_unique(&mut signals, red_flags::scan(normalized));
    }
    signals
}

fn elevated(significance: ClinicalSignificance) -> Option<UrgencyLevel> {
    match significance.urgency() {
        UrgencyLevel::Routine => None,
        level => Some(level),
    }
}

fn push_unique(into: &mut Vec<TriggerSignal>, more: Vec<TriggerSignal>) {
    for signal in more {
        if !into.iter().any(|s| s.rule_id == signal.rule_id) {
            into.push(signal);
        }
    }
}

fn verdict(mut triggers: Vec<TriggerSignal>, running: UrgencyLevel) -> RiskAssessment {
    // Highest level first so the audit trail leads with what decided the verdict
    triggers.sort_by(|a, b| b.level.cmp(&a.level));
    let turn_level = triggers
        .iter()
        .map(|t| t.level)
        .max()
        .unwrap_or(UrgencyLevel::Routine);
    let urgency = turn_level.max(running);

    if turn_level > UrgencyLevel::Routine {
        let rule_ids: Vec<&str> = triggers.iter().map(|t| t.rule_id.as_str()).collect();
        tracing::warn!(
            turn_level = %turn_level,
            urgency = %urgency,
            triggers = triggers.len(),
            rule_ids = ?rule_ids,
            "Non-routine urgency verdict"
        );
    }

    RiskAssessment {
        urgency,
        turn_level,
        triggers,
        escalated: urgency > running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicalContext;
    use crate::pipeline::arena::TurnArena;
    use crate::pipeline::extraction::extract;
    use crate::pipeline::intent::classify;
    use crate::pipeline::reasoning::reason;

    fn assess_text(text: &str, running: UrgencyLevel) -> RiskAssessment {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        let extraction = extract(text, &mut arena, 10);
        let intents = classify(text, arena.entities());
        let outcome = reason(&ctx, &mut arena, &extraction, &intents, None);
        assess(
            &AssessmentInput {
                raw_text: text,
                untruncated_text: None,
                normalized_text: text,
                view: EvidenceView::new(&ctx, &arena),
                syndromes: &outcome.syndromes,
                intents: &intents,
                demographics: None,
            },
            running,
        )
    }

    #[test]
    fn crushing_chest_pain_and_breathlessness_is_emergency() {
        let a = assess_text("crushing chest pain and shortness of breath", UrgencyLevel::Routine);
        assert_eq!(a.urgency, UrgencyLevel::Emergency);
        assert!(a.escalated);
        assert!(a.triggers.iter().any(|t| t.source == TriggerSource::RedFlag));
        assert!(a.triggers.iter().any(|t| t.rule_id == "SYN-ACS"));
        assert_eq!(a.triggers[0].level, UrgencyLevel::Emergency);
    }

    #[test]
    fn mild_headache_is_routine() {
        let a = assess_text("mild headache for two days, no other symptoms", UrgencyLevel::Routine);
        assert_eq!(a.urgency, UrgencyLevel::Routine);
        assert!(a.triggers.is_empty());
        assert!(!a.escalated);
    }

    #[test]
    fn never_lowers_running_level() {
        let a = assess_text("mild headache", UrgencyLevel::Emergency);
        assert_eq!(a.turn_level, UrgencyLevel::Routine);
        assert_eq!(a.urgency, UrgencyLevel::Emergency);
        assert!(!a.escalated);
    }

    #[test]
    fn red_flag_in_raw_text_counts_when_normalized_differs() {
        let ctx = MedicalContext::new();
        let arena = TurnArena::for_context(&ctx);
        let a = assess(
            &AssessmentInput {
                raw_text: "my throat is closing",
                untruncated_text: None,
                normalized_text: "my throat",
                view: EvidenceView::new(&ctx, &arena),
                syndromes: &[],
                intents: &[],
                demographics: None,
            },
            UrgencyLevel::Routine,
        );
        assert_eq!(a.urgency, UrgencyLevel::Emergency);
        assert_eq!(a.triggers[0].rule_id, "RF-009");
    }

    #[test]
    fn red_flag_past_truncation_counts() {
        let ctx = MedicalContext::new();
        let arena = TurnArena::for_context(&ctx);
        let full = format!("{} crushing chest pain", "tired ".repeat(50));
        let a = assess(
            &AssessmentInput {
                raw_text: "tired tired",
                untruncated_text: Some(&full),
                normalized_text: "tired tired",
                view: EvidenceView::new(&ctx, &arena),
                syndromes: &[],
                intents: &[],
                demographics: None,
            },
            UrgencyLevel::Routine,
        );
        assert_eq!(a.urgency, UrgencyLevel::Emergency);
        assert_eq!(a.triggers[0].rule_id, "RF-001");
    }

    #[test]
    fn syndrome_on_evidence_older_than_override_is_ignored() {
        let text = "crushing chest pain and shortness of breath";
        let mut ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        extract(text, &mut arena, 10);
        arena.merge_into(&mut ctx);
        ctx.escalate(UrgencyLevel::Emergency);
        ctx.apply_override(UrgencyLevel::Routine, "ECG normal");

        let mut arena = TurnArena::for_context(&ctx);
        let extraction = extract("ok thanks", &mut arena, 10);
        let outcome = reason(&ctx, &mut arena, &extraction, &[], None);
        assert!(outcome.syndromes.iter().any(|m| m.meets_emergency_threshold()));

        let a = assess(
            &AssessmentInput {
                raw_text: "ok thanks",
                untruncated_text: None,
                normalized_text: "ok thanks",
                view: EvidenceView::new(&ctx, &arena),
                syndromes: &outcome.syndromes,
                intents: &[],
                demographics: None,
            },
            ctx.urgency,
        );
        assert_eq!(a.urgency, UrgencyLevel::Routine);
        assert!(a.triggers.is_empty());
    }

    #[test]
    fn infant_fever_escalates() {
        let ctx = MedicalContext::new();
        let arena = TurnArena::for_context(&ctx);
        let infant = PatientDemographics {
            age_years: Some(0),
            age_months: Some(1),
            sex: None,
        };
        let a = assess(
            &AssessmentInput {
                raw_text: "she has a fever",
                untruncated_text: None,
                normalized_text: "she has a fever",
                view: EvidenceView::new(&ctx, &arena),
                syndromes: &[],
                intents: &[],
                demographics: Some(&infant),
            },
            UrgencyLevel::Routine,
        );
        assert_eq!(a.urgency, UrgencyLevel::Emergency);
        assert_eq!(a.triggers[0].source, TriggerSource::Demographic);
    }

    #[test]
    fn degraded_is_at_least_urgent() {
        let a = assess_degraded("hello", None, UrgencyLevel::Routine, "extraction failed");
        assert_eq!(a.urgency, UrgencyLevel::Urgent);
        assert!(a.triggers.iter().any(|t| t.source == TriggerSource::Degraded));

        let a = assess_degraded("I can't breathe", None, UrgencyLevel::Routine, "extraction failed");
        assert_eq!(a.urgency, UrgencyLevel::Emergency);
        assert_eq!(a.triggers[0].rule_id, "RF-003");
    }
}
