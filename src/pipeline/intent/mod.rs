//! Intent classification over normalized text and the turn's entities.

mod taxonomy;

use serde::{Deserialize, Serialize};

use crate::models::enums::str_enum;
use crate::models::{ClinicalSignificance, Entity, EntityKind, ModelError, QualityDimension};
use taxonomy::INTENT_RULES;

str_enum!(
    /// Fixed 20-intent taxonomy.
    IntentKind {
        SymptomReporting => "symptom_reporting",
        SeverityAssessment => "severity_assessment",
        EmergencyConcern => "emergency_concern",
        FollowUp => "follow_up",
        DurationReport => "duration_report",
        LocationReport => "location_report",
        TriggerReport => "trigger_report",
        MedicationQuery => "medication_query",
        MedicationReport => "medication_report",
        AllergyReport => "allergy_report",
        MedicalHistoryReport => "medical_history_report",
        FamilyHistoryReport => "family_history_report",
        SocialHistoryReport => "social_history_report",
        ReassuranceSeeking => "reassurance_seeking",
        Clarification => "clarification",
        Denial => "denial",
        Affirmation => "affirmation",
        Greeting => "greeting",
        Gratitude => "gratitude",
        EndConversation => "end_conversation",
    }
);

impl IntentKind {
    pub fn significance(&self) -> ClinicalSignificance {
        match self {
            Self::EmergencyConcern => ClinicalSignificance::Emergency,
            Self::SymptomReporting
            | Self::SeverityAssessment
            | Self::MedicationReport
            | Self::AllergyReport
            | Self::MedicalHistoryReport => ClinicalSignificance::Moderate,
            _ => ClinicalSignificance::Low,
        }
    }

    pub fn is_emergency(&self) -> bool {
        *self == Self::EmergencyConcern
    }
}

/// Additional matches of the same intent add this much, up to `MAX_CONFIDENCE`.
const REPEAT_BONUS: f32 = 0.05;
const MAX_CONFIDENCE: f32 = 0.99;
/// Provider input can raise a local confidence by at most this much.
pub const PROVIDER_MAX_BOOST: f32 = 0.15;
/// Intents only the provider saw are admitted at no more than this.
const PROVIDER_ONLY_CAP: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    pub kind: IntentKind,
    pub confidence: f32,
    pub significance: ClinicalSignificance,
    /// Matched phrases or entity labels.
    pub evidence: Vec<String>,
}

impl ClassifiedIntent {
    fn new(kind: IntentKind, confidence: f32, evidence: Vec<String>) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, MAX_CONFIDENCE),
            significance: kind.significance(),
            evidence,
        }
    }
}

/// Classify an utterance. Output is ordered by confidence with emergency
/// concern first whenever it competes with reassurance seeking.
pub fn classify(text: &str, entities: &[Entity]) -> Vec<ClassifiedIntent> {
    let mut intents = Vec::new();

    for rule in INTENT_RULES.iter() {
        let vetoes: Vec<(usize, usize)> = rule
            .vetoes
            .iter()
            .flat_map(|v| v.find_iter(text).map(|m| (m.start(), m.end())))
            .collect();

        let mut best = 0.0f32;
        let mut evidence = Vec::new();
        for pattern in &rule.patterns {
            for m in pattern.regex.find_iter(text) {
                let vetoed = vetoes.iter().any(|(s, e)| *s < m.end() && m.start() < *e);
                if vetoed {
                    continue;
                }
                best = best.max(pattern.weight);
                evidence.push(m.as_str().trim().to_lowercase());
            }
        }
        if !evidence.is_empty() {
            let confidence = best + REPEAT_BONUS * (evidence.len() - 1) as f32;
            intents.push(ClassifiedIntent::new(rule.kind, confidence, evidence));
        }
    }

    apply_entity_boosts(&mut intents, entities);
    order(&mut intents);

    tracing::debug!(
        intents = intents.len(),
        top = intents.first().map(|i| i.kind.as_str()),
        "Classified intents"
    );
    intents
}

fn apply_entity_boosts(intents: &mut Vec<ClassifiedIntent>, entities: &[Entity]) {
    for entity in entities {
        let boost = match &entity.kind {
            EntityKind::AssociatedSymptom { .. } => Some((IntentKind::SymptomReporting, 0.15, 0.6)),
            EntityKind::Anatomical {
                radiation: None, ..
            } => Some((IntentKind::LocationReport, 0.1, 0.55)),
            EntityKind::Anatomical { .. } => Some((IntentKind::LocationReport, 0.1, 0.6)),
            EntityKind::TriggerContext { .. } => Some((IntentKind::TriggerReport, 0.1, 0.6)),
            EntityKind::Quality {
                dimension: QualityDimension::Severity,
                ..
            } => Some((IntentKind::SeverityAssessment, 0.1, 0.6)),
            _ => None,
        };
        if let Some((kind, bump, floor)) = boost {
            boost_or_insert(intents, kind, bump, floor, entity.label());
        }
        if entity.significance == ClinicalSignificance::Emergency {
            boost_or_insert(intents, IntentKind::EmergencyConcern, 0.1, 0.85, entity.label());
        }
    }
}

fn boost_or_insert(
    intents: &mut Vec<ClassifiedIntent>,
    kind: IntentKind,
    bump: f32,
    floor: f32,
    label: &str,
) {
    match intents.iter_mut().find(|i| i.kind == kind) {
        Some(existing) => {
            existing.confidence = (existing.confidence + bump).min(MAX_CONFIDENCE);
            if !existing.evidence.iter().any(|e| e == label) {
                existing.evidence.push(label.to_string());
            }
        }
        None => intents.push(ClassifiedIntent::new(kind, floor, vec![label.to_string()])),
    }
}

/// Confidence descending, emergency winning ties. If reassurance seeking is
/// present, emergency concern moves to the front regardless of confidence.
fn order(intents: &mut [ClassifiedIntent]) {
    intents.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.kind.is_emergency().cmp(&a.kind.is_emergency()))
            .then_with(|| a.kind.cmp(&b.kind))
    });

    let reassurance = intents
        .iter()
        .any(|i| i.kind == IntentKind::ReassuranceSeeking);
    if reassurance {
        if let Some(pos) = intents.iter().position(|i| i.kind.is_emergency()) {
            intents[..=pos].rotate_right(1);
        }
    }
}

/// Fold provider-suggested intents into the local ranking. Provider input may
/// add non-emergency intents or raise a confidence by a bounded amount; it never
/// removes or lowers anything, and never touches emergency concern.
pub fn merge_provider(
    mut local: Vec<ClassifiedIntent>,
    suggested: &[(IntentKind, f32)],
) -> Vec<ClassifiedIntent> {
    for &(kind, confidence) in suggested {
        if kind.is_emergency() || !confidence.is_finite() {
            continue;
        }
        let confidence = confidence.clamp(0.0, 1.0);
        match local.iter_mut().find(|i| i.kind == kind) {
            Some(existing) => {
                let raised = confidence.min(existing.confidence + PROVIDER_MAX_BOOST);
                existing.confidence = existing.confidence.max(raised).min(MAX_CONFIDENCE);
            }
            None => local.push(ClassifiedIntent::new(
                kind,
                confidence.min(PROVIDER_ONLY_CAP),
                vec!["provider".to_string()],
            )),
        }
    }
    order(&mut local);
    local
}

/// Whether `kind` is among the intents at or above `min_confidence`.
pub fn has_intent(intents: &[ClassifiedIntent], kind: IntentKind, min_confidence: f32) -> bool {
    intents
        .iter()
        .any(|i| i.kind == kind && i.confidence >= min_confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, PatternId, SourceSpan};

    fn kinds(intents: &[ClassifiedIntent]) -> Vec<IntentKind> {
        intents.iter().map(|i| i.kind).collect()
    }

    fn intent(kind: IntentKind, confidence: f32) -> ClassifiedIntent {
        ClassifiedIntent::new(kind, confidence, vec![])
    }

    #[test]
    fn taxonomy_has_twenty_intents() {
        assert_eq!(INTENT_RULES.len(), 20);
        let mut seen: Vec<IntentKind> = INTENT_RULES.iter().map(|r| r.kind).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn symptom_report_detected() {
        let intents = classify("I have a headache", &[]);
        assert_eq!(intents[0].kind, IntentKind::SymptomReporting);
        assert!(intents[0].confidence > 0.5);
    }

    #[test]
    fn negated_symptom_vetoes_symptom_reporting() {
        let intents = classify("no pain", &[]);
        assert!(!kinds(&intents).contains(&IntentKind::SymptomReporting));
        assert!(kinds(&intents).contains(&IntentKind::Denial));
    }

    #[test]
    fn veto_only_cancels_overlapping_hit() {
        let intents = classify("no pain but now a headache", &[]);
        assert!(kinds(&intents).contains(&IntentKind::SymptomReporting));
    }

    #[test]
    fn past_events_are_not_emergencies() {
        let intents = classify("I have a history of heart attack", &[]);
        assert!(!kinds(&intents).contains(&IntentKind::EmergencyConcern));
        assert!(kinds(&intents).contains(&IntentKind::MedicalHistoryReport));

        let intents = classify("my father had a stroke", &[]);
        assert!(!kinds(&intents).contains(&IntentKind::EmergencyConcern));
        assert!(kinds(&intents).contains(&IntentKind::FamilyHistoryReport));
    }

    #[test]
    fn emergency_outranks_reassurance() {
        let mut intents = vec![
            intent(IntentKind::ReassuranceSeeking, 0.95),
            intent(IntentKind::SymptomReporting, 0.8),
            intent(IntentKind::EmergencyConcern, 0.5),
        ];
        order(&mut intents);
        assert_eq!(
            kinds(&intents),
            vec![
                IntentKind::EmergencyConcern,
                IntentKind::ReassuranceSeeking,
                IntentKind::SymptomReporting,
            ]
        );
    }

    #[test]
    fn emergency_wins_ties() {
        let intents = classify("is this serious? I can't breathe", &[]);
        assert_eq!(intents[0].kind, IntentKind::EmergencyConcern);
    }

    #[test]
    fn emergency_entity_adds_emergency_concern() {
        let entity = Entity {
            id: EntityId(0),
            kind: EntityKind::AssociatedSymptom {
                symptom: "facial droop".into(),
                probability: 0.95,
                urgency_contribution: 0.95,
                primary: true,
                body_site: Some("face".into()),
            },
            confidence: 0.9,
            span: SourceSpan {
                start: 3,
                end: 15,
                text: "face drooping".into(),
            },
            pattern_id: PatternId(3),
            significance: ClinicalSignificance::Emergency,
            uncertainty: vec![],
        };
        let intents = classify("my face drooping", &[entity]);
        assert_eq!(intents[0].kind, IntentKind::EmergencyConcern);
        assert!(kinds(&intents).contains(&IntentKind::SymptomReporting));
    }

    #[test]
    fn provider_cannot_lower_or_remove_emergency() {
        let local = vec![intent(IntentKind::EmergencyConcern, 0.9)];
        let merged = merge_provider(
            local,
            &[
                (IntentKind::EmergencyConcern, 0.1),
                (IntentKind::ReassuranceSeeking, 0.99),
            ],
        );
        assert_eq!(merged[0].kind, IntentKind::EmergencyConcern);
        assert_eq!(merged[0].confidence, 0.9);
        let reassurance = merged
            .iter()
            .find(|i| i.kind == IntentKind::ReassuranceSeeking)
            .unwrap();
        assert_eq!(reassurance.confidence, PROVIDER_ONLY_CAP);
    }

    #[test]
    fn provider_boost_is_bounded() {
        let local = vec![intent(IntentKind::SymptomReporting, 0.6)];
        let merged = merge_provider(local, &[(IntentKind::SymptomReporting, 0.98)]);
        assert!((merged[0].confidence - 0.75).abs() < 1e-6);

        let local = vec![intent(IntentKind::SymptomReporting, 0.6)];
        let merged = merge_provider(local, &[(IntentKind::SymptomReporting, 0.2)]);
        assert_eq!(merged[0].confidence, 0.6);
    }

    #[test]
    fn closing_remarks() {
        let intents = classify("thanks, that's all", &[]);
        assert!(has_intent(&intents, IntentKind::Gratitude, 0.5));
        assert!(has_intent(&intents, IntentKind::EndConversation, 0.5));
    }

    #[test]
    fn confidences_bounded() {
        let text = "I have pain, severe pain, pain all over, it hurts, so much pain, 9/10";
        for intent in classify(text, &[]) {
            assert!((0.0..=1.0).contains(&intent.confidence));
        }
    }
}
