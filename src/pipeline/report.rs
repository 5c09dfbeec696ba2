//! End-of-session synthesis: the structured summary handed to an external
//! report renderer. Candidates only, never a diagnosis.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    CausalContext, ClinicalHypothesis, ConsultationSession, EntityKind, HistoryAnswers, HpiField,
    MedicalContext, RedFlagRecord, UrgencyLevel,
};

/// Hypotheses beyond this rank are left out of the report.
const MAX_REPORTED_HYPOTHESES: usize = 5;
const MAX_PLAN_NEXT_STEPS: usize = 3;

pub const DISCLAIMER: &str = "This summary was produced by an automated intake assistant from the \
patient's own description. It lists possibilities ranked by the evidence gathered, not diagnoses, \
and must be reviewed by a qualified clinician.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpiSummary {
    pub fields: BTreeMap<HpiField, Vec<String>>,
    pub narrative: String,
    pub missing: Vec<HpiField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosSummary {
    pub positives: BTreeMap<String, Vec<String>>,
    pub negatives: BTreeMap<String, Vec<String>>,
    /// Findings the patient explicitly denied anywhere in the conversation.
    pub denied: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSummary {
    pub cause: String,
    pub effect: String,
    pub context: CausalContext,
    pub mechanism: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub hypotheses: Vec<ClinicalHypothesis>,
    pub red_flags: Vec<RedFlagRecord>,
    pub urgency: UrgencyLevel,
    pub contextual_significance: f32,
    pub key_relationships: Vec<RelationshipSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationReport {
    pub session_id: Uuid,
    pub chief_complaint: Option<String>,
    pub history_of_present_illness: HpiSummary,
    pub review_of_systems: RosSummary,
    pub history: HistoryAnswers,
    pub assessment: Assessment,
    pub plan: Vec<String>,
    pub disclaimer: String,
    pub generated_at: DateTime<Utc>,
}

/// Build the report for a session.
pub fn synthesize(session: &ConsultationSession) -> ConsultationReport {
    let ctx = &session.context;
    let chief_complaint = chief_complaint(ctx);
    let hypotheses: Vec<ClinicalHypothesis> = ctx
        .hypotheses
        .iter()
        .take(MAX_REPORTED_HYPOTHESES)
        .cloned()
        .collect();

    ConsultationReport {
        session_id: session.id,
        history_of_present_illness: HpiSummary {
            fields: ctx.hpi.fields.clone(),
            narrative: narrative(chief_complaint.as_deref(), ctx),
            missing: ctx.hpi.missing(),
        },
        review_of_systems: RosSummary {
            positives: ctx.review_of_systems.positives.clone(),
            negatives: ctx.review_of_systems.negatives.clone(),
            denied: ctx.negated_findings.clone(),
        },
        history: ctx.history.clone(),
        plan: plan(ctx, &hypotheses),
        assessment: Assessment {
            hypotheses,
            red_flags: ctx.red_flags.clone(),
            urgency: ctx.urgency,
            contextual_significance: ctx.contextual_significance,
            key_relationships: key_relationships(ctx),
        },
        chief_complaint,
        disclaimer: DISCLAIMER.to_string(),
        generated_at: Utc::now(),
    }
}

fn chief_complaint(ctx: &MedicalContext) -> Option<String> {
    ctx.chief_complaint.clone().or_else(|| {
        ctx.entities
            .iter()
            .find(|e| matches!(e.kind, EntityKind::AssociatedSymptom { primary: true, .. }))
            .map(|e| e.label().to_string())
    })
}

fn narrative(chief_complaint: Option<&str>, ctx: &MedicalContext) -> String {
    let mut sentences = Vec::new();
    match chief_complaint {
        Some(cc) => sentences.push(format!("Presents with {cc}.")),
        None => sentences.push("No chief complaint was established.".to_string()),
    }

    let join = |field: HpiField| ctx.hpi.get(field).map(|values| values.join(", "));
    let phrases: [(HpiField, &str); 8] = [
        (HpiField::Onset, "Onset"),
        (HpiField::Duration, "Duration"),
        (HpiField::Location, "Location"),
        (HpiField::Radiation, "Radiates to"),
        (HpiField::Character, "Character"),
        (HpiField::Severity, "Severity"),
        (HpiField::Timing, "Timing"),
        (HpiField::ModifyingFactors, "Modifying factors"),
    ];
    for (field, lead) in phrases {
        if let Some(value) = join(field) {
            sentences.push(format!("{lead}: {value}."));
        }
    }

    let associated: Vec<&str> = ctx
        .entities
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::AssociatedSymptom { primary: false, .. }))
        .map(|e| e.label())
        .collect();
    if !associated.is_empty() {
        sentences.push(format!("Associated with {}.", associated.join(", ")));
    }
    if !ctx.negated_findings.is_empty() {
        sentences.push(format!("Denies {}.", ctx.negated_findings.join(", ")));
    }
    sentences.join(" ")
}

fn key_relationships(ctx: &MedicalContext) -> Vec<RelationshipSummary> {
    let mut rels: Vec<RelationshipSummary> = ctx
        .relationships
        .iter()
        .filter_map(|r| {
            Some(RelationshipSummary {
                cause: ctx.entity(r.cause)?.label().to_string(),
                effect: ctx.entity(r.effect)?.label().to_string(),
                context: r.context,
                mechanism: r.mechanism.clone(),
                confidence: r.confidence,
            })
        })
        .collect();
    rels.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    rels
}

fn plan(ctx: &MedicalContext, hypotheses: &[ClinicalHypothesis]) -> Vec<String> {
    let mut plan = vec![match ctx.urgency {
        UrgencyLevel::Emergency => {
            "Seek emergency care now: call your local emergency number or go to the nearest emergency department."
        }
        UrgencyLevel::Urgent => "Arrange a same-day medical assessment.",
        UrgencyLevel::Routine => {
            "Book a routine appointment with your primary care clinician if symptoms persist or worsen."
        }
    }
    .to_string()];

    for step in hypotheses.iter().map(|h| h.recommended_next_step.as_str()) {
        if plan.len() > MAX_PLAN_NEXT_STEPS {
            break;
        }
        if !plan.iter().any(|p| p == step) {
            plan.push(step.to_string());
        }
    }

    let missing = ctx.hpi.missing();
    if !missing.is_empty() && ctx.has_symptom() {
        let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
        plan.push(format!(
            "Clarify at the visit: {}.",
            names.join(", ").replace('_', " ")
        ));
    }

    if ctx.urgency < UrgencyLevel::Emergency {
        plan.push(
            "Get help immediately if new warning signs appear, for example chest pain or difficulty breathing."
                .to_string(),
        );
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CausalRelationship, ClinicalSignificance, Entity, EntityId, PatternId, SourceSpan,
    };

    fn symptom(id: usize, name: &str, primary: bool) -> Entity {
        Entity {
            id: EntityId(id),
            kind: EntityKind::AssociatedSymptom {
                symptom: name.into(),
                probability: 0.9,
                urgency_contribution: 0.4,
                primary,
                body_site: None,
            },
            confidence: 0.8,
            span: SourceSpan {
                start: 0,
                end: name.len(),
                text: name.into(),
            },
            pattern_id: PatternId(0),
            significance: ClinicalSignificance::Moderate,
            uncertainty: vec![],
        }
    }

    fn hypothesis(id: &str, step: &str, rank: f32) -> ClinicalHypothesis {
        ClinicalHypothesis {
            condition: id.to_string(),
            syndrome_id: id.to_string(),
            probability: rank,
            significance: ClinicalSignificance::Moderate,
            supporting_entities: vec![EntityId(0)],
            supporting_relationships: vec![],
            matched_findings: vec![],
            recommended_next_step: step.to_string(),
            rank_score: rank,
        }
    }

    fn session() -> ConsultationSession {
        let mut s = ConsultationSession::new(None);
        let ctx = &mut s.context;
        ctx.entities.push(symptom(0, "abdominal pain", true));
        ctx.entities.push(symptom(1, "vomiting", false));
        ctx.relationships.push(CausalRelationship {
            cause: EntityId(0),
            effect: EntityId(1),
            context: CausalContext::Associative,
            mechanism: "Abdominal pain with vomiting".into(),
            confidence: 0.7,
            significance: ClinicalSignificance::Moderate,
        });
        ctx.hpi.record(HpiField::Duration, "2 days");
        ctx.hpi.record(HpiField::Character, "cramping");
        ctx.record_negated("fever");
        ctx.hypotheses = vec![
            hypothesis("SYN-GASTRO", "Oral fluids; review if unable to keep fluids down.", 0.45),
            hypothesis("SYN-ABDO", "Same-day examination.", 0.3),
        ];
        s
    }

    #[test]
    fn narrative_reads_from_context() {
        let report = synthesize(&session());
        let hpi = &report.history_of_present_illness;
        assert_eq!(report.chief_complaint.as_deref(), Some("abdominal pain"));
        assert!(hpi.narrative.starts_with("Presents with abdominal pain."));
        assert!(hpi.narrative.contains("Duration: 2 days."));
        assert!(hpi.narrative.contains("Associated with vomiting."));
        assert!(hpi.narrative.contains("Denies fever."));
        assert_eq!(hpi.missing.len(), 6);
    }

    #[test]
    fn plan_leads_with_disposition() {
        let mut s = session();
        let routine = synthesize(&s);
        assert!(routine.plan[0].starts_with("Book a routine appointment"));
        assert_eq!(routine.plan[1], "Oral fluids; review if unable to keep fluids down.");
        assert!(routine.plan.iter().any(|p| p.starts_with("Clarify at the visit")));

        s.context.escalate(UrgencyLevel::Emergency);
        let emergency = synthesize(&s);
        assert!(emergency.plan[0].starts_with("Seek emergency care now"));
        assert_eq!(emergency.assessment.urgency, UrgencyLevel::Emergency);
    }

    #[test]
    fn relationships_resolved_to_labels() {
        let report = synthesize(&session());
        let rel = &report.assessment.key_relationships[0];
        assert_eq!((rel.cause.as_str(), rel.effect.as_str()), ("abdominal pain", "vomiting"));
        assert!(!report.disclaimer.is_empty());
    }

    #[test]
    fn empty_session_still_reports() {
        let report = synthesize(&ConsultationSession::new(None));
        assert!(report.chief_complaint.is_none());
        assert!(report.assessment.hypotheses.is_empty());
        assert_eq!(report.plan.len(), 2);
    }
}
