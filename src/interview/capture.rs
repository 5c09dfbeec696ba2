//! Recording what a turn contributes to the session's structured history.

use crate::models::{Entity, EntityKind, InterviewStage, MedicalContext};
use crate::pipeline::extraction::ExtractionResult;
use crate::pipeline::intent::{has_intent, ClassifiedIntent, IntentKind};

/// Answers longer than this are clipped before being stored.
const MAX_ANSWER_CHARS: usize = 240;
const INTENT_MIN: f32 = 0.5;
pub const NONE_REPORTED: &str = "none reported";

/// Body systems for the review of systems, matched by substring on the finding.
/// First match wins, so more specific needles come first.
const BODY_SYSTEMS: &[(&str, &str)] = &[
    ("pleuritic", "respiratory"),
    ("chest pain", "cardiovascular"),
    ("palpitation", "cardiovascular"),
    ("syncope", "cardiovascular"),
    ("leg swelling", "cardiovascular"),
    ("calf", "cardiovascular"),
    ("breath", "respiratory"),
    ("cough", "respiratory"),
    ("wheez", "respiratory"),
    ("throat", "ent"),
    ("nasal", "ent"),
    ("sneez", "ent"),
    ("common cold", "ent"),
    ("heartburn", "gastrointestinal"),
    ("abdominal", "gastrointestinal"),
    ("epigastric", "gastrointestinal"),
    ("nausea", "gastrointestinal"),
    ("vomit", "gastrointestinal"),
    ("diarrh", "gastrointestinal"),
    ("stool", "gastrointestinal"),
    ("constipation", "gastrointestinal"),
    ("bloating", "gastrointestinal"),
    ("urin", "genitourinary"),
    ("flank", "genitourinary"),
    ("vision", "eyes"),
    ("light sensitivity", "eyes"),
    ("rash", "skin"),
    ("hives", "skin"),
    ("headache", "neurological"),
    ("migraine", "neurological"),
    ("seizure", "neurological"),
    ("confusion", "neurological"),
    ("numb", "neurological"),
    ("tingl", "neurological"),
    ("lightheaded", "neurological"),
    ("vertigo", "neurological"),
    ("droop", "neurological"),
    ("slurred", "neurological"),
    ("one-sided", "neurological"),
    ("unresponsive", "neurological"),
    ("neck stiffness", "neurological"),
    ("anxiety", "psychiatric"),
    ("back pain", "musculoskeletal"),
    ("fever", "constitutional"),
    ("chills", "constitutional"),
    ("sweat", "constitutional"),
    ("fatigue", "constitutional"),
    ("weight", "constitutional"),
    ("weakness", "constitutional"),
];

/// Review-of-systems body system for a finding; "general" when unknown.
pub fn body_system(finding: &str) -> &'static str {
    let finding = finding.to_lowercase();
    BODY_SYSTEMS
        .iter()
        .find(|(needle, _)| finding.contains(needle))
        .map_or("general", |(_, system)| *system)
}

/// Fold one turn into the context. `turn_entities` are the entities this
/// message produced (already merged into `context.entities`), `text` the
/// sanitized patient message and `stage` the stage the turn was taken in.
pub fn record_turn(
    context: &mut MedicalContext,
    stage: InterviewStage,
    turn_entities: &[Entity],
    extraction: &ExtractionResult,
    intents: &[ClassifiedIntent],
    text: &str,
) {
    if context.chief_complaint.is_none() {
        context.chief_complaint = chief_complaint(turn_entities);
    }

    for (field, value) in &extraction.hpi {
        context.hpi.record(*field, value);
    }

    for entity in turn_entities {
        if let Some(name) = entity.symptom_name() {
            context
                .review_of_systems
                .record_positive(body_system(name), name);
        }
    }
    for finding in &extraction.uncertainty.negated {
        context.record_negated(finding);
        context
            .review_of_systems
            .record_negative(body_system(finding), finding);
    }

    record_stage_answer(context, stage, turn_entities, extraction, intents, text);
}

fn chief_complaint(turn_entities: &[Entity]) -> Option<String> {
    let primary = turn_entities.iter().find(|e| {
        matches!(
            e.kind,
            EntityKind::AssociatedSymptom { primary: true, .. }
        )
    });
    primary
        .or_else(|| turn_entities.iter().find(|e| e.is_symptom()))
        .map(|e| e.label().to_string())
}

fn record_stage_answer(
    context: &mut MedicalContext,
    stage: InterviewStage,
    turn_entities: &[Entity],
    extraction: &ExtractionResult,
    intents: &[ClassifiedIntent],
    text: &str,
) {
    let text = text.trim();
    let denial = has_intent(intents, IntentKind::Denial, INTENT_MIN);
    let only_asking = !denial
        && intents
            .first()
            .is_some_and(|i| i.kind == IntentKind::Clarification);
    if text.is_empty() || only_asking {
        return;
    }

    let history = &mut context.history;
    match stage {
        InterviewStage::ReviewOfSystems => {
            let answered = turn_entities.iter().any(Entity::is_symptom)
                || !extraction.uncertainty.negated.is_empty()
                || extraction.uncertainty.denied_other_symptoms
                || denial
                || has_intent(intents, IntentKind::Affirmation, INTENT_MIN);
            if answered {
                context.review_of_systems.answered = true;
            }
        }
        InterviewStage::PastMedicalHistory => {
            push_answer(&mut history.past_medical_history, answer(text, denial));
        }
        InterviewStage::MedicationsAllergies => {
            let allergy = has_intent(intents, IntentKind::AllergyReport, INTENT_MIN);
            let medication = has_intent(intents, IntentKind::MedicationReport, INTENT_MIN);
            if allergy {
                push_answer(&mut history.allergies, answer(text, denial));
            }
            if medication || !allergy {
                push_answer(&mut history.medications, answer(text, denial));
            }
        }
        InterviewStage::SocialFamilyHistory => {
            let family = has_intent(intents, IntentKind::FamilyHistoryReport, INTENT_MIN);
            let social = has_intent(intents, IntentKind::SocialHistoryReport, INTENT_MIN);
            if family {
                push_answer(&mut history.family_history, answer(text, denial));
            }
            if social || !family {
                push_answer(&mut history.social_history, answer(text, denial));
            }
        }
        _ => {}
    }
}

/// A flat denial is stored as "none reported"; anything else verbatim, clipped.
fn answer(text: &str, denial: bool) -> String {
    let words = text.split_whitespace().count();
    if denial && words <= 4 {
        return NONE_REPORTED.to_string();
    }
    match text.char_indices().nth(MAX_ANSWER_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn push_answer(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}
