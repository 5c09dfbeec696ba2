//! Patient-facing replies and follow-up questions.

use crate::models::{
    CausalRelationship, ClinicalHypothesis, Entity, HpiField, InterviewStage, MedicalContext,
    UrgencyLevel,
};
use crate::pipeline::extraction::patterns::{PatternTemplate, PATTERN_LIBRARY};
use crate::pipeline::reasoning::SYNDROMES;
use crate::pipeline::safety::RiskAssessment;

use super::transitions::Transition;

pub const GREETING_MESSAGE: &str = "Hello, I'm an intake assistant. I'll ask some questions about \
how you're feeling so your clinician has a clear picture before your visit. I can't diagnose \
anything, and if you feel you are in danger right now, please call your local emergency number. \
What brings you in today?";

const EMERGENCY_MESSAGE: &str = "What you describe could be a medical emergency. Please call your \
local emergency number or go to the nearest emergency department now. Do not drive yourself.";

const URGENT_MESSAGE: &str =
    "Some of what you describe should be seen by a clinician today, in person if possible.";

const DEGRADED_MESSAGE: &str = "I couldn't fully process that message. To be safe, please \
arrange to be seen by a clinician today, and call emergency services if things get worse.";

/// Hypotheses below this probability are not mentioned to the patient.
const MENTION_THRESHOLD: f32 = 0.35;
/// HPI questions asked per turn.
const HPI_QUESTIONS_PER_TURN: usize = 2;
/// Relationship sentences echoed back per turn.
const RELATIONSHIPS_PER_TURN: usize = 2;

/// Review-of-systems prompts, one per body system.
const ROS_PROMPTS: &[(&str, &str)] = &[
    ("constitutional", "fever, chills or unusual tiredness"),
    ("respiratory", "cough or shortness of breath"),
    ("cardiovascular", "chest pain or a racing heartbeat"),
    ("gastrointestinal", "nausea, vomiting or changes in your bowels"),
    ("genitourinary", "pain or changes when you pass urine"),
    ("neurological", "headache, numbness or dizziness"),
    ("skin", "a rash"),
];
const ROS_PROMPTS_PER_TURN: usize = 3;

pub struct ResponseInputs<'a> {
    /// Stage after the transition.
    pub stage: InterviewStage,
    pub transition: Transition,
    pub assessment: &'a RiskAssessment,
    /// Context with this turn already merged.
    pub context: &'a MedicalContext,
    pub turn_entities: &'a [Entity],
    pub turn_relationships: &'a [CausalRelationship],
    /// HPI values found in this message.
    pub turn_hpi: &'a [(HpiField, String)],
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedResponse {
    pub text: String,
    pub next_questions: Vec<String>,
}

/// Compose the reply. Safety advice first, then what was understood from this
/// message, then the questions for the stage the interview is now in.
pub fn compose(inputs: &ResponseInputs<'_>) -> ComposedResponse {
    let mut paragraphs = Vec::new();

    if inputs.degraded {
        paragraphs.push(DEGRADED_MESSAGE.to_string());
    } else if inputs.assessment.turn_is_emergency()
        || inputs.transition == Transition::EmergencyJump
    {
        paragraphs.push(emergency_paragraph(inputs.assessment));
    } else if inputs.assessment.escalated && inputs.assessment.urgency == UrgencyLevel::Urgent {
        paragraphs.push(URGENT_MESSAGE.to_string());
    }

    if let Some(findings) = findings_paragraph(inputs) {
        paragraphs.push(findings);
    }

    let next_questions = questions_for(inputs.stage, inputs.context);
    match inputs.stage {
        InterviewStage::RiskAssessment => paragraphs.push(risk_summary(inputs.context)),
        InterviewStage::DifferentialDiagnosis => {
            paragraphs.push(differential_summary(&inputs.context.hypotheses))
        }
        InterviewStage::Completed => paragraphs.push(closing(inputs.context)),
        _ => {}
    }
    paragraphs.extend(next_questions.iter().cloned());

    ComposedResponse {
        text: paragraphs.join("\n\n"),
        next_questions,
    }
}

fn emergency_paragraph(assessment: &RiskAssessment) -> String {
    match assessment
        .triggers
        .iter()
        .find(|t| t.level == UrgencyLevel::Emergency)
    {
        Some(trigger) => format!("{EMERGENCY_MESSAGE} (Concern: {}.)", trigger.description),
        None => EMERGENCY_MESSAGE.to_string(),
    }
}

/// Relationships beat a bare symptom list; the leading hypothesis is mentioned
/// once there is enough evidence for it.
fn findings_paragraph(inputs: &ResponseInputs<'_>) -> Option<String> {
    let mut sentences: Vec<String> = inputs
        .turn_relationships
        .iter()
        .take(RELATIONSHIPS_PER_TURN)
        .map(|r| format!("I noted: {}.", r.mechanism.trim_end_matches('.')))
        .collect();

    if sentences.is_empty() {
        let symptoms: Vec<&str> = inputs
            .turn_entities
            .iter()
            .filter_map(Entity::symptom_name)
            .collect();
        if !symptoms.is_empty() {
            sentences.push(format!("I noted {}.", join_list(&symptoms)));
        } else {
            // No symptom named yet: echo the details so the re-prompt is not empty.
            let details = echoed_details(inputs.turn_hpi);
            if !details.is_empty() {
                let refs: Vec<&str> = details.iter().map(String::as_str).collect();
                sentences.push(format!("You mentioned {}.", join_list(&refs)));
            }
        }
    }

    let mentionable = matches!(
        inputs.stage,
        InterviewStage::HistoryPresentIllness
            | InterviewStage::ReviewOfSystems
            | InterviewStage::PastMedicalHistory
            | InterviewStage::MedicationsAllergies
            | InterviewStage::SocialFamilyHistory
    );
    if mentionable && !inputs.turn_entities.is_empty() {
        if let Some(top) = inputs
            .context
            .hypotheses
            .first()
            .filter(|h| h.probability >= MENTION_THRESHOLD)
        {
            sentences.push(format!(
                "Together these details can fit with {}, which your clinician will need to confirm or rule out.",
                top.condition.to_lowercase()
            ));
        }
    }

    (!sentences.is_empty()).then(|| sentences.join(" "))
}

/// Fields echoed back, in the order they read best. Onset is left out since
/// "since ..." already lands in the duration.
const ECHO_ORDER: &[HpiField] = &[
    HpiField::Location,
    HpiField::Radiation,
    HpiField::Character,
    HpiField::Severity,
    HpiField::Duration,
    HpiField::Timing,
    HpiField::ModifyingFactors,
];

fn echoed_details(turn_hpi: &[(HpiField, String)]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for field in ECHO_ORDER {
        for (_, value) in turn_hpi.iter().filter(|(f, _)| f == field) {
            let phrase = match field {
                HpiField::Location => format!("your {value}"),
                HpiField::Radiation => format!("spreading to your {value}"),
                HpiField::Duration if !value.starts_with("since") => format!("for {value}"),
                _ => value.clone(),
            };
            if !out.contains(&phrase) {
                out.push(phrase);
            }
        }
    }
    out
}

fn chief_complaint_question(context: &MedicalContext) -> String {
    match context.hpi.get(HpiField::Location).and_then(|v| v.last()) {
        Some(site) => format!(
            "What is bothering you about your {site}? For example pain, swelling, stiffness or something else?"
        ),
        None => "What is the main symptom or problem bothering you today?".to_string(),
    }
}

/// Questions for `stage`, most informative first.
pub fn questions_for(stage: InterviewStage, context: &MedicalContext) -> Vec<String> {
    match stage {
        InterviewStage::Greeting => vec!["What brings you in today?".to_string()],
        InterviewStage::ChiefComplaint => vec![chief_complaint_question(context)],
        InterviewStage::HistoryPresentIllness => {
            let mut questions: Vec<String> = hypothesis_follow_up(context).into_iter().collect();
            questions.extend(
                context
                    .hpi
                    .missing()
                    .into_iter()
                    .take(HPI_QUESTIONS_PER_TURN)
                    .map(|f: HpiField| f.question().to_string()),
            );
            questions
        }
        InterviewStage::ReviewOfSystems => {
            let mut questions: Vec<String> = hypothesis_follow_up(context).into_iter().collect();
            questions.push(review_of_systems_question(context));
            questions
        }
        InterviewStage::PastMedicalHistory => vec![
            "Do you have any ongoing medical conditions, or have you had surgery or a hospital stay before?"
                .to_string(),
        ],
        InterviewStage::MedicationsAllergies => vec![
            "Do you take any medicines, including over-the-counter ones or supplements? Do you have any allergies?"
                .to_string(),
        ],
        InterviewStage::SocialFamilyHistory => vec![
            "Do you smoke, drink alcohol, or use other substances? Do any conditions run in your family?"
                .to_string(),
        ],
        InterviewStage::RiskAssessment => {
            vec!["Is there anything else you'd like to add before I summarize?".to_string()]
        }
        InterviewStage::DifferentialDiagnosis => {
            vec!["Is there anything important I've missed?".to_string()]
        }
        InterviewStage::Completed => Vec::new(),
    }
}

/// Ask about the heaviest unconfirmed symptom of the leading hypothesis.
fn hypothesis_follow_up(context: &MedicalContext) -> Option<String> {
    let top = context.hypotheses.first()?;
    let syndrome = SYNDROMES.iter().find(|s| s.id == top.syndrome_id)?;
    let mut members: Vec<_> = syndrome.members.iter().collect();
    members.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let label = members
        .into_iter()
        .filter(|m| {
            !m.labels
                .iter()
                .any(|l| top.matched_findings.iter().any(|f| f == l))
        })
        .flat_map(|m| m.labels.iter().copied())
        .find(|l| is_symptom_name(l) && !already_discussed(context, l))?;
    Some(format!("Have you also had any {label}?"))
}

fn is_symptom_name(label: &str) -> bool {
    label.ends_with(" pain")
        || PATTERN_LIBRARY.iter().any(|p| {
            matches!(p.template, PatternTemplate::Symptom { name, .. } if name == label)
        })
}

fn already_discussed(context: &MedicalContext, label: &str) -> bool {
    context
        .negated_findings
        .iter()
        .any(|n| n.eq_ignore_ascii_case(label))
        || context
            .symptoms()
            .any(|e| e.label().eq_ignore_ascii_case(label))
}

fn review_of_systems_question(context: &MedicalContext) -> String {
    let ros = &context.review_of_systems;
    let open: Vec<&str> = ROS_PROMPTS
        .iter()
        .filter(|(system, _)| {
            !ros.positives.contains_key(*system) && !ros.negatives.contains_key(*system)
        })
        .take(ROS_PROMPTS_PER_TURN)
        .map(|(_, prompt)| *prompt)
        .collect();
    if open.is_empty() {
        "Have you noticed any other symptoms at all?".to_string()
    } else {
        format!(
            "Have you noticed any other symptoms, such as {}?",
            join_list_with(&open, "or")
        )
    }
}

fn risk_summary(context: &MedicalContext) -> String {
    match context.urgency {
        UrgencyLevel::Emergency => {
            "Based on what you've told me, you should be seen as an emergency.".to_string()
        }
        UrgencyLevel::Urgent => {
            "Based on what you've told me, you should be seen by a clinician today.".to_string()
        }
        UrgencyLevel::Routine => {
            "Nothing you've told me so far suggests you need urgent care, but a clinician should still review it."
                .to_string()
        }
    }
}

fn differential_summary(hypotheses: &[ClinicalHypothesis]) -> String {
    let conditions: Vec<String> = hypotheses
        .iter()
        .take(3)
        .map(|h| h.condition.to_lowercase())
        .collect();
    if conditions.is_empty() {
        return "I haven't found a clear pattern in what you've described; your clinician will go through it with you."
            .to_string();
    }
    let refs: Vec<&str> = conditions.iter().map(String::as_str).collect();
    format!(
        "The details you've shared are most in keeping with {}. This is not a diagnosis; your clinician will decide what it means.",
        join_list_with(&refs, "or")
    )
}

fn closing(context: &MedicalContext) -> String {
    let mut text =
        "Thank you. Your intake summary is complete and ready for your clinician.".to_string();
    if context.urgency == UrgencyLevel::Emergency {
        text.push(' ');
        text.push_str("Please do not wait for an appointment; seek emergency care now.");
    }
    text
}

fn join_list(items: &[&str]) -> String {
    join_list_with(items, "and")
}

fn join_list_with(items: &[&str], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} {conjunction} {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CausalContext, ClinicalSignificance, EntityId};
    use crate::pipeline::safety::{TriggerSignal, TriggerSource};

    fn assessment(level: UrgencyLevel) -> RiskAssessment {
        RiskAssessment {
            urgency: level,
            turn_level: level,
            triggers: if level == UrgencyLevel::Routine {
                vec![]
            } else {
                vec![TriggerSignal {
                    source: TriggerSource::RedFlag,
                    rule_id: "RF-001".into(),
                    description: "Crushing chest pain".into(),
                    level,
                }]
            },
            escalated: level != UrgencyLevel::Routine,
        }
    }

    fn hypothesis(condition: &str, id: &str, probability: f32, matched: &[&str]) -> ClinicalHypothesis {
        ClinicalHypothesis {
            condition: condition.into(),
            syndrome_id: id.into(),
            probability,
            significance: ClinicalSignificance::Emergency,
            supporting_entities: vec![],
            supporting_relationships: vec![],
            matched_findings: matched.iter().map(|s| s.to_string()).collect(),
            recommended_next_step: String::new(),
            rank_score: probability,
        }
    }

    fn inputs<'a>(
        stage: InterviewStage,
        transition: Transition,
        assessment: &'a RiskAssessment,
        context: &'a MedicalContext,
        relationships: &'a [CausalRelationship],
    ) -> ResponseInputs<'a> {
        ResponseInputs {
            stage,
            transition,
            assessment,
            context,
            turn_entities: &[],
            turn_relationships: relationships,
            turn_hpi: &[],
            degraded: false,
        }
    }

    #[test]
    fn emergency_advice_leads() {
        let a = assessment(UrgencyLevel::Emergency);
        let ctx = MedicalContext::new();
        let r = compose(&inputs(
            InterviewStage::RiskAssessment,
            Transition::EmergencyJump,
            &a,
            &ctx,
            &[],
        ));
        assert!(r.text.starts_with(EMERGENCY_MESSAGE));
        assert!(r.text.contains("Crushing chest pain"));
    }

    #[test]
    fn relationships_are_echoed_back() {
        let a = assessment(UrgencyLevel::Routine);
        let ctx = MedicalContext::new();
        let rels = vec![CausalRelationship {
            cause: EntityId(0),
            effect: EntityId(1),
            context: CausalContext::Associative,
            mechanism: "Abdominal pain with vomiting suggests a gastrointestinal process".into(),
            confidence: 0.7,
            significance: ClinicalSignificance::Moderate,
        }];
        let r = compose(&inputs(
            InterviewStage::HistoryPresentIllness,
            Transition::Advance(InterviewStage::HistoryPresentIllness),
            &a,
            &ctx,
            &rels,
        ));
        assert!(r.text.contains("gastrointestinal process"));
        assert!(!r.next_questions.is_empty());
    }

    #[test]
    fn location_and_modifiers_echoed_without_symptom() {
        let a = assessment(UrgencyLevel::Routine);
        let mut ctx = MedicalContext::new();
        ctx.hpi.record(HpiField::Location, "left knee");
        let hpi = vec![
            (HpiField::Duration, "since yesterday".to_string()),
            (HpiField::Onset, "yesterday".to_string()),
            (HpiField::Location, "left knee".to_string()),
            (HpiField::ModifyingFactors, "worse with stairs".to_string()),
        ];
        let r = compose(&ResponseInputs {
            turn_hpi: &hpi,
            ..inputs(InterviewStage::ChiefComplaint, Transition::Stay, &a, &ctx, &[])
        });
        assert!(r
            .text
            .contains("You mentioned your left knee, since yesterday and worse with stairs."));
        assert!(r.next_questions[0].starts_with("What is bothering you about your left knee?"));
    }

    #[test]
    fn chief_complaint_question_is_generic_without_findings() {
        let qs = questions_for(InterviewStage::ChiefComplaint, &MedicalContext::new());
        assert_eq!(qs, vec!["What is the main symptom or problem bothering you today?"]);
    }

    #[test]
    fn hpi_questions_follow_missing_fields() {
        let mut ctx = MedicalContext::new();
        ctx.hpi.record(HpiField::Onset, "yesterday");
        let qs = questions_for(InterviewStage::HistoryPresentIllness, &ctx);
        assert_eq!(qs.len(), HPI_QUESTIONS_PER_TURN);
        assert_eq!(qs[0], HpiField::Location.question());
    }

    #[test]
    fn leading_hypothesis_drives_follow_up() {
        let mut ctx = MedicalContext::new();
        ctx.hypotheses
            .push(hypothesis("Acute coronary syndrome", "SYN-ACS", 0.5, &["chest pain"]));
        let q = hypothesis_follow_up(&ctx);
        assert_eq!(q.as_deref(), Some("Have you also had any shortness of breath?"));

        ctx.negated_findings.push("shortness of breath".into());
        let q = hypothesis_follow_up(&ctx);
        assert_eq!(q.as_deref(), Some("Have you also had any sweating?"));
    }

    #[test]
    fn review_of_systems_skips_covered_systems() {
        let mut ctx = MedicalContext::new();
        ctx.review_of_systems.record_positive("constitutional", "fever");
        ctx.review_of_systems.record_negative("respiratory", "cough");
        let q = review_of_systems_question(&ctx);
        assert!(q.contains("chest pain"));
        assert!(!q.contains("fever"));
        assert!(!q.contains("cough"));
    }

    #[test]
    fn differential_never_claims_a_diagnosis() {
        let text = differential_summary(&[
            hypothesis("Migraine", "SYN-MIG", 0.6, &[]),
            hypothesis("Tension headache", "SYN-TTH", 0.4, &[]),
        ]);
        assert!(text.contains("migraine or tension headache"));
        assert!(text.contains("not a diagnosis"));
    }

    #[test]
    fn list_joining() {
        assert_eq!(join_list(&["a"]), "a");
        assert_eq!(join_list(&["a", "b"]), "a and b");
        assert_eq!(join_list(&["a", "b", "c"]), "a, b and c");
    }
}
