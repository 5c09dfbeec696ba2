//! Stage transition table.

use serde::{Deserialize, Serialize};

use crate::models::{InterviewStage, MedicalContext};

/// What a turn did to the interview stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "to", rename_all = "snake_case")]
pub enum Transition {
    /// Required information for the stage is still missing.
    Stay,
    Advance(InterviewStage),
    /// Emergency override: straight to risk assessment.
    EmergencyJump,
    Complete,
}

impl Transition {
    /// Stage the session is in after applying this transition to `from`.
    pub fn target(&self, from: InterviewStage) -> InterviewStage {
        match self {
            Self::Stay => from,
            Self::Advance(to) => *to,
            Self::EmergencyJump => InterviewStage::RiskAssessment,
            Self::Complete => InterviewStage::Completed,
        }
    }
}

/// Per-turn facts the table looks at besides the stage itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnFacts {
    /// This turn's own verdict (not the running level) was Emergency.
    pub emergency: bool,
    /// The patient asked to stop.
    pub end_requested: bool,
    /// The message had any content after sanitization.
    pub has_text: bool,
}

/// Whether `stage` has what it needs to move on.
pub fn is_complete(
    stage: InterviewStage,
    context: &MedicalContext,
    facts: &TurnFacts,
    hpi_required: usize,
) -> bool {
    use InterviewStage::*;
    let history = &context.history;
    match stage {
        Greeting => facts.has_text,
        ChiefComplaint => context.has_symptom(),
        HistoryPresentIllness => context.hpi.filled_count() >= hpi_required,
        ReviewOfSystems => context.review_of_systems.answered,
        PastMedicalHistory => !history.past_medical_history.is_empty(),
        MedicationsAllergies => !history.medications.is_empty() || !history.allergies.is_empty(),
        SocialFamilyHistory => {
            !history.social_history.is_empty() || !history.family_history.is_empty()
        }
        RiskAssessment | DifferentialDiagnosis => facts.has_text,
        Completed => true,
    }
}

/// Decide the transition for a turn taken at `stage`.
///
/// `complete` is asked about the current stage and, when advancing, about
/// each following content-driven stage, so a first message that already names
/// a symptom and enough HPI detail moves several stages at once.
pub fn decide(
    stage: InterviewStage,
    facts: &TurnFacts,
    complete: impl Fn(InterviewStage) -> bool,
) -> Transition {
    use InterviewStage::*;
    match stage {
        Completed => Transition::Stay,
        s if facts.emergency && s < RiskAssessment => Transition::EmergencyJump,
        RiskAssessment | DifferentialDiagnosis if facts.emergency => Transition::Complete,
        s if facts.end_requested && s > ChiefComplaint => Transition::Complete,
        s if complete(s) => {
            let mut next = s.next();
            while next.is_content_driven() && complete(next) {
                next = next.next();
            }
            if next.is_terminal() {
                Transition::Complete
            } else {
                Transition::Advance(next)
            }
        }
        _ => Transition::Stay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InterviewStage::*;

    fn facts(emergency: bool, end_requested: bool) -> TurnFacts {
        TurnFacts {
            emergency,
            end_requested,
            has_text: true,
        }
    }

    #[test]
    fn incomplete_stage_stays() {
        let t = decide(ChiefComplaint, &facts(false, false), |_| false);
        assert_eq!(t, Transition::Stay);
        assert_eq!(t.target(ChiefComplaint), ChiefComplaint);
    }

    #[test]
    fn advances_one_stage_when_next_is_not_content_driven() {
        let t = decide(ReviewOfSystems, &facts(false, false), |_| true);
        assert_eq!(t, Transition::Advance(PastMedicalHistory));
    }

    #[test]
    fn cascades_through_content_driven_stages_only() {
        let t = decide(Greeting, &facts(false, false), |_| true);
        assert_eq!(t, Transition::Advance(ReviewOfSystems));

        let t = decide(Greeting, &facts(false, false), |s| s != HistoryPresentIllness);
        assert_eq!(t, Transition::Advance(HistoryPresentIllness));
    }

    #[test]
    fn emergency_jumps_to_risk_assessment() {
        for stage in [Greeting, ChiefComplaint, HistoryPresentIllness, SocialFamilyHistory] {
            let t = decide(stage, &facts(true, false), |_| false);
            assert_eq!(t, Transition::EmergencyJump);
            assert_eq!(t.target(stage), RiskAssessment);
        }
    }

    #[test]
    fn second_emergency_turn_completes() {
        assert_eq!(decide(RiskAssessment, &facts(true, false), |_| false), Transition::Complete);
    }

    #[test]
    fn end_conversation_only_after_chief_complaint() {
        assert_eq!(decide(Greeting, &facts(false, true), |_| false), Transition::Stay);
        assert_eq!(decide(ChiefComplaint, &facts(false, true), |_| false), Transition::Stay);
        assert_eq!(
            decide(HistoryPresentIllness, &facts(false, true), |_| false),
            Transition::Complete
        );
    }

    #[test]
    fn greeting_never_reaches_completed_without_emergency() {
        for end_requested in [false, true] {
            let t = decide(Greeting, &facts(false, end_requested), |_| true);
            assert_ne!(t.target(Greeting), Completed);
        }
    }

    #[test]
    fn differential_reply_completes() {
        assert_eq!(decide(DifferentialDiagnosis, &facts(false, false), |_| true), Transition::Complete);
    }

    #[test]
    fn completed_is_terminal() {
        assert_eq!(decide(Completed, &facts(true, true), |_| true), Transition::Stay);
    }

    #[test]
    fn completeness_rules() {
        let mut ctx = MedicalContext::new();
        let f = facts(false, false);
        assert!(is_complete(Greeting, &ctx, &f, 4));
        assert!(!is_complete(Greeting, &ctx, &TurnFacts::default(), 4));
        assert!(!is_complete(ChiefComplaint, &ctx, &f, 4));
        assert!(!is_complete(ReviewOfSystems, &ctx, &f, 4));

        ctx.review_of_systems.answered = true;
        assert!(is_complete(ReviewOfSystems, &ctx, &f, 4));

        assert!(!is_complete(MedicationsAllergies, &ctx, &f, 4));
        ctx.history.allergies.push("penicillin".into());
        assert!(is_complete(MedicationsAllergies, &ctx, &f, 4));

        use crate::models::HpiField;
        ctx.hpi.record(HpiField::Onset, "yesterday");
        ctx.hpi.record(HpiField::Duration, "two days");
        assert!(!is_complete(HistoryPresentIllness, &ctx, &f, 4));
        assert!(is_complete(HistoryPresentIllness, &ctx, &f, 2));
    }
}
