//! Context-aware reasoning: causal relationships, syndrome matching and
//! hypothesis ranking over the session's accumulated evidence.

pub mod causal;
pub mod syndromes;

use std::collections::BTreeSet;

use super::arena::{EvidenceView, TurnArena};
use super::extraction::ExtractionResult;
use super::intent::{has_intent, ClassifiedIntent, IntentKind};
use crate::models::{ClinicalHypothesis, MedicalContext, PatientDemographics};
use causal::CausalInputs;
pub use syndromes::{match_syndromes, Syndrome, SyndromeMatch, SYNDROMES};

/// Syndromes at or below this probability are not offered as hypotheses.
pub const HYPOTHESIS_THRESHOLD: f32 = 0.2;
const RELATIONSHIP_BOOST: f32 = 0.05;
const MAX_RELATIONSHIP_BOOST: f32 = 0.15;
const HYPOTHESIS_CEILING: f32 = 0.95;

#[derive(Debug, Clone, Default)]
pub struct ReasoningOutcome {
    /// Every syndrome with at least one matched member, highest probability first.
    pub syndromes: Vec<SyndromeMatch>,
    /// Ranked by `rank_score`.
    pub hypotheses: Vec<ClinicalHypothesis>,
    pub contextual_significance: f32,
    pub relationships_added: usize,
}

/// Detect relationships for this turn (recorded in `arena`) and re-rank the
/// session's hypotheses against all evidence so far.
pub fn reason(
    context: &MedicalContext,
    arena: &mut TurnArena,
    extraction: &ExtractionResult,
    intents: &[ClassifiedIntent],
    demographics: Option<&PatientDemographics>,
) -> ReasoningOutcome {
    let candidates = causal::detect(&CausalInputs {
        view: EvidenceView::new(context, arena),
        clusters: &extraction.clusters,
        demographics,
        trigger_intent: has_intent(intents, IntentKind::TriggerReport, 0.5),
    });
    let mut relationships_added = 0;
    for rel in candidates {
        if arena.push_relationship(rel, context) {
            relationships_added += 1;
        }
    }

    let view = EvidenceView::new(context, arena);
    let syndromes = match_syndromes(&view);
    let hypotheses = rank_hypotheses(&view, &syndromes);
    let contextual_significance = contextual_significance(&view, &syndromes);

    tracing::debug!(
        relationships_added,
        syndromes = syndromes.len(),
        hypotheses = hypotheses.len(),
        contextual_significance,
        "Reasoning pass complete"
    );

    ReasoningOutcome {
        syndromes,
        hypotheses,
        contextual_significance,
        relationships_added,
    }
}

fn rank_hypotheses(view: &EvidenceView<'_>, syndromes: &[SyndromeMatch]) -> Vec<ClinicalHypothesis> {
    let mut hypotheses: Vec<ClinicalHypothesis> = syndromes
        .iter()
        .filter(|m| m.probability > HYPOTHESIS_THRESHOLD)
        .map(|m| {
            let supporting: BTreeSet<_> = m.supporting.iter().copied().collect();
            let supporting_relationships: Vec<usize> = view
                .relationships()
                .enumerate()
                .filter(|(_, r)| supporting.contains(&r.cause) || supporting.contains(&r.effect))
                .map(|(i, _)| i)
                .collect();

            let boost = (supporting_relationships.len() as f32 * RELATIONSHIP_BOOST)
                .min(MAX_RELATIONSHIP_BOOST);
            let probability = (m.probability + boost)
                .min(HYPOTHESIS_CEILING)
                .max(m.probability)
                .clamp(0.0, 1.0);
            let significance = m.syndrome.significance;

            ClinicalHypothesis {
                condition: m.syndrome.condition.to_string(),
                syndrome_id: m.syndrome.id.to_string(),
                probability,
                significance,
                supporting_entities: m.supporting.clone(),
                supporting_relationships,
                matched_findings: m.matched.iter().map(|s| s.to_string()).collect(),
                recommended_next_step: m.syndrome.next_step.to_string(),
                rank_score: probability * significance.weight(),
            }
        })
        .collect();

    hypotheses.sort_by(|a, b| {
        b.rank_score
            .total_cmp(&a.rank_score)
            .then_with(|| b.probability.total_cmp(&a.probability))
    });
    hypotheses
}

/// 0.4 · strongest entity significance + 0.3 · strongest relationship
/// significance + 0.3 · best syndrome probability, within [0, 1].
fn contextual_significance(view: &EvidenceView<'_>, syndromes: &[SyndromeMatch]) -> f32 {
    let entity = view
        .entities()
        .map(|e| e.significance.weight())
        .fold(0.0_f32, f32::max);
    let relationship = view
        .relationships()
        .map(|r| r.significance.weight())
        .fold(0.0_f32, f32::max);
    let syndrome = syndromes
        .iter()
        .map(|m| m.probability)
        .fold(0.0_f32, f32::max);
    (0.4 * entity + 0.3 * relationship + 0.3 * syndrome).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CausalContext;
    use crate::pipeline::extraction::extract;
    use crate::pipeline::intent::classify;

    fn reason_over(text: &str, age: Option<u32>) -> (TurnArena, ReasoningOutcome) {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        let extraction = extract(text, &mut arena, 10);
        let intents = classify(text, arena.entities());
        let demographics = PatientDemographics {
            age_years: age,
            ..Default::default()
        };
        let outcome = reason(&ctx, &mut arena, &extraction, &intents, Some(&demographics));
        (arena, outcome)
    }

    #[test]
    fn cardiac_presentation_ranks_acs_first() {
        let (arena, outcome) = reason_over("crushing chest pain and shortness of breath", Some(60));
        let top = &outcome.hypotheses[0];
        assert_eq!(top.syndrome_id, "SYN-ACS");
        assert!(top.probability > 0.5);
        assert!(!top.supporting_relationships.is_empty());
        assert!(outcome.syndromes[0].meets_emergency_threshold());
        assert_eq!(arena.relationships().len(), 1);
        assert!(outcome.relationships_added >= 1);
    }

    #[test]
    fn compound_gastro_description_links_symptoms() {
        let (arena, outcome) = reason_over("abdominal pain and vomiting", None);
        assert_eq!(arena.relationships().len(), 1);
        assert_eq!(arena.relationships()[0].context, CausalContext::Associative);
        assert!(outcome
            .hypotheses
            .iter()
            .any(|h| h.syndrome_id == "SYN-GASTRO"));
    }

    #[test]
    fn hypotheses_sorted_by_rank() {
        let (_, outcome) = reason_over("crushing chest pain and shortness of breath", None);
        for pair in outcome.hypotheses.windows(2) {
            assert!(pair[0].rank_score >= pair[1].rank_score);
        }
        assert!(outcome
            .hypotheses
            .iter()
            .all(|h| h.probability > HYPOTHESIS_THRESHOLD && h.probability <= 1.0));
    }

    #[test]
    fn significance_within_unit_interval() {
        for text in [
            "",
            "mild headache",
            "crushing chest pain and shortness of breath",
            "fever and neck stiffness with a headache",
        ] {
            let (_, outcome) = reason_over(text, None);
            assert!((0.0..=1.0).contains(&outcome.contextual_significance), "{text}");
        }
        let (_, none) = reason_over("", None);
        assert_eq!(none.contextual_significance, 0.0);
        assert!(none.hypotheses.is_empty());
    }

    #[test]
    fn evidence_accumulates_across_turns() {
        let mut ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        let first = extract("I have chest pain", &mut arena, 10);
        reason(&ctx, &mut arena, &first, &[], None);
        arena.merge_into(&mut ctx);

        let mut arena = TurnArena::for_context(&ctx);
        let second = extract("and now shortness of breath too", &mut arena, 10);
        let outcome = reason(&ctx, &mut arena, &second, &[], None);
        let acs = outcome
            .syndromes
            .iter()
            .find(|m| m.syndrome.id == "SYN-ACS")
            .unwrap();
        assert!((acs.probability - 0.5).abs() < 1e-4);
    }
}
