use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use super::enums::{str_enum, ClinicalSignificance};

str_enum!(
    /// Context class in which a causal relationship was detected.
    CausalContext {
        Positional => "positional",
        Exertional => "exertional",
        Dietary => "dietary",
        Temporal => "temporal",
        Associative => "associative",
    }
);

/// A detected cause → effect link between two entities of the same session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalRelationship {
    pub cause: EntityId,
    pub effect: EntityId,
    pub context: CausalContext,
    pub mechanism: String,
    pub confidence: f32,
    pub significance: ClinicalSignificance,
}

impl CausalRelationship {
    pub fn involves(&self, id: EntityId) -> bool {
        self.cause == id || self.effect == id
    }
}

/// A ranked, evidence-backed candidate explanation. Never a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalHypothesis {
    pub condition: String,
    pub syndrome_id: String,
    pub probability: f32,
    pub significance: ClinicalSignificance,
    pub supporting_entities: Vec<EntityId>,
    /// Indices into the session's relationship list.
    pub supporting_relationships: Vec<usize>,
    pub matched_findings: Vec<String>,
    pub recommended_next_step: String,
    /// probability × significance weight; the ranking key.
    pub rank_score: f32,
}
