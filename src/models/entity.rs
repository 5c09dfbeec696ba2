use serde::{Deserialize, Serialize};

use super::enums::{str_enum, ClinicalSignificance};

/// Index of an entity within a session.
///
/// Ids are allocated from the session's running entity count, so an id minted
/// in a turn arena stays valid once the arena is merged into the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub usize);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identifier of a pattern in the static entity pattern library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub u16);

/// Byte span of the text an entity was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl SourceSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn overlaps(&self, other: &SourceSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

str_enum!(
    Laterality {
        Left => "left",
        Right => "right",
        Bilateral => "bilateral",
        Central => "central",
        Unspecified => "unspecified",
    }
);

str_enum!(
    /// Which HPI dimension a quality descriptor speaks to.
    QualityDimension {
        Character => "character",
        Severity => "severity",
        Onset => "onset",
        FunctionalImpact => "functional_impact",
    }
);

str_enum!(
    /// Context class of a trigger, which selects the causal heuristics applied to it.
    TriggerType {
        Positional => "positional",
        Exertional => "exertional",
        Dietary => "dietary",
        Temporal => "temporal",
        Emotional => "emotional",
        Environmental => "environmental",
        Relieving => "relieving",
    }
);

impl TriggerType {
    /// Generic evidence label used by syndrome matching.
    pub fn evidence_label(&self) -> &'static str {
        match self {
            Self::Positional => "position change",
            Self::Exertional => "exertion",
            Self::Dietary => "food intake",
            Self::Temporal => "time of day",
            Self::Emotional => "stress",
            Self::Environmental => "environmental exposure",
            Self::Relieving => "relief",
        }
    }
}

/// The closed set of entity kinds the extractor can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    Anatomical {
        location: String,
        laterality: Laterality,
        radiation: Option<String>,
    },
    Quality {
        descriptor: String,
        dimension: QualityDimension,
        onset: Option<String>,
        functional_impact: Option<String>,
    },
    AssociatedSymptom {
        symptom: String,
        /// Likelihood the symptom is actually present, lowered by hedging.
        probability: f32,
        /// How much this symptom alone pushes towards escalation, in [0, 1].
        urgency_contribution: f32,
        /// Head of a symptom cluster (or a lone symptom) rather than an associated one.
        primary: bool,
        body_site: Option<String>,
    },
    Frequency {
        pattern: String,
        circadian_correlation: Option<String>,
    },
    TriggerContext {
        trigger_type: TriggerType,
        factor: String,
    },
}

/// A single uncertainty contribution detected around an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyFactor {
    pub marker: String,
    /// Always non-negative; subtracted from the entity's confidence.
    pub penalty: f32,
}

/// An extracted medical entity. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub confidence: f32,
    pub span: SourceSpan,
    pub pattern_id: PatternId,
    pub significance: ClinicalSignificance,
    pub uncertainty: Vec<UncertaintyFactor>,
}

impl Entity {
    /// Primary human-readable label.
    pub fn label(&self) -> &str {
        match &self.kind {
            EntityKind::Anatomical { location, .. } => location,
            EntityKind::Quality { descriptor, .. } => descriptor,
            EntityKind::AssociatedSymptom { symptom, .. } => symptom,
            EntityKind::Frequency { pattern, .. } => pattern,
            EntityKind::TriggerContext { factor, .. } => factor,
        }
    }

    /// Every label this entity contributes as syndrome evidence.
    pub fn evidence_labels(&self) -> Vec<&str> {
        match &self.kind {
            EntityKind::Anatomical {
                location,
                radiation,
                ..
            } => {
                let mut labels = vec![location.as_str()];
                if let Some(r) = radiation {
                    labels.push(r.as_str());
                    labels.push("radiating");
                }
                labels
            }
            EntityKind::Quality {
                descriptor, onset, ..
            } => {
                let mut labels = vec![descriptor.as_str()];
                if let Some(o) = onset {
                    labels.push(o.as_str());
                }
                labels
            }
            EntityKind::AssociatedSymptom {
                symptom, body_site, ..
            } => {
                let mut labels = vec![symptom.as_str()];
                if let Some(site) = body_site {
                    labels.push(site.as_str());
                }
                labels
            }
            EntityKind::Frequency {
                pattern,
                circadian_correlation,
            } => {
                let mut labels = vec![pattern.as_str()];
                if let Some(c) = circadian_correlation {
                    labels.push(c.as_str());
                }
                labels
            }
            EntityKind::TriggerContext {
                trigger_type,
                factor,
            } => vec![factor.as_str(), trigger_type.evidence_label()],
        }
    }

    pub fn is_symptom(&self) -> bool {
        matches!(self.kind, EntityKind::AssociatedSymptom { .. })
    }

    pub fn symptom_name(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::AssociatedSymptom { symptom, .. } => Some(symptom),
            _ => None,
        }
    }

    /// Body site implied by the entity, if any.
    pub fn body_site(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Anatomical { location, .. } => Some(location),
            EntityKind::AssociatedSymptom { body_site, .. } => body_site.as_deref(),
            _ => None,
        }
    }

    pub fn trigger_type(&self) -> Option<TriggerType> {
        match &self.kind {
            EntityKind::TriggerContext { trigger_type, .. } => Some(*trigger_type),
            _ => None,
        }
    }

    /// Sum of uncertainty penalties applied to this entity.
    pub fn uncertainty_penalty(&self) -> f32 {
        self.uncertainty.iter().map(|f| f.penalty).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symptom(name: &str, site: Option<&str>) -> Entity {
        Entity {
            id: EntityId(0),
            kind: EntityKind::AssociatedSymptom {
                symptom: name.into(),
                probability: 0.9,
                urgency_contribution: 0.2,
                primary: true,
                body_site: site.map(String::from),
            },
            confidence: 0.8,
            span: SourceSpan {
                start: 0,
                end: name.len(),
                text: name.into(),
            },
            pattern_id: PatternId(1),
            significance: ClinicalSignificance::Moderate,
            uncertainty: vec![],
        }
    }

    #[test]
    fn evidence_labels_include_body_site() {
        let e = symptom("chest pain", Some("chest"));
        assert_eq!(e.evidence_labels(), vec!["chest pain", "chest"]);
        assert_eq!(e.body_site(), Some("chest"));
        assert!(e.is_symptom());
    }

    #[test]
    fn trigger_labels_include_context_class() {
        let e = Entity {
            kind: EntityKind::TriggerContext {
                trigger_type: TriggerType::Exertional,
                factor: "climbing stairs".into(),
            },
            ..symptom("x", None)
        };
        assert_eq!(e.evidence_labels(), vec!["climbing stairs", "exertion"]);
        assert_eq!(e.trigger_type(), Some(TriggerType::Exertional));
    }

    #[test]
    fn spans_overlap() {
        let a = SourceSpan { start: 0, end: 5, text: "aaaaa".into() };
        let b = SourceSpan { start: 4, end: 8, text: "bbbb".into() };
        let c = SourceSpan { start: 5, end: 8, text: "ccc".into() };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn entity_kind_serializes_tagged() {
        let e = symptom("vomiting", None);
        let json = serde_json::to_value(&e.kind).unwrap();
        assert_eq!(json["type"], "associated_symptom");
        assert_eq!(json["symptom"], "vomiting");
    }

    #[test]
    fn laterality_parses_outside_enums_module() {
        use std::str::FromStr;
        assert_eq!(Laterality::from_str("left").unwrap(), Laterality::Left);
        assert_eq!(TriggerType::from_str("dietary").unwrap(), TriggerType::Dietary);
        let err = Laterality::from_str("sideways").unwrap_err();
        assert!(err.to_string().contains("Laterality"));
    }
}
