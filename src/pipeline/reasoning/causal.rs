//! Heuristic cause → effect detection between entities.

use crate::models::{
    CausalContext, CausalRelationship, ClinicalSignificance as Sig, Entity, EntityId, EntityKind,
    PatientDemographics, TriggerType,
};
use crate::pipeline::arena::EvidenceView;
use crate::pipeline::extraction::cluster::SymptomCluster;

/// Age from which exertional symptoms are weighted as cardiac risk.
const CARDIAC_RISK_AGE: u32 = 40;

/// Co-reported symptom pairs with a known clinical reading, order-insensitive.
struct KnownPair {
    a: &'static str,
    b: &'static str,
    mechanism: &'static str,
    significance: Sig,
}

static KNOWN_PAIRS: &[KnownPair] = &[
    KnownPair {
        a: "chest pain",
        b: "shortness of breath",
        mechanism: "Chest pain with breathlessness points to a cardiopulmonary process",
        significance: Sig::Urgent,
    },
    KnownPair {
        a: "chest pain",
        b: "sweating",
        mechanism: "Chest pain with sweating is an autonomic response typical of cardiac ischaemia",
        significance: Sig::Urgent,
    },
    KnownPair {
        a: "fever",
        b: "neck stiffness",
        mechanism: "Fever with neck stiffness is a meningeal irritation pattern",
        significance: Sig::Emergency,
    },
    KnownPair {
        a: "fever",
        b: "non-blanching rash",
        mechanism: "Fever with a non-blanching rash suggests meningococcal septicaemia",
        significance: Sig::Emergency,
    },
    KnownPair {
        a: "hives",
        b: "throat swelling",
        mechanism: "Hives with throat swelling indicates a systemic allergic reaction",
        significance: Sig::Emergency,
    },
    KnownPair {
        a: "headache",
        b: "neck stiffness",
        mechanism: "Headache with neck stiffness raises concern for meningeal involvement",
        significance: Sig::Urgent,
    },
    KnownPair {
        a: "shortness of breath",
        b: "wheezing",
        mechanism: "Breathlessness with wheeze indicates airway narrowing",
        significance: Sig::Urgent,
    },
    KnownPair {
        a: "abdominal pain",
        b: "vomiting",
        mechanism: "Abdominal pain with vomiting suggests a gastrointestinal process",
        significance: Sig::Moderate,
    },
    KnownPair {
        a: "diarrhea",
        b: "vomiting",
        mechanism: "Vomiting with diarrhoea is typical of gastroenteritis",
        significance: Sig::Moderate,
    },
    KnownPair {
        a: "fever",
        b: "chills",
        mechanism: "Fever with chills indicates a systemic inflammatory response",
        significance: Sig::Moderate,
    },
    KnownPair {
        a: "headache",
        b: "nausea",
        mechanism: "Headache with nausea is common in migraine",
        significance: Sig::Low,
    },
    KnownPair {
        a: "nausea",
        b: "vomiting",
        mechanism: "Nausea progressing to vomiting",
        significance: Sig::Low,
    },
    KnownPair {
        a: "cough",
        b: "sore throat",
        mechanism: "Cough with sore throat is typical of upper airway infection",
        significance: Sig::Low,
    },
];

/// Inputs shared by every heuristic.
pub struct CausalInputs<'a> {
    pub view: EvidenceView<'a>,
    pub clusters: &'a [SymptomCluster],
    pub demographics: Option<&'a PatientDemographics>,
    /// The patient is explicitly describing triggers this turn.
    pub trigger_intent: bool,
}

/// Relationship candidates for this turn. Validation (both ends exist, no
/// duplicates) happens when they are pushed into the arena.
pub fn detect(inputs: &CausalInputs<'_>) -> Vec<CausalRelationship> {
    let view = inputs.view;
    let turn = view.turn_entities();
    let stress = view
        .entities()
        .any(|e| e.trigger_type() == Some(TriggerType::Emotional));
    let rest_relief = view.entities().any(|e| {
        matches!(
            &e.kind,
            EntityKind::TriggerContext {
                trigger_type: TriggerType::Relieving,
                factor,
            } if factor.starts_with("rest") || factor.starts_with("stop") || factor.starts_with("sit")
        )
    });
    let older = inputs
        .demographics
        .and_then(|d| d.age_years)
        .is_some_and(|age| age >= CARDIAC_RISK_AGE);
    let intent_bonus = if inputs.trigger_intent { 0.05 } else { 0.0 };

    let mut out = Vec::new();

    for cause in turn {
        let Some(effect) = target_symptom(&view, cause) else {
            continue;
        };
        let relationship = match &cause.kind {
            EntityKind::TriggerContext {
                trigger_type,
                factor,
            } => trigger_relationship(
                *trigger_type,
                factor,
                cause.id,
                effect,
                TriggerFlags {
                    stress,
                    rest_relief,
                    older,
                },
            ),
            EntityKind::Frequency {
                circadian_correlation: Some(when),
                ..
            } => Some(CausalRelationship {
                cause: cause.id,
                effect: effect.id,
                context: CausalContext::Temporal,
                mechanism: format!(
                    "{} recurs in the {when}, suggesting a diurnal pattern",
                    capitalize(effect.label())
                ),
                confidence: 0.5,
                significance: Sig::Low,
            }),
            _ => None,
        };
        if let Some(mut rel) = relationship {
            rel.confidence = (rel.confidence + intent_bonus).clamp(0.0, 0.95);
            out.push(rel);
        }
    }

    for cluster in inputs.clusters {
        let Some(primary) = view.get(cluster.primary) else {
            continue;
        };
        for id in &cluster.associated {
            let Some(associated) = view.get(*id) else {
                continue;
            };
            out.push(associative(primary, associated, &cluster.connector));
        }
    }

    out
}

#[derive(Clone, Copy)]
struct TriggerFlags {
    stress: bool,
    rest_relief: bool,
    older: bool,
}

fn trigger_relationship(
    trigger_type: TriggerType,
    factor: &str,
    cause: EntityId,
    effect: &Entity,
    flags: TriggerFlags,
) -> Option<CausalRelationship> {
    let symptom = effect.label();
    let chest = is_chest(effect);

    let (context, mechanism, confidence, significance) = match trigger_type {
        TriggerType::Positional => {
            let orthostatic = matches!(symptom, "lightheadedness" | "syncope" | "vertigo");
            let mechanism = if orthostatic {
                format!("{} on {factor} suggests an orthostatic (blood pressure) component", capitalize(symptom))
            } else {
                format!("{} changes with {factor}, suggesting a postural or mechanical cause", capitalize(symptom))
            };
            let significance = if orthostatic { Sig::Moderate } else { Sig::Low };
            (CausalContext::Positional, mechanism, 0.6, significance)
        }
        TriggerType::Exertional => {
            let mut confidence = 0.55;
            if chest {
                confidence += 0.15;
            }
            if flags.older {
                confidence += 0.1;
            }
            if flags.rest_relief {
                confidence += 0.1;
            }
            let (mechanism, significance) = if chest {
                (
                    format!(
                        "{} brought on by {factor}{} fits an exertional cardiac pattern",
                        capitalize(symptom),
                        if flags.rest_relief { " and relieved by rest" } else { "" }
                    ),
                    Sig::Urgent,
                )
            } else {
                (
                    format!("{} is provoked by {factor}, suggesting limited exercise tolerance", capitalize(symptom)),
                    Sig::Moderate,
                )
            };
            (CausalContext::Exertional, mechanism, confidence, significance)
        }
        TriggerType::Dietary => {
            let gastric = matches!(
                symptom,
                "abdominal pain" | "epigastric pain" | "heartburn" | "nausea" | "bloating"
            );
            let mut mechanism = format!("{} follows {factor}, suggesting a digestive trigger", capitalize(symptom));
            let mut confidence = if gastric { 0.6 } else { 0.45 };
            if flags.stress {
                mechanism.push_str(", possibly modulated by stress");
                confidence += 0.05;
            }
            let significance = if gastric { Sig::Moderate } else { Sig::Low };
            (CausalContext::Dietary, mechanism, confidence, significance)
        }
        TriggerType::Environmental => {
            let allergic = matches!(
                symptom,
                "throat swelling" | "hives" | "shortness of breath" | "wheezing" | "rash"
            );
            let significance = match symptom {
                "throat swelling" => Sig::Emergency,
                _ if allergic => Sig::Urgent,
                _ => Sig::Low,
            };
            (
                CausalContext::Associative,
                format!("{} followed exposure to {factor}", capitalize(symptom)),
                if allergic { 0.65 } else { 0.45 },
                significance,
            )
        }
        TriggerType::Relieving => {
            let context = if factor.starts_with("rest") || factor.starts_with("stop") {
                CausalContext::Exertional
            } else if factor.starts_with("sit") || factor.starts_with("lie") || factor.starts_with("lying") {
                CausalContext::Positional
            } else if factor.starts_with("antacid") {
                CausalContext::Dietary
            } else {
                CausalContext::Associative
            };
            let significance = if chest && context == CausalContext::Exertional {
                Sig::Urgent
            } else {
                Sig::Low
            };
            (
                context,
                format!("{} eases with {factor}", capitalize(symptom)),
                0.5,
                significance,
            )
        }
        TriggerType::Temporal => (
            CausalContext::Temporal,
            format!("{} is tied to {factor}", capitalize(symptom)),
            0.5,
            Sig::Low,
        ),
        // Stress modulates other relationships rather than standing alone.
        TriggerType::Emotional => return None,
    };

    Some(CausalRelationship {
        cause,
        effect: effect.id,
        context,
        mechanism,
        confidence,
        significance,
    })
}

fn associative(primary: &Entity, associated: &Entity, connector: &str) -> CausalRelationship {
    let (a, b) = (primary.label(), associated.label());
    let known = KNOWN_PAIRS
        .iter()
        .find(|p| (p.a == a && p.b == b) || (p.a == b && p.b == a));
    match known {
        Some(pair) => CausalRelationship {
            cause: primary.id,
            effect: associated.id,
            context: CausalContext::Associative,
            mechanism: pair.mechanism.to_string(),
            confidence: 0.7,
            significance: pair.significance,
        },
        None => CausalRelationship {
            cause: primary.id,
            effect: associated.id,
            context: CausalContext::Associative,
            mechanism: format!("{} reported {connector} {b}", capitalize(a)),
            confidence: 0.5,
            significance: primary.significance.max(associated.significance),
        },
    }
}

/// The symptom a trigger or timing entity most plausibly refers to: the
/// nearest symptom in this turn, else the latest primary symptom of the session.
fn target_symptom<'a>(view: &EvidenceView<'a>, cause: &Entity) -> Option<&'a Entity> {
    let nearest = view
        .turn_entities()
        .iter()
        .filter(|e| e.is_symptom())
        .min_by_key(|e| span_distance(e, cause));
    nearest.or_else(|| {
        view.context.entities.iter().rev().find(|e| {
            matches!(
                e.kind,
                EntityKind::AssociatedSymptom { primary: true, .. }
            )
        })
    })
}

fn span_distance(a: &Entity, b: &Entity) -> usize {
    if a.span.end <= b.span.start {
        b.span.start - a.span.end
    } else {
        a.span.start.saturating_sub(b.span.end)
    }
}

fn is_chest(entity: &Entity) -> bool {
    entity.body_site() == Some("chest") || entity.label().contains("chest")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MedicalContext, PatternId, SourceSpan};
    use crate::pipeline::arena::TurnArena;

    fn entity(id: EntityId, kind: EntityKind, start: usize, significance: Sig) -> Entity {
        Entity {
            id,
            kind,
            confidence: 0.8,
            span: SourceSpan {
                start,
                end: start + 5,
                text: "xxxxx".into(),
            },
            pattern_id: PatternId(0),
            significance,
            uncertainty: vec![],
        }
    }

    fn symptom(name: &str, site: Option<&str>) -> EntityKind {
        EntityKind::AssociatedSymptom {
            symptom: name.into(),
            probability: 0.9,
            urgency_contribution: 0.5,
            primary: true,
            body_site: site.map(String::from),
        }
    }

    fn trigger(trigger_type: TriggerType, factor: &str) -> EntityKind {
        EntityKind::TriggerContext {
            trigger_type,
            factor: factor.into(),
        }
    }

    fn run(arena: &TurnArena, ctx: &MedicalContext, age: Option<u32>) -> Vec<CausalRelationship> {
        let demographics = PatientDemographics {
            age_years: age,
            ..Default::default()
        };
        detect(&CausalInputs {
            view: EvidenceView::new(ctx, arena),
            clusters: &[],
            demographics: Some(&demographics),
            trigger_intent: false,
        })
    }

    #[test]
    fn exertional_chest_pain_weighted_by_age_and_rest() {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        arena.alloc(|id| entity(id, symptom("chest pain", Some("chest")), 0, Sig::Urgent));
        arena.alloc(|id| entity(id, trigger(TriggerType::Exertional, "climbing stairs"), 20, Sig::Moderate));

        let young = run(&arena, &ctx, Some(25));
        assert_eq!(young.len(), 1);
        assert_eq!(young[0].context, CausalContext::Exertional);
        assert_eq!(young[0].significance, Sig::Urgent);

        let older = run(&arena, &ctx, Some(58));
        assert!(older[0].confidence > young[0].confidence);

        arena.alloc(|id| entity(id, trigger(TriggerType::Relieving, "rest"), 40, Sig::Low));
        let relieved = run(&arena, &ctx, Some(58));
        let exertional = relieved
            .iter()
            .find(|r| r.mechanism.contains("relieved by rest"))
            .unwrap();
        assert!(exertional.confidence > older[0].confidence);
    }

    #[test]
    fn positional_dizziness_is_orthostatic() {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        arena.alloc(|id| entity(id, symptom("lightheadedness", Some("head")), 0, Sig::Moderate));
        arena.alloc(|id| entity(id, trigger(TriggerType::Positional, "standing up"), 10, Sig::Low));
        let rels = run(&arena, &ctx, None);
        assert_eq!(rels[0].context, CausalContext::Positional);
        assert!(rels[0].mechanism.contains("orthostatic"));
    }

    #[test]
    fn dietary_is_stress_modulated() {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        arena.alloc(|id| entity(id, symptom("epigastric pain", Some("upper abdomen")), 0, Sig::Moderate));
        arena.alloc(|id| entity(id, trigger(TriggerType::Dietary, "eating"), 10, Sig::Low));
        let plain = run(&arena, &ctx, None);
        arena.alloc(|id| entity(id, trigger(TriggerType::Emotional, "stressed"), 30, Sig::Low));
        let stressed = run(&arena, &ctx, None);
        assert_eq!(stressed.len(), 1);
        assert!(stressed[0].mechanism.contains("stress"));
        assert!(stressed[0].confidence > plain[0].confidence);
    }

    #[test]
    fn trigger_attaches_to_prior_symptom() {
        let mut ctx = MedicalContext::new();
        let mut first = TurnArena::for_context(&ctx);
        first.alloc(|id| entity(id, symptom("headache", Some("head")), 0, Sig::Moderate));
        first.merge_into(&mut ctx);

        let mut arena = TurnArena::for_context(&ctx);
        arena.alloc(|id| entity(id, EntityKind::Frequency {
            pattern: "recurring".into(),
            circadian_correlation: Some("morning".into()),
        }, 0, Sig::Low));
        let rels = run(&arena, &ctx, None);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].effect, EntityId(0));
        assert_eq!(rels[0].context, CausalContext::Temporal);
    }

    #[test]
    fn clusters_become_associative_links() {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        let a = arena.alloc(|id| entity(id, symptom("abdominal pain", Some("abdomen")), 0, Sig::Moderate));
        let b = arena.alloc(|id| entity(id, symptom("vomiting", None), 19, Sig::Moderate));
        let clusters = vec![SymptomCluster {
            primary: a,
            associated: vec![b],
            connector: "and".into(),
        }];
        let rels = detect(&CausalInputs {
            view: EvidenceView::new(&ctx, &arena),
            clusters: &clusters,
            demographics: None,
            trigger_intent: false,
        });
        assert_eq!(rels.len(), 1);
        assert_eq!((rels[0].cause, rels[0].effect), (a, b));
        assert_eq!(rels[0].context, CausalContext::Associative);
        assert!(rels[0].mechanism.contains("gastrointestinal"));
    }

    #[test]
    fn confidences_within_bounds() {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        arena.alloc(|id| entity(id, symptom("chest pain", Some("chest")), 0, Sig::Urgent));
        arena.alloc(|id| entity(id, trigger(TriggerType::Exertional, "running"), 10, Sig::Moderate));
        arena.alloc(|id| entity(id, trigger(TriggerType::Relieving, "rest"), 20, Sig::Low));
        let rels = detect(&CausalInputs {
            view: EvidenceView::new(&ctx, &arena),
            clusters: &[],
            demographics: Some(&PatientDemographics {
                age_years: Some(70),
                ..Default::default()
            }),
            trigger_intent: true,
        });
        assert!(rels.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
    }
}
