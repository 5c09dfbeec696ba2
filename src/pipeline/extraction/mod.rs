//! Medical entity extraction over normalized text.
//!
//! Candidates from the static pattern library are collected, overlap-resolved
//! by priority, disambiguated, filtered for negation, grouped into symptom
//! clusters and finally allocated into the turn arena in span order.

pub mod cluster;
pub mod disambiguate;
pub mod hpi;
pub mod patterns;
pub mod uncertainty;

use serde::{Deserialize, Serialize};

use super::arena::TurnArena;
use super::types::TurnWarning;
use crate::models::{
    ClinicalSignificance, Entity, EntityId, EntityKind, HpiField, Laterality, QualityDimension,
    SourceSpan, UncertaintyFactor,
};
use cluster::{find_clusters, SymptomCluster, SymptomSpan};
use disambiguate::{context_window, resolve};
use patterns::{EntityPattern, PatternLibrary, PatternTemplate, PATTERN_LIBRARY};
use uncertainty::{
    clause_of, clauses, density_bonus, denies_other_symptoms, entity_confidence,
    has_certainty_marker, hedges, negation_cue, word_count, PRIOR_FALLBACK_PENALTY,
};

/// Sites without a left/right counterpart.
const CENTRAL_SITES: &[&str] = &["jaw", "neck", "throat", "head", "abdomen", "groin"];
/// Paired sites; a bare plural ("my knees") reads as both sides.
const PAIRED_SITES: &[&str] = &[
    "arm", "leg", "shoulder", "knee", "hip", "foot", "hand", "eye", "ear", "wrist", "elbow",
    "ankle", "calf",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityUncertainty {
    pub entity: EntityId,
    pub factor: UncertaintyFactor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyReport {
    pub factors: Vec<EntityUncertainty>,
    /// Findings the patient explicitly denied in this message.
    pub negated: Vec<String>,
    /// Ambiguous terms resolved by prior probability alone.
    pub prior_fallbacks: Vec<String>,
    /// "no other symptoms" or similar.
    pub denied_other_symptoms: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Arena ids, ordered by span start.
    pub entities: Vec<EntityId>,
    pub clusters: Vec<SymptomCluster>,
    pub uncertainty: UncertaintyReport,
    pub hpi: Vec<(HpiField, String)>,
    pub warnings: Vec<TurnWarning>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Fold a second pass (over the raw text) into this result.
    pub fn absorb(&mut self, other: ExtractionResult) {
        self.entities.extend(other.entities);
        self.clusters.extend(other.clusters);
        self.uncertainty.factors.extend(other.uncertainty.factors);
        for negated in other.uncertainty.negated {
            if !self.uncertainty.negated.contains(&negated) {
                self.uncertainty.negated.push(negated);
            }
        }
        self.uncertainty
            .prior_fallbacks
            .extend(other.uncertainty.prior_fallbacks);
        self.uncertainty.denied_other_symptoms |= other.uncertainty.denied_other_symptoms;
        self.hpi.extend(other.hpi);
        self.warnings.extend(other.warnings);
    }
}

/// Extract entities from `text` into `arena`.
pub fn extract(text: &str, arena: &mut TurnArena, window_tokens: usize) -> ExtractionResult {
    run(text, arena, window_tokens, &[])
}

/// Second pass over a differently-phrased copy of the message. Entities whose
/// label is already in the arena are skipped.
pub fn extract_supplement(
    text: &str,
    arena: &mut TurnArena,
    window_tokens: usize,
) -> ExtractionResult {
    let known: Vec<String> = arena
        .entities()
        .iter()
        .map(|e| e.label().to_lowercase())
        .collect();
    run(text, arena, window_tokens, &known)
}

/// A raw regex match before overlap resolution.
struct Candidate {
    pattern: &'static EntityPattern,
    start: usize,
    end: usize,
    side: Option<String>,
    site: Option<String>,
    factor: Option<String>,
}

impl Candidate {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn overlaps(&self, other: &Candidate) -> bool {
        self.start < other.end && other.start < self.end
    }

    fn contains(&self, other: &Candidate) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A resolved candidate turned into entity fields, not yet allocated.
struct Draft {
    pattern: &'static EntityPattern,
    start: usize,
    end: usize,
    kind: EntityKind,
    significance: ClinicalSignificance,
    factors: Vec<UncertaintyFactor>,
}

impl Draft {
    fn label(&self) -> &str {
        match &self.kind {
            EntityKind::Anatomical { location, .. } => location,
            EntityKind::Quality { descriptor, .. } => descriptor,
            EntityKind::AssociatedSymptom { symptom, .. } => symptom,
            EntityKind::Frequency { pattern, .. } => pattern,
            EntityKind::TriggerContext { factor, .. } => factor,
        }
    }

    fn is_symptom(&self) -> bool {
        matches!(self.kind, EntityKind::AssociatedSymptom { .. })
    }

    /// Plain body location, excluding radiation targets.
    fn location(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Anatomical {
                location,
                radiation: None,
                ..
            } => Some(location),
            _ => None,
        }
    }
}

fn run(
    text: &str,
    arena: &mut TurnArena,
    window_tokens: usize,
    known_labels: &[String],
) -> ExtractionResult {
    let mut result = ExtractionResult {
        uncertainty: UncertaintyReport {
            denied_other_symptoms: denies_other_symptoms(text),
            ..Default::default()
        },
        ..Default::default()
    };
    if text.trim().is_empty() {
        return result;
    }

    let candidates = collect_candidates(text);
    let resolved = resolve_overlaps(candidates, text, &mut result.warnings);

    let clause_spans = clauses(text);
    let mut drafts = Vec::with_capacity(resolved.len());
    for candidate in resolved {
        let clause = clause_of(&clause_spans, candidate.start);
        let (draft, fallback) = build_draft(candidate, text, window_tokens);
        if negation_cue(text, clause, draft.start).is_some() {
            let label = draft.label().to_string();
            if !result.uncertainty.negated.contains(&label) {
                result.uncertainty.negated.push(label);
            }
            continue;
        }
        if let Some(term) = fallback {
            result.uncertainty.prior_fallbacks.push(term.to_string());
        }
        drafts.push(draft);
    }

    attach_pain_sites(&mut drafts, &clause_spans);

    if !known_labels.is_empty() {
        drafts.retain(|d| !known_labels.contains(&d.label().to_lowercase()));
    }

    let symptom_spans: Vec<SymptomSpan> = drafts
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_symptom())
        .map(|(index, d)| SymptomSpan {
            index,
            start: d.start,
            end: d.end,
        })
        .collect();
    let index_clusters = find_clusters(text, &symptom_spans);
    for cluster in &index_clusters {
        for &i in &cluster.associated {
            if let EntityKind::AssociatedSymptom { primary, .. } = &mut drafts[i].kind {
                *primary = false;
            }
        }
    }

    let density = density_bonus(drafts.len(), word_count(text));
    let first_new = arena.entities().len();
    let mut ids = Vec::with_capacity(drafts.len());
    for mut draft in drafts {
        let clause = clause_of(&clause_spans, draft.start);
        draft.factors.extend(hedges(text, clause));
        let penalty: f32 = draft.factors.iter().map(|f| f.penalty).sum();
        let confidence = entity_confidence(
            draft.pattern.weight,
            draft.pattern.specificity,
            has_certainty_marker(text, clause),
            density,
            penalty,
        );
        if let EntityKind::AssociatedSymptom { probability, .. } = &mut draft.kind {
            *probability = (0.95 - penalty).clamp(0.05, 1.0);
        }

        let factors = draft.factors;
        let id = arena.alloc(|id| Entity {
            id,
            kind: draft.kind,
            confidence,
            span: SourceSpan {
                start: draft.start,
                end: draft.end,
                text: text[draft.start..draft.end].to_string(),
            },
            pattern_id: draft.pattern.id,
            significance: draft.significance,
            uncertainty: factors.clone(),
        });
        result
            .uncertainty
            .factors
            .extend(factors.into_iter().map(|factor| EntityUncertainty { entity: id, factor }));
        ids.push(id);
    }

    result.clusters = index_clusters
        .into_iter()
        .map(|c| SymptomCluster {
            primary: ids[c.primary],
            associated: c.associated.iter().map(|&i| ids[i]).collect(),
            connector: c.connector,
        })
        .collect();
    result.hpi = hpi::derive_hpi(text, &arena.entities()[first_new..]);
    result.entities = ids;

    tracing::debug!(
        entities = result.entities.len(),
        clusters = result.clusters.len(),
        negated = result.uncertainty.negated.len(),
        warnings = result.warnings.len(),
        "Entity extraction complete"
    );
    result
}

fn collect_candidates(text: &str) -> Vec<Candidate> {
    let library: &'static PatternLibrary = &PATTERN_LIBRARY;
    let mut out = Vec::new();
    for pattern in library.iter() {
        for caps in pattern.regex.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if m.as_str().is_empty() {
                continue;
            }
            let group = |name: &str| caps.name(name).map(|g| g.as_str().to_lowercase());
            out.push(Candidate {
                pattern,
                start: m.start(),
                end: m.end(),
                side: group("side"),
                site: group("site"),
                factor: group("factor"),
            });
        }
    }
    out
}

/// Greedy interval scheduling: highest priority first, then longer span, then
/// earlier start. A loser nested strictly inside its winner is an expected
/// refinement ("pain" inside "chest pain"); any other conflict is reported.
fn resolve_overlaps(
    mut candidates: Vec<Candidate>,
    text: &str,
    warnings: &mut Vec<TurnWarning>,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.pattern
            .priority()
            .total_cmp(&a.pattern.priority())
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        match kept.iter().find(|k| k.overlaps(&candidate)) {
            None => kept.push(candidate),
            Some(winner) => {
                let nested = winner.contains(&candidate) && winner.len() > candidate.len();
                if !nested {
                    warnings.push(TurnWarning::ExtractionAmbiguous {
                        kept: winner.pattern.id,
                        dropped: candidate.pattern.id,
                        text: text[candidate.start..candidate.end].to_string(),
                    });
                }
            }
        }
    }
    kept.sort_by_key(|c| c.start);
    kept
}

/// Build the entity fields for a candidate. Also returns the ambiguous term
/// when it was resolved by prior alone.
fn build_draft(
    candidate: Candidate,
    text: &str,
    window_tokens: usize,
) -> (Draft, Option<&'static str>) {
    let matched = text[candidate.start..candidate.end].to_lowercase();
    let pattern = candidate.pattern;
    let mut significance = pattern.significance;
    let mut factors = Vec::new();
    let mut fallback = None;

    let kind = match pattern.template {
        PatternTemplate::Symptom {
            name,
            urgency,
            body_site,
        } => EntityKind::AssociatedSymptom {
            symptom: name.to_string(),
            probability: 1.0,
            urgency_contribution: urgency,
            primary: true,
            body_site: body_site.map(String::from),
        },
        PatternTemplate::Ambiguous(term) => {
            let (lo, hi) = context_window(text, candidate.start, candidate.end, window_tokens);
            let resolution = resolve(term, &text[lo..hi]);
            let referent = resolution.referent;
            if resolution.prior_fallback {
                factors.push(UncertaintyFactor {
                    marker: format!("prior fallback: {}", term.as_str()),
                    penalty: PRIOR_FALLBACK_PENALTY,
                });
                fallback = Some(term.as_str());
            }
            significance = referent.significance;
            EntityKind::AssociatedSymptom {
                symptom: referent.label.to_string(),
                probability: 1.0,
                urgency_contribution: referent.urgency,
                primary: true,
                body_site: referent.body_site.map(String::from),
            }
        }
        PatternTemplate::Location | PatternTemplate::Radiation => {
            let raw_site = candidate.site.as_deref().unwrap_or(matched.as_str());
            let site = singularize(raw_site);
            let laterality = laterality(candidate.side.as_deref(), raw_site, &site);
            let radiation = (pattern.template == PatternTemplate::Radiation)
                .then(|| sided(&site, laterality));
            EntityKind::Anatomical {
                location: site,
                laterality,
                radiation,
            }
        }
        PatternTemplate::Quality {
            descriptor,
            dimension,
        } => {
            let descriptor = descriptor.map(String::from).unwrap_or(matched);
            EntityKind::Quality {
                onset: (dimension == QualityDimension::Onset).then(|| descriptor.clone()),
                functional_impact: (dimension == QualityDimension::FunctionalImpact)
                    .then(|| descriptor.clone()),
                descriptor,
                dimension,
            }
        }
        PatternTemplate::Frequency { pattern, circadian } => EntityKind::Frequency {
            pattern: pattern.to_string(),
            circadian_correlation: circadian.map(String::from),
        },
        PatternTemplate::Trigger { trigger_type } => EntityKind::TriggerContext {
            trigger_type,
            factor: candidate.factor.unwrap_or(matched),
        },
    };

    let draft = Draft {
        pattern,
        start: candidate.start,
        end: candidate.end,
        kind,
        significance,
        factors,
    };
    (draft, fallback)
}

/// Name a bare "pain"/"hurts" after the closest plain location in its clause.
fn attach_pain_sites(drafts: &mut [Draft], clause_spans: &[(usize, usize)]) {
    let mut updates = Vec::new();
    for (i, draft) in drafts.iter().enumerate() {
        if !draft.pattern.is_generic_pain() {
            continue;
        }
        let clause = clause_of(clause_spans, draft.start);
        let nearest = drafts
            .iter()
            .filter(|d| d.start >= clause.0 && d.start < clause.1)
            .filter_map(|d| d.location().map(|loc| (distance(d, draft), loc)))
            .min_by_key(|(dist, _)| *dist);
        if let Some((_, site)) = nearest {
            updates.push((i, site.to_string()));
        }
    }
    for (i, site) in updates {
        if let EntityKind::AssociatedSymptom {
            symptom, body_site, ..
        } = &mut drafts[i].kind
        {
            *symptom = format!("{site} pain");
            *body_site = Some(site);
        }
    }
}

fn distance(a: &Draft, b: &Draft) -> usize {
    if a.end <= b.start {
        b.start - a.end
    } else {
        a.start.saturating_sub(b.end)
    }
}

fn singularize(site: &str) -> String {
    match site {
        "feet" => "foot".to_string(),
        "teeth" => "tooth".to_string(),
        "calves" => "calf".to_string(),
        s if s.len() > 3 && s.ends_with('s') && !s.ends_with("ss") => s[..s.len() - 1].to_string(),
        s => s.to_string(),
    }
}

fn laterality(side: Option<&str>, raw_site: &str, site: &str) -> Laterality {
    match side {
        Some("left") => Laterality::Left,
        Some("right") => Laterality::Right,
        Some("both") => Laterality::Bilateral,
        _ if CENTRAL_SITES.contains(&site) => Laterality::Central,
        _ if raw_site != site && PAIRED_SITES.contains(&site) => Laterality::Bilateral,
        _ => Laterality::Unspecified,
    }
}

fn sided(site: &str, laterality: Laterality) -> String {
    match laterality {
        Laterality::Left | Laterality::Right => format!("{} {site}", laterality.as_str()),
        _ => site.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicalContext;

    fn run_extract(text: &str) -> (TurnArena, ExtractionResult) {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        let result = extract(text, &mut arena, 10);
        (arena, result)
    }

    fn labels(arena: &TurnArena) -> Vec<String> {
        arena.entities().iter().map(|e| e.label().to_string()).collect()
    }

    #[test]
    fn compound_description_yields_cluster() {
        let (arena, result) = run_extract("abdominal pain and vomiting");
        assert_eq!(labels(&arena), vec!["abdominal pain", "vomiting"]);
        assert_eq!(result.clusters.len(), 1);
        let cluster = &result.clusters[0];
        assert_eq!(cluster.primary, result.entities[0]);
        assert_eq!(cluster.associated, vec![result.entities[1]]);
        match &arena.entities()[1].kind {
            EntityKind::AssociatedSymptom { primary, .. } => assert!(!primary),
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn crushing_chest_pain_with_breathlessness() {
        let (arena, result) = run_extract("crushing chest pain and shortness of breath");
        let labels = labels(&arena);
        assert_eq!(labels, vec!["crushing", "chest pain", "shortness of breath"]);
        let chest = &arena.entities()[1];
        assert_eq!(chest.significance, ClinicalSignificance::Urgent);
        assert!(chest.uncertainty.is_empty());
        assert!(result.uncertainty.prior_fallbacks.is_empty());
        assert_eq!(result.clusters.len(), 1);
    }

    #[test]
    fn negated_findings_are_suppressed_and_reported() {
        let (arena, result) = run_extract("no fever but a bad cough");
        assert_eq!(labels(&arena), vec!["cough"]);
        assert_eq!(result.uncertainty.negated, vec!["fever"]);
    }

    #[test]
    fn hedging_lowers_confidence() {
        let (hedged, result) = run_extract("I think I have a headache");
        let (plain, _) = run_extract("I have a headache");
        let hedged_entity = &hedged.entities()[0];
        assert_eq!(hedged_entity.uncertainty[0].marker, "I think");
        assert!(hedged_entity.confidence < plain.entities()[0].confidence);
        assert_eq!(result.uncertainty.factors.len(), 1);
    }

    #[test]
    fn ambiguous_term_without_cues_uses_prior() {
        let (arena, result) = run_extract("my back hurts");
        assert_eq!(labels(&arena), vec!["back pain"]);
        assert_eq!(result.uncertainty.prior_fallbacks, vec!["back"]);
        assert!(arena.entities()[0].uncertainty_penalty() > 0.0);
    }

    #[test]
    fn generic_pain_takes_nearby_site() {
        let (arena, _) = run_extract("my left knee hurts");
        let entities = arena.entities();
        assert_eq!(entities.len(), 2);
        match &entities[0].kind {
            EntityKind::Anatomical {
                location,
                laterality,
                ..
            } => {
                assert_eq!(location, "knee");
                assert_eq!(*laterality, Laterality::Left);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(entities[1].symptom_name(), Some("knee pain"));
    }

    #[test]
    fn radiation_is_sided() {
        let (arena, result) = run_extract("chest pain that radiates to my left arm");
        let radiation = arena
            .entities()
            .iter()
            .find_map(|e| match &e.kind {
                EntityKind::Anatomical { radiation, .. } => radiation.clone(),
                _ => None,
            });
        assert_eq!(radiation.as_deref(), Some("left arm"));
        assert!(result
            .hpi
            .contains(&(HpiField::Radiation, "left arm".to_string())));
    }

    #[test]
    fn partial_overlap_reported_as_ambiguous() {
        let (_, result) = run_extract("it gets worse when I'm stressed out");
        assert!(result.warnings.iter().any(|w| matches!(
            w,
            TurnWarning::ExtractionAmbiguous { text, .. } if text == "stressed out"
        )));
    }

    #[test]
    fn hpi_fields_and_summary_denial() {
        let (_, result) = run_extract("mild headache for two days, no other symptoms");
        assert!(result.hpi.contains(&(HpiField::Duration, "two days".into())));
        assert!(result.hpi.contains(&(HpiField::Severity, "mild".into())));
        assert!(result.uncertainty.denied_other_symptoms);
    }

    #[test]
    fn supplement_skips_known_labels() {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        extract("headache", &mut arena, 10);
        let extra = extract_supplement("headache and queasy", &mut arena, 10);
        assert_eq!(extra.entities.len(), 1);
        assert_eq!(labels(&arena), vec!["headache", "nausea"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (arena, result) = run_extract("   ");
        assert!(arena.is_empty());
        assert!(result.is_empty());
    }

    #[test]
    fn confidence_and_penalties_bounded() {
        let inputs = [
            "maybe I might possibly kind of sort of have a headache, not sure",
            "definitely crushing chest pain 9/10 radiating to my left arm when walking",
            "my tummy is sore and I feel dizzy in the morning",
            "sharp stabbing pain in my lower back after lifting, better with rest",
        ];
        for input in inputs {
            let (arena, _) = run_extract(input);
            for entity in arena.entities() {
                assert!((0.0..=1.0).contains(&entity.confidence), "{input}");
                assert!(entity.uncertainty.iter().all(|f| f.penalty >= 0.0));
            }
        }
    }
}
