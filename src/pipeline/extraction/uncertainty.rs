//! Hedging, negation and certainty markers, and the per-entity confidence formula.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::UncertaintyFactor;

/// Penalty recorded when an ambiguous term was resolved by prior alone.
pub const PRIOR_FALLBACK_PENALTY: f32 = 0.1;
/// Sum of penalties applied to one entity never exceeds this.
pub const MAX_PENALTY: f32 = 0.5;
const CERTAINTY_BONUS: f32 = 0.05;
const MAX_DENSITY_BONUS: f32 = 0.1;
/// Negation only reaches this many words forward.
const NEGATION_REACH_TOKENS: usize = 6;

const HEDGE_TABLE: &[(&str, &str, f32)] = &[
    (r"\bnot (?:really )?sure\b", "not sure", 0.2),
    (r"\bmaybe\b", "maybe", 0.15),
    (r"\bmight\b", "might", 0.15),
    (r"\bpossibly\b", "possibly", 0.15),
    (r"\bperhaps\b", "perhaps", 0.15),
    (r"\bI guess\b", "I guess", 0.15),
    (r"\bI think\b", "I think", 0.1),
    (r"\bkind of\b|\bkinda\b", "kind of", 0.1),
    (r"\bsort of\b|\bsorta\b", "sort of", 0.1),
    (r"\bcould be\b", "could be", 0.1),
    (r"\bseems? like\b", "seems like", 0.1),
    (r"\bprobably\b", "probably", 0.05),
];

static HEDGES: LazyLock<Vec<(Regex, &'static str, f32)>> = LazyLock::new(|| {
    HEDGE_TABLE
        .iter()
        .map(|(p, marker, penalty)| {
            (
                Regex::new(&format!("(?i){p}")).expect("invalid hedge pattern"),
                *marker,
                *penalty,
            )
        })
        .collect()
});

static CERTAINTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:definitely|certainly|for sure|absolutely|clearly|really)\b")
        .expect("invalid certainty pattern")
});

static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:no|not|denies|deny|denied|without|negative for|free of|don'?t have|doesn'?t have|haven'?t had|hasn'?t had|haven'?t noticed|none)\b",
    )
    .expect("invalid negation pattern")
});

/// Phrases that open with a negation word but deny nothing clinical
/// ("without warning", "no relief from", "did not help").
static PSEUDO_NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:without (?:any )?(?:warning|reason|cause|stopping|a break)|no (?:relief|change|better|improvement|idea|matter|way|longer|doubt|reason)|not (?:really )?(?:sure|certain|help(?:ing|ed)?|improv(?:e|ed|ing)|better|only|go(?:ing)? away|stop(?:ped|ping)?|work(?:ed|ing)?|know|easing))\b",
    )
    .expect("invalid pseudo-negation pattern")
});

/// A denial written directly in front of the phrase ("no chest pain",
/// "denies any shortness of breath").
static HEADING_NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(no|not|never|denies|deny|denied|without|negative for|free of|don'?t have|doesn'?t have|haven'?t had|hasn'?t had)\s+(?:any\s+|an?\s+)?$",
    )
    .expect("invalid heading negation pattern")
});

static CLAUSE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[.,;!?\n]|\bbut\b|\bhowever\b").expect("invalid clause pattern")
});

static NO_OTHER_SYMPTOMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bno other (?:symptoms|complaints|problems)\b|\bnothing else\b")
        .expect("invalid summary-denial pattern")
});

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w'-]+").expect("invalid word pattern"));

/// Byte ranges of the clauses of `text`.
pub fn clauses(text: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in CLAUSE_BREAK.find_iter(text) {
        if m.start() > start {
            out.push((start, m.start()));
        }
        start = m.end();
    }
    if start < text.len() {
        out.push((start, text.len()));
    }
    out
}

/// The clause containing byte `pos`, or the whole text.
pub fn clause_of(clauses: &[(usize, usize)], pos: usize) -> (usize, usize) {
    clauses
        .iter()
        .copied()
        .find(|(s, e)| *s <= pos && pos < *e)
        .unwrap_or((0, usize::MAX))
}

/// The negation cue governing a span starting at `span_start`, if any. Cues
/// must precede the span within the same clause and lie within reach.
/// Pseudo-negations never count.
pub fn negation_cue(text: &str, clause: (usize, usize), span_start: usize) -> Option<String> {
    let scope = negation_scope(text, clause, span_start);
    NEGATION.find_iter(scope).find_map(|m| {
        if PSEUDO_NEGATION.is_match(&scope[m.start()..]) {
            return None;
        }
        let after = &scope[m.end()..];
        if WORD.find_iter(after).count() > NEGATION_REACH_TOKENS {
            return None;
        }
        Some(m.as_str().to_lowercase())
    })
}

/// The negation cue directly heading the span, if any. Only a denial
/// immediately in front of the phrase counts, optionally followed by "any"
/// or an article ("haven't had a seizure").
pub fn heading_negation(text: &str, clause: (usize, usize), span_start: usize) -> Option<String> {
    let scope = negation_scope(text, clause, span_start);
    HEADING_NEGATION
        .captures(scope)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

fn negation_scope(text: &str, clause: (usize, usize), span_start: usize) -> &str {
    let clause_start = clause.0.min(text.len());
    let span_start = span_start.clamp(clause_start, text.len());
    &text[clause_start..span_start]
}

/// Hedging markers anywhere in the clause.
pub fn hedges(text: &str, clause: (usize, usize)) -> Vec<UncertaintyFactor> {
    let scope = clause_text(text, clause);
    HEDGES
        .iter()
        .filter(|(regex, _, _)| regex.is_match(scope))
        .map(|(_, marker, penalty)| UncertaintyFactor {
            marker: (*marker).to_string(),
            penalty: *penalty,
        })
        .collect()
}

pub fn has_certainty_marker(text: &str, clause: (usize, usize)) -> bool {
    CERTAINTY.is_match(clause_text(text, clause))
}

/// Whether the patient summarily denied anything further ("no other symptoms").
pub fn denies_other_symptoms(text: &str) -> bool {
    NO_OTHER_SYMPTOMS.is_match(text)
}

pub fn word_count(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Bonus for messages dense in recognised terminology.
pub fn density_bonus(entity_count: usize, words: usize) -> f32 {
    if words == 0 {
        return 0.0;
    }
    (entity_count as f32 / words as f32 * 0.2).min(MAX_DENSITY_BONUS)
}

/// Entity confidence, always within [0, 1].
pub fn entity_confidence(
    weight: f32,
    specificity: f32,
    certain: bool,
    density_bonus: f32,
    penalty: f32,
) -> f32 {
    let base = 0.45 + 0.3 * weight + 0.2 * specificity;
    let bonus = if certain { CERTAINTY_BONUS } else { 0.0 } + density_bonus;
    (base + bonus - penalty.clamp(0.0, MAX_PENALTY)).clamp(0.0, 1.0)
}

fn clause_text(text: &str, clause: (usize, usize)) -> &str {
    let start = clause.0.min(text.len());
    let end = clause.1.min(text.len());
    &text[start..end]
}
