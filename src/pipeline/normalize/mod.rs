//! Text normalization: patient phrasing to clinical phrasing.
//!
//! Passes run in a fixed order: grammar, colloquial phrases, abbreviations,
//! spelling, pronoun/tense repair. Colloquial substitution must precede
//! spelling so "tummy" is mapped before the speller ever sees it.

pub mod rules;
pub mod sanitize;
pub mod spelling;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use rules::{
    apply_rules, ABBREVIATION_RULES, COLLOQUIAL_RULES, GRAMMAR_RULES, PRONOUN_TENSE_RULES,
};

/// Below this aggregate confidence the turn carries a `NormalizationUncertain` warning.
pub const NORMALIZATION_UNCERTAIN_THRESHOLD: f32 = 0.5;

/// Aggregate confidence never drops below this, however many corrections apply.
const CONFIDENCE_FLOOR: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    Grammar,
    Colloquial,
    Abbreviation,
    Spelling,
    PronounTense,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub kind: CorrectionKind,
    pub from: String,
    pub to: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub original: String,
    pub text: String,
    pub corrections: Vec<Correction>,
    pub confidence: f32,
}

impl NormalizedText {
    pub fn is_uncertain(&self) -> bool {
        self.confidence < NORMALIZATION_UNCERTAIN_THRESHOLD
    }

    pub fn was_changed(&self) -> bool {
        self.text != self.original
    }
}

/// Normalize a sanitized patient utterance. Never fails: text that matches no
/// rule comes back unchanged with confidence 1.0.
pub fn normalize(input: &str) -> NormalizedText {
    let mut corrections = Vec::new();

    let text = collapse_whitespace(input);
    let text = apply_rules(&text, &GRAMMAR_RULES, CorrectionKind::Grammar, &mut corrections);
    let text = apply_rules(
        &text,
        &COLLOQUIAL_RULES,
        CorrectionKind::Colloquial,
        &mut corrections,
    );
    let text = apply_rules(
        &text,
        &ABBREVIATION_RULES,
        CorrectionKind::Abbreviation,
        &mut corrections,
    );
    let text = spelling::correct_spelling(&text, &mut corrections);
    let text = apply_rules(
        &text,
        &PRONOUN_TENSE_RULES,
        CorrectionKind::PronounTense,
        &mut corrections,
    );

    let confidence = aggregate_confidence(&corrections);
    tracing::debug!(
        corrections = corrections.len(),
        confidence,
        "Normalized patient utterance"
    );

    NormalizedText {
        original: input.to_string(),
        text,
        corrections,
        confidence,
    }
}

/// Product of per-correction confidences, floored.
fn aggregate_confidence(corrections: &[Correction]) -> f32 {
    corrections
        .iter()
        .map(|c| c.confidence)
        .product::<f32>()
        .clamp(CONFIDENCE_FLOOR, 1.0)
}

fn collapse_whitespace(text: &str) -> String {
    static RUNS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("invalid whitespace pattern"));
    RUNS.replace_all(text.trim(), " ").into_owned()
}
