//! Pattern-rule tables for the substitution passes of the normalizer.
//!
//! Rules inside a table apply in order, so longer phrases sit above the
//! shorter phrases they contain.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{Correction, CorrectionKind};

pub(crate) struct Rule {
    pattern: Regex,
    replacement: &'static str,
    confidence: f32,
}

fn rules(table: &[(&str, &'static str)], confidence: f32) -> Vec<Rule> {
    table
        .iter()
        .map(|(pattern, replacement)| Rule {
            pattern: Regex::new(pattern).expect("invalid normalization rule"),
            replacement,
            confidence,
        })
        .collect()
}

pub(crate) static GRAMMAR_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(
        &[
            (r"(?i)\bi has\b", "I have"),
            (r"(?i)\bi is\b", "I am"),
            (r"(?i)\bi been\b", "I have been"),
            (r"(?i)\bi feeling\b", "I am feeling"),
            (r"(?i)\bit hurt bad(?:ly)?\b", "it hurts badly"),
            (r"(?i)\b(he|she|it) have\b", "$1 has"),
            (
                r"(?i)\bme (head|stomach|chest|back|throat|leg|legs|arm|arms|neck|belly|tummy|eyes?)\b",
                "my $1",
            ),
        ],
        0.97,
    )
});

pub(crate) static COLLOQUIAL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(
        &[
            (
                r"(?i)\b(feel|feels|feeling|felt) like (?:throwing up|i'?m (?:going to|gonna) throw up|puking)",
                "$1 nauseated",
            ),
            (r"(?i)\bcan'?t keep (?:anything|food|water) down\b", "persistent vomiting"),
            (r"(?i)\b(?:throwing up|threw up|throw up|puking|puked)\b", "vomiting"),
            (
                r"(?i)\b(?:tummy|belly) (?:hurts|hurting|hurt|aches|ache|pain)\b",
                "abdominal pain",
            ),
            (r"(?i)\bstomach ?ache\b", "abdominal pain"),
            (r"(?i)\b(?:tummy|belly)\b", "abdomen"),
            (
                r"(?i)\b(?:can'?t catch my breath|out of breath|short of breath|hard to breathe|trouble breathing)\b",
                "shortness of breath",
            ),
            (
                r"(?i)\bhead (?:is killing me|is pounding|pounding|hurts|hurting)\b",
                "headache",
            ),
            (r"(?i)\b(?:burning up|running a (?:temperature|fever))\b", "having a fever"),
            (r"(?i)\bfeverish\b", "fever"),
            (r"(?i)\b(?:passed out|blacked out)\b", "fainted"),
            (r"(?i)\bpins and needles\b", "tingling"),
            (r"(?i)\bthe runs\b", "diarrhea"),
            (r"(?i)\b(?:the sweats|sweaty)\b", "sweating"),
            (r"(?i)\bblood in (?:my )?poop\b", "blood in stool"),
            (r"(?i)\bpeeing\b", "urinating"),
            (r"(?i)\bpee\b", "urinate"),
            (r"(?i)\bwoozy\b", "dizzy"),
        ],
        0.93,
    )
});

pub(crate) static ABBREVIATION_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(
        &[
            (r"\bSOB\b", "shortness of breath"),
            (r"\bCP\b", "chest pain"),
            (r"\bN/V\b", "nausea and vomiting"),
            (r"\bHA\b", "headache"),
            (r"\bBP\b", "blood pressure"),
            (r"\bHTN\b", "hypertension"),
            (r"\bDM\b", "diabetes"),
            (r"\bMI\b", "heart attack"),
            (r"\bSx\b", "symptoms"),
            (r"(?i)\babd\b", "abdominal"),
            (r"(?i)\bhx\b", "history"),
            (r"(?i)\bdx\b", "diagnosis"),
            (r"(?i)\bw/o\b", "without"),
            (r"(?i)\bw/\s*", "with "),
            (r"(?i)\bmeds\b", "medications"),
        ],
        0.95,
    )
});

pub(crate) static PRONOUN_TENSE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(
        &[
            (r"\bi\b", "I"),
            (r"(?i)\bim\b", "I'm"),
            (r"(?i)\bhurted\b", "hurt"),
            (r"(?i)\bfeeled\b", "felt"),
            (r"(?i)\bbleeded\b", "bled"),
            (r"(?i)\bthrowed\b", "threw"),
            (
                r"(?i)\b([2-9]|\d{2,}|two|three|four|five|six|seven|eight|nine|ten|several|few) (day|week|month|hour|minute|year)\b",
                "$1 ${2}s",
            ),
        ],
        0.99,
    )
});

/// Apply every rule of `table` in order, recording one correction per replaced span.
pub(crate) fn apply_rules(
    text: &str,
    table: &[Rule],
    kind: CorrectionKind,
    corrections: &mut Vec<Correction>,
) -> String {
    let mut current = text.to_string();
    for rule in table {
        if !rule.pattern.is_match(&current) {
            continue;
        }
        current = rule
            .pattern
            .replace_all(&current, |caps: &Captures| {
                let mut out = String::new();
                caps.expand(rule.replacement, &mut out);
                if out != caps[0] {
                    corrections.push(Correction {
                        kind,
                        from: caps[0].to_string(),
                        to: out.clone(),
                        confidence: rule.confidence,
                    });
                }
                out
            })
            .into_owned();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(text: &str, table: &[Rule]) -> (String, Vec<Correction>) {
        let mut corrections = Vec::new();
        let out = apply_rules(text, table, CorrectionKind::Colloquial, &mut corrections);
        (out, corrections)
    }

    #[test]
    fn longer_colloquial_phrase_wins() {
        let (out, _) = apply("I feel like throwing up", &COLLOQUIAL_RULES);
        assert_eq!(out, "I feel nauseated");
        let (out, _) = apply("I keep throwing up", &COLLOQUIAL_RULES);
        assert_eq!(out, "I keep vomiting");
    }

    #[test]
    fn grammar_captures_expand() {
        let (out, corrections) = apply("me head hurts and it have been days", &GRAMMAR_RULES);
        assert_eq!(out, "my head hurts and it has been days");
        assert_eq!(corrections.len(), 2);
    }

    #[test]
    fn abbreviations_are_case_sensitive() {
        let (out, _) = apply("CP and SOB since noon", &ABBREVIATION_RULES);
        assert_eq!(out, "chest pain and shortness of breath since noon");
        let (out, _) = apply("my cp is bad", &ABBREVIATION_RULES);
        assert_eq!(out, "my cp is bad");
        let (out, _) = apply("fever w/ chills, w/o cough", &ABBREVIATION_RULES);
        assert_eq!(out, "fever with chills, without cough");
    }

    #[test]
    fn pluralizes_durations_without_touching_plurals() {
        let (out, _) = apply("since 2 day", &PRONOUN_TENSE_RULES);
        assert_eq!(out, "since 2 days");
        let (out, corrections) = apply("for 3 days and 1 day", &PRONOUN_TENSE_RULES);
        assert_eq!(out, "for 3 days and 1 day");
        assert!(corrections.is_empty());
    }

    #[test]
    fn lowercase_i_capitalized() {
        let (out, _) = apply("i think i'm sick", &PRONOUN_TENSE_RULES);
        assert_eq!(out, "I think I'm sick");
    }
}
