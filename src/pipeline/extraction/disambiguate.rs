//! Context-window disambiguation for terms with more than one medical referent.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ClinicalSignificance;

/// Words that point at more than one underlying problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmbiguousTerm {
    /// Cardiac vs pleuritic (lung) chest pain.
    Chest,
    /// Abdominal vs gastric (epigastric) pain.
    Stomach,
    /// Spinal vs kidney (flank) pain.
    Back,
    /// Common cold vs feeling cold.
    Cold,
    /// Vertigo vs lightheadedness.
    Dizzy,
}

#[derive(Debug)]
pub struct Referent {
    /// Symptom name the entity is emitted under.
    pub label: &'static str,
    pub body_site: Option<&'static str>,
    pub significance: ClinicalSignificance,
    pub urgency: f32,
    /// Chosen when no cue in the window discriminates.
    pub prior: f32,
    /// Lowercase word prefixes that vote for this referent.
    pub cues: &'static [&'static str],
}

static CHEST: [Referent; 2] = [
    Referent {
        label: "chest pain",
        body_site: Some("chest"),
        significance: ClinicalSignificance::Urgent,
        urgency: 0.8,
        prior: 0.6,
        cues: &[
            "pressure", "crushing", "squeez", "heav", "tight", "arm", "jaw", "exert", "stairs",
            "walking", "climb", "sweat", "clammy", "nause", "elephant",
        ],
    },
    Referent {
        label: "pleuritic chest pain",
        body_site: Some("chest"),
        significance: ClinicalSignificance::Moderate,
        urgency: 0.5,
        prior: 0.4,
        cues: &[
            "deep breath", "breathe in", "breathing in", "inhal", "cough", "when I breathe",
            "press on", "touch",
        ],
    },
];

static STOMACH: [Referent; 2] = [
    Referent {
        label: "abdominal pain",
        body_site: Some("abdomen"),
        significance: ClinicalSignificance::Moderate,
        urgency: 0.4,
        prior: 0.6,
        cues: &[
            "lower", "right side", "cramp", "diarrh", "appendix", "bloat", "belly button", "navel",
            "period",
        ],
    },
    Referent {
        label: "epigastric pain",
        body_site: Some("upper abdomen"),
        significance: ClinicalSignificance::Moderate,
        urgency: 0.35,
        prior: 0.4,
        cues: &[
            "burn", "acid", "after eating", "after meals", "meal", "food", "reflux", "heartburn",
            "upper", "sour", "empty",
        ],
    },
];

static BACK: [Referent; 2] = [
    Referent {
        label: "back pain",
        body_site: Some("back"),
        significance: ClinicalSignificance::Low,
        urgency: 0.2,
        prior: 0.7,
        cues: &[
            "lift", "bend", "muscle", "spine", "sitting", "posture", "strain", "twist", "desk",
        ],
    },
    Referent {
        label: "flank pain",
        body_site: Some("flank"),
        significance: ClinicalSignificance::Moderate,
        urgency: 0.45,
        prior: 0.3,
        cues: &[
            "urin", "kidney", "fever", "side", "blood in", "burning", "flank", "groin",
        ],
    },
];

static COLD: [Referent; 2] = [
    Referent {
        label: "common cold",
        body_site: Some("nose"),
        significance: ClinicalSignificance::Low,
        urgency: 0.05,
        prior: 0.55,
        cues: &[
            "caught", "runny", "sneez", "congest", "nose", "throat", "cough", "a cold",
        ],
    },
    Referent {
        label: "chills",
        body_site: None,
        significance: ClinicalSignificance::Low,
        urgency: 0.2,
        prior: 0.45,
        cues: &["shiver", "freezing", "hands", "feet", "always", "so cold", "feel cold", "feeling cold"],
    },
];

static DIZZY: [Referent; 2] = [
    Referent {
        label: "vertigo",
        body_site: Some("head"),
        significance: ClinicalSignificance::Moderate,
        urgency: 0.4,
        prior: 0.35,
        cues: &["spin", "room", "turn", "roll over", "ear", "ringing", "balance", "moving"],
    },
    Referent {
        label: "lightheadedness",
        body_site: Some("head"),
        significance: ClinicalSignificance::Moderate,
        urgency: 0.35,
        prior: 0.65,
        cues: &[
            "stand", "faint", "pass out", "black out", "weak", "dehydrat", "lightheaded",
            "light-headed", "hungry",
        ],
    },
];

impl AmbiguousTerm {
    pub fn referents(&self) -> &'static [Referent] {
        match self {
            Self::Chest => &CHEST,
            Self::Stomach => &STOMACH,
            Self::Back => &BACK,
            Self::Cold => &COLD,
            Self::Dizzy => &DIZZY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chest => "chest",
            Self::Stomach => "stomach",
            Self::Back => "back",
            Self::Cold => "cold",
            Self::Dizzy => "dizzy",
        }
    }
}

#[derive(Debug)]
pub struct Resolution {
    pub referent: &'static Referent,
    /// No cue singled out one referent; the prior decided.
    pub prior_fallback: bool,
    pub cue_hits: usize,
}

/// Pick the referent whose cues occur most often in `window`. Ties, including
/// the no-cue case, go to the highest prior.
pub fn resolve(term: AmbiguousTerm, window: &str) -> Resolution {
    let window = window.to_lowercase();
    let scored: Vec<(&'static Referent, usize)> = term
        .referents()
        .iter()
        .map(|r| {
            let hits = r
                .cues
                .iter()
                .filter(|cue| contains_at_word_start(&window, &cue.to_lowercase()))
                .count();
            (r, hits)
        })
        .collect();

    let best_hits = scored.iter().map(|(_, h)| *h).max().unwrap_or(0);
    let tied: Vec<&'static Referent> = scored
        .iter()
        .filter(|(_, h)| *h == best_hits)
        .map(|(r, _)| *r)
        .collect();

    // `referents()` is never empty, so `tied` always has a first element
    let mut referent = tied[0];
    for candidate in &tied[1..] {
        if candidate.prior > referent.prior {
            referent = candidate;
        }
    }

    Resolution {
        referent,
        prior_fallback: best_hits == 0 || tied.len() > 1,
        cue_hits: best_hits,
    }
}

fn contains_at_word_start(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        haystack[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Byte range covering `tokens` words either side of `start..end`, the span itself included.
pub fn context_window(text: &str, start: usize, end: usize, tokens: usize) -> (usize, usize) {
    static WORD: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\w'-]+").expect("invalid word pattern"));

    let words: Vec<(usize, usize)> = WORD.find_iter(text).map(|m| (m.start(), m.end())).collect();
    if words.is_empty() {
        return (start, end);
    }

    let first = words.iter().position(|(_, e)| *e > start).unwrap_or(words.len() - 1);
    let last = words
        .iter()
        .rposition(|(s, _)| *s < end)
        .unwrap_or(first);

    let lo = first.saturating_sub(tokens);
    let hi = (last + tokens).min(words.len() - 1);
    (words[lo].0.min(start), words[hi].1.max(end))
}
