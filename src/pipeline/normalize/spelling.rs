//! Spelling correction against a small symptom lexicon.
//!
//! Only corrects when confidence is high: a unique best match, edit distance 1
//! for words of 5 to 7 characters and up to 2 for longer words. Short words are
//! never touched; neither are everyday words one letter away from a symptom
//! ("never" / "fever", "turning" / "burning").

use super::{Correction, CorrectionKind};

/// Lowercase, sorted for binary search.
const SYMPTOM_LEXICON: &[&str] = &[
    "abdomen", "abdominal", "allergic", "allergies", "anxiety", "appendicitis",
    "arthritis", "asthma", "breath", "breathe", "breathing", "bruising", "burning",
    "chills", "confusion", "congestion", "constipation", "coughing", "cramping",
    "cramps", "crushing", "diabetes", "diarrhea", "dizziness", "exhaustion",
    "fainting", "fatigue", "fever", "headache", "heartburn", "hypertension",
    "indigestion", "infection", "insomnia", "lightheaded", "medication",
    "medications", "migraine", "nausea", "numbness", "palpitations", "pneumonia",
    "pressure", "radiating", "seizure", "shortness", "shoulder", "shoulders",
    "sneezing", "squeezing", "stiffness", "stomach", "sweating", "swelling",
    "swollen", "throat", "throbbing", "tightness", "tingling", "unconscious",
    "urination", "vision", "vomiting", "weakness", "wheezing",
];

/// Everyday words within correction distance of a lexicon entry. Lowercase, sorted.
const COMMON_WORDS: &[&str] = &[
    "brushing", "camping", "clamps", "conclusion", "contusion", "crashing", "dumbness",
    "dwelling", "every", "fewer", "inflection", "jingling", "lever", "mingling", "never",
    "painting", "pitching", "pleasure", "radiation", "rushing", "selling", "seven",
    "sever", "smelling", "spelling", "swearing", "threat", "tinkling", "turning",
    "wheeling",
];

/// Frequent patient misspellings that the distance rule alone would miss or get wrong.
const KNOWN_MISSPELLINGS: &[(&str, &str)] = &[
    ("breth", "breath"),
    ("diarea", "diarrhea"),
    ("diarhea", "diarrhea"),
    ("diarrea", "diarrhea"),
    ("dizzyness", "dizziness"),
    ("feaver", "fever"),
    ("headach", "headache"),
    ("nasea", "nausea"),
    ("nausia", "nausea"),
    ("stomache", "stomach"),
    ("vomitting", "vomiting"),
];

const KNOWN_MISSPELLING_CONFIDENCE: f32 = 0.9;
const DISTANCE_ONE_CONFIDENCE: f32 = 0.85;
const DISTANCE_TWO_CONFIDENCE: f32 = 0.75;

/// Correct every word of `text`, recording one `Correction` per changed word.
pub(crate) fn correct_spelling(text: &str, corrections: &mut Vec<Correction>) -> String {
    let mut result = String::with_capacity(text.len());
    let mut word_buf = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            word_buf.push(ch);
        } else {
            flush_word(&mut word_buf, &mut result, corrections);
            result.push(ch);
        }
    }
    flush_word(&mut word_buf, &mut result, corrections);

    result
}

fn flush_word(word_buf: &mut String, result: &mut String, corrections: &mut Vec<Correction>) {
    if word_buf.is_empty() {
        return;
    }
    match try_correct_word(word_buf) {
        Some((corrected, confidence)) => {
            corrections.push(Correction {
                kind: CorrectionKind::Spelling,
                from: word_buf.clone(),
                to: corrected.clone(),
                confidence,
            });
            result.push_str(&corrected);
        }
        None => result.push_str(word_buf),
    }
    word_buf.clear();
}

/// Returns the corrected word and the correction's confidence, or `None` to keep it.
fn try_correct_word(word: &str) -> Option<(String, f32)> {
    let char_len = word.chars().count();
    if char_len < 5 || word.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let lower = word.to_lowercase();
    if is_known_word(&lower) {
        return None;
    }

    if let Some((_, fix)) = KNOWN_MISSPELLINGS.iter().find(|(bad, _)| *bad == lower) {
        return Some((preserve_case(word, fix), KNOWN_MISSPELLING_CONFIDENCE));
    }

    let max_distance = if char_len >= 8 { 2 } else { 1 };
    let mut best_term: Option<&str> = None;
    let mut best_distance = max_distance + 1;
    let mut ambiguous = false;

    for &term in SYMPTOM_LEXICON {
        let len_diff = (char_len as i64 - term.chars().count() as i64).unsigned_abs();
        if len_diff > max_distance as u64 {
            continue;
        }

        let dist = edit_distance(&lower, term);
        if dist < best_distance {
            best_distance = dist;
            best_term = Some(term);
            ambiguous = false;
        } else if dist == best_distance && best_term.is_some() {
            ambiguous = true;
        }
    }

    match best_term {
        Some(term) if !ambiguous => {
            let confidence = if best_distance <= 1 {
                DISTANCE_ONE_CONFIDENCE
            } else {
                DISTANCE_TWO_CONFIDENCE
            };
            Some((preserve_case(word, term), confidence))
        }
        _ => None,
    }
}

/// Lexicon words, their plurals, and the common-word stoplist are all left alone.
fn is_known_word(lower: &str) -> bool {
    if SYMPTOM_LEXICON.binary_search(&lower).is_ok() || COMMON_WORDS.binary_search(&lower).is_ok() {
        return true;
    }
    ["s", "es"].iter().any(|suffix| {
        lower
            .strip_suffix(suffix)
            .is_some_and(|stem| SYMPTOM_LEXICON.binary_search(&stem).is_ok())
    })
}

fn preserve_case(original: &str, correction: &str) -> String {
    if original.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
        return correction.to_uppercase();
    }

    let first_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if first_upper {
        let mut chars = correction.chars();
        match chars.next() {
            Some(c) => {
                let mut s = c.to_uppercase().to_string();
                s.extend(chars);
                s
            }
            None => correction.to_string(),
        }
    } else {
        correction.to_string()
    }
}

/// Levenshtein distance.
pub(crate) fn edit_distance(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n as u32;
    }
    if n == 0 {
        return m as u32;
    }

    let mut prev: Vec<u32> = (0..=n as u32).collect();
    let mut curr = vec![0u32; n + 1];

    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = (i + 1) as u32;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = u32::from(a_ch != b_ch);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correct(text: &str) -> String {
        let mut corrections = Vec::new();
        correct_spelling(text, &mut corrections)
    }

    #[test]
    fn corrects_common_misspellings() {
        assert_eq!(correct("vomitting"), "vomiting");
        assert_eq!(correct("nausia"), "nausea");
        assert_eq!(correct("palpatations"), "palpitations");
        assert_eq!(correct("headahce"), "headache");
        assert_eq!(correct("feaver"), "fever");
    }

    #[test]
    fn records_confidence_by_distance() {
        let mut corrections = Vec::new();
        correct_spelling("dizzyness and wheezng", &mut corrections);
        assert_eq!(corrections.len(), 2);
        assert_eq!(corrections[0].to, "dizziness");
        assert_eq!(corrections[1].to, "wheezing");
        assert!((corrections[1].confidence - DISTANCE_ONE_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[test]
    fn leaves_everyday_words_alone() {
        assert_eq!(correct("I never had this"), "I never had this");
        assert_eq!(correct("turning my head"), "turning my head");
        assert_eq!(correct("short of breath"), "short of breath");
        assert_eq!(correct("yesterday morning"), "yesterday morning");
    }

    #[test]
    fn keeps_plurals_of_lexicon_words() {
        assert_eq!(correct("headaches"), "headaches");
        assert_eq!(correct("seizures"), "seizures");
    }

    #[test]
    fn skips_short_words_and_numbers() {
        assert_eq!(correct("pian"), "pian");
        assert_eq!(correct("8/10 for 2days"), "8/10 for 2days");
    }

    #[test]
    fn preserves_case_pattern() {
        assert_eq!(correct("Vomitting"), "Vomiting");
        assert_eq!(correct("NAUSIA"), "NAUSEA");
    }

    #[test]
    fn lexicon_and_stoplist_sorted() {
        for list in [SYMPTOM_LEXICON, COMMON_WORDS] {
            for window in list.windows(2) {
                assert!(window[0] < window[1], "not sorted: {:?} >= {:?}", window[0], window[1]);
            }
        }
    }

    #[test]
    fn edit_distance_basic() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("vomiting", "vomitting"), 1);
    }
}
