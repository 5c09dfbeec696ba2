use std::sync::LazyLock;

use regex::Regex;

use super::{TriggerSignal, TriggerSource};
use crate::models::UrgencyLevel;
use crate::pipeline::extraction::uncertainty::{clause_of, clauses, heading_negation, negation_cue};

/// A compiled red-flag rule.
struct RedFlagRule {
    id: &'static str,
    description: &'static str,
    level: UrgencyLevel,
    /// Every group must have at least one non-negated match.
    groups: Vec<Regex>,
}

fn rule(id: &'static str, description: &'static str, level: UrgencyLevel, groups: &[&str]) -> RedFlagRule {
    RedFlagRule {
        id,
        description,
        level,
        groups: groups
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).expect("invalid red flag pattern"))
            .collect(),
    }
}

const CHEST: &str = r"\bchest (?:pain|pressure|tightness|discomfort)|\bchest (?:hurts|is tight)|\bpain in (?:my |the )?chest\b";
const BREATHLESS: &str = r"\bshort(?:ness)? of breath\b|\bbreathless|\bcan'?t (?:catch my )?breath|\btrouble breathing\b|\bhard to breathe\b|\bstruggling to breathe\b";
const FEVER: &str = r"\bfevers?\b|\bfebrile\b|\bhigh temperature\b";

// ── Rule registry ───────────────────────────────────────────

/// Emergency rules first, then Urgent.
static RED_FLAGS: LazyLock<Vec<RedFlagRule>> = LazyLock::new(|| {
    use UrgencyLevel::{Emergency, Urgent};
    vec![
        rule(
            "RF-001",
            "Crushing or squeezing chest pain",
            Emergency,
            &[r"\b(?:crushing|squeezing|vise-like|like an elephant)\b[^.;!?]{0,40}\bchest\b|\bchest\b[^.;!?]{0,30}\b(?:crushing|squeezing)\b"],
        ),
        rule(
            "RF-002",
            "Chest pain with shortness of breath",
            Emergency,
            &[CHEST, BREATHLESS],
        ),
        rule(
            "RF-003",
            "Unable to breathe",
            Emergency,
            &[r"\b(?:can'?t|cannot|unable to) breathe\b|\bgasping\b|\bchoking\b|\bturning blue\b|\blips? (?:are |is |look )?blue\b"],
        ),
        rule(
            "RF-004",
            "Stroke signs",
            Emergency,
            &[r"\bface (?:is )?droop|\bfacial droop|\bslurred speech\b|\bslurring (?:my )?words\b|\bcan'?t (?:move|feel) (?:my )?(?:arm|leg|one side)\b|\b(?:sudden )?(?:numbness|weakness) (?:on|in) one side\b|\bone[- ]sided weakness\b"],
        ),
        rule(
            "RF-005",
            "Sudden worst-ever headache",
            Emergency,
            &[r"\bworst headache\b|\bthunderclap\b|\bheadache like (?:being hit|a thunderclap)\b"],
        ),
        rule(
            "RF-006",
            "Unresponsive",
            Emergency,
            &[r"\bunresponsive\b|\bunconscious\b|\bnot responding\b|\bwon'?t wake(?: up)?\b|\blimp\b|\bfloppy\b"],
        ),
        rule(
            "RF-007",
            "Seizure",
            Emergency,
            &[r"\bseizures?\b|\bconvuls|\bfitting\b"],
        ),
        rule(
            "RF-008",
            "Coughing or vomiting blood",
            Emergency,
            &[r"\bcough(?:ing|ed)? (?:up )?blood\b|\bvomit(?:ing|ed)? blood\b|\bthrowing up blood\b|\bblood in (?:my )?vomit\b"],
        ),
        rule(
            "RF-009",
            "Throat or tongue swelling",
            Emergency,
            &[r"\b(?:throat|tongue) (?:is )?(?:swelling|closing|swollen)\b|\bswollen (?:throat|tongue)\b|\banaphyla"],
        ),
        rule(
            "RF-010",
            "Thoughts of self-harm",
            Emergency,
            &[r"\bkill myself\b|\bsuicid|\bend my life\b|\bwant to die\b|\bhurt myself\b"],
        ),
        rule(
            "RF-011",
            "Fever with neck stiffness",
            Emergency,
            &[FEVER, r"\bstiff neck\b|\bneck (?:is )?stiff|\bneck stiffness\b|\bcan'?t (?:bend|move) my neck\b"],
        ),
        rule(
            "RF-012",
            "Rash that does not fade under pressure",
            Emergency,
            &[r"\bnon-?blanching\b|\brash (?:that )?(?:doesn'?t|does not|won'?t) (?:fade|blanch|go away when)"],
        ),
        rule(
            "RF-013",
            "Uncontrolled bleeding",
            Emergency,
            &[r"\bbleeding (?:heavily|a lot|won'?t stop|that won'?t stop)\b|\bheavy bleeding\b|\bcan'?t stop the bleeding\b"],
        ),
        rule(
            "RF-014",
            "Fainting",
            Urgent,
            &[r"\bpassed out\b|\bfainted\b|\bfainting\b|\bblacked out\b"],
        ),
        rule(
            "RF-015",
            "High fever",
            Urgent,
            &[r"\bhigh fever\b|\b(?:fever|temperature|temp) (?:of |is |was )?(?:10[3-9]|4[0-2])(?:\.\d)?\b"],
        ),
        rule(
            "RF-016",
            "Blood in stool",
            Urgent,
            &[r"\bblood in (?:my )?(?:stool|poo|poop)\b|\bblack (?:tarry )?stools?\b|\bbloody stools?\b"],
        ),
        rule(
            "RF-017",
            "Severe abdominal pain",
            Urgent,
            &[r"\b(?:severe|excruciating|unbearable|worst) (?:abdominal|stomach|belly|tummy) pain\b"],
        ),
        rule(
            "RF-018",
            "New confusion",
            Urgent,
            &[r"\bconfused\b|\bconfusion\b|\bdisoriented\b"],
        ),
    ]
});

// ── Matching logic ──────────────────────────────────────────

/// Scan `text` for red flags. A phrase under a negation cue in its clause
/// ("no chest pain") does not count. Emergency rules only yield to a denial
/// written directly in front of the phrase.
pub fn scan(text: &str) -> Vec<TriggerSignal> {
    let clause_spans = clauses(text);
    RED_FLAGS
        .iter()
        .filter(|rule| {
            rule.groups
                .iter()
                .all(|group| has_affirmed_match(group, rule.level, text, &clause_spans))
        })
        .map(|rule| TriggerSignal {
            source: TriggerSource::RedFlag,
            rule_id: rule.id.to_string(),
            description: rule.description.to_string(),
            level: rule.level,
        })
        .collect()
}

fn has_affirmed_match(
    regex: &Regex,
    level: UrgencyLevel,
    text: &str,
    clause_spans: &[(usize, usize)],
) -> bool {
    regex.find_iter(text).any(|m| {
        let clause = clause_of(clause_spans, m.start());
        let negated = if level == UrgencyLevel::Emergency {
            heading_negation(text, clause, m.start())
        } else {
            negation_cue(text, clause, m.start())
        };
        negated.is_none()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(text: &str) -> Vec<String> {
        scan(text).into_iter().map(|s| s.rule_id).collect()
    }

    #[test]
    fn crushing_chest_pain_with_breathlessness() {
        let ids = ids("crushing chest pain and shortness of breath");
        assert_eq!(ids, vec!["RF-001", "RF-002"]);
    }

    #[test]
    fn both_groups_required() {
        assert!(ids("my chest hurts").is_empty());
        assert!(ids("I get short of breath on stairs").is_empty());
        assert_eq!(ids("chest pain, and now I'm short of breath"), vec!["RF-002"]);
    }

    #[test]
    fn negated_flags_ignored() {
        assert!(ids("no chest pain and no shortness of breath").is_empty());
        assert!(ids("I have not passed out").is_empty());
        assert_eq!(ids("no fever but I fainted this morning"), vec!["RF-014"]);
    }

    #[test]
    fn unrelated_negation_does_not_cancel_emergency() {
        for text in [
            "I woke up without warning with crushing chest pain and shortness of breath",
            "the pills did not help my crushing chest pain and shortness of breath",
            "there is no relief from this crushing chest pain and shortness of breath",
            "no idea what is going on, I can't breathe",
        ] {
            let signals = scan(text);
            assert!(
                signals.iter().any(|s| s.level == UrgencyLevel::Emergency),
                "missed emergency in {text:?}"
            );
        }
    }

    #[test]
    fn direct_denial_still_cancels_emergency() {
        assert!(ids("denies any crushing chest pain").is_empty());
        assert!(ids("I don't have chest pain, just shortness of breath").is_empty());
    }

    #[test]
    fn urgent_levels() {
        let signals = scan("I had a high fever and blood in my stool");
        assert!(signals.iter().all(|s| s.level == UrgencyLevel::Urgent));
        assert_eq!(signals.len(), 2);
    }

    #[test]
    fn benign_text_clear() {
        assert!(scan("mild headache for two days, no other symptoms").is_empty());
        assert!(scan("").is_empty());
    }

    #[test]
    fn rule_ids_unique() {
        let mut ids: Vec<_> = RED_FLAGS.iter().map(|r| r.id).collect();
        let total = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
