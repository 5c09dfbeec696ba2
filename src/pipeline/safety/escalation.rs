//! Age-dependent escalation rules.
//!
//! These fire on the patient's words and demographics alone, independent of
//! how well extraction went. Thresholds follow AAP and WHO paediatric triage
//! guidance.

use super::{TriggerSignal, TriggerSource};
use crate::models::{PatientDemographics, UrgencyLevel};

/// Condition under which an escalation rule fires.
enum EscalationCondition {
    /// Age in months below threshold and any keyword present.
    AgeBelow {
        months: u32,
        keywords: &'static [&'static str],
    },
    /// Minor and every keyword set has a hit.
    ChildAllOf {
        keyword_sets: &'static [&'static [&'static str]],
    },
}

struct EscalationRule {
    /// Unique identifier for the audit trail.
    id: &'static str,
    description: &'static str,
    condition: EscalationCondition,
    level: UrgencyLevel,
}

// ── Keyword sets ────────────────────────────────────────────

const FEVER_KEYWORDS: &[&str] = &["fever", "temperature", "burning up", "febrile"];

const HIGH_FEVER_KEYWORDS: &[&str] = &["high fever", "39", "40", "41", "102", "103", "104"];

const RASH_KEYWORDS: &[&str] = &["rash", "spots", "petechiae", "blotches"];

const HEAD_INJURY_KEYWORDS: &[&str] = &[
    "head injury", "hit head", "hit his head", "hit her head", "hit their head",
    "hit my head", "fell on head", "head bump", "concussion",
];

const INJURY_KEYWORDS: &[&str] = &["fell", "fall", "injur", "hit", "bump", "knock"];

const BREATHING_KEYWORDS: &[&str] = &[
    "breathing fast", "fast breathing", "grunting", "wheez", "struggling to breathe",
    "ribs sucking in",
];

// ── Rule registry ───────────────────────────────────────────

/// Emergency rules first, then Urgent.
static RULES: &[EscalationRule] = &[
    // PED-001: infant under 3 months with any fever
    EscalationRule {
        id: "PED-001",
        description: "Fever in an infant under 3 months",
        condition: EscalationCondition::AgeBelow {
            months: 3,
            keywords: FEVER_KEYWORDS,
        },
        level: UrgencyLevel::Emergency,
    },
    // PED-003: infant under 12 months with laboured breathing
    EscalationRule {
        id: "PED-003",
        description: "Laboured breathing in an infant",
        condition: EscalationCondition::AgeBelow {
            months: 12,
            keywords: BREATHING_KEYWORDS,
        },
        level: UrgencyLevel::Emergency,
    },
    // PED-002: infant 3-6 months with high fever
    EscalationRule {
        id: "PED-002",
        description: "High fever in an infant under 6 months",
        condition: EscalationCondition::AgeBelow {
            months: 6,
            keywords: HIGH_FEVER_KEYWORDS,
        },
        level: UrgencyLevel::Urgent,
    },
    // PED-006: any child with rash and fever
    EscalationRule {
        id: "PED-006",
        description: "Rash with fever in a child",
        condition: EscalationCondition::ChildAllOf {
            keyword_sets: &[RASH_KEYWORDS, FEVER_KEYWORDS],
        },
        level: UrgencyLevel::Urgent,
    },
    // PED-007: any child with a head injury
    EscalationRule {
        id: "PED-007",
        description: "Head injury in a child",
        condition: EscalationCondition::ChildAllOf {
            keyword_sets: &[HEAD_INJURY_KEYWORDS, INJURY_KEYWORDS],
        },
        level: UrgencyLevel::Urgent,
    },
];

// ── Matching logic ──────────────────────────────────────────

/// Every rule that fires for `text` given the patient's demographics. `labels`
/// are lowercase entity labels, which count as keyword hits too.
pub fn check_escalation(
    text: &str,
    labels: &[String],
    demographics: Option<&PatientDemographics>,
) -> Vec<TriggerSignal> {
    let Some(demographics) = demographics else {
        return Vec::new();
    };
    let lower = text.to_lowercase();
    let age_months = demographics.age_in_months();
    let is_minor = demographics.is_minor();

    RULES
        .iter()
        .filter(|rule| rule.condition.matches(&lower, labels, age_months, is_minor))
        .map(|rule| {
            tracing::warn!(
                rule_id = rule.id,
                level = %rule.level,
                "Demographic escalation rule fired"
            );
            TriggerSignal {
                source: TriggerSource::Demographic,
                rule_id: rule.id.to_string(),
                description: rule.description.to_string(),
                level: rule.level,
            }
        })
        .collect()
}

impl EscalationCondition {
    fn matches(&self, lower: &str, labels: &[String], age_months: Option<u32>, is_minor: bool) -> bool {
        let hit = |keywords: &[&str]| {
            keywords
                .iter()
                .any(|kw| lower.contains(kw) || labels.iter().any(|l| l.contains(kw)))
        };
        match self {
            Self::AgeBelow { months, keywords } => {
                let Some(age) = age_months else { return false };
                age < *months && hit(*keywords)
            }
            Self::ChildAllOf { keyword_sets } => {
                is_minor && keyword_sets.iter().all(|set| hit(*set))
            }
        }
    }
}
