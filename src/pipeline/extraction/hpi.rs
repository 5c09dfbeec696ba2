//! History-of-present-illness fields implied by one message.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Entity, EntityKind, HpiField, Laterality, QualityDimension, TriggerType};

const QUANTITY: &str = r"(?:\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten|several|a few|few|a couple of|couple of)";
const UNIT: &str = r"(?:minutes?|hours?|days?|weeks?|months?|years?)";

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:for|over|past|last)\s+(?:the\s+(?:past|last)\s+)?(?P<d>{QUANTITY}\s+{UNIT})\b"
    ))
    .expect("invalid duration pattern")
});

static SINCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bsince\s+(?P<d>yesterday|last night|this morning|this afternoon|last week|last month|monday|tuesday|wednesday|thursday|friday|saturday|sunday|{QUANTITY}\s+{UNIT}(?:\s+ago)?)\b"
    ))
    .expect("invalid since pattern")
});

static AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?P<d>{QUANTITY}\s+{UNIT}\s+ago)\b"))
        .expect("invalid ago pattern")
});

static STARTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:started|began|came on|woke up with it)\s+(?P<d>yesterday|today|this morning|last night|this afternoon|last week|on \w+day)\b",
    )
    .expect("invalid onset pattern")
});

/// HPI values from the message text and the entities extracted from it.
pub fn derive_hpi(text: &str, entities: &[Entity]) -> Vec<(HpiField, String)> {
    let mut out = Vec::new();

    for caps in DURATION.captures_iter(text) {
        out.push((HpiField::Duration, caps["d"].to_lowercase()));
    }
    for caps in SINCE.captures_iter(text) {
        let since = caps["d"].to_lowercase();
        out.push((HpiField::Duration, format!("since {since}")));
        out.push((HpiField::Onset, since));
    }
    for caps in AGO.captures_iter(text) {
        out.push((HpiField::Onset, caps["d"].to_lowercase()));
    }
    for caps in STARTED.captures_iter(text) {
        out.push((HpiField::Onset, caps["d"].to_lowercase()));
    }

    for entity in entities {
        match &entity.kind {
            EntityKind::Anatomical {
                location,
                laterality,
                radiation,
            } => match radiation {
                Some(target) => out.push((HpiField::Radiation, target.clone())),
                None => out.push((HpiField::Location, sided(location, *laterality))),
            },
            EntityKind::AssociatedSymptom {
                body_site: Some(site),
                primary: true,
                ..
            } => out.push((HpiField::Location, site.clone())),
            EntityKind::Quality {
                descriptor,
                dimension,
                ..
            } => {
                let field = match dimension {
                    QualityDimension::Character => Some(HpiField::Character),
                    QualityDimension::Severity => Some(HpiField::Severity),
                    QualityDimension::Onset => Some(HpiField::Onset),
                    QualityDimension::FunctionalImpact => None,
                };
                if let Some(field) = field {
                    out.push((field, descriptor.clone()));
                }
            }
            EntityKind::Frequency {
                pattern,
                circadian_correlation,
            } => {
                let timing = match circadian_correlation {
                    Some(when) => format!("worse {}", at_time(when)),
                    None => pattern.clone(),
                };
                out.push((HpiField::Timing, timing));
            }
            EntityKind::TriggerContext {
                trigger_type,
                factor,
            } => {
                let value = match trigger_type {
                    TriggerType::Relieving => format!("better with {factor}"),
                    _ => format!("worse with {factor}"),
                };
                out.push((HpiField::ModifyingFactors, value));
            }
            EntityKind::AssociatedSymptom { .. } => {}
        }
    }

    out
}

fn sided(location: &str, laterality: Laterality) -> String {
    match laterality {
        Laterality::Left | Laterality::Right => format!("{} {}", laterality.as_str(), location),
        Laterality::Bilateral => format!("both {location}"),
        Laterality::Central | Laterality::Unspecified => location.to_string(),
    }
}

fn at_time(when: &str) -> String {
    match when {
        "night" => "at night".to_string(),
        other => format!("in the {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_and_onsets_from_text() {
        let hpi = derive_hpi("mild headache for two days, started yesterday", &[]);
        assert!(hpi.contains(&(HpiField::Duration, "two days".into())));
        assert!(hpi.contains(&(HpiField::Onset, "yesterday".into())));
    }

    #[test]
    fn since_sets_duration_and_onset() {
        let hpi = derive_hpi("it has been there since Monday", &[]);
        assert!(hpi.contains(&(HpiField::Duration, "since monday".into())));
        assert!(hpi.contains(&(HpiField::Onset, "monday".into())));
    }

    #[test]
    fn ago_sets_onset() {
        let hpi = derive_hpi("it began 3 hours ago", &[]);
        assert_eq!(hpi, vec![(HpiField::Onset, "3 hours ago".into())]);
    }

    #[test]
    fn sided_locations() {
        assert_eq!(sided("arm", Laterality::Left), "left arm");
        assert_eq!(sided("knee", Laterality::Bilateral), "both knee");
        assert_eq!(sided("jaw", Laterality::Central), "jaw");
    }
}
