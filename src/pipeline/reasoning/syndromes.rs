//! Predefined syndrome clusters and weighted matching against session evidence.

use std::collections::BTreeSet;

use crate::models::{ClinicalSignificance as Sig, EntityId};
use crate::pipeline::arena::EvidenceView;

/// One weighted member of a syndrome. Any of `labels` satisfies it.
#[derive(Debug)]
pub struct SyndromeMember {
    pub labels: &'static [&'static str],
    pub weight: f32,
}

#[derive(Debug)]
pub struct Syndrome {
    pub id: &'static str,
    pub condition: &'static str,
    pub members: &'static [SyndromeMember],
    /// At least one must be present or the score is halved. Empty means no anchor.
    pub anchors: &'static [&'static str],
    /// Probability at or above which the match alone is an emergency.
    pub emergency_threshold: Option<f32>,
    pub significance: Sig,
    pub next_step: &'static str,
}

impl Syndrome {
    pub fn total_weight(&self) -> f32 {
        self.members.iter().map(|m| m.weight).sum()
    }
}

const ANCHOR_MISSING_FACTOR: f32 = 0.5;

const fn member(labels: &'static [&'static str], weight: f32) -> SyndromeMember {
    SyndromeMember { labels, weight }
}

pub static SYNDROMES: &[Syndrome] = &[
    Syndrome {
        id: "SYN-ACS",
        condition: "Acute coronary syndrome",
        members: &[
            member(&["chest pain"], 0.35),
            member(&["shortness of breath"], 0.15),
            member(&["sweating"], 0.1),
            member(&["nausea", "vomiting"], 0.05),
            member(&["left arm", "jaw", "left shoulder", "radiating"], 0.15),
            member(
                &[
                    "crushing", "pressure", "squeezing", "heavy", "heaviness", "tightness", "tight",
                    "pressing", "like an elephant", "vise-like",
                ],
                0.1,
            ),
            member(&["exertion"], 0.1),
        ],
        anchors: &["chest pain"],
        emergency_threshold: Some(0.5),
        significance: Sig::Emergency,
        next_step: "Call emergency services now for an ECG and cardiac assessment.",
    },
    Syndrome {
        id: "SYN-PE",
        condition: "Pulmonary embolism",
        members: &[
            member(&["shortness of breath"], 0.3),
            member(&["pleuritic chest pain", "chest pain"], 0.2),
            member(&["leg swelling", "calf"], 0.2),
            member(&["coughing blood"], 0.15),
            member(&["palpitations"], 0.1),
            member(&["sudden onset"], 0.05),
        ],
        anchors: &["shortness of breath"],
        emergency_threshold: Some(0.7),
        significance: Sig::Emergency,
        next_step: "Seek emergency assessment for possible blood clot in the lungs.",
    },
    Syndrome {
        id: "SYN-STROKE",
        condition: "Stroke or transient ischaemic attack",
        members: &[
            member(&["facial droop"], 0.3),
            member(&["slurred speech"], 0.3),
            member(&["one-sided weakness"], 0.3),
            member(&["confusion", "vision changes"], 0.05),
            member(&["sudden onset", "thunderclap headache"], 0.05),
        ],
        anchors: &[],
        emergency_threshold: Some(0.3),
        significance: Sig::Emergency,
        next_step: "Call emergency services immediately and note the time symptoms started.",
    },
    Syndrome {
        id: "SYN-ABDO",
        condition: "Acute abdomen",
        members: &[
            member(&["abdominal pain", "epigastric pain", "flank pain"], 0.35),
            member(&["excruciating", "unbearable", "agonizing", "worst pain", "severe"], 0.2),
            member(&["persistent vomiting", "vomiting blood"], 0.15),
            member(&["fever", "high fever"], 0.1),
            member(&["blood in stool"], 0.1),
            member(&["sudden onset"], 0.1),
        ],
        anchors: &["abdominal pain", "epigastric pain", "flank pain"],
        emergency_threshold: Some(0.7),
        significance: Sig::Emergency,
        next_step: "Urgent in-person abdominal examination; do not eat or drink until assessed.",
    },
    Syndrome {
        id: "SYN-MENING",
        condition: "Meningitis",
        members: &[
            member(&["fever", "high fever"], 0.25),
            member(&["neck stiffness"], 0.3),
            member(&["headache", "thunderclap headache"], 0.2),
            member(&["light sensitivity"], 0.1),
            member(&["confusion"], 0.1),
            member(&["non-blanching rash"], 0.05),
        ],
        anchors: &["neck stiffness", "non-blanching rash"],
        emergency_threshold: Some(0.7),
        significance: Sig::Emergency,
        next_step: "Seek emergency care now for assessment of possible meningitis.",
    },
    Syndrome {
        id: "SYN-SEPSIS",
        condition: "Sepsis",
        members: &[
            member(&["high fever", "fever"], 0.25),
            member(&["chills"], 0.15),
            member(&["confusion"], 0.2),
            member(&["palpitations"], 0.15),
            member(&["shortness of breath"], 0.1),
            member(&["weakness", "syncope", "lightheadedness"], 0.15),
        ],
        anchors: &["fever", "high fever"],
        emergency_threshold: Some(0.75),
        significance: Sig::Emergency,
        next_step: "Seek emergency care; infection with these signs needs same-hour assessment.",
    },
    Syndrome {
        id: "SYN-ANAPH",
        condition: "Anaphylaxis",
        members: &[
            member(&["throat swelling"], 0.35),
            member(&["hives", "rash"], 0.2),
            member(&["shortness of breath", "wheezing"], 0.25),
            member(&["environmental exposure"], 0.1),
            member(&["lightheadedness", "syncope"], 0.1),
        ],
        anchors: &[],
        emergency_threshold: Some(0.55),
        significance: Sig::Emergency,
        next_step: "Use an adrenaline auto-injector if available and call emergency services.",
    },
    Syndrome {
        id: "SYN-MIGRAINE",
        condition: "Migraine",
        members: &[
            member(&["migraine"], 0.3),
            member(&["headache"], 0.25),
            member(&["light sensitivity"], 0.15),
            member(&["nausea", "vomiting"], 0.15),
            member(&["throbbing", "pounding"], 0.1),
            member(&["vision changes"], 0.05),
        ],
        anchors: &["headache", "migraine"],
        emergency_threshold: None,
        significance: Sig::Moderate,
        next_step: "Primary care review of headache pattern and triggers.",
    },
    Syndrome {
        id: "SYN-GASTRO",
        condition: "Gastroenteritis",
        members: &[
            member(&["vomiting", "persistent vomiting"], 0.3),
            member(&["diarrhea"], 0.3),
            member(&["nausea"], 0.15),
            member(&["abdominal pain", "epigastric pain"], 0.15),
            member(&["fever"], 0.1),
        ],
        anchors: &["vomiting", "persistent vomiting", "diarrhea"],
        emergency_threshold: None,
        significance: Sig::Moderate,
        next_step: "Oral fluids and primary care review if symptoms persist beyond 48 hours.",
    },
    Syndrome {
        id: "SYN-GERD",
        condition: "Gastro-oesophageal reflux",
        members: &[
            member(&["heartburn"], 0.4),
            member(&["epigastric pain"], 0.2),
            member(&["food intake"], 0.15),
            member(&["burning"], 0.1),
            member(&["night", "lying down"], 0.1),
            member(&["cough"], 0.05),
        ],
        anchors: &["heartburn", "epigastric pain"],
        emergency_threshold: None,
        significance: Sig::Low,
        next_step: "Primary care review; note relation of symptoms to meals and lying down.",
    },
    Syndrome {
        id: "SYN-TENSION",
        condition: "Tension-type headache",
        members: &[
            member(&["headache"], 0.4),
            member(&["dull", "pressure", "tightness", "tight"], 0.15),
            member(&["stress"], 0.2),
            member(&["mild", "moderate"], 0.1),
            member(&["neck"], 0.1),
            member(&["daily", "constant"], 0.05),
        ],
        anchors: &["headache"],
        emergency_threshold: None,
        significance: Sig::Low,
        next_step: "Routine primary care review if headaches persist or change in character.",
    },
    Syndrome {
        id: "SYN-URI",
        condition: "Upper respiratory infection",
        members: &[
            member(&["sore throat"], 0.2),
            member(&["nasal congestion", "common cold"], 0.25),
            member(&["cough"], 0.2),
            member(&["sneezing"], 0.1),
            member(&["fever"], 0.1),
            member(&["body aches", "fatigue"], 0.15),
        ],
        anchors: &[],
        emergency_threshold: None,
        significance: Sig::Low,
        next_step: "Self-care and primary care review if symptoms last beyond ten days.",
    },
];

#[derive(Debug, Clone)]
pub struct SyndromeMatch {
    pub syndrome: &'static Syndrome,
    /// Normalized to [0, 1].
    pub probability: f32,
    /// First label of each matched member.
    pub matched: Vec<&'static str>,
    pub supporting: Vec<EntityId>,
}

impl SyndromeMatch {
    pub fn meets_emergency_threshold(&self) -> bool {
        self.syndrome
            .emergency_threshold
            .is_some_and(|t| self.probability >= t)
    }
}

/// Score every syndrome against all evidence so far. Only syndromes with at
/// least one matched member are returned, highest probability first.
pub fn match_syndromes(view: &EvidenceView<'_>) -> Vec<SyndromeMatch> {
    let evidence: Vec<(EntityId, String)> = view
        .entities()
        .flat_map(|e| {
            e.evidence_labels()
                .into_iter()
                .map(move |label| (e.id, label.to_lowercase()))
        })
        .collect();

    let mut matches: Vec<SyndromeMatch> = SYNDROMES
        .iter()
        .filter_map(|syndrome| score(syndrome, &evidence))
        .collect();
    matches.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    matches
}

fn score(syndrome: &'static Syndrome, evidence: &[(EntityId, String)]) -> Option<SyndromeMatch> {
    let mut weight = 0.0;
    let mut matched = Vec::new();
    let mut supporting = BTreeSet::new();

    for member in syndrome.members {
        let hits: Vec<EntityId> = evidence
            .iter()
            .filter(|(_, label)| member.labels.contains(&label.as_str()))
            .map(|(id, _)| *id)
            .collect();
        if hits.is_empty() {
            continue;
        }
        weight += member.weight;
        matched.push(member.labels[0]);
        supporting.extend(hits);
    }
    if matched.is_empty() {
        return None;
    }

    let total = syndrome.total_weight();
    let mut probability = if total > 0.0 { weight / total } else { 0.0 };
    let anchored = syndrome.anchors.is_empty()
        || syndrome
            .anchors
            .iter()
            .any(|a| evidence.iter().any(|(_, label)| label == a));
    if !anchored {
        probability *= ANCHOR_MISSING_FACTOR;
    }

    Some(SyndromeMatch {
        syndrome,
        probability: probability.clamp(0.0, 1.0),
        matched,
        supporting: supporting.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_weights_are_normalized() {
        for syndrome in SYNDROMES {
            let total = syndrome.total_weight();
            assert!((total - 1.0).abs() < 1e-4, "{} sums to {total}", syndrome.id);
        }
    }

    #[test]
    fn twelve_syndromes_with_unique_ids() {
        let mut ids: Vec<_> = SYNDROMES.iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn anchors_are_member_labels() {
        for syndrome in SYNDROMES {
            for anchor in syndrome.anchors {
                assert!(
                    syndrome.members.iter().any(|m| m.labels.contains(anchor)),
                    "{} anchor {anchor}",
                    syndrome.id
                );
            }
        }
    }

    #[test]
    fn scoring_halves_without_anchor() {
        let acs = &SYNDROMES[0];
        let evidence = vec![(EntityId(0), "shortness of breath".to_string())];
        let m = score(acs, &evidence).unwrap();
        assert!((m.probability - 0.075).abs() < 1e-4);

        let evidence = vec![
            (EntityId(0), "chest pain".to_string()),
            (EntityId(1), "shortness of breath".to_string()),
            (EntityId(2), "crushing".to_string()),
        ];
        let m = score(acs, &evidence).unwrap();
        assert!((m.probability - 0.6).abs() < 1e-4);
        assert!(m.meets_emergency_threshold());
        assert_eq!(m.supporting, vec![EntityId(0), EntityId(1), EntityId(2)]);
    }

    #[test]
    fn no_evidence_no_match() {
        assert!(score(&SYNDROMES[0], &[]).is_none());
    }
}
