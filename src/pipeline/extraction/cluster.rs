//! Compound symptom descriptions: "abdominal pain and vomiting", "fever with chills".

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::EntityId;

/// Symptoms joined by a connector within one sentence. The first one named is primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomCluster {
    pub primary: EntityId,
    pub associated: Vec<EntityId>,
    pub connector: String,
}

/// Gaps longer than this are two separate statements, not a compound description.
const MAX_GAP_WORDS: usize = 8;

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?\n]").expect("invalid sentence pattern"));

static CONNECTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:along with|as well as|together with|and|with|plus|also)\b|,|&")
        .expect("invalid connector pattern")
});

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w'-]+").expect("invalid word pattern"));

/// A symptom candidate: caller's index plus its byte span.
#[derive(Debug, Clone, Copy)]
pub struct SymptomSpan {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

/// A cluster expressed in caller indices.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCluster {
    pub primary: usize,
    pub associated: Vec<usize>,
    pub connector: String,
}

/// Group `symptoms` (ordered by start) into clusters.
pub fn find_clusters(text: &str, symptoms: &[SymptomSpan]) -> Vec<IndexCluster> {
    let mut clusters: Vec<IndexCluster> = Vec::new();
    let mut current: Option<IndexCluster> = None;

    for pair in symptoms.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let connector = if prev.end <= next.start {
            joining_connector(&text[prev.end..next.start])
        } else {
            None
        };

        match (connector, current.as_mut()) {
            (Some(_), Some(cluster)) => cluster.associated.push(next.index),
            (Some(connector), None) => {
                current = Some(IndexCluster {
                    primary: prev.index,
                    associated: vec![next.index],
                    connector,
                });
            }
            (None, _) => {
                if let Some(done) = current.take() {
                    clusters.push(done);
                }
            }
        }
    }
    if let Some(done) = current {
        clusters.push(done);
    }
    clusters
}

fn joining_connector(gap: &str) -> Option<String> {
    if SENTENCE_BREAK.is_match(gap) || WORD.find_iter(gap).count() > MAX_GAP_WORDS {
        return None;
    }
    CONNECTOR
        .find(gap)
        .map(|m| m.as_str().trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(text: &str, names: &[&str]) -> Vec<SymptomSpan> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let start = text.find(name).unwrap();
                SymptomSpan {
                    index,
                    start,
                    end: start + name.len(),
                }
            })
            .collect()
    }

    #[test]
    fn joined_symptoms_form_one_cluster() {
        let text = "abdominal pain and vomiting";
        let clusters = find_clusters(text, &spans(text, &["abdominal pain", "vomiting"]));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].primary, 0);
        assert_eq!(clusters[0].associated, vec![1]);
        assert_eq!(clusters[0].connector, "and");
    }

    #[test]
    fn list_extends_cluster() {
        let text = "fever with chills, cough and sore throat";
        let clusters = find_clusters(
            text,
            &spans(text, &["fever", "chills", "cough", "sore throat"]),
        );
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].associated, vec![1, 2, 3]);
        assert_eq!(clusters[0].connector, "with");
    }

    #[test]
    fn sentence_break_splits_clusters() {
        let text = "I have a headache. Yesterday I had nausea";
        let clusters = find_clusters(text, &spans(text, &["headache", "nausea"]));
        assert!(clusters.is_empty());
    }

    #[test]
    fn single_symptom_has_no_cluster() {
        let text = "just a cough";
        assert!(find_clusters(text, &spans(text, &["cough"])).is_empty());
    }
}
