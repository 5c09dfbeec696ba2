//! Optional external language-understanding providers.
//!
//! Providers only ever enrich the deterministic pipeline: their intents are
//! merged with bounded influence, and emergency detection never waits on them.

pub mod ollama;
pub mod openai;
pub mod pool;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::intent::IntentKind;

pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;
pub use pool::ProviderPool;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Provider rate limited")]
    RateLimited,

    #[error("No providers configured")]
    NoProviders,
}

/// What a provider contributes for one utterance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderClassification {
    pub intents: Vec<(IntentKind, f32)>,
}

/// A language-understanding backend. Implementations block; the pool bounds
/// every call with a timeout.
pub trait LanguageProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn classify(&self, text: &str) -> Result<ProviderClassification, ProviderError>;
}

pub(crate) const CLASSIFY_SYSTEM_PROMPT: &str = "You label patient messages in a clinical intake \
conversation. Reply with JSON only, in the form {\"intents\":[{\"kind\":\"<intent>\",\"confidence\":<0..1>}]}. \
Allowed intents: symptom_reporting, severity_assessment, emergency_concern, follow_up, \
duration_report, location_report, trigger_report, medication_query, medication_report, \
allergy_report, medical_history_report, family_history_report, social_history_report, \
reassurance_seeking, clarification, denial, affirmation, greeting, gratitude, end_conversation. \
Do not diagnose.";

#[derive(Deserialize)]
struct RawClassification {
    #[serde(default)]
    intents: Vec<RawIntent>,
}

#[derive(Deserialize)]
struct RawIntent {
    kind: String,
    confidence: f32,
}

/// Parse a model reply into a classification. Unknown intent names are
/// skipped and confidences are clamped; JSON wrapped in prose or code fences
/// is tolerated.
pub(crate) fn parse_classification(reply: &str) -> Result<ProviderClassification, ProviderError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => return Err(ProviderError::Parse("no JSON object in reply".into())),
    };
    let raw: RawClassification =
        serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let intents = raw
        .intents
        .into_iter()
        .filter_map(|i| {
            let kind = i.kind.trim().parse::<IntentKind>().ok()?;
            i.confidence
                .is_finite()
                .then(|| (kind, i.confidence.clamp(0.0, 1.0)))
        })
        .collect();
    Ok(ProviderClassification { intents })
}

/// Map a transport error to a provider error.
pub(crate) fn http_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }
    } else if e.is_connect() {
        ProviderError::Unavailable(e.to_string())
    } else {
        ProviderError::Http(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Mock provider
// ---------------------------------------------------------------------------

/// Canned provider for tests and offline runs.
pub struct MockProvider {
    name: String,
    result: Result<ProviderClassification, ProviderError>,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str, intents: Vec<(IntentKind, f32)>) -> Self {
        Self {
            name: name.to_string(),
            result: Ok(ProviderClassification { intents }),
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str, error: ProviderError) -> Self {
        Self {
            result: Err(error),
            ..Self::new(name, Vec::new())
        }
    }

    /// Sleeps before answering, to exercise timeouts.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl LanguageProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, _text: &str) -> Result<ProviderClassification, ProviderError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"intents\":[{\"kind\":\"symptom_reporting\",\"confidence\":0.8},{\"kind\":\"made_up\",\"confidence\":0.9}]}\n```";
        let parsed = parse_classification(reply).unwrap();
        assert_eq!(parsed.intents, vec![(IntentKind::SymptomReporting, 0.8)]);
    }

    #[test]
    fn clamps_confidence() {
        let parsed =
            parse_classification(r#"{"intents":[{"kind":"clarification","confidence":3.0}]}"#).unwrap();
        assert_eq!(parsed.intents, vec![(IntentKind::Clarification, 1.0)]);
    }

    #[test]
    fn rejects_prose() {
        assert!(matches!(
            parse_classification("I think the patient is worried"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn mock_counts_calls() {
        let mock = MockProvider::failing("down", ProviderError::Unavailable("offline".into()));
        assert!(mock.classify("x").is_err());
        assert!(mock.classify("x").is_err());
        assert_eq!(mock.calls(), 2);
    }
}
