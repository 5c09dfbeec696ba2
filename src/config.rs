use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Anamnesis";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_CRATE_NAME"))
}

/// Engine tuning knobs. Every field can be overridden from the environment
/// (`ANAMNESIS_*`), see [`EngineConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tokens on each side of an ambiguous term used for disambiguation.
    pub context_window_tokens: usize,
    /// Hard bound on any external language-understanding call.
    pub provider_timeout_ms: u64,
    /// Consecutive failures before a provider's circuit opens.
    pub provider_failure_threshold: u32,
    /// How long an open circuit stays open.
    pub provider_cooldown_secs: u64,
    /// Idle time after which a session is swept.
    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// Patient messages are truncated to this many bytes after sanitization.
    pub max_input_length: usize,
    /// HPI fields (out of 8) required before leaving the HPI stage.
    pub hpi_required_fields: usize,
    pub bind_addr: String,
    /// SQLite file for the context store. In-memory store when unset.
    pub database_path: Option<String>,
    /// Local Ollama endpoint used as a language-understanding provider.
    pub ollama_url: Option<String>,
    pub ollama_model: String,
    /// OpenAI-compatible endpoint; one provider slot per API key.
    pub openai_url: Option<String>,
    pub openai_model: String,
    pub openai_api_keys: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_window_tokens: 10,
            provider_timeout_ms: 3_000,
            provider_failure_threshold: 3,
            provider_cooldown_secs: 60,
            session_ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
            max_input_length: 2_000,
            hpi_required_fields: 4,
            bind_addr: "127.0.0.1:8088".to_string(),
            database_path: None,
            ollama_url: None,
            ollama_model: "medgemma".to_string(),
            openai_url: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_api_keys: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Build from defaults overridden by `ANAMNESIS_*` environment variables.
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup, for tests.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        parse_into(&lookup, "ANAMNESIS_CONTEXT_WINDOW", &mut cfg.context_window_tokens);
        parse_into(&lookup, "ANAMNESIS_PROVIDER_TIMEOUT_MS", &mut cfg.provider_timeout_ms);
        parse_into(
            &lookup,
            "ANAMNESIS_PROVIDER_FAILURE_THRESHOLD",
            &mut cfg.provider_failure_threshold,
        );
        parse_into(&lookup, "ANAMNESIS_PROVIDER_COOLDOWN_SECS", &mut cfg.provider_cooldown_secs);
        parse_into(&lookup, "ANAMNESIS_SESSION_TTL_SECS", &mut cfg.session_ttl_secs);
        parse_into(&lookup, "ANAMNESIS_SWEEP_INTERVAL_SECS", &mut cfg.sweep_interval_secs);
        parse_into(&lookup, "ANAMNESIS_MAX_INPUT_LENGTH", &mut cfg.max_input_length);
        parse_into(&lookup, "ANAMNESIS_HPI_REQUIRED_FIELDS", &mut cfg.hpi_required_fields);

        if let Some(addr) = lookup("ANAMNESIS_BIND_ADDR") {
            cfg.bind_addr = addr;
        }
        cfg.database_path = lookup("ANAMNESIS_DB_PATH").filter(|p| !p.trim().is_empty());
        cfg.ollama_url = lookup("ANAMNESIS_OLLAMA_URL").filter(|u| !u.trim().is_empty());
        if let Some(model) = lookup("ANAMNESIS_OLLAMA_MODEL") {
            cfg.ollama_model = model;
        }
        cfg.openai_url = lookup("ANAMNESIS_OPENAI_URL").filter(|u| !u.trim().is_empty());
        if let Some(model) = lookup("ANAMNESIS_OPENAI_MODEL") {
            cfg.openai_model = model;
        }
        if let Some(keys) = lookup("ANAMNESIS_OPENAI_API_KEYS") {
            cfg.openai_api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }

        cfg.hpi_required_fields = cfg.hpi_required_fields.clamp(1, 8);
        cfg
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn provider_cooldown(&self) -> Duration {
        Duration::from_secs(self.provider_cooldown_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Whether any external provider is configured.
    pub fn has_provider(&self) -> bool {
        self.ollama_url.is_some() || (self.openai_url.is_some() && !self.openai_api_keys.is_empty())
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else { return };
    match raw.trim().parse::<T>() {
        Ok(v) => *target = v,
        Err(_) => tracing::warn!(key, "Ignoring unparseable configuration value"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = EngineConfig::from_lookup(|_| None);
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.context_window_tokens, 10);
        assert!(!cfg.has_provider());
    }

    #[test]
    fn overrides_from_environment() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("ANAMNESIS_CONTEXT_WINDOW", "6"),
            ("ANAMNESIS_PROVIDER_TIMEOUT_MS", "250"),
            ("ANAMNESIS_OPENAI_URL", "https://llm.example"),
            ("ANAMNESIS_OPENAI_API_KEYS", "k1, k2,,k3"),
        ]));
        assert_eq!(cfg.context_window_tokens, 6);
        assert_eq!(cfg.provider_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.openai_api_keys, vec!["k1", "k2", "k3"]);
        assert!(cfg.has_provider());
    }

    #[test]
    fn unparseable_values_keep_defaults() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("ANAMNESIS_SESSION_TTL_SECS", "soon"),
            ("ANAMNESIS_HPI_REQUIRED_FIELDS", "42"),
        ]));
        assert_eq!(cfg.session_ttl_secs, 30 * 60);
        assert_eq!(cfg.hpi_required_fields, 8);
    }

    #[test]
    fn app_name_is_anamnesis() {
        assert_eq!(APP_NAME, "Anamnesis");
    }
}
