use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    http_error, parse_classification, LanguageProvider, ProviderClassification, ProviderError,
    CLASSIFY_SYSTEM_PROMPT,
};

/// Local Ollama instance used for intent classification.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout,
        })
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl LanguageProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn classify(&self, text: &str) -> Result<ProviderClassification, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: text,
            system: CLASSIFY_SYSTEM_PROMPT,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| http_error(e, self.timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ProviderError::Http(format!("{}: {}", status.as_u16(), body)));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_classification(&parsed.response)
    }
}
