//! Text-generation collaborator abstraction.
//!
//! The pipeline only needs "prompt in, free text out"; everything else
//! (JSON extraction, validation) happens on our side so a sloppy model
//! cannot break the contract. Real backends are Ollama-style or
//! OpenAI-compatible HTTP endpoints; tests use the scripted fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Sampling temperature passed through to the backend
    pub temperature: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key: None,
            temperature: 0.9,
        }
    }
}

/// Generation call errors
#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("backend returned an unreadable response: {0}")]
    BadResponse(String),

    #[error("backend returned empty text")]
    Empty,
}

/// One generation call: free text expected to embed a question object.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, seed: u64) -> Result<String, GeneratorError>;
}

/// HTTP text generator. Tries the Ollama API when the endpoint looks
/// like Ollama, otherwise the OpenAI-compatible chat endpoint.
pub struct HttpTextGenerator {
    config: GeneratorConfig,
    client: reqwest::Client,
}

impl HttpTextGenerator {
    /// The HTTP client carries no timeout of its own; the attempt
    /// engine races every call against its own budget.
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn is_ollama_endpoint(&self) -> bool {
        self.config.endpoint.contains("11434") || self.config.endpoint.contains("ollama")
    }

    async fn call_ollama(&self, prompt: &str, seed: u64) -> Result<String, GeneratorError> {
        let url = format!("{}/api/generate", self.config.endpoint);

        let request_body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "seed": seed,
            },
        });

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeneratorError::Http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GeneratorError::Http(format!(
                "HTTP {} from Ollama",
                response.status()
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GeneratorError::BadResponse(e.to_string()))?;

        response_json
            .get("response")
            .and_then(|v| v.as_str())
            .filter(|t| !t.trim().is_empty())
            .map(String::from)
            .ok_or(GeneratorError::Empty)
    }

    async fn call_openai_compatible(
        &self,
        prompt: &str,
        seed: u64,
    ) -> Result<String, GeneratorError> {
        let url = format!("{}/v1/chat/completions", self.config.endpoint);

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "user", "content": prompt},
            ],
            "temperature": self.config.temperature,
            "seed": seed,
        });

        let mut request = self.client.post(&url).json(&request_body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GeneratorError::Http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GeneratorError::Http(format!(
                "HTTP {} from OpenAI-compatible API",
                response.status()
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GeneratorError::BadResponse(e.to_string()))?;

        response_json
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .filter(|t| !t.trim().is_empty())
            .map(String::from)
            .ok_or(GeneratorError::Empty)
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, seed: u64) -> Result<String, GeneratorError> {
        if self.is_ollama_endpoint() {
            match self.call_ollama(prompt, seed).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::debug!("Ollama API failed, trying OpenAI-compatible: {}", e);
                }
            }
        }
        self.call_openai_compatible(prompt, seed).await
    }
}

/// Scripted behavior for one fake call.
#[derive(Clone)]
pub enum FakeResponse {
    Text(String),
    Error(GeneratorError),
    /// Never completes within any attempt budget.
    Hang,
}

/// Fake generator for tests: replays scripted responses in order,
/// repeating the last one when the script runs out.
pub struct FakeTextGenerator {
    responses: std::sync::Mutex<Vec<FakeResponse>>,
    call_count: std::sync::Mutex<usize>,
}

impl FakeTextGenerator {
    pub fn new(responses: Vec<FakeResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            call_count: std::sync::Mutex::new(0),
        }
    }

    pub fn always_text(text: impl Into<String>) -> Self {
        Self::new(vec![FakeResponse::Text(text.into())])
    }

    pub fn always_error(error: GeneratorError) -> Self {
        Self::new(vec![FakeResponse::Error(error)])
    }

    /// Simulates a collaborator that never answers in time.
    pub fn always_hangs() -> Self {
        Self::new(vec![FakeResponse::Hang])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for FakeTextGenerator {
    async fn generate(&self, _prompt: &str, _seed: u64) -> Result<String, GeneratorError> {
        {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
        }

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                FakeResponse::Error(GeneratorError::Empty)
            } else if responses.len() == 1 {
                responses[0].clone()
            } else {
                responses.remove(0)
            }
        };

        match next {
            FakeResponse::Text(t) => Ok(t),
            FakeResponse::Error(e) => Err(e),
            FakeResponse::Hang => {
                // Outlives any sane attempt budget; abandoned by the
                // engine's timeout, not cancelled here.
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Err(GeneratorError::Empty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_config_default() {
        let config = GeneratorConfig::default();
        assert_eq!(config.endpoint, "http://127.0.0.1:11434");
        assert!(config.api_key.is_none());
    }

    #[tokio::test]
    async fn test_fake_always_text() {
        let fake = FakeTextGenerator::always_text("{\"a\":1}");
        assert_eq!(fake.generate("p", 0).await.unwrap(), "{\"a\":1}");
        assert_eq!(fake.generate("p", 0).await.unwrap(), "{\"a\":1}");
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fake_scripted_sequence() {
        let fake = FakeTextGenerator::new(vec![
            FakeResponse::Error(GeneratorError::Empty),
            FakeResponse::Text("second".to_string()),
        ]);
        assert!(fake.generate("p", 0).await.is_err());
        assert_eq!(fake.generate("p", 1).await.unwrap(), "second");
        // Script exhausted down to one entry, which repeats
        assert_eq!(fake.generate("p", 2).await.unwrap(), "second");
        assert_eq!(fake.call_count(), 3);
    }
}
