mod client;
pub mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use serde_json::json;
use thiserror::Error;

use client::OpenAiClient;
use types::*;

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A plain-text completion plus its token usage.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

/// A parsed structured extraction plus its token usage.
#[derive(Debug, Clone)]
pub struct Extraction<T> {
    pub value: T,
    pub usage: Usage,
}

/// Errors are split so callers can tell contract drift (malformed output,
/// which burned tokens) from transport-level failures (which did not).
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {detail}")]
    Malformed { detail: String, usage: Usage },

    #[error("empty response from model")]
    Empty { usage: Usage },
}

impl LlmError {
    /// True for failures worth retrying with backoff (network, 429, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Malformed { .. } | LlmError::Empty { .. } => false,
        }
    }
}

// =============================================================================
// OpenAi
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    /// Plain-text chat completion.
    pub async fn complete(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Completion, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                WireMessage::system(system),
                WireMessage::user(user),
            ],
            max_tokens,
            temperature,
            response_format: None,
        };

        let response = self.client().chat(&request).await?;
        let usage = response.usage();
        let text = response
            .text()
            .ok_or(LlmError::Empty { usage })?
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(LlmError::Empty { usage });
        }
        Ok(Completion { text, usage })
    }

    /// Type-safe structured extraction via JSON mode. A well-formed HTTP
    /// response that fails to parse into `T` is reported as `Malformed`
    /// with the usage that was spent on it.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Extraction<T>, LlmError> {
        let system: String = system.into();
        let system = format!(
            "{system}\n\nRespond with a JSON object matching this schema:\n{}",
            T::schema_json()
        );
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                WireMessage::system(system),
                WireMessage::user(user),
            ],
            max_tokens,
            temperature: 0.3,
            response_format: Some(json!({ "type": "json_object" })),
        };

        let response = self.client().chat(&request).await?;
        let usage = response.usage();
        let text = response.text().ok_or(LlmError::Empty { usage })?;

        let value = serde_json::from_str::<T>(&text).map_err(|e| LlmError::Malformed {
            detail: e.to_string(),
            usage,
        })?;

        Ok(Extraction { value, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_new_sets_model() {
        let ai = OpenAi::new("sk-test", "gpt-4o-mini");
        assert_eq!(ai.model(), "gpt-4o-mini");
    }

    #[test]
    fn openai_with_base_url() {
        let ai = OpenAi::new("sk-test", "gpt-4o-mini").with_base_url("http://localhost:9999");
        assert_eq!(ai.base_url, Some("http://localhost:9999".to_string()));
    }

    #[test]
    fn transient_classification() {
        assert!(LlmError::Api { status: 429, body: String::new() }.is_transient());
        assert!(LlmError::Api { status: 503, body: String::new() }.is_transient());
        assert!(!LlmError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!LlmError::Malformed { detail: "eof".into(), usage: Usage::default() }
            .is_transient());
    }
}
