//! OpenAI-compatible chat completions client
use crate::model::{ModelClient, ModelError};
use async_trait::async_trait;
use netheal_core::ModelConfig;
use serde_json::json;
use std::time::Duration;

const SYSTEM_PROMPT: &str =
    "You are a network operations assistant. Answer with a single JSON object and nothing else.";

pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }

    /// Build from config, reading the key from the named env var if set
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|k| !k.is_empty());

        Ok(Self {
            client,
            base_url: config.endpoint.clone(),
            model: config.name.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.1,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;
        let value: serde_json::Value = res
            .json()
            .await
            .map_err(|e| ModelError::BadReply(e.to_string()))?;

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ModelError::BadReply("missing choices[0].message.content".to_string()))
    }
}
