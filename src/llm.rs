//! LLM provider abstraction used by the reranker.
//!
//! Providers turn a prompt into a completion string. The completion is
//! expected, not guaranteed, to be JSON; parsing is the reranker's job.
//!
//! - **[`DisabledLlm`]**: always errors; reranking silently degrades.
//! - **[`OpenAiCompatibleLlm`]**: any `/v1/chat/completions` endpoint
//!   (OpenAI, LM Studio, vLLM, Ollama's OpenAI shim).
//! - **[`GeminiLlm`]**: Google Gemini `generateContent`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct DisabledLlm;

#[async_trait]
impl LlmProvider for DisabledLlm {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("LLM provider is disabled")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

pub struct OpenAiCompatibleLlm {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
}

impl OpenAiCompatibleLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let key_var = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        let api_key = std::env::var(key_var).ok().filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
            temperature: config.temperature,
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = [Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read LLM response")?;
        if !status.is_success() {
            bail!("LLM API error {}: {}", status, text);
        }
        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse LLM JSON")?;

        json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("LLM response has no message content"))
    }
}

pub struct GeminiLlm {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
}

impl GeminiLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let key_var = config.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY");
        let api_key = std::env::var(key_var)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow::anyhow!("{} environment variable not set", key_var))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            api_key,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = serde_json::json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json",
            },
        });

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read Gemini response")?;
        if !status.is_success() {
            bail!("Gemini API error {}: {}", status, text);
        }
        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse Gemini JSON")?;

        let parts = json["candidates"]
            .get(0)
            .and_then(|c| c["content"]["parts"].as_array())
            .ok_or_else(|| anyhow::anyhow!("Gemini response has no candidates"))?;
        let content: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if content.is_empty() {
            bail!("Gemini response has no text parts");
        }
        Ok(content)
    }
}

/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledLlm`] |
/// | `"openai"` | [`OpenAiCompatibleLlm`] |
/// | `"gemini"` | [`GeminiLlm`] |
pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledLlm)),
        "openai" => Ok(Arc::new(OpenAiCompatibleLlm::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiLlm::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
