//! Language model client.
//!
//! [`OllamaClient`] calls Ollama's `POST /api/chat` with a single user
//! message and `stream: false`, returning the complete reply. Word-by-word
//! display is simulated by the front ends, not streamed from the model.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::LlmConfig;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a reply to `prompt`. `None` leaves the temperature at the
    /// model's default.
    async fn generate(&self, prompt: &str, temperature: Option<f32>) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaClient {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

fn chat_body(model: &str, prompt: &str, temperature: Option<f32>) -> serde_json::Value {
    let mut body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "stream": false,
    });
    if let (Some(t), Some(obj)) = (temperature, body.as_object_mut()) {
        obj.insert("options".to_string(), json!({ "temperature": t }));
    }
    body
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: Option<f32>) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&chat_body(&self.model, prompt, temperature))
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama chat error {}: {}", status, body_text);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Invalid Ollama chat response")?;
        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_with_temperature() {
        let body = chat_body("llama3.2", "hello", Some(0.1));
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn body_without_temperature_has_no_options() {
        let body = chat_body("llama3.2", "hello", None);
        assert!(body.get("options").is_none());
    }

    #[test]
    fn parses_chat_reply() {
        let parsed: ChatResponse = serde_json::from_value(json!({
            "model": "llama3.2",
            "message": { "role": "assistant", "content": "On Crete." },
            "done": true
        }))
        .unwrap();
        assert_eq!(parsed.message.content, "On Crete.");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..LlmConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model_name(), "llama3.2");
    }
}
