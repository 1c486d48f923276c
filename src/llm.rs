//! Model backend abstraction and the Ollama implementation.
//!
//! [`ModelClient`] is the seam between the agent/map-builder logic and the
//! actual language model. The production implementation talks to an
//! Ollama-compatible HTTP API; tests script the trait directly.
//!
//! Chat responses stream as NDJSON. Each line carries a message fragment;
//! the consumer's callback decides whether to keep reading, which is how the
//! stream coordinator enforces its ceilings and cancellation without this
//! module knowing about either.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::RwLock;
use std::time::Duration;

use crate::error::LlmError;
use crate::models::Message;

/// Consumer verdict after each delivered fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    /// Stop reading; the request is dropped mid-stream.
    Stop,
}

/// An installed model as reported by the backend.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: Option<String>,
}

/// The language-model seam.
///
/// `chat` delivers raw fragments to `on_fragment` as they arrive and stops
/// early when the callback says so. `generate` is the non-streaming path used
/// by the map builder.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model_name(&self) -> String;

    /// Switch the active model. No-op for backends without that notion.
    fn set_model(&self, _name: &str) {}

    async fn generate(&self, prompt: &str, num_ctx: usize) -> Result<String, LlmError>;

    // The callback bound must be higher-ranked: under async_trait an elided
    // lifetime here gets tied to the boxed future, which rejects fragments
    // borrowed from per-line parse state inside `chat`.
    async fn chat(
        &self,
        messages: &[Message],
        num_ctx: usize,
        on_fragment: &mut (dyn for<'a> FnMut(&'a str) -> StreamControl + Send),
    ) -> Result<(), LlmError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;
}

/// Client for an Ollama-compatible HTTP API.
pub struct OllamaClient {
    base_url: String,
    model: RwLock<String>,
    temperature: f64,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, temperature: f64, timeout_secs: u64) -> Result<Self> {
        // Connect timeout only: chat streams legitimately run longer than any
        // fixed request deadline. `timeout_secs` bounds non-streaming calls.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let _ = timeout_secs;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: RwLock::new(model.to_string()),
            temperature,
            client,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() || e.is_timeout() {
            LlmError::Unreachable {
                url: self.base_url.clone(),
                message: e.to_string(),
            }
        } else {
            LlmError::Malformed(e.to_string())
        }
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(LlmError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn model_name(&self) -> String {
        self.model.read().expect("model lock poisoned").clone()
    }

    fn set_model(&self, name: &str) {
        *self.model.write().expect("model lock poisoned") = name.to_string();
    }

    async fn generate(&self, prompt: &str, num_ctx: usize) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model_name(),
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_ctx": num_ctx,
            },
        });

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let resp = self.check_status(resp).await?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::Malformed("missing 'response' field".to_string()))
    }

    async fn chat(
        &self,
        messages: &[Message],
        num_ctx: usize,
        on_fragment: &mut (dyn for<'a> FnMut(&'a str) -> StreamControl + Send),
    ) -> Result<(), LlmError> {
        let body = serde_json::json!({
            "model": self.model_name(),
            "messages": messages,
            "stream": true,
            "options": {
                "temperature": self.temperature,
                "num_ctx": num_ctx,
            },
        });

        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let mut resp = self.check_status(resp).await?;

        // NDJSON lines may split across network chunks; buffer partial lines.
        let mut line_buf = String::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?
        {
            line_buf.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = line_buf.find('\n') {
                let line: String = line_buf.drain(..=pos).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Ok(json) = serde_json::from_str::<serde_json::Value>(line) else {
                    // Malformed mid-stream line: skip, never fail the stream.
                    continue;
                };
                if let Some(content) = json
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(|c| c.as_str())
                {
                    if !content.is_empty() && on_fragment(content) == StreamControl::Stop {
                        return Ok(());
                    }
                }
                if json.get("done").and_then(|d| d.as_bool()) == Some(true) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let resp = self.check_status(resp).await?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        let models = json
            .get("models")
            .and_then(|m| m.as_array())
            .ok_or_else(|| LlmError::Malformed("missing 'models' array".to_string()))?;

        Ok(models
            .iter()
            .map(|m| ModelInfo {
                name: m
                    .get("name")
                    .or_else(|| m.get("model"))
                    .and_then(|n| n.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                size_bytes: m.get("size").and_then(|s| s.as_u64()).unwrap_or(0),
                modified_at: m
                    .get("modified_at")
                    .and_then(|t| t.as_str())
                    .map(|s| s.to_string()),
            })
            .collect())
    }
}
