//! Small-model chat client.
//!
//! Speaks the backend's native `/api/chat` endpoint with a fixed request
//! shape: non-streaming, temperature 0, bounded output tokens. Both the
//! intent classifier and the complexity scorer go through this client; the
//! per-call timeout is baked into the reqwest client so a slow backend
//! surfaces as an error here and a fallback in the caller, never as a
//! router failure.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde_json::{json, Value};

/// Output token cap for classifier calls — the JSON verdict is tiny.
const NUM_PREDICT: u32 = 128;

/// Queries are truncated to this many characters before being sent; the
/// classification signal is in the head of the query.
const MAX_PROMPT_CHARS: usize = 2_000;

/// Thin adapter over the small-model `/api/chat` endpoint.
#[derive(Clone)]
pub struct SlmChatClient {
    client: Client,
    base_url: String,
}

impl SlmChatClient {
    /// Build a client. No API key is required for typical local deployments.
    pub fn new(base_url: &str, timeout_ms: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("failed to build reqwest client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send one system+user exchange and return the assistant message text.
    pub async fn chat(&self, model: &str, system: &str, query: &str) -> anyhow::Result<String> {
        let truncated: String = query.chars().take(MAX_PROMPT_CHARS).collect();
        let url = format!("{}/api/chat", self.base_url);
        let body = json!({
            "model": model,
            "stream": false,
            "options": { "temperature": 0.0, "num_predict": NUM_PREDICT },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": format!("Query: {truncated}") },
            ],
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        let text = response.text().await.context("reading SLM response body")?;

        if !status.is_success() {
            anyhow::bail!("SLM backend returned HTTP {status}: {text}");
        }

        let parsed: Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing SLM response as JSON: {text}"))?;

        parsed
            .pointer("/message/content")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .context("SLM response missing message.content")
    }

    /// Probe the backend's model listing (`GET /api/tags`).
    pub async fn health_check(&self) -> anyhow::Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        anyhow::ensure!(
            response.status().is_success(),
            "SLM health check returned HTTP {}",
            response.status()
        );
        Ok(())
    }
}

/// Extract the first balanced `{…}` substring from a model reply.
///
/// Small models wrap their JSON in markdown fences or prose more often than
/// not; scanning for brace balance is tolerant of both.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
