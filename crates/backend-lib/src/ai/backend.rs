// ============================
// backend-lib/src/ai/backend.rs
// ============================
//! Completion backend seam and the Gemini implementation.
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::AppError;

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stateless prompt-in, text-out generation.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str) -> Result<String, AppError>;
}

/// Client for the Google Generative Language API.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    max_output_tokens: u32,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String, max_output_tokens: u32) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model,
            max_output_tokens,
        })
    }

    fn request_url(&self) -> String {
        format!(
            "{API_BASE_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens,
            },
        });

        let response = self.client.post(self.request_url()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            debug!(%status, %detail, "completion request rejected");
            return Err(AppError::Backend(format!(
                "completion request failed with status {status}"
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        extract_text(&payload).ok_or_else(|| {
            AppError::Backend("completion response contained no text".to_string())
        })
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(payload: &serde_json::Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let mut text = String::new();
    for part in parts {
        if let Some(chunk) = part.get("text").and_then(|t| t.as_str()) {
            text.push_str(chunk);
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
