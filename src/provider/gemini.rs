//! Google Gemini `generateContent` client.

use super::{check_status, ChatModel, ModelOptions, ProviderKind, UserMessage};
use crate::error::ModelError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub(super) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiModel {
    pub(super) fn new(
        client: reqwest::Client,
        api_key: &str,
        base_url: String,
        model: String,
        options: &ModelOptions,
    ) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url,
            model,
            temperature: options.temperature,
            max_tokens: options.max_tokens_for(ProviderKind::Gemini),
        }
    }

    fn request_body(&self, system_prompt: &str, messages: &[UserMessage]) -> Value {
        let contents: Vec<Value> = messages
            .iter()
            .map(|m| {
                let mut parts = vec![json!({ "text": m.text })];
                if let Some(ref image) = m.image {
                    parts.push(json!({
                        "inlineData": { "mimeType": image.mime_type, "data": image.data }
                    }));
                }
                json!({ "role": "user", "parts": parts })
            })
            .collect();

        json!({
            "systemInstruction": { "parts": [{ "text": system_prompt }] },
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

fn completion_text(response: GenerateResponse) -> Result<String, ModelError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        Err(ModelError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        messages: &[UserMessage],
    ) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(system_prompt, messages))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        completion_text(body)
    }
}
