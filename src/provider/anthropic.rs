//! Anthropic Messages API client.

use super::{check_status, ChatModel, ModelOptions, ProviderKind, UserMessage};
use crate::error::ModelError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub(super) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicModel {
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
            max_tokens: options.max_tokens_for(ProviderKind::Anthropic),
        }
    }

    fn request_body(&self, system_prompt: &str, messages: &[UserMessage]) -> Value {
        let wire: Vec<Value> = messages
            .iter()
            .map(|m| {
                let mut content = vec![json!({ "type": "text", "text": m.text })];
                if let Some(ref image) = m.image {
                    content.push(json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.mime_type,
                            "data": image.data,
                        }
                    }));
                }
                json!({ "role": "user", "content": content })
            })
            .collect();

        json!({
            "model": self.model,
            "system": system_prompt,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": wire,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn completion_text(response: MessagesResponse) -> Result<String, ModelError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.trim().is_empty() {
        Err(ModelError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        messages: &[UserMessage],
    ) -> Result<String, ModelError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!("POST {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(system_prompt, messages))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        completion_text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PageImage;

    #[test]
    fn body_uses_top_level_system_and_base64_source() {
        let model = AnthropicModel::new(
            reqwest::Client::new(),
            "key",
            DEFAULT_BASE_URL.into(),
            "claude-3-5-sonnet-20240620".into(),
            &ModelOptions::default(),
        );
        let img = PageImage::new(1, "image/png", "iVBO");
        let body = model.request_body("sys", &[UserMessage::with_image("read", img)]);

        assert_eq!(body["system"], "sys");
        let source = &body["messages"][0]["content"][1]["source"];
        assert_eq!(source["type"], "base64");
        assert_eq!(source["media_type"], "image/png");
        assert_eq!(source["data"], "iVBO");
    }

    #[test]
    fn default_model_gets_an_output_cap_it_accepts() {
        let model = AnthropicModel::new(
            reqwest::Client::new(),
            "key",
            DEFAULT_BASE_URL.into(),
            ProviderKind::Anthropic.default_model().into(),
            &ModelOptions::default(),
        );
        let body = model.request_body("sys", &[UserMessage::text("read")]);
        assert_eq!(body["model"], "claude-3-5-sonnet-20240620");
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn explicit_output_cap_is_sent_unchanged() {
        let options = ModelOptions {
            max_tokens: Some(8192),
            ..ModelOptions::default()
        };
        let model = AnthropicModel::new(
            reqwest::Client::new(),
            "key",
            DEFAULT_BASE_URL.into(),
            "claude-sonnet-4-20250514".into(),
            &options,
        );
        let body = model.request_body("sys", &[UserMessage::text("read")]);
        assert_eq!(body["max_tokens"], 8192);
    }

    #[test]
    fn text_blocks_are_concatenated() {
        let resp: MessagesResponse = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "{\"a\":" },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "1}" }
            ]
        }))
        .unwrap();
        assert_eq!(completion_text(resp).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn no_text_blocks_is_empty_response() {
        let resp: MessagesResponse = serde_json::from_value(json!({ "content": [] })).unwrap();
        assert!(matches!(completion_text(resp), Err(ModelError::EmptyResponse)));
    }
}
