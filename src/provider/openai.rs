//! OpenAI chat-completions client, also used for OpenAI-compatible proxies.

use super::{check_status, ChatModel, ModelOptions, ProviderKind, UserMessage};
use crate::error::ModelError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub(super) const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiModel {
    kind: ProviderKind,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiModel {
    pub(super) fn new(
        kind: ProviderKind,
        client: reqwest::Client,
        api_key: &str,
        base_url: String,
        model: String,
        options: &ModelOptions,
    ) -> Self {
        Self {
            kind,
            client,
            api_key: api_key.to_string(),
            base_url,
            model,
            temperature: options.temperature,
            max_tokens: options.max_tokens_for(kind),
        }
    }

    fn request_body(&self, system_prompt: &str, messages: &[UserMessage]) -> Value {
        let mut wire = vec![json!({ "role": "system", "content": system_prompt })];
        wire.extend(messages.iter().map(|m| {
            let mut content = vec![json!({ "type": "text", "text": m.text })];
            if let Some(ref image) = m.image {
                content.push(json!({
                    "type": "image_url",
                    "image_url": { "url": image.to_data_url(), "detail": "high" }
                }));
            }
            json!({ "role": "user", "content": content })
        }));

        json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": wire,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn completion_text(response: CompletionResponse) -> Result<String, ModelError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(ModelError::EmptyResponse)
}

#[async_trait]
impl ChatModel for OpenAiModel {
    fn provider(&self) -> &str {
        self.kind.id()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        messages: &[UserMessage],
    ) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(system_prompt, messages))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: CompletionResponse = response
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

    fn model() -> OpenAiModel {
        OpenAiModel::new(
            ProviderKind::OpenAi,
            reqwest::Client::new(),
            "sk-test",
            DEFAULT_BASE_URL.to_string(),
            "gpt-4o".into(),
            &ModelOptions::default(),
        )
    }

    #[test]
    fn body_embeds_image_as_data_url() {
        let img = PageImage::new(0, "image/jpeg", "QUJD");
        let body = model().request_body("sys", &[UserMessage::with_image("read", img)]);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        let parts = &body["messages"][1]["content"];
        assert_eq!(parts[0]["text"], "read");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn text_only_message_has_single_part() {
        let body = model().request_body("sys", &[UserMessage::text("hi")]);
        assert_eq!(body["messages"][1]["content"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn completion_text_takes_first_choice() {
        let resp: CompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"a\":1}" } }]
        }))
        .unwrap();
        assert_eq!(completion_text(resp).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn missing_content_is_empty_response() {
        let resp: CompletionResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": null } }] }))
                .unwrap();
        assert!(matches!(completion_text(resp), Err(ModelError::EmptyResponse)));
    }
}
