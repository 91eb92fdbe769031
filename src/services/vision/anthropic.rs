//! Anthropic messages strands, direct and through Bedrock

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse::parse_reading, CoverImage, VisionProvider, COVER_PROMPT, MAX_OUTPUT_TOKENS};
use crate::{
    config::ProviderConfig,
    error::{AppError, AppResult},
    models::cover::VisionReading,
    services::http,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Which endpoint flavour speaks the Anthropic messages format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Anthropic,
    /// Bedrock runtime `InvokeModel`, authenticated with a Bedrock API key
    Bedrock,
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    flavor: Flavor,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn anthropic(config: &ProviderConfig, timeout: Duration) -> AppResult<Self> {
        Self::new(Flavor::Anthropic, config, timeout)
    }

    pub fn bedrock(config: &ProviderConfig, timeout: Duration) -> AppResult<Self> {
        Self::new(Flavor::Bedrock, config, timeout)
    }

    fn new(flavor: Flavor, config: &ProviderConfig, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            flavor,
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        match self.flavor {
            Flavor::Anthropic => self.endpoint.clone(),
            Flavor::Bedrock => format!("{}/model/{}/invoke", self.endpoint, self.model),
        }
    }

    fn request_body(&self, image: &CoverImage) -> Value {
        let mut body = json!({
            "max_tokens": MAX_OUTPUT_TOKENS,
            "temperature": 0,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.media_type,
                            "data": image.base64()
                        }
                    },
                    { "type": "text", "text": COVER_PROMPT }
                ]
            }]
        });
        // Bedrock takes the model from the URL
        match self.flavor {
            Flavor::Anthropic => body["model"] = json!(self.model),
            Flavor::Bedrock => body["anthropic_version"] = json!(BEDROCK_ANTHROPIC_VERSION),
        }
        body
    }

    fn request(&self, image: &CoverImage) -> reqwest::RequestBuilder {
        let request = self.client.post(self.url()).json(&self.request_body(image));
        match self.flavor {
            Flavor::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Flavor::Bedrock => request.bearer_auth(&self.api_key),
        }
    }
}

fn reply_text(provider: &str, response: MessagesResponse) -> AppResult<String> {
    let text: Vec<String> = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(AppError::upstream(provider, "reply has no text content"));
    }
    Ok(text.join("\n"))
}

#[async_trait]
impl VisionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        match self.flavor {
            Flavor::Anthropic => "anthropic",
            Flavor::Bedrock => "bedrock",
        }
    }

    async fn analyze(&self, image: &CoverImage) -> AppResult<VisionReading> {
        let response: MessagesResponse = http::send_json(self.name(), self.request(image)).await?;
        parse_reading(self.name(), &reply_text(self.name(), response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, model: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: Some("key".to_string()),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    fn image() -> CoverImage {
        CoverImage {
            bytes: vec![0xFF, 0xD8, 0xFF],
            media_type: "image/jpeg",
        }
    }

    #[test]
    fn test_anthropic_request() {
        let provider = AnthropicProvider::anthropic(
            &config("https://api.anthropic.com/v1/messages", "claude-3-5-sonnet-latest"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.url(), "https://api.anthropic.com/v1/messages");

        let body = provider.request_body(&image());
        assert_eq!(body["model"], "claude-3-5-sonnet-latest");
        assert!(body.get("anthropic_version").is_none());
        let source = &body["messages"][0]["content"][0]["source"];
        assert_eq!(source["media_type"], "image/jpeg");
        assert_eq!(source["data"], "/9j/");
    }

    #[test]
    fn test_bedrock_request() {
        let provider = AnthropicProvider::bedrock(
            &config(
                "https://bedrock-runtime.us-east-1.amazonaws.com/",
                "anthropic.claude-3-haiku-20240307-v1:0",
            ),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.name(), "bedrock");
        assert_eq!(
            provider.url(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-haiku-20240307-v1:0/invoke"
        );

        let body = provider.request_body(&image());
        assert_eq!(body["anthropic_version"], BEDROCK_ANTHROPIC_VERSION);
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_reply_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                { "type": "text", "text": "{\"title\":" },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "\"Dune\"}" }
            ]
        }))
        .unwrap();
        assert_eq!(reply_text("anthropic", response).unwrap(), "{\"title\":\n\"Dune\"}");

        let empty: MessagesResponse = serde_json::from_value(json!({ "content": [] })).unwrap();
        assert!(reply_text("anthropic", empty).is_err());
    }
}
