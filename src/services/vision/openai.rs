//! OpenAI chat completions strand

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

const NAME: &str = "openai";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    fn request_body(&self, image: &CoverImage) -> Value {
        json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": COVER_PROMPT },
                    { "type": "image_url", "image_url": { "url": image.data_url() } }
                ]
            }]
        })
    }
}

fn reply_text(completion: ChatCompletion) -> AppResult<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AppError::upstream(NAME, "empty completion"))
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn analyze(&self, image: &CoverImage) -> AppResult<VisionReading> {
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(image));

        let completion: ChatCompletion = http::send_json(NAME, request).await?;
        parse_reading(NAME, &reply_text(completion)?)
    }
}
