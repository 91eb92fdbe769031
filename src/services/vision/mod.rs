//! Cover reading through multimodal model providers ("strands")
//!
//! Every enabled [`VisionProvider`] reads the same photo; the
//! [`CoverAnalyzer`] fans out to all of them, merges their answers by
//! consensus and enriches the result from the catalogue.

pub mod analyzer;
pub mod anthropic;
pub mod consensus;
pub mod openai;
pub mod parse;
pub mod retry;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    config::VisionConfig,
    error::AppResult,
    models::cover::VisionReading,
    services::uploads::ImageUpload,
};

pub use analyzer::{CoverAnalyzer, RetryPolicy};
pub use retry::with_linear_backoff;

/// Instructions sent along with the photo
pub const COVER_PROMPT: &str = "You are reading the front cover of a book from a photo. \
Reply with a single JSON object and nothing else, using exactly these keys: \
\"title\" (string or null), \"author\" (string or null, several authors separated by commas), \
\"isbn\" (string or null, digits only), \"publisher\" (string or null), \
\"confidence\" (number between 0 and 1 for how sure you are about title and author), \
\"text\" (all text visible on the cover, one line per visual line). \
Do not guess values that are not visible.";

/// Upper bound on tokens generated per reading
pub const MAX_OUTPUT_TOKENS: u32 = 600;

#[derive(Debug, Clone)]
pub struct CoverImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

impl CoverImage {
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64())
    }
}

impl From<&ImageUpload> for CoverImage {
    fn from(upload: &ImageUpload) -> Self {
        CoverImage {
            bytes: upload.bytes.clone(),
            media_type: upload.kind.mime_type(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Short identifier reported in strand outcomes
    fn name(&self) -> &'static str;

    async fn analyze(&self, image: &CoverImage) -> AppResult<VisionReading>;
}

/// Providers that have an API key configured
pub fn build_providers(config: &VisionConfig) -> AppResult<Vec<Arc<dyn VisionProvider>>> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    let mut providers: Vec<Arc<dyn VisionProvider>> = Vec::new();

    if config.openai.enabled() {
        providers.push(Arc::new(openai::OpenAiProvider::new(&config.openai, timeout)?));
    }
    if config.anthropic.enabled() {
        providers.push(Arc::new(anthropic::AnthropicProvider::anthropic(
            &config.anthropic,
            timeout,
        )?));
    }
    if config.bedrock.enabled() {
        providers.push(Arc::new(anthropic::AnthropicProvider::bedrock(
            &config.bedrock,
            timeout,
        )?));
    }

    Ok(providers)
}
