//! Shared handling of third-party HTTP responses

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// Longest upstream error body kept in messages
const MAX_ERROR_BODY: usize = 300;

pub fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("bookclub-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request and decode a JSON body. Rate-limit and overload answers
/// (429, 529) come back as throttled upstream errors.
pub async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> AppResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| AppError::upstream(provider, format!("request failed: {}", e)))?;

    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| AppError::upstream(provider, format!("invalid response: {}", e)));
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(&body));

    if is_throttling_status(status.as_u16()) {
        Err(AppError::throttled(provider, message))
    } else {
        Err(AppError::upstream(provider, message))
    }
}

pub fn is_throttling_status(status: u16) -> bool {
    matches!(status, 429 | 529)
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY).collect::<String>() + "..."
    }
}
