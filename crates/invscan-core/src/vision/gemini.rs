//! Gemini `generateContent` client.

use std::time::Duration;

use base64::prelude::*;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::VisionError;
use crate::models::config::GeminiConfig;

use super::{VisionModel, VisionRequest};

/// Async client for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    settings: GeminiConfig,
}

impl GeminiClient {
    /// Build a client from configuration. Fails without an API key.
    pub fn new(config: &GeminiConfig) -> Result<Self, VisionError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(VisionError::MissingApiKey)?
            .to_string();

        let client = reqwest::Client::builder()
            .user_agent(concat!("invscan/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint(&config.base_url, &config.model),
            api_key,
            settings: config.clone(),
        })
    }

    /// Model endpoint this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn should_retry(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    /// `max_retries` counts total attempts; at least one is always made.
    fn has_attempts_left(&self, attempt: usize) -> bool {
        attempt + 1 < self.settings.max_retries.max(1)
    }

    fn retry_backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(500 * (1 << capped))
    }
}

impl VisionModel for GeminiClient {
    async fn generate(&self, request: &VisionRequest) -> Result<String, VisionError> {
        let body = request_body(request, &self.settings);
        let mut attempt = 0usize;

        loop {
            debug!(
                "Calling {} with {} page(s), attempt {}",
                self.settings.model,
                request.images.len(),
                attempt + 1
            );

            let response = self
                .client
                .post(&self.endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: GenerateContentResponse = resp.json().await?;
                        return response_text(parsed);
                    }

                    let text = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if self.should_retry(status) && self.has_attempts_left(attempt) {
                        attempt += 1;
                        warn!("Gemini returned {}, retrying (attempt {})", status, attempt + 1);
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(VisionError::Status {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Err(err) => {
                    if self.is_retryable_error(&err) && self.has_attempts_left(attempt) {
                        attempt += 1;
                        warn!("Gemini request failed ({}), retrying", err);
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

fn endpoint(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
    response_schema: Value,
}

fn request_body<'a>(request: &'a VisionRequest, settings: &GeminiConfig) -> GenerateContentRequest<'a> {
    let mut parts: Vec<Part<'a>> = request
        .images
        .iter()
        .map(|image| Part::Inline {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: BASE64_STANDARD.encode(&image.data),
            },
        })
        .collect();
    parts.push(Part::Text {
        text: &request.prompt,
    });

    GenerateContentRequest {
        contents: vec![Content { role: "user", parts }],
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            max_output_tokens: settings.max_output_tokens,
            response_mime_type: "application/json",
            response_schema: request.schema.to_gemini(),
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn response_text(response: GenerateContentResponse) -> Result<String, VisionError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(VisionError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(VisionError::EmptyResponse)?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            warn!("Gemini finished with reason {}", reason);
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(VisionError::EmptyResponse);
    }
    Ok(text)
}
