//! Google Gemini `generateContent` backend.
//!
//! The key travels in the `x-goog-api-key` header, so request URLs are safe to log.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{extract_error_message, CompletionBackend, CompletionOptions, Prompt};
use crate::error::AskError;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
}

impl Gemini {
  pub fn new(client: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
    Self { client, api_key, base_url, model }
  }
}

#[async_trait]
impl CompletionBackend for Gemini {
  #[instrument(level = "debug", skip(self, prompt, opts), fields(model = %self.model))]
  async fn complete(&self, prompt: &Prompt, opts: &CompletionOptions) -> Result<String, AskError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateRequest {
      system_instruction: Some(Content { role: None, parts: vec![Part { text: prompt.system.clone() }] }),
      contents: vec![Content { role: Some("user".into()), parts: vec![Part { text: prompt.user.clone() }] }],
      generation_config: GenerationConfig {
        temperature: opts.temperature,
        max_output_tokens: opts.max_tokens,
      },
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, concat!("edubrain-backend/", env!("CARGO_PKG_VERSION")))
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_error_message(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(AskError::Status { status, message });
    }

    let body: GenerateResponse = res.json().await?;
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
      warn!(%reason, "Gemini blocked the prompt");
      return Err(AskError::Blocked(reason));
    }
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }

    let candidate = body.candidates.into_iter().next().ok_or(AskError::NoCandidates)?;
    let text: String = candidate
      .content
      .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
      .unwrap_or_default();
    Ok(text.trim().to_string())
  }

  fn provider(&self) -> &'static str {
    "gemini"
  }

  fn model(&self) -> &str {
    &self.model
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  parts: Vec<Part>,
}
#[derive(Serialize)]
struct Part { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] prompt_feedback: Option<PromptFeedback>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<CandidateContent> }
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<CandidatePart> }
#[derive(Deserialize)]
struct CandidatePart { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback { #[serde(default)] block_reason: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}
