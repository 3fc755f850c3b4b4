//! OpenAI-compatible chat.completions backend.
//!
//! Works against any server speaking the same wire format (set OPENAI_API_BASE).
//! Logs token usage when the server reports it; never logs the key or prompt text.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{extract_error_message, CompletionBackend, CompletionOptions, Prompt};
use crate::error::AskError;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct OpenAi {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
}

impl OpenAi {
  pub fn new(client: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
    Self { client, api_key, base_url, model }
  }
}

#[async_trait]
impl CompletionBackend for OpenAi {
  #[instrument(level = "debug", skip(self, prompt, opts), fields(model = %self.model))]
  async fn complete(&self, prompt: &Prompt, opts: &CompletionOptions) -> Result<String, AskError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: prompt.system.clone() },
        ChatMessageReq { role: "user".into(), content: prompt.user.clone() },
      ],
      temperature: opts.temperature,
      max_tokens: Some(opts.max_tokens),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, concat!("edubrain-backend/", env!("CARGO_PKG_VERSION")))
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_error_message(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(AskError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }

    let first = body.choices.into_iter().next().ok_or(AskError::NoCandidates)?;
    Ok(first.message.content.unwrap_or_default().trim().to_string())
  }

  fn provider(&self) -> &'static str {
    "openai"
  }

  fn model(&self) -> &str {
    &self.model
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}
