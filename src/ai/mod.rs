//! AI fallback: one configured LLM backend behind `CompletionBackend`, a pure
//! prompt builder and answer post-processing.
//!
//! Calls are instrumented and log model names, latencies and answer sizes.
//! The API key is never logged.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info, instrument};

use crate::config::{AiSettings, Prompts, ProviderKind};
use crate::domain::{AnswerResult, AnswerSource, QuestionQuery};
use crate::error::{AskError, ConfigError};

pub mod answer;
pub mod gemini;
pub mod openai;
pub mod prompt;

pub use answer::extract_answer;
pub use prompt::{build_prompt, Prompt};

/// Sampling knobs shared by all backends.
#[derive(Clone, Copy, Debug)]
pub struct CompletionOptions {
  pub temperature: f32,
  pub max_tokens: u32,
}

/// The one capability every provider offers: prompt in, top candidate text out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
  async fn complete(&self, prompt: &Prompt, opts: &CompletionOptions) -> Result<String, AskError>;

  /// Provider name for logs and health output.
  fn provider(&self) -> &'static str;

  fn model(&self) -> &str;
}

/// Build the backend selected in settings.
pub fn build_backend(settings: &AiSettings) -> Result<Arc<dyn CompletionBackend>, ConfigError> {
  let client = reqwest::Client::builder()
    .timeout(settings.timeout)
    .build()
    .map_err(|e| ConfigError::Client(e.to_string()))?;

  let backend: Arc<dyn CompletionBackend> = match settings.provider {
    ProviderKind::OpenAi => Arc::new(openai::OpenAi::new(
      client,
      settings.api_key.clone(),
      settings.base_url.clone(),
      settings.model.clone(),
    )),
    ProviderKind::Gemini => Arc::new(gemini::Gemini::new(
      client,
      settings.api_key.clone(),
      settings.base_url.clone(),
      settings.model.clone(),
    )),
  };
  info!(target: "edubrain_backend", provider = backend.provider(), model = %backend.model(), base_url = %settings.base_url, "AI backend ready");
  Ok(backend)
}

#[derive(Clone)]
pub struct AiClient {
  backend: Arc<dyn CompletionBackend>,
  prompts: Arc<Prompts>,
  options: CompletionOptions,
}

impl AiClient {
  pub fn new(backend: Arc<dyn CompletionBackend>, prompts: Prompts, options: CompletionOptions) -> Self {
    Self { backend, prompts: Arc::new(prompts), options }
  }

  pub fn provider(&self) -> &'static str {
    self.backend.provider()
  }

  pub fn model(&self) -> &str {
    self.backend.model()
  }

  /// Single provider call, no retry. Failures are terminal for the request.
  #[instrument(
    level = "info",
    skip(self, query),
    fields(provider = self.backend.provider(), model = %self.backend.model(), kind = %query.kind, title_len = query.title.len())
  )]
  pub async fn ask(&self, query: &QuestionQuery) -> Result<AnswerResult, AskError> {
    let prompt = build_prompt(query, &self.prompts);
    let start = Instant::now();
    let raw = self.backend.complete(&prompt, &self.options).await;
    let elapsed = start.elapsed();

    let raw = match raw {
      Ok(text) => {
        info!(?elapsed, response_len = text.len(), "Model response received");
        text
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed");
        return Err(e);
      }
    };

    let answer = extract_answer(&raw, query.kind, &query.choices())?;
    Ok(AnswerResult::found(query.title.clone(), answer, AnswerSource::Ai))
  }
}

/// Pull `error.message` out of an OpenAI/Gemini style error body.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
