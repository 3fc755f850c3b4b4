//! Shared helpers for unit tests: in-process HTTP stubs and a scripted
//! completion backend.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use crate::ai::{CompletionBackend, CompletionOptions, Prompt};
use crate::error::AskError;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(app: Router) -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
  let addr = listener.local_addr().expect("stub local addr");
  tokio::spawn(async move {
    axum::serve(listener, app).await.expect("stub server");
  });
  format!("http://{addr}")
}

/// Completion backend that replays a fixed reply and counts calls.
pub struct ScriptedBackend {
  reply: Result<String, AskError>,
  calls: AtomicUsize,
}

impl ScriptedBackend {
  pub fn replying(text: &str) -> Arc<Self> {
    Arc::new(Self { reply: Ok(text.to_string()), calls: AtomicUsize::new(0) })
  }

  pub fn failing(err: AskError) -> Arc<Self> {
    Arc::new(Self { reply: Err(err), calls: AtomicUsize::new(0) })
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
  async fn complete(&self, _prompt: &Prompt, _opts: &CompletionOptions) -> Result<String, AskError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.reply.clone()
  }

  fn provider(&self) -> &'static str {
    "scripted"
  }

  fn model(&self) -> &str {
    "scripted-model"
  }
}
