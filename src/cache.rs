//! In-memory answer cache keyed by a normalized question fingerprint.
//!
//! Entries expire after a TTL (checked lazily on `get`) and, when a maximum
//! size is configured, the oldest entry is evicted to make room for a new key.

use std::{
  collections::HashMap,
  time::{Duration, Instant},
};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{AnswerResult, AnswerSource, QuestionQuery};
use crate::util::collapse_whitespace;

#[derive(Clone, Debug)]
struct CacheEntry {
  result: AnswerResult,
  created_at: Instant,
}

pub struct AnswerCache {
  entries: RwLock<HashMap<String, CacheEntry>>,
  ttl: Duration,
  max_entries: Option<usize>,
}

/// Deterministic key for a query: case/whitespace-insensitive title, type,
/// and options with each line trimmed and blank lines removed.
pub fn fingerprint(query: &QuestionQuery) -> String {
  let title = collapse_whitespace(&query.title).to_lowercase();
  let options = query
    .options
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .collect::<Vec<_>>()
    .join("\n");

  let mut hasher = Sha256::new();
  hasher.update(title.as_bytes());
  hasher.update(b"|");
  hasher.update(query.kind.as_str().as_bytes());
  hasher.update(b"|");
  hasher.update(options.as_bytes());
  format!("{:x}", hasher.finalize())
}

impl AnswerCache {
  /// `max_entries` of `None` (or zero) leaves the cache unbounded.
  pub fn new(ttl: Duration, max_entries: Option<usize>) -> Self {
    Self {
      entries: RwLock::new(HashMap::new()),
      ttl,
      max_entries: max_entries.filter(|n| *n > 0),
    }
  }

  /// Cached result for the query, re-labelled with `source = cache`.
  ///
  /// The question echoes this request's title, unless an external bank
  /// supplied its own wording when the entry was stored.
  #[instrument(level = "debug", skip_all)]
  pub async fn get(&self, query: &QuestionQuery) -> Option<AnswerResult> {
    let key = fingerprint(query);
    {
      let entries = self.entries.read().await;
      match entries.get(&key) {
        None => return None,
        Some(e) if e.created_at.elapsed() < self.ttl => {
          let mut hit = e.result.clone();
          if !matches!(hit.source, AnswerSource::External(_)) {
            hit.question = query.title.clone();
          }
          hit.source = AnswerSource::Cache;
          return Some(hit);
        }
        Some(_) => {}
      }
    }

    // Expired: drop it, re-checking under the write lock in case it was refreshed.
    let mut entries = self.entries.write().await;
    if entries.get(&key).is_some_and(|e| e.created_at.elapsed() >= self.ttl) {
      entries.remove(&key);
      debug!(target: "resolver", %key, "Evicted expired cache entry");
    }
    None
  }

  #[instrument(level = "debug", skip_all)]
  pub async fn put(&self, query: &QuestionQuery, result: AnswerResult) {
    let key = fingerprint(query);
    let mut entries = self.entries.write().await;

    let before = entries.len();
    entries.retain(|_, e| e.created_at.elapsed() < self.ttl);
    if entries.len() < before {
      debug!(target: "resolver", swept = before - entries.len(), "Swept expired cache entries");
    }

    if let Some(max) = self.max_entries {
      if !entries.contains_key(&key) && entries.len() >= max {
        let oldest = entries
          .iter()
          .min_by_key(|(_, e)| e.created_at)
          .map(|(k, _)| k.clone());
        if let Some(oldest) = oldest {
          entries.remove(&oldest);
          debug!(target: "resolver", key = %oldest, "Evicted oldest cache entry");
        }
      }
    }

    entries.insert(key, CacheEntry { result, created_at: Instant::now() });
  }

  pub async fn clear(&self) {
    self.entries.write().await.clear();
  }

  /// Number of stored entries, including entries expired since the last `put`.
  pub async fn size(&self) -> usize {
    self.entries.read().await.len()
  }
}
