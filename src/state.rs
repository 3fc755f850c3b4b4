//! Application state: the resolver (cache, external banks, AI client), the
//! recent-records log and request screening flags.
//!
//! Everything is built once at startup from `Settings` and shared behind an `Arc`.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::ai::{build_backend, AiClient, CompletionOptions};
use crate::cache::AnswerCache;
use crate::config::{load_external_databases, load_prompts, Settings};
use crate::error::ConfigError;
use crate::external::ExternalDbClient;
use crate::records::RecordLog;
use crate::resolver::Resolver;

pub struct AppState {
    pub resolver: Resolver,
    pub records: RecordLog,
    pub input_validation: bool,
}

impl AppState {
    pub fn new(resolver: Resolver, input_validation: bool) -> Self {
        Self { resolver, records: RecordLog::default(), input_validation }
    }

    /// Build state from settings: prompts, AI backend, cache and external databases.
    #[instrument(level = "info", skip_all)]
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let prompts = load_prompts(settings.prompts_path.as_deref())?;
        let backend = build_backend(&settings.ai)?;
        let ai = AiClient::new(
            backend,
            prompts,
            CompletionOptions {
                temperature: settings.ai.temperature,
                max_tokens: settings.ai.max_tokens,
            },
        );

        let cache = if settings.cache_enabled {
            info!(
                target: "edubrain_backend",
                ttl = ?settings.cache_ttl,
                max_entries = ?settings.cache_max_entries,
                "Answer cache enabled"
            );
            Some(Arc::new(AnswerCache::new(settings.cache_ttl, settings.cache_max_entries)))
        } else {
            warn!(target: "edubrain_backend", "Answer cache disabled");
            None
        };

        let external = if settings.external_enabled {
            let file = load_external_databases(&settings.external_config_path)?;
            let client = ExternalDbClient::from_file(file, settings.external_timeout);
            if client.is_none() {
                warn!(
                    target: "edubrain_backend",
                    path = %settings.external_config_path,
                    "No enabled external databases; AI fallback only"
                );
            }
            client
        } else {
            info!(target: "edubrain_backend", "External databases disabled by ENABLE_EXTERNAL_DATABASE");
            None
        };

        Ok(Self::new(Resolver::new(cache, external, ai), settings.input_validation))
    }
}
