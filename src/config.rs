//! Runtime configuration: environment settings, the external database file
//! (JSON) and optional prompt overrides (TOML).
//!
//! Important env variables (a `.env` file is honoured):
//!   HOST / PORT                 : bind address (default 0.0.0.0:5000)
//!   AI_PROVIDER                 : "openai" or "gemini" (default "gemini")
//!   OPENAI_API_KEY / OPENAI_API_BASE / OPENAI_MODEL
//!   GEMINI_API_KEY / GEMINI_API_BASE / GEMINI_MODEL
//!   MAX_TOKENS, TEMPERATURE, AI_TIMEOUT (seconds)
//!   ENABLE_CACHE, CACHE_EXPIRATION (seconds), CACHE_MAX_ENTRIES
//!   ENABLE_EXTERNAL_DATABASE, EXTERNAL_DATABASE_TIMEOUT, EXTERNAL_DATABASE_CONFIG
//!   ENABLE_INPUT_VALIDATION
//!   PROMPTS_CONFIG_PATH         : TOML file overriding the prompt texts

use std::{net::SocketAddr, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::external::ExternalDatabaseFile;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
  OpenAi,
  Gemini,
}

impl ProviderKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::OpenAi => "openai",
      Self::Gemini => "gemini",
    }
  }
}

/// Connection details for the selected AI backend.
#[derive(Clone, Debug)]
pub struct AiSettings {
  pub provider: ProviderKind,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub max_tokens: u32,
  pub temperature: f32,
  pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Settings {
  pub addr: SocketAddr,
  pub ai: AiSettings,
  pub cache_enabled: bool,
  pub cache_ttl: Duration,
  pub cache_max_entries: Option<usize>,
  pub external_enabled: bool,
  pub external_timeout: Duration,
  pub external_config_path: String,
  pub input_validation: bool,
  pub prompts_path: Option<String>,
}

impl Settings {
  /// Load `.env` (if any) and read settings from the process environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
      info!(target: "edubrain_backend", path = %path.display(), "Loaded .env file");
    }
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Build settings from an arbitrary key lookup. Used directly by tests.
  pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
    let port: u16 = parse_or(&var, "PORT", 5000)?;
    if port == 0 {
      return Err(ConfigError::Invalid { key: "PORT", reason: "must be between 1 and 65535".into() });
    }
    let ip = host
      .parse()
      .map_err(|e| ConfigError::Invalid { key: "HOST", reason: format!("{e}") })?;

    let provider = match var("AI_PROVIDER").unwrap_or_else(|| "gemini".into()).to_lowercase().as_str() {
      "openai" => ProviderKind::OpenAi,
      "gemini" => ProviderKind::Gemini,
      other => return Err(ConfigError::UnknownProvider(other.to_string())),
    };

    let (api_key, base_url, model) = match provider {
      ProviderKind::OpenAi => (
        var("OPENAI_API_KEY").ok_or(ConfigError::MissingKey("OPENAI_API_KEY"))?,
        var("OPENAI_API_BASE").unwrap_or_else(|| "https://api.openai.com/v1".into()),
        var("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".into()),
      ),
      ProviderKind::Gemini => (
        var("GEMINI_API_KEY").ok_or(ConfigError::MissingKey("GEMINI_API_KEY"))?,
        var("GEMINI_API_BASE")
          .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".into()),
        var("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".into()),
      ),
    };

    let ai_timeout: u64 = parse_or(&var, "AI_TIMEOUT", 60)?;
    let external_timeout: u64 = parse_or(&var, "EXTERNAL_DATABASE_TIMEOUT", 10)?;
    if ai_timeout == 0 {
      return Err(ConfigError::Invalid { key: "AI_TIMEOUT", reason: "must be greater than 0".into() });
    }
    if external_timeout == 0 {
      return Err(ConfigError::Invalid {
        key: "EXTERNAL_DATABASE_TIMEOUT",
        reason: "must be greater than 0".into(),
      });
    }

    let ai = AiSettings {
      provider,
      api_key,
      base_url: base_url.trim_end_matches('/').to_string(),
      model,
      max_tokens: parse_or(&var, "MAX_TOKENS", 4096)?,
      temperature: parse_or(&var, "TEMPERATURE", 0.7)?,
      timeout: Duration::from_secs(ai_timeout),
    };

    let max_entries: usize = parse_or(&var, "CACHE_MAX_ENTRIES", 10_000)?;

    Ok(Self {
      addr: SocketAddr::new(ip, port),
      ai,
      cache_enabled: flag_or(&var, "ENABLE_CACHE", true)?,
      cache_ttl: Duration::from_secs(parse_or(&var, "CACHE_EXPIRATION", 86_400)?),
      cache_max_entries: (max_entries > 0).then_some(max_entries),
      external_enabled: flag_or(&var, "ENABLE_EXTERNAL_DATABASE", true)?,
      external_timeout: Duration::from_secs(external_timeout),
      external_config_path: var("EXTERNAL_DATABASE_CONFIG")
        .unwrap_or_else(|| "external_databases.json".into()),
      input_validation: flag_or(&var, "ENABLE_INPUT_VALIDATION", false)?,
      prompts_path: var("PROMPTS_CONFIG_PATH"),
    })
  }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
  F: Fn(&str) -> Option<String>,
{
  match var(key) {
    None => Ok(default),
    Some(raw) => raw
      .parse()
      .map_err(|e: T::Err| ConfigError::Invalid { key, reason: format!("'{raw}': {e}") }),
  }
}

fn flag_or<F>(var: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
  F: Fn(&str) -> Option<String>,
{
  match var(key).map(|v| v.to_lowercase()) {
    None => Ok(default),
    Some(v) => match v.as_str() {
      "true" | "1" | "yes" | "on" => Ok(true),
      "false" | "0" | "no" | "off" => Ok(false),
      _ => Err(ConfigError::Invalid { key, reason: format!("'{v}' is not a boolean") }),
    },
  }
}

/// Prompt texts used by the AI client. Defaults target Chinese coursework;
/// any field can be overridden from TOML.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub single_rule: String,
  pub multiple_rule: String,
  pub judgement_rule: String,
  pub completion_rule: String,
  pub unspecified_rule: String,
  /// Placeholders: {title}, {type_label}, {context_block}, {options_block}
  pub user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "你是一个专业的考试答题助手。请根据题目、上下文和选项给出最准确的答案。\
只输出最终答案本身，不要输出解释、分析、序号或任何多余文字。\
如果需要思考，请把思考过程放在 <thinking></thinking> 中，并把最终答案放在 <answer></answer> 中。"
        .into(),
      single_rule: "这是一道单选题：答案必须与某一个选项的文本完全一致（不要输出选项字母）。".into(),
      multiple_rule: "这是一道多选题：输出所有正确选项的完整文本，按选项原有顺序排列，\
并且只能用井号 # 分隔，例如：北京#广州。"
        .into(),
      judgement_rule: "这是一道判断题：只能回答 正确 或 错误。".into(),
      completion_rule: "这是一道填空题：直接给出需要填入的内容；如果有多个空，只能用井号 # 分隔。".into(),
      unspecified_rule: "题目类型未指定：直接给出最准确、最简洁的答案。".into(),
      user_template: "问题: {title}\n类型: {type_label}\n{context_block}{options_block}".into(),
    }
  }
}

#[derive(Debug, Deserialize, Default)]
struct PromptsFile {
  #[serde(default)]
  prompts: Prompts,
}

/// Read prompt overrides from a TOML file with a `[prompts]` table.
pub fn load_prompts(path: Option<&str>) -> Result<Prompts, ConfigError> {
  let Some(path) = path else {
    return Ok(Prompts::default());
  };
  let raw = std::fs::read_to_string(path)
    .map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
  let file: PromptsFile = toml::from_str(&raw)
    .map_err(|e| ConfigError::Parse { path: path.to_string(), reason: e.to_string() })?;
  info!(target: "edubrain_backend", %path, "Loaded prompt overrides (TOML)");
  Ok(file.prompts)
}

/// Read the external database file. A missing file means "no databases".
pub fn load_external_databases(path: &str) -> Result<ExternalDatabaseFile, ConfigError> {
  let raw = match std::fs::read_to_string(path) {
    Ok(raw) => raw,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      warn!(target: "edubrain_backend", %path, "External database config not found; no external lookups");
      return Ok(ExternalDatabaseFile::default());
    }
    Err(source) => return Err(ConfigError::Io { path: path.to_string(), source }),
  };
  let file: ExternalDatabaseFile = serde_json::from_str(&raw)
    .map_err(|e| ConfigError::Parse { path: path.to_string(), reason: e.to_string() })?;
  info!(
    target: "edubrain_backend",
    %path,
    enabled = file.enabled,
    databases = file.databases.len(),
    "Loaded external database config"
  );
  Ok(file)
}

/// Convenience for tests: settings from a fixed map.
#[cfg(test)]
pub fn settings_from_pairs(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
  let map: std::collections::HashMap<String, String> =
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
  Settings::from_lookup(|k| map.get(k).cloned())
}
