//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable so clients (userscripts, OCS-style readers) don't break.

use serde::{Deserialize, Serialize};

use crate::domain::{QuestionQuery, QuestionType};
use crate::error::QueryError;
use crate::records::QaRecord;

/// Search parameters, shared by the query string (GET) and JSON/form bodies (POST).
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default, alias = "question", alias = "q")]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub options: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
}

impl SearchParams {
    /// Turn raw wire parameters into a query. Unknown types are an error when
    /// `strict`, otherwise they degrade to `unspecified`.
    pub fn into_query(self, strict: bool) -> Result<QuestionQuery, QueryError> {
        let raw_kind = self.kind.unwrap_or_default();
        let kind = match QuestionType::parse(&raw_kind) {
            Some(kind) => kind,
            None if strict => return Err(QueryError::UnknownType(raw_kind)),
            None => QuestionType::Unspecified,
        };
        QuestionQuery::new(
            self.title,
            kind,
            self.options.unwrap_or_default(),
            self.context,
            self.course,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub version: &'static str,
    pub cache_enabled: bool,
    pub cache_size: usize,
    pub external_enabled: bool,
    pub ai_provider: &'static str,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct CacheClearOut {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RecordsOut {
    pub total: usize,
    pub records: Vec<QaRecord>,
}
