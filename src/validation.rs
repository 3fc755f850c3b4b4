//! Optional request screening (ENABLE_INPUT_VALIDATION): length caps and a
//! coarse filter for script, SQL and shell injection payloads.

use once_cell::sync::Lazy;
use regex::RegexSet;

use crate::domain::QuestionQuery;
use crate::error::QueryError;

pub const MAX_TITLE_CHARS: usize = 5000;
pub const MAX_OPTIONS_CHARS: usize = 2000;
pub const MAX_CONTEXT_CHARS: usize = 10000;

static DISALLOWED: Lazy<RegexSet> = Lazy::new(|| {
  RegexSet::new([
    // markup / script
    r"(?is)<script[^>]*>.*?</script>",
    r"(?i)javascript:",
    r"(?i)vbscript:",
    r"(?i)on(?:load|error|click)\s*=",
    r"(?is)<iframe[^>]*>.*?</iframe>",
    r"(?is)<object[^>]*>.*?</object>",
    r"(?is)<embed[^>]*>.*?</embed>",
    // sql
    r"(?i);\s*drop\s+table",
    r"(?i);\s*delete\s+from",
    r"(?i)union\s+select",
    r"--\s*$",
    r"/\*\*/",
    // shell
    r"(?i);\s*(?:rm|del|format)\s+",
    r"(?i)&&\s*(?:rm|del)\s+",
  ])
  .expect("valid regex set")
});

pub fn contains_disallowed(text: &str) -> bool {
  DISALLOWED.is_match(text)
}

fn check(field: &'static str, text: &str, max: usize) -> Result<(), QueryError> {
  if text.chars().count() > max {
    return Err(QueryError::TooLong { field, max });
  }
  if contains_disallowed(text) {
    return Err(QueryError::Disallowed { field });
  }
  Ok(())
}

/// Screen a query before it reaches the resolver.
pub fn validate_query(query: &QuestionQuery) -> Result<(), QueryError> {
  check("title", &query.title, MAX_TITLE_CHARS)?;
  check("options", &query.options, MAX_OPTIONS_CHARS)?;
  if let Some(ctx) = &query.context {
    check("context", ctx, MAX_CONTEXT_CHARS)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuestionType;

  fn q(title: &str, options: &str, context: Option<&str>) -> QuestionQuery {
    QuestionQuery::new(title, QuestionType::Single, options, context.map(String::from), None).unwrap()
  }

  #[test]
  fn ordinary_questions_pass() {
    assert!(validate_query(&q("1+1=?", "A.1\nB.2\nC.3", Some("算术"))).is_ok());
    assert!(validate_query(&q("下列哪项是 C 语言的注释符号 /* */ ?", "A. //\nB. #", None)).is_ok());
  }

  #[test]
  fn lengths_are_counted_in_characters() {
    let at_cap = "题".repeat(MAX_TITLE_CHARS);
    assert!(validate_query(&q(&at_cap, "", None)).is_ok());

    let over = "题".repeat(MAX_TITLE_CHARS + 1);
    assert_eq!(
      validate_query(&q(&over, "", None)).unwrap_err(),
      QueryError::TooLong { field: "title", max: MAX_TITLE_CHARS }
    );
    let ctx = "x".repeat(MAX_CONTEXT_CHARS + 1);
    assert_eq!(
      validate_query(&q("t", "", Some(&ctx))).unwrap_err(),
      QueryError::TooLong { field: "context", max: MAX_CONTEXT_CHARS }
    );
  }

  #[test]
  fn injection_payloads_are_rejected() {
    for bad in [
      "<SCRIPT>alert(1)</script>",
      "click <a href=\"javascript:void(0)\">",
      "<img src=x onerror = alert(1)>",
      "1; DROP TABLE users",
      "x' UNION SELECT password FROM users",
      "admin' --",
      "ls && rm -rf /",
    ] {
      assert!(contains_disallowed(bad), "{bad}");
    }
    assert_eq!(
      validate_query(&q("ok", "A. 1; delete from t", None)).unwrap_err(),
      QueryError::Disallowed { field: "options" }
    );
  }
}
