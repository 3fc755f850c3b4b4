//! Prompt construction. A pure function of the query and the prompt texts,
//! so the same query always yields the same prompt.

use crate::config::Prompts;
use crate::domain::{QuestionQuery, QuestionType};
use crate::util::fill_template;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
  pub system: String,
  pub user: String,
}

pub fn build_prompt(query: &QuestionQuery, prompts: &Prompts) -> Prompt {
  let rule = match query.kind {
    QuestionType::Single => &prompts.single_rule,
    QuestionType::Multiple => &prompts.multiple_rule,
    QuestionType::Judgement => &prompts.judgement_rule,
    QuestionType::Completion => &prompts.completion_rule,
    QuestionType::Unspecified => &prompts.unspecified_rule,
  };
  let system = format!("{}\n\n{}", prompts.system.trim(), rule.trim());

  let context_block = query
    .context
    .as_deref()
    .map(|c| format!("上下文:\n{}\n", c.trim()))
    .unwrap_or_default();

  let choices = query.choices();
  let options_block = if choices.is_empty() {
    String::new()
  } else {
    let lines: Vec<String> = choices
      .iter()
      .map(|c| match &c.label {
        Some(label) => format!("{}. {}", label, c.text),
        None => c.text.clone(),
      })
      .collect();
    format!("选项:\n{}\n", lines.join("\n"))
  };

  // title goes last so its text is never re-scanned for placeholders
  let user = fill_template(
    &prompts.user_template,
    &[
      ("type_label", query.kind.label_zh()),
      ("context_block", &context_block),
      ("options_block", &options_block),
      ("title", query.title.trim()),
    ],
  );

  Prompt { system, user: user.trim_end().to_string() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn q(kind: QuestionType, options: &str, context: Option<&str>) -> QuestionQuery {
    QuestionQuery::new(" 1+1=? ", kind, options, context.map(String::from), None).unwrap()
  }

  #[test]
  fn same_query_same_prompt() {
    let prompts = Prompts::default();
    let a = build_prompt(&q(QuestionType::Single, "A.1\nB.2", None), &prompts);
    let b = build_prompt(&q(QuestionType::Single, "A.1\nB.2", None), &prompts);
    assert_eq!(a, b);
  }

  #[test]
  fn system_carries_the_type_rule() {
    let prompts = Prompts::default();
    let multi = build_prompt(&q(QuestionType::Multiple, "", None), &prompts);
    assert!(multi.system.contains(&prompts.multiple_rule));
    assert!(multi.system.contains('#'));

    let judge = build_prompt(&q(QuestionType::Judgement, "", None), &prompts);
    assert!(judge.system.contains(&prompts.judgement_rule));
    assert!(!judge.system.contains(&prompts.multiple_rule));
  }

  #[test]
  fn user_section_lists_title_context_and_options() {
    let p = build_prompt(&q(QuestionType::Single, "A.1\nB.2\nC.3", Some("算术题")), &Prompts::default());
    assert_eq!(p.user, "问题: 1+1=?\n类型: 单选题\n上下文:\n算术题\n选项:\nA. 1\nB. 2\nC. 3");
  }

  #[test]
  fn omits_empty_blocks() {
    let p = build_prompt(&q(QuestionType::Completion, "", None), &Prompts::default());
    assert_eq!(p.user, "问题: 1+1=?\n类型: 填空题");
  }
}
