//! Turn a raw model completion into an answer payload.
//!
//! The model is asked for the bare answer, but replies often carry
//! `<thinking>` blocks, an `答案：` prefix, quotes or a trailing explanation.
//! Multiple-choice output is re-validated against the supplied options.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ChoiceOption, QuestionType};
use crate::error::AskError;

static THINKING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<thinking>.*?</thinking>").expect("valid regex"));
static ANSWER_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<answer>(.*?)</answer>").expect("valid regex"));
static ANSWER_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"答案(?:是|为)?\s*[：:]").expect("valid regex"));
static TRAILING_NOTE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\s*[(（][^()（）]*[)）]?\s*$").expect("valid regex"));
static LABEL_PREFIX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[(（]?([A-Za-z])\s*[.、:：．)）]\s*(.+)$").expect("valid regex"));
static LOOSE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[、,，/|\s]+").expect("valid regex"));

const QUOTE_PAIRS: &[(&str, &str)] = &[
  ("\"", "\""),
  ("'", "'"),
  ("`", "`"),
  ("“", "”"),
  ("‘", "’"),
  ("「", "」"),
  ("『", "』"),
];

const TRUE_EXACT: &[&str] = &["正确", "对", "是", "没错", "true", "yes", "√", "✓", "t", "right", "correct"];
const FALSE_EXACT: &[&str] = &["错误", "错", "否", "false", "no", "×", "✗", "x", "f", "wrong", "incorrect"];
// checked before the "true" fragments: 不正确 contains 正确, incorrect contains correct
const FALSE_FRAGMENTS: &[&str] = &["错误", "不正确", "不对", "错", "否", "false", "×", "incorrect", "wrong"];
const TRUE_FRAGMENTS: &[&str] = &["正确", "对", "true", "√", "correct", "right"];
// "no error" phrases, removed before the false-fragment scan; longest first
const NEGATED_FALSE: &[&str] = &["没有错误", "没有错", "没错", "无误"];

/// Post-process a completion for the given question type.
pub fn extract_answer(raw: &str, kind: QuestionType, choices: &[ChoiceOption]) -> Result<String, AskError> {
  let payload = isolate_payload(raw);
  if payload.is_empty() {
    return Err(AskError::EmptyAnswer);
  }

  match kind {
    QuestionType::Judgement => normalize_judgement(&payload)
      .map(str::to_string)
      .ok_or(AskError::NoValidAnswer),
    QuestionType::Multiple => select_multiple(&payload, choices),
    QuestionType::Single => Ok(clean_single(&payload, choices)),
    QuestionType::Completion => Ok(payload.replace(['；', ';'], "#")),
    QuestionType::Unspecified => Ok(payload),
  }
}

fn isolate_payload(raw: &str) -> String {
  let text = THINKING.replace_all(raw, "");
  let body = if let Some(c) = ANSWER_TAG.captures(&text) {
    c[1].to_string()
  } else if let Some(m) = ANSWER_MARKER.find_iter(&text).last() {
    text[m.end()..].to_string()
  } else {
    text.to_string()
  };
  strip_wrappers(&body)
}

/// Remove surrounding quotes and trailing full stops, repeatedly.
fn strip_wrappers(s: &str) -> String {
  let mut s = s.trim();
  loop {
    let before = s;
    s = s.trim_end_matches('。').trim();
    for (open, close) in QUOTE_PAIRS {
      if s.len() >= open.len() + close.len() && s.starts_with(open) && s.ends_with(close) {
        s = s[open.len()..s.len() - close.len()].trim();
      }
    }
    if s == before {
      return s.to_string();
    }
  }
}

fn normalize_judgement(s: &str) -> Option<&'static str> {
  let lower = s.trim().trim_end_matches(['.', '!', '！']).to_lowercase();
  if TRUE_EXACT.contains(&lower.as_str()) {
    return Some("正确");
  }
  if FALSE_EXACT.contains(&lower.as_str()) {
    return Some("错误");
  }
  let scrubbed = NEGATED_FALSE.iter().fold(lower.clone(), |s, p| s.replace(p, ""));
  if FALSE_FRAGMENTS.iter().any(|f| scrubbed.contains(f)) {
    return Some("错误");
  }
  if scrubbed.len() < lower.len() || TRUE_FRAGMENTS.iter().any(|f| scrubbed.contains(f)) {
    return Some("正确");
  }
  None
}

/// Label for choice `i`: its own label, or the implied letter by position.
fn label_of(i: usize, choice: &ChoiceOption) -> String {
  match &choice.label {
    Some(l) => l.clone(),
    None => char::from(b'A' + (i.min(25) as u8)).to_string(),
  }
}

pub(crate) fn match_choice(token: &str, choices: &[ChoiceOption]) -> Option<usize> {
  let token = token.trim();
  if token.is_empty() {
    return None;
  }
  let by_text = |t: &str| choices.iter().position(|c| c.text == t);

  if let Some(i) = by_text(token) {
    return Some(i);
  }
  if let Some(i) = choices
    .iter()
    .enumerate()
    .position(|(i, c)| label_of(i, c).eq_ignore_ascii_case(token))
  {
    return Some(i);
  }
  if let Some(c) = LABEL_PREFIX.captures(token) {
    if let Some(i) = by_text(c[2].trim()) {
      return Some(i);
    }
  }
  let stripped = TRAILING_NOTE.replace(token, "");
  if stripped.len() < token.len() {
    return match_choice(&stripped, choices);
  }
  None
}

pub(crate) fn select_multiple(payload: &str, choices: &[ChoiceOption]) -> Result<String, AskError> {
  let normalized = payload.replace(['；', ';', '\n'], "#");
  let tokens: Vec<String> = normalized
    .split('#')
    .map(strip_wrappers)
    .filter(|t| !t.is_empty())
    .collect();

  if choices.is_empty() {
    return if tokens.is_empty() { Err(AskError::NoValidAnswer) } else { Ok(tokens.join("#")) };
  }

  let mut picked: Vec<usize> = tokens.iter().filter_map(|t| match_choice(t, choices)).collect();

  // "A B D", "北京、广州", "ABD": looser separators when `#` found nothing
  if picked.is_empty() {
    for token in &tokens {
      for part in LOOSE_SEPARATORS.split(token) {
        if let Some(i) = match_choice(part, choices) {
          picked.push(i);
        } else if part.len() > 1 && part.chars().all(|c| c.is_ascii_uppercase()) {
          picked.extend(part.chars().filter_map(|c| match_choice(&c.to_string(), choices)));
        }
      }
    }
  }

  picked.sort_unstable();
  picked.dedup();
  if picked.is_empty() {
    return Err(AskError::NoValidAnswer);
  }
  Ok(picked.iter().map(|&i| choices[i].text.as_str()).collect::<Vec<_>>().join("#"))
}

fn clean_single(payload: &str, choices: &[ChoiceOption]) -> String {
  if match_choice_exact(payload, choices) {
    return payload.to_string();
  }
  let stripped = TRAILING_NOTE.replace(payload, "");
  let stripped = stripped.trim();
  if stripped.is_empty() { payload.to_string() } else { stripped.to_string() }
}

fn match_choice_exact(token: &str, choices: &[ChoiceOption]) -> bool {
  choices
    .iter()
    .enumerate()
    .any(|(i, c)| c.text == token || label_of(i, c).eq_ignore_ascii_case(token))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::parse_options;

  fn cities() -> Vec<ChoiceOption> {
    parse_options(r#"["北京","上海","广州"]"#)
  }

  #[test]
  fn strips_explanation_from_multiple_choice() {
    assert_eq!(
      extract_answer("北京#广州 (because...)", QuestionType::Multiple, &cities()).unwrap(),
      "北京#广州"
    );
  }

  #[test]
  fn multiple_choice_follows_option_order_and_drops_unknowns() {
    assert_eq!(
      extract_answer("广州#深圳#北京#广州", QuestionType::Multiple, &cities()).unwrap(),
      "北京#广州"
    );
    assert_eq!(
      extract_answer("深圳#杭州", QuestionType::Multiple, &cities()).unwrap_err(),
      AskError::NoValidAnswer
    );
  }

  #[test]
  fn multiple_choice_accepts_labels_and_loose_separators() {
    let opts = parse_options("A. 京师兵\nB. 郡县兵\nC. 贵族卫队\nD. 边兵");
    for raw in ["A#B#D", "A B D", "ABD", "A;B;D", "京师兵、郡县兵、边兵", "A. 京师兵#B. 郡县兵#D. 边兵"] {
      assert_eq!(
        extract_answer(raw, QuestionType::Multiple, &opts).unwrap(),
        "京师兵#郡县兵#边兵",
        "input {raw}"
      );
    }
  }

  #[test]
  fn multiple_choice_without_options_keeps_tokens() {
    assert_eq!(extract_answer("甲；乙", QuestionType::Multiple, &[]).unwrap(), "甲#乙");
  }

  #[test]
  fn isolates_tagged_answers_and_prefixes() {
    let raw = "<thinking>1+1 等于 2，对应 B</thinking>\n<answer>2</answer>";
    let opts = parse_options("A.1\nB.2\nC.3");
    assert_eq!(extract_answer(raw, QuestionType::Single, &opts).unwrap(), "2");
    assert_eq!(extract_answer("答案：“地球”。", QuestionType::Single, &[]).unwrap(), "地球");
    assert_eq!(extract_answer("正确答案是：B", QuestionType::Single, &opts).unwrap(), "B");
  }

  #[test]
  fn single_choice_keeps_labels_and_option_text() {
    let opts = parse_options("A.1\nB.2\nC.3");
    assert_eq!(extract_answer("B", QuestionType::Single, &opts).unwrap(), "B");
    let ai = parse_options("A. 人工智能(AI)\nB. 机器学习");
    assert_eq!(extract_answer("人工智能(AI)", QuestionType::Single, &ai).unwrap(), "人工智能(AI)");
    assert_eq!(extract_answer("机器学习（因为…）", QuestionType::Single, &ai).unwrap(), "机器学习");
  }

  #[test]
  fn judgement_is_normalized() {
    assert_eq!(extract_answer("对", QuestionType::Judgement, &[]).unwrap(), "正确");
    assert_eq!(extract_answer("False.", QuestionType::Judgement, &[]).unwrap(), "错误");
    assert_eq!(extract_answer("<answer>×</answer>", QuestionType::Judgement, &[]).unwrap(), "错误");
    assert_eq!(extract_answer("这个说法不正确", QuestionType::Judgement, &[]).unwrap(), "错误");
    assert_eq!(
      extract_answer("无法判断", QuestionType::Judgement, &[]).unwrap_err(),
      AskError::NoValidAnswer
    );
  }

  #[test]
  fn negated_errors_read_as_true() {
    assert_eq!(extract_answer("没错", QuestionType::Judgement, &[]).unwrap(), "正确");
    assert_eq!(extract_answer("正确，没有错误", QuestionType::Judgement, &[]).unwrap(), "正确");
    assert_eq!(extract_answer("无误", QuestionType::Judgement, &[]).unwrap(), "正确");
    assert_eq!(extract_answer("这个说法没有错。", QuestionType::Judgement, &[]).unwrap(), "正确");
    assert_eq!(extract_answer("没错，但结论错误", QuestionType::Judgement, &[]).unwrap(), "错误");
  }

  #[test]
  fn completion_blanks_are_hash_joined() {
    assert_eq!(extract_answer("答案：长江；黄河", QuestionType::Completion, &[]).unwrap(), "长江#黄河");
  }

  #[test]
  fn empty_payload_is_an_error() {
    assert_eq!(
      extract_answer("<thinking>hmm</thinking>  ", QuestionType::Unspecified, &[]).unwrap_err(),
      AskError::EmptyAnswer
    );
    assert_eq!(extract_answer("\"\"", QuestionType::Single, &[]).unwrap_err(), AskError::EmptyAnswer);
  }
}
