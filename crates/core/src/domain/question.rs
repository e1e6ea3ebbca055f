use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::{required_str, string_list};
use crate::errors::PayloadError;

/// Upper bound on questions kept from one model answer. Anything past this
/// bound is dropped.
pub const MAX_QUESTIONS: usize = 8;

/// How many questions the model is asked for. Other counts are kept but
/// logged.
pub const EXPECTED_QUESTIONS: RangeInclusive<usize> = 3..=5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub i64);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "question")]
    pub text: String,
    pub options: Vec<String>,
}

impl Question {
    pub fn offers(&self, option: &str) -> bool {
        self.options.iter().any(|candidate| candidate == option)
    }

    fn from_value(value: &Value, path: &str) -> Result<Self, PayloadError> {
        let id = question_id(value, path)?;

        let text = match value.get("question") {
            Some(_) => required_str(value, "question", path)?,
            None => required_str(value, "text", path)?,
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(PayloadError::MissingField(format!("{path}.question")));
        }

        let options = string_list(value, "options", path)?;
        if options.is_empty() {
            return Err(PayloadError::EmptyList(format!("{path}.options")));
        }

        Ok(Self { id, text: text.to_string(), options })
    }
}

/// Validates the `questions` field of a model payload into typed questions,
/// preserving the model's order.
pub fn questions_from_payload(payload: &Value) -> Result<Vec<Question>, PayloadError> {
    let items = match payload.get("questions") {
        None | Some(Value::Null) => return Err(PayloadError::MissingField("questions".into())),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(PayloadError::WrongType {
                field: "questions".into(),
                expected: "an array of questions",
            })
        }
    };
    if items.is_empty() {
        return Err(PayloadError::EmptyList("questions".into()));
    }
    if items.len() > MAX_QUESTIONS {
        warn!(
            event_name = "interview.questions.truncated",
            received = items.len(),
            kept = MAX_QUESTIONS,
            "model returned more questions than allowed, extra questions dropped"
        );
    }

    let mut seen = HashSet::new();
    let mut questions = Vec::with_capacity(items.len().min(MAX_QUESTIONS));
    for (index, item) in items.iter().take(MAX_QUESTIONS).enumerate() {
        let question = Question::from_value(item, &format!("questions[{index}]"))?;
        if !seen.insert(question.id) {
            return Err(PayloadError::DuplicateQuestionId(question.id));
        }
        questions.push(question);
    }

    if !EXPECTED_QUESTIONS.contains(&questions.len()) {
        warn!(
            event_name = "interview.questions.unexpected_count",
            count = questions.len(),
            expected_min = *EXPECTED_QUESTIONS.start(),
            expected_max = *EXPECTED_QUESTIONS.end(),
            "model returned an unusual number of questions, keeping them"
        );
    }

    Ok(questions)
}

fn question_id(value: &Value, path: &str) -> Result<QuestionId, PayloadError> {
    let field = format!("{path}.id");
    match value.get("id") {
        None | Some(Value::Null) => Err(PayloadError::MissingField(field)),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(QuestionId)
            .ok_or(PayloadError::WrongType { field, expected: "an integer" }),
        // Some models quote numeric ids.
        Some(Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map(QuestionId)
            .map_err(|_| PayloadError::WrongType { field, expected: "an integer" }),
        Some(_) => Err(PayloadError::WrongType { field, expected: "an integer" }),
    }
}
