use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::answer::AnswerSet;
use crate::domain::question::Question;
use crate::domain::quote::Quote;
use crate::flows::states::SessionId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Snapshot of a finished interview. Built once the quote is committed and
/// handed to the recorder by value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub session_id: SessionId,
    pub request: String,
    pub questions: Vec<Question>,
    pub answers: AnswerSet,
    pub quote: Quote,
    pub created_at: DateTime<Utc>,
}

impl InterviewRecord {
    pub fn qa_pairs(&self) -> Vec<QaPair> {
        resolved_pairs(&self.questions, &self.answers)
    }
}

/// Question text paired with its resolved answer, in question order. Questions
/// without a usable answer resolve to an empty string.
pub fn resolved_pairs(questions: &[Question], answers: &AnswerSet) -> Vec<QaPair> {
    questions
        .iter()
        .map(|question| QaPair {
            question: question.text.clone(),
            answer: answers
                .get(question.id)
                .and_then(|state| state.resolved())
                .unwrap_or_default()
                .to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::resolved_pairs;
    use crate::domain::answer::{AnswerSet, AnswerState};
    use crate::domain::question::{Question, QuestionId};

    #[test]
    fn pairs_follow_question_order_and_resolve_custom_text() {
        let questions = vec![
            Question { id: QuestionId(7), text: "平台？".into(), options: vec!["小红书".into()] },
            Question { id: QuestionId(3), text: "风格？".into(), options: vec!["活泼".into()] },
        ];
        let mut answers = AnswerSet::for_questions(&questions);
        answers.set(QuestionId(3), AnswerState::Custom("  温柔知性 ".into())).expect("known id");
        answers.set(QuestionId(7), AnswerState::Selected("小红书".into())).expect("known id");

        let pairs = resolved_pairs(&questions, &answers);

        assert_eq!(pairs[0].question, "平台？");
        assert_eq!(pairs[0].answer, "小红书");
        assert_eq!(pairs[1].answer, "温柔知性");
    }
}
