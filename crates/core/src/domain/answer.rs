use serde::{Deserialize, Serialize};

use crate::domain::question::{Question, QuestionId};
use crate::errors::SessionError;

/// Label the presentation shows for the free-text override. Custom mode is
/// tracked as its own [`AnswerState`] variant, so an option that happens to
/// carry this text is still an ordinary fixed choice.
pub const CUSTOM_OPTION_LABEL: &str = "其他（自定义）";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerState {
    #[default]
    Unanswered,
    Selected(String),
    /// Free-text override. Blank text (after trimming) is the pending state
    /// right after custom mode is switched on and does not count as an
    /// answer; non-blank text is the answer, trimmed.
    Custom(String),
}

impl AnswerState {
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// The value sent to the model and persisted: the selected option, or the
    /// trimmed custom text. `None` while the answer is not usable yet.
    pub fn resolved(&self) -> Option<&str> {
        match self {
            Self::Unanswered => None,
            Self::Selected(option) => Some(option.as_str()),
            Self::Custom(text) => {
                let text = text.trim();
                (!text.is_empty()).then_some(text)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    pub state: AnswerState,
}

/// One answer slot per question, kept in question order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    entries: Vec<AnswerEntry>,
}

impl AnswerSet {
    pub fn for_questions(questions: &[Question]) -> Self {
        let entries = questions
            .iter()
            .map(|question| AnswerEntry { question_id: question.id, state: AnswerState::Unanswered })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[AnswerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, question_id: QuestionId) -> Option<&AnswerState> {
        self.entries.iter().find(|entry| entry.question_id == question_id).map(|entry| &entry.state)
    }

    pub fn is_custom_active(&self, question_id: QuestionId) -> bool {
        self.get(question_id).is_some_and(AnswerState::is_custom)
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|entry| entry.state.resolved().is_some())
    }

    pub fn missing(&self) -> Vec<QuestionId> {
        self.entries
            .iter()
            .filter(|entry| entry.state.resolved().is_none())
            .map(|entry| entry.question_id)
            .collect()
    }

    /// Replaces the whole state for one question; the previous value is gone.
    pub(crate) fn set(
        &mut self,
        question_id: QuestionId,
        state: AnswerState,
    ) -> Result<(), SessionError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.question_id == question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        entry.state = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AnswerSet, AnswerState};
    use crate::domain::question::{Question, QuestionId};
    use crate::errors::SessionError;

    fn questions() -> Vec<Question> {
        vec![
            Question {
                id: QuestionId(1),
                text: "平台？".to_string(),
                options: vec!["小红书".to_string(), "抖音".to_string()],
            },
            Question {
                id: QuestionId(2),
                text: "频率？".to_string(),
                options: vec!["每天".to_string(), "每周".to_string()],
            },
        ]
    }

    #[test]
    fn starts_unanswered_in_question_order() {
        let answers = AnswerSet::for_questions(&questions());

        assert_eq!(answers.len(), 2);
        assert_eq!(answers.entries()[0].question_id, QuestionId(1));
        assert_eq!(answers.entries()[1].question_id, QuestionId(2));
        assert!(answers.entries().iter().all(|entry| entry.state == AnswerState::Unanswered));
        assert!(!answers.is_complete());
    }

    #[test]
    fn blank_custom_text_is_incomplete() {
        let mut answers = AnswerSet::for_questions(&questions());
        answers.set(QuestionId(1), AnswerState::Selected("抖音".to_string())).expect("known id");
        answers.set(QuestionId(2), AnswerState::Custom("   ".to_string())).expect("known id");

        assert!(!answers.is_complete());
        assert_eq!(answers.missing(), vec![QuestionId(2)]);
    }

    #[test]
    fn padded_custom_text_is_complete_and_trimmed() {
        let mut answers = AnswerSet::for_questions(&questions());
        answers.set(QuestionId(1), AnswerState::Selected("抖音".to_string())).expect("known id");
        answers.set(QuestionId(2), AnswerState::Custom("  x ".to_string())).expect("known id");

        assert!(answers.is_complete());
        assert_eq!(answers.get(QuestionId(2)).and_then(AnswerState::resolved), Some("x"));
        assert!(answers.is_custom_active(QuestionId(2)));
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut answers = AnswerSet::for_questions(&questions());
        let error = answers
            .set(QuestionId(9), AnswerState::Selected("x".to_string()))
            .expect_err("id 9 does not exist");

        assert_eq!(error, SessionError::UnknownQuestion(QuestionId(9)));
    }
}
