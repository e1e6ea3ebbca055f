use thiserror::Error;

use crate::domain::question::QuestionId;
use crate::flows::states::SessionPhase;

/// Locally detected misuse of the interview session. None of these ever
/// reach the network.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("request text is empty")]
    EmptyRequest,
    #[error("answers are incomplete for questions {missing:?}")]
    IncompleteAnswers { missing: Vec<QuestionId> },
    #[error("question {0} is not part of the current question set")]
    UnknownQuestion(QuestionId),
    #[error("option `{option}` is not offered by question {question_id}")]
    OptionNotOffered { question_id: QuestionId, option: String },
    #[error("custom input is not active for question {0}")]
    CustomModeInactive(QuestionId),
    #[error("`{action}` is not allowed while the session is in {phase:?}")]
    InvalidPhase { phase: SessionPhase, action: &'static str },
}

impl SessionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyRequest => "请先描述你想要的工具或自动化需求。",
            Self::IncompleteAnswers { .. } => "请回答所有问题后再生成报价。",
            Self::UnknownQuestion(_) | Self::OptionNotOffered { .. } => "所选答案无效，请重新选择。",
            Self::CustomModeInactive(_) => "请先切换到自定义输入。",
            Self::InvalidPhase { .. } => "当前步骤无法执行该操作。",
        }
    }
}

/// The model payload decoded but does not have the expected shape.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("field `{field}` must be {expected}")]
    WrongType { field: String, expected: &'static str },
    #[error("field `{0}` must not be empty")]
    EmptyList(String),
    #[error("duplicate question id {0}")]
    DuplicateQuestionId(QuestionId),
}

/// Unified "generation failed" signal handed to the session. The session
/// never inspects where it came from; it only rolls back and shows the text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GenerationFailure {
    pub message: String,
}

impl GenerationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub(crate) fn network_failure_message(failure: &GenerationFailure) -> String {
    format!("生成失败，请检查网络或 API 配置后重试（{}）", failure.message)
}

pub(crate) fn format_failure_message(error: &PayloadError) -> String {
    format!("AI 返回的数据格式不正确，请重试（{error}）")
}
