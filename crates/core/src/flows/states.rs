use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::record::InterviewRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Input,
    Analyzing,
    Questions,
    Calculating,
    Quote,
}

impl SessionPhase {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Analyzing | Self::Calculating)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    RequestSubmitted,
    QuestionsReceived,
    QuestionsRejected,
    AnswersSubmitted,
    QuoteReceived,
    QuoteRejected,
    RevisionRequested,
    RestartRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Questions,
    Quote,
}

impl CallKind {
    /// Phase the session must still be in for a response to be applied.
    pub fn awaiting_phase(&self) -> SessionPhase {
        match self {
            Self::Questions => SessionPhase::Analyzing,
            Self::Quote => SessionPhase::Calculating,
        }
    }
}

/// One outstanding model call. The epoch ties the eventual response to the
/// session generation that issued it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCall {
    pub session_id: SessionId,
    pub epoch: u64,
    pub kind: CallKind,
    pub system_instruction: &'static str,
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionAction {
    CallModel(PendingCall),
    ShowError(String),
    PersistRecord(InterviewRecord),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionOutcome {
    pub from: SessionPhase,
    pub to: SessionPhase,
    pub event: SessionEvent,
    pub actions: Vec<SessionAction>,
}

impl TransitionOutcome {
    pub fn pending_call(&self) -> Option<&PendingCall> {
        self.actions.iter().find_map(|action| match action {
            SessionAction::CallModel(call) => Some(call),
            _ => None,
        })
    }

    pub fn record(&self) -> Option<&InterviewRecord> {
        self.actions.iter().find_map(|action| match action {
            SessionAction::PersistRecord(record) => Some(record),
            _ => None,
        })
    }
}

/// Why a model response was dropped instead of applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaleCall {
    pub kind: CallKind,
    pub call_epoch: u64,
    pub current_epoch: u64,
    pub phase: SessionPhase,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallResolution {
    Applied(TransitionOutcome),
    Discarded(StaleCall),
}

impl CallResolution {
    pub fn is_discarded(&self) -> bool {
        matches!(self, Self::Discarded(_))
    }
}
