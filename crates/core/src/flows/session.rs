use chrono::Utc;
use serde_json::Value;

use crate::domain::answer::{AnswerSet, AnswerState};
use crate::domain::question::{questions_from_payload, Question, QuestionId};
use crate::domain::quote::Quote;
use crate::domain::record::{resolved_pairs, InterviewRecord};
use crate::errors::{
    format_failure_message, network_failure_message, GenerationFailure, SessionError,
};
use crate::flows::prompts::{
    questions_prompt, quote_prompt, QUESTIONS_SYSTEM_INSTRUCTION, QUOTE_SYSTEM_INSTRUCTION,
};
use crate::flows::states::{
    CallKind, CallResolution, PendingCall, SessionAction, SessionEvent, SessionId, SessionPhase,
    StaleCall, TransitionOutcome,
};

/// In-memory state of one quoting interview.
///
/// Every user action is a synchronous method. The two model calls are not
/// performed here: entering `Analyzing` or `Calculating` yields a
/// [`PendingCall`] and the caller feeds the eventual result back through
/// [`InterviewSession::resolve`]. A result whose call no longer matches the
/// session (restart, newer call, different phase) is discarded untouched.
#[derive(Clone, Debug)]
pub struct InterviewSession {
    id: SessionId,
    epoch: u64,
    phase: SessionPhase,
    request: String,
    questions: Vec<Question>,
    answers: AnswerSet,
    quote: Option<Quote>,
    error: Option<String>,
}

impl Default for InterviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InterviewSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            epoch: 0,
            phase: SessionPhase::Input,
            request: String::new(),
            questions: Vec::new(),
            answers: AnswerSet::default(),
            quote: None,
            error: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.quote.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn set_request(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Input, "set_request")?;
        self.request = text.into();
        Ok(())
    }

    pub fn begin_interview(&mut self, request: &str) -> Result<TransitionOutcome, SessionError> {
        self.require_phase(SessionPhase::Input, "begin_interview")?;
        let trimmed = request.trim();
        if trimmed.is_empty() {
            return Err(self.reject(SessionError::EmptyRequest));
        }

        self.request = request.to_string();
        self.error = None;
        let call = self.issue_call(
            CallKind::Questions,
            QUESTIONS_SYSTEM_INSTRUCTION,
            questions_prompt(trimmed),
        );
        Ok(self.move_to(
            SessionPhase::Analyzing,
            SessionEvent::RequestSubmitted,
            vec![SessionAction::CallModel(call)],
        ))
    }

    pub fn select_option(
        &mut self,
        question_id: QuestionId,
        option: &str,
    ) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Questions, "select_option")?;
        let question = self.question(question_id)?;
        if !question.offers(option) {
            return Err(SessionError::OptionNotOffered {
                question_id,
                option: option.to_string(),
            });
        }
        self.answers.set(question_id, AnswerState::Selected(option.to_string()))
    }

    pub fn enable_custom_input(&mut self, question_id: QuestionId) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Questions, "enable_custom_input")?;
        self.question(question_id)?;
        self.answers.set(question_id, AnswerState::Custom(String::new()))
    }

    pub fn set_custom_text(
        &mut self,
        question_id: QuestionId,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Questions, "set_custom_text")?;
        self.question(question_id)?;
        if !self.answers.is_custom_active(question_id) {
            return Err(SessionError::CustomModeInactive(question_id));
        }
        self.answers.set(question_id, AnswerState::Custom(value.into()))
    }

    pub fn generate_quote(&mut self) -> Result<TransitionOutcome, SessionError> {
        self.require_phase(SessionPhase::Questions, "generate_quote")?;
        if !self.answers.is_complete() {
            let missing = self.answers.missing();
            return Err(self.reject(SessionError::IncompleteAnswers { missing }));
        }

        self.error = None;
        let pairs = resolved_pairs(&self.questions, &self.answers);
        let call = self.issue_call(
            CallKind::Quote,
            QUOTE_SYSTEM_INSTRUCTION,
            quote_prompt(&self.request, &pairs),
        );
        Ok(self.move_to(
            SessionPhase::Calculating,
            SessionEvent::AnswersSubmitted,
            vec![SessionAction::CallModel(call)],
        ))
    }

    /// Applies the result of a model call, or discards it when the call is
    /// stale.
    pub fn resolve(
        &mut self,
        call: &PendingCall,
        result: Result<Value, GenerationFailure>,
    ) -> CallResolution {
        let awaiting = call.kind.awaiting_phase();
        if call.session_id != self.id || call.epoch != self.epoch || self.phase != awaiting {
            return CallResolution::Discarded(StaleCall {
                kind: call.kind,
                call_epoch: call.epoch,
                current_epoch: self.epoch,
                phase: self.phase,
            });
        }

        let outcome = match call.kind {
            CallKind::Questions => self.apply_questions(result),
            CallKind::Quote => self.apply_quote(result),
        };
        CallResolution::Applied(outcome)
    }

    /// Goes back from a finished quote to the answers so a new quote can be
    /// generated. The old quote is dropped.
    pub fn back_to_questions(&mut self) -> Result<TransitionOutcome, SessionError> {
        self.require_phase(SessionPhase::Quote, "back_to_questions")?;
        self.quote = None;
        self.error = None;
        Ok(self.move_to(SessionPhase::Questions, SessionEvent::RevisionRequested, Vec::new()))
    }

    /// Returns to `Input` from any phase and wipes all session data. Calls
    /// still in flight become stale.
    pub fn restart(&mut self) -> TransitionOutcome {
        let from = self.phase;
        let epoch = self.epoch + 1;
        *self = Self::new();
        self.epoch = epoch;
        TransitionOutcome {
            from,
            to: SessionPhase::Input,
            event: SessionEvent::RestartRequested,
            actions: Vec::new(),
        }
    }

    fn apply_questions(&mut self, result: Result<Value, GenerationFailure>) -> TransitionOutcome {
        let parsed = match result {
            Ok(payload) => {
                questions_from_payload(&payload).map_err(|error| format_failure_message(&error))
            }
            Err(failure) => Err(network_failure_message(&failure)),
        };

        match parsed {
            Ok(questions) => {
                self.answers = AnswerSet::for_questions(&questions);
                self.questions = questions;
                self.move_to(SessionPhase::Questions, SessionEvent::QuestionsReceived, Vec::new())
            }
            Err(message) => {
                self.error = Some(message.clone());
                self.move_to(
                    SessionPhase::Input,
                    SessionEvent::QuestionsRejected,
                    vec![SessionAction::ShowError(message)],
                )
            }
        }
    }

    fn apply_quote(&mut self, result: Result<Value, GenerationFailure>) -> TransitionOutcome {
        let parsed = match result {
            Ok(payload) => Quote::from_payload(&payload).map_err(|error| format_failure_message(&error)),
            Err(failure) => Err(network_failure_message(&failure)),
        };

        match parsed {
            Ok(quote) => {
                let record = InterviewRecord {
                    session_id: self.id,
                    request: self.request.clone(),
                    questions: self.questions.clone(),
                    answers: self.answers.clone(),
                    quote: quote.clone(),
                    created_at: Utc::now(),
                };
                self.quote = Some(quote);
                self.move_to(
                    SessionPhase::Quote,
                    SessionEvent::QuoteReceived,
                    vec![SessionAction::PersistRecord(record)],
                )
            }
            Err(message) => {
                self.error = Some(message.clone());
                self.move_to(
                    SessionPhase::Questions,
                    SessionEvent::QuoteRejected,
                    vec![SessionAction::ShowError(message)],
                )
            }
        }
    }

    fn question(&self, question_id: QuestionId) -> Result<&Question, SessionError> {
        self.questions
            .iter()
            .find(|question| question.id == question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))
    }

    fn require_phase(
        &self,
        expected: SessionPhase,
        action: &'static str,
    ) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase { phase: self.phase, action })
        }
    }

    fn reject(&mut self, error: SessionError) -> SessionError {
        self.error = Some(error.user_message().to_string());
        error
    }

    fn issue_call(
        &mut self,
        kind: CallKind,
        system_instruction: &'static str,
        prompt: String,
    ) -> PendingCall {
        self.epoch += 1;
        PendingCall { session_id: self.id, epoch: self.epoch, kind, system_instruction, prompt }
    }

    fn move_to(
        &mut self,
        to: SessionPhase,
        event: SessionEvent,
        actions: Vec<SessionAction>,
    ) -> TransitionOutcome {
        let from = self.phase;
        self.phase = to;
        TransitionOutcome { from, to, event, actions }
    }
}
