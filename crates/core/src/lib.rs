pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod recorder;

pub use audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use config::{AppConfig, ConfigError, LlmConfig, LoadOptions, RecordStoreConfig};
pub use domain::answer::{AnswerEntry, AnswerSet, AnswerState, CUSTOM_OPTION_LABEL};
pub use domain::question::{Question, QuestionId};
pub use domain::quote::{Quote, QuoteTier, TierPrice, ASK_FOR_QUOTE};
pub use domain::record::{InterviewRecord, QaPair};
pub use errors::{GenerationFailure, PayloadError, SessionError};
pub use flows::{
    CallKind, CallResolution, InterviewSession, PendingCall, SessionAction, SessionEvent,
    SessionId, SessionPhase, StaleCall, TransitionOutcome,
};
pub use recorder::{InMemoryRecorder, InterviewRecorder, RecordError, RecordStatus};
