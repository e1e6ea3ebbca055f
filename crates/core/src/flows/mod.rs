pub mod prompts;
pub mod session;
pub mod states;

pub use session::InterviewSession;
pub use states::{
    CallKind, CallResolution, PendingCall, SessionAction, SessionEvent, SessionId, SessionPhase,
    StaleCall, TransitionOutcome,
};
