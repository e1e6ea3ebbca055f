use std::sync::{Arc, Mutex};

use quoteflow_core::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, CallResolution, GenerationFailure,
    InterviewRecord, InterviewRecorder, InterviewSession, PendingCall, RecordStatus,
    SessionError, SessionEvent, SessionId, TracingAuditSink, TransitionOutcome,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::llm::ModelGateway;

/// Drives an [`InterviewSession`] through its model calls.
///
/// The session stays the single writer of interview state; the runtime only
/// performs the calls it asks for, feeds results back and hands finished
/// interviews to the recorder on a background task.
pub struct InterviewRuntime {
    gateway: Arc<dyn ModelGateway>,
    recorder: Arc<dyn InterviewRecorder>,
    audit: Arc<dyn AuditSink>,
    pending_records: Mutex<Vec<JoinHandle<()>>>,
}

impl InterviewRuntime {
    pub fn new(gateway: Arc<dyn ModelGateway>, recorder: Arc<dyn InterviewRecorder>) -> Self {
        Self {
            gateway,
            recorder,
            audit: Arc::new(TracingAuditSink),
            pending_records: Mutex::new(Vec::new()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Submits the request and waits for the clarifying questions.
    pub async fn begin_interview(
        &self,
        session: &mut InterviewSession,
        request: &str,
    ) -> Result<CallResolution, SessionError> {
        let outcome = match session.begin_interview(request) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.audit_rejection(session.id(), "begin_interview", &error);
                return Err(error);
            }
        };
        Ok(self.drive(session, outcome).await)
    }

    /// Submits the answers and waits for the quote.
    pub async fn generate_quote(
        &self,
        session: &mut InterviewSession,
    ) -> Result<CallResolution, SessionError> {
        let outcome = match session.generate_quote() {
            Ok(outcome) => outcome,
            Err(error) => {
                self.audit_rejection(session.id(), "generate_quote", &error);
                return Err(error);
            }
        };
        Ok(self.drive(session, outcome).await)
    }

    pub fn restart(&self, session: &mut InterviewSession) -> TransitionOutcome {
        let previous = session.id();
        let outcome = session.restart();
        self.audit_transition(previous, &outcome);
        outcome
    }

    /// Performs one model call without touching any session.
    pub async fn fulfil(&self, call: &PendingCall) -> Result<Value, GenerationFailure> {
        complete_call(Arc::clone(&self.gateway), call.clone()).await
    }

    /// Performs one model call on a background task. The result still has to
    /// go through [`InterviewRuntime::settle`].
    pub fn dispatch(&self, call: &PendingCall) -> JoinHandle<Result<Value, GenerationFailure>> {
        tokio::spawn(complete_call(Arc::clone(&self.gateway), call.clone()))
    }

    /// Feeds a call result back into the session. A freshly saved quote is
    /// archived in the background; nothing about that save reaches the
    /// session.
    pub fn settle(
        &self,
        session: &mut InterviewSession,
        call: &PendingCall,
        result: Result<Value, GenerationFailure>,
    ) -> CallResolution {
        let resolution = session.resolve(call, result);
        match &resolution {
            CallResolution::Applied(outcome) => {
                self.audit_transition(call.session_id, outcome);
                if let Some(record) = outcome.record() {
                    self.spawn_record(record.clone());
                }
            }
            CallResolution::Discarded(stale) => {
                info!(
                    event_name = "interview.response.discarded",
                    session_id = %call.session_id,
                    kind = ?stale.kind,
                    call_epoch = stale.call_epoch,
                    current_epoch = stale.current_epoch,
                    phase = ?stale.phase,
                    "dropping model response for a superseded call"
                );
                self.audit.emit(
                    AuditEvent::new(
                        call.session_id,
                        "interview.response_discarded",
                        AuditCategory::Generation,
                        AuditOutcome::Discarded,
                    )
                    .with_metadata("kind", format!("{:?}", stale.kind))
                    .with_metadata("call_epoch", stale.call_epoch.to_string())
                    .with_metadata("current_epoch", stale.current_epoch.to_string()),
                );
            }
        }
        resolution
    }

    /// Waits for every archive attempt spawned so far.
    pub async fn flush_records(&self) {
        let handles = match self.pending_records.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in handles {
            if let Err(error) = handle.await {
                warn!(event_name = "record_store.task.failed", error = %error, "archive task did not finish");
            }
        }
    }

    async fn drive(
        &self,
        session: &mut InterviewSession,
        outcome: TransitionOutcome,
    ) -> CallResolution {
        self.audit_transition(session.id(), &outcome);
        let Some(call) = outcome.pending_call().cloned() else {
            return CallResolution::Applied(outcome);
        };
        let result = self.fulfil(&call).await;
        self.settle(session, &call, result)
    }

    fn spawn_record(&self, record: InterviewRecord) {
        let recorder = Arc::clone(&self.recorder);
        let audit = Arc::clone(&self.audit);
        let handle = tokio::spawn(async move {
            let session_id = record.session_id;
            let (outcome, detail) = match recorder.record(&record).await {
                Ok(RecordStatus::Stored) => {
                    info!(event_name = "record_store.save.stored", session_id = %session_id, "interview archived");
                    (AuditOutcome::Success, "stored".to_string())
                }
                Ok(RecordStatus::Skipped { reason }) => {
                    info!(
                        event_name = "record_store.save.skipped",
                        session_id = %session_id,
                        reason = %reason,
                        "interview not archived"
                    );
                    (AuditOutcome::Success, reason)
                }
                Err(error) => {
                    warn!(
                        event_name = "record_store.save.failed",
                        session_id = %session_id,
                        error = %error,
                        "interview archive failed"
                    );
                    (AuditOutcome::Failed, error.to_string())
                }
            };
            audit.emit(
                AuditEvent::new(
                    session_id,
                    "interview.record_saved",
                    AuditCategory::Persistence,
                    outcome,
                )
                .with_metadata("detail", detail),
            );
        });

        let mut pending = match self.pending_records.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    fn audit_transition(&self, session_id: SessionId, outcome: &TransitionOutcome) {
        let rejected =
            matches!(outcome.event, SessionEvent::QuestionsRejected | SessionEvent::QuoteRejected);
        info!(
            event_name = "interview.transition",
            session_id = %session_id,
            from = ?outcome.from,
            to = ?outcome.to,
            event = ?outcome.event,
            "session transition applied"
        );
        self.audit.emit(
            AuditEvent::new(
                session_id,
                "interview.transition_applied",
                AuditCategory::Interview,
                if rejected { AuditOutcome::Rejected } else { AuditOutcome::Success },
            )
            .with_metadata("from", format!("{:?}", outcome.from))
            .with_metadata("to", format!("{:?}", outcome.to))
            .with_metadata("event", format!("{:?}", outcome.event)),
        );
    }

    fn audit_rejection(&self, session_id: SessionId, action: &str, error: &SessionError) {
        debug!(
            event_name = "interview.action.rejected",
            session_id = %session_id,
            action,
            error = %error,
            "session refused user action"
        );
        self.audit.emit(
            AuditEvent::new(
                session_id,
                "interview.action_rejected",
                AuditCategory::Interview,
                AuditOutcome::Rejected,
            )
            .with_metadata("action", action)
            .with_metadata("error", error.to_string()),
        );
    }
}

async fn complete_call(
    gateway: Arc<dyn ModelGateway>,
    call: PendingCall,
) -> Result<Value, GenerationFailure> {
    debug!(
        event_name = "interview.model_call.start",
        session_id = %call.session_id,
        kind = ?call.kind,
        epoch = call.epoch,
        "calling completion service"
    );
    match gateway.complete(&call.prompt, call.system_instruction).await {
        Ok(payload) => Ok(payload),
        Err(error) => {
            warn!(
                event_name = "interview.model_call.failed",
                session_id = %call.session_id,
                kind = ?call.kind,
                error = %error,
                "completion call failed"
            );
            Err(GenerationFailure::from(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use quoteflow_core::{
        AuditOutcome, InMemoryAuditSink, InMemoryRecorder, InterviewSession, SessionPhase,
    };
    use serde_json::{json, Value};

    use super::InterviewRuntime;
    use crate::llm::{GatewayError, ModelGateway};

    struct EchoGateway;

    #[async_trait]
    impl ModelGateway for EchoGateway {
        async fn complete(&self, _user: &str, _system: &str) -> Result<Value, GatewayError> {
            Ok(json!({"questions": [{"id": 1, "question": "平台？", "options": ["网页"]}]}))
        }
    }

    #[tokio::test]
    async fn rejected_user_action_is_audited_without_a_call() {
        let audit = InMemoryAuditSink::default();
        let runtime = InterviewRuntime::new(Arc::new(EchoGateway), Arc::new(InMemoryRecorder::default()))
            .with_audit(Arc::new(audit.clone()));
        let mut session = InterviewSession::new();

        let error = runtime.begin_interview(&mut session, "   ").await.expect_err("blank request");

        assert_eq!(error, quoteflow_core::SessionError::EmptyRequest);
        assert_eq!(session.phase(), SessionPhase::Input);
        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "interview.action_rejected");
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
    }

    #[tokio::test]
    async fn transitions_are_audited_in_order() {
        let audit = InMemoryAuditSink::default();
        let runtime = InterviewRuntime::new(Arc::new(EchoGateway), Arc::new(InMemoryRecorder::default()))
            .with_audit(Arc::new(audit.clone()));
        let mut session = InterviewSession::new();

        runtime.begin_interview(&mut session, "做一个官网").await.expect("accepted");

        let targets = audit
            .events()
            .into_iter()
            .filter(|event| event.event_type == "interview.transition_applied")
            .filter_map(|event| event.metadata.get("to").cloned())
            .collect::<Vec<_>>();
        assert_eq!(targets, vec!["Analyzing".to_string(), "Questions".to_string()]);
    }
}
