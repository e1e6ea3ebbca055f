use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quoteflow_agent::{GatewayError, InterviewRuntime, ModelGateway};
use quoteflow_core::{
    AuditCategory, AuditOutcome, CallResolution, InMemoryAuditSink, InMemoryRecorder,
    InterviewRecord, InterviewRecorder, InterviewSession, QaPair, QuestionId, RecordError,
    RecordStatus, SessionPhase,
};
use serde_json::{json, Value};

#[derive(Default)]
struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<Value, GatewayError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn replying(replies: Vec<Result<Value, GatewayError>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), prompts: Mutex::default() })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(&self, user_prompt: &str, _system: &str) -> Result<Value, GatewayError> {
        self.prompts.lock().expect("prompt log").push(user_prompt.to_string());
        self.replies.lock().expect("script").pop_front().unwrap_or(Err(GatewayError::EmptyResponse))
    }
}

struct RejectingRecorder;

#[async_trait]
impl InterviewRecorder for RejectingRecorder {
    async fn record(&self, _record: &InterviewRecord) -> Result<RecordStatus, RecordError> {
        Err(RecordError::Status { status: 500, body: "table unavailable".to_string() })
    }
}

fn invoice_questions() -> Value {
    json!({
        "questions": [
            {"id": 1, "question": "发票来源？", "options": ["邮箱", "扫描件"]},
            {"id": 2, "question": "每月数量？", "options": ["少于50张", "50到500张"]}
        ]
    })
}

fn invoice_quote() -> Value {
    json!({
        "tiers": [
            {"name": "基础版", "price": "2999", "features": ["邮箱抓取"], "desc": "单人使用"},
            {"name": "标准版", "price": "6999", "features": ["邮箱抓取", "自动归档"]},
            {"name": "企业版", "price": "咨询报价"}
        ],
        "notes": ["不含服务器费用"],
        "analysis": "中等复杂度"
    })
}

async fn answered_session(runtime: &InterviewRuntime) -> InterviewSession {
    let mut session = InterviewSession::new();
    runtime.begin_interview(&mut session, "我想做一个自动整理发票的工具").await.expect("request accepted");
    session.select_option(QuestionId(1), "邮箱").expect("offered option");
    session.enable_custom_input(QuestionId(2)).expect("custom mode");
    session.set_custom_text(QuestionId(2), "每月约200张").expect("custom text");
    session
}

#[tokio::test]
async fn completed_interview_is_archived_once_with_resolved_answers() {
    let gateway = ScriptedGateway::replying(vec![Ok(invoice_questions()), Ok(invoice_quote())]);
    let recorder = InMemoryRecorder::default();
    let runtime = InterviewRuntime::new(gateway.clone(), Arc::new(recorder.clone()));

    let mut session = answered_session(&runtime).await;
    let resolution = runtime.generate_quote(&mut session).await.expect("answers complete");
    runtime.flush_records().await;

    assert!(matches!(resolution, CallResolution::Applied(ref outcome) if outcome.to == SessionPhase::Quote));
    assert_eq!(session.phase(), SessionPhase::Quote);
    assert_eq!(session.quote().map(|quote| quote.tiers.len()), Some(3));
    assert!(session.error().is_none());

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id, session.id());
    assert_eq!(records[0].request, "我想做一个自动整理发票的工具");
    assert_eq!(
        records[0].qa_pairs(),
        vec![
            QaPair { question: "发票来源？".to_string(), answer: "邮箱".to_string() },
            QaPair { question: "每月数量？".to_string(), answer: "每月约200张".to_string() },
        ]
    );
    assert_eq!(Some(&records[0].quote), session.quote());

    let prompts = gateway.prompts();
    assert_eq!(prompts[0], "用户需求：我想做一个自动整理发票的工具");
    assert!(prompts[1].contains("发票来源？: 邮箱\n"));
    assert!(prompts[1].contains("每月数量？: 每月约200张\n"));
}

#[tokio::test]
async fn malformed_questions_roll_back_with_request_preserved() {
    let gateway = ScriptedGateway::replying(vec![Ok(json!({"foo": "bar"}))]);
    let recorder = InMemoryRecorder::default();
    let runtime = InterviewRuntime::new(gateway, Arc::new(recorder.clone()));
    let mut session = InterviewSession::new();

    let resolution =
        runtime.begin_interview(&mut session, "小红书文案生成器").await.expect("request accepted");
    runtime.flush_records().await;

    assert!(matches!(resolution, CallResolution::Applied(ref outcome) if outcome.to == SessionPhase::Input));
    assert_eq!(session.phase(), SessionPhase::Input);
    assert_eq!(session.request(), "小红书文案生成器");
    assert!(session.questions().is_empty());
    assert!(session.error().is_some_and(|message| message.contains("格式")));
    assert!(recorder.records().is_empty());
}

#[tokio::test]
async fn failed_archive_never_reaches_the_session() {
    let gateway = ScriptedGateway::replying(vec![Ok(invoice_questions()), Ok(invoice_quote())]);
    let audit = InMemoryAuditSink::default();
    let runtime = InterviewRuntime::new(gateway, Arc::new(RejectingRecorder))
        .with_audit(Arc::new(audit.clone()));

    let mut session = answered_session(&runtime).await;
    runtime.generate_quote(&mut session).await.expect("answers complete");
    runtime.flush_records().await;

    assert_eq!(session.phase(), SessionPhase::Quote);
    assert!(session.quote().is_some());
    assert!(session.error().is_none());

    let persistence = audit
        .events()
        .into_iter()
        .filter(|event| event.category == AuditCategory::Persistence)
        .collect::<Vec<_>>();
    assert_eq!(persistence.len(), 1);
    assert_eq!(persistence[0].outcome, AuditOutcome::Failed);
    assert!(persistence[0].metadata["detail"].contains("500"));
}

#[tokio::test]
async fn quote_failure_keeps_answers_and_archives_nothing() {
    let gateway = ScriptedGateway::replying(vec![
        Ok(invoice_questions()),
        Err(GatewayError::Http { status: 401, message: "Invalid API key".to_string() }),
    ]);
    let recorder = InMemoryRecorder::default();
    let runtime = InterviewRuntime::new(gateway, Arc::new(recorder.clone()));

    let mut session = answered_session(&runtime).await;
    runtime.generate_quote(&mut session).await.expect("answers complete");
    runtime.flush_records().await;

    assert_eq!(session.phase(), SessionPhase::Questions);
    assert!(session.answers().is_complete());
    assert!(session.error().is_some_and(|message| message.contains("Invalid API key")));
    assert!(recorder.records().is_empty());
}

#[tokio::test]
async fn response_arriving_after_restart_is_discarded() {
    let gateway = ScriptedGateway::replying(vec![Ok(invoice_questions())]);
    let audit = InMemoryAuditSink::default();
    let runtime = InterviewRuntime::new(gateway, Arc::new(InMemoryRecorder::default()))
        .with_audit(Arc::new(audit.clone()));
    let mut session = InterviewSession::new();

    let outcome = session.begin_interview("自动对账").expect("request accepted");
    let call = outcome.pending_call().cloned().expect("questions call");
    let in_flight = runtime.dispatch(&call);
    runtime.restart(&mut session);

    let result = in_flight.await.expect("call task");
    let resolution = runtime.settle(&mut session, &call, result);

    assert!(resolution.is_discarded());
    assert_eq!(session.phase(), SessionPhase::Input);
    assert_eq!(session.request(), "");
    assert!(session.questions().is_empty());
    assert!(audit.events().iter().any(|event| event.outcome == AuditOutcome::Discarded));
}

#[tokio::test]
async fn regenerated_quote_is_archived_again() {
    let gateway = ScriptedGateway::replying(vec![
        Ok(invoice_questions()),
        Ok(invoice_quote()),
        Ok(invoice_quote()),
    ]);
    let recorder = InMemoryRecorder::default();
    let runtime = InterviewRuntime::new(gateway, Arc::new(recorder.clone()));

    let mut session = answered_session(&runtime).await;
    runtime.generate_quote(&mut session).await.expect("first quote");
    session.back_to_questions().expect("revise");
    session.select_option(QuestionId(2), "50到500张").expect("offered option");
    runtime.generate_quote(&mut session).await.expect("second quote");
    runtime.flush_records().await;

    let records = recorder.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].qa_pairs()[1].answer, "50到500张");
}
