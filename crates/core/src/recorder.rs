use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::record::InterviewRecord;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Stored,
    Skipped { reason: String },
}

/// Failures of a single save attempt. They end at the recorder boundary:
/// logged by whoever spawned the attempt, never shown to the user.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record encoding failed: {0}")]
    Encode(String),
    #[error("record store request failed: {0}")]
    Transport(String),
    #[error("record store returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Best-effort archive of finished interviews.
#[async_trait]
pub trait InterviewRecorder: Send + Sync {
    async fn record(&self, record: &InterviewRecord) -> Result<RecordStatus, RecordError>;
}

#[derive(Clone, Default)]
pub struct InMemoryRecorder {
    records: Arc<Mutex<Vec<InterviewRecord>>>,
}

impl InMemoryRecorder {
    pub fn records(&self) -> Vec<InterviewRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl InterviewRecorder for InMemoryRecorder {
    async fn record(&self, record: &InterviewRecord) -> Result<RecordStatus, RecordError> {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
        Ok(RecordStatus::Stored)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{InMemoryRecorder, InterviewRecorder, RecordStatus};
    use crate::domain::answer::AnswerSet;
    use crate::domain::quote::{Quote, QuoteTier};
    use crate::domain::record::InterviewRecord;
    use crate::flows::states::SessionId;

    #[tokio::test]
    async fn in_memory_recorder_keeps_every_record() {
        let recorder = InMemoryRecorder::default();
        let record = InterviewRecord {
            session_id: SessionId::new(),
            request: "自动对账".to_string(),
            questions: Vec::new(),
            answers: AnswerSet::default(),
            quote: Quote {
                tiers: vec![QuoteTier {
                    name: "基础版".to_string(),
                    price: "1999".to_string(),
                    features: Vec::new(),
                    desc: String::new(),
                }],
                notes: Vec::new(),
                analysis: String::new(),
            },
            created_at: Utc::now(),
        };

        let status = recorder.record(&record).await.expect("in-memory save never fails");

        assert_eq!(status, RecordStatus::Stored);
        assert_eq!(recorder.records(), vec![record]);
    }
}
