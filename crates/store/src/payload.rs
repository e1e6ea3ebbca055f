use quoteflow_core::{InterviewRecord, RecordError};
use serde::Serialize;

pub const NEW_RECORD_STATUS: &str = "New";

/// Column layout of one archived interview. The session id stays in logs
/// and audit events; the table has no column for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordRow {
    #[serde(rename = "UserRequest")]
    pub user_request: String,
    #[serde(rename = "QAData")]
    pub qa_data: String,
    #[serde(rename = "QuoteResult")]
    pub quote_result: String,
    #[serde(rename = "Status")]
    pub status: String,
}

impl RecordRow {
    pub fn from_record(record: &InterviewRecord) -> Result<Self, RecordError> {
        let qa_data = serde_json::to_string_pretty(&record.qa_pairs())
            .map_err(|error| RecordError::Encode(error.to_string()))?;
        let quote_result = serde_json::to_string_pretty(&record.quote)
            .map_err(|error| RecordError::Encode(error.to_string()))?;

        Ok(Self {
            user_request: record.request.clone(),
            qa_data,
            quote_result,
            status: NEW_RECORD_STATUS.to_string(),
        })
    }
}
