use async_trait::async_trait;
use quoteflow_core::{
    InterviewRecord, InterviewRecorder, RecordError, RecordStatus, RecordStoreConfig,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::payload::RecordRow;

const TOKEN_HEADER: &str = "xc-token";

#[derive(Clone)]
struct StoreTarget {
    endpoint: String,
    api_token: SecretString,
}

/// Writes finished interviews as table rows through the store's REST API.
///
/// Built from a [`RecordStoreConfig`] with any value missing, the recorder
/// stays disabled and every save is skipped without a request.
#[derive(Clone)]
pub struct RecordStoreRecorder {
    client: Client,
    target: Option<StoreTarget>,
}

impl RecordStoreRecorder {
    pub fn new(config: &RecordStoreConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &RecordStoreConfig) -> Self {
        let target = match (&config.base_url, &config.table_id, &config.api_token) {
            (Some(base_url), Some(table_id), Some(api_token)) if config.is_complete() => {
                Some(StoreTarget {
                    endpoint: records_endpoint(base_url, table_id),
                    api_token: api_token.clone(),
                })
            }
            _ => None,
        };
        Self { client, target }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }
}

fn records_endpoint(base_url: &str, table_id: &str) -> String {
    format!("{}/api/v2/tables/{}/records", base_url.trim().trim_end_matches('/'), table_id.trim())
}

#[async_trait]
impl InterviewRecorder for RecordStoreRecorder {
    async fn record(&self, record: &InterviewRecord) -> Result<RecordStatus, RecordError> {
        let Some(target) = &self.target else {
            info!(
                event_name = "record_store.disabled",
                session_id = %record.session_id,
                "record store not configured; skipping archive"
            );
            return Ok(RecordStatus::Skipped { reason: "record store not configured".to_string() });
        };

        let row = RecordRow::from_record(record)?;
        debug!(event_name = "record_store.save.start", session_id = %record.session_id, "posting record");
        let response = self
            .client
            .post(&target.endpoint)
            .header(TOKEN_HEADER, target.api_token.expose_secret())
            .json(&row)
            .send()
            .await
            .map_err(|error| RecordError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecordError::Status { status: status.as_u16(), body });
        }
        Ok(RecordStatus::Stored)
    }
}
