use async_trait::async_trait;
use quoteflow_core::GenerationFailure;
use serde_json::Value;
use thiserror::Error;

use crate::extract::ExtractionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("completion service is not configured: {0}")]
    Config(String),
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("completion service returned no content")]
    EmptyResponse,
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl From<GatewayError> for GenerationFailure {
    fn from(error: GatewayError) -> Self {
        GenerationFailure::new(error.to_string())
    }
}

/// One system instruction plus one user prompt in, one structured object out.
/// Exactly one request per call.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(
        &self,
        user_prompt: &str,
        system_instruction: &str,
    ) -> Result<Value, GatewayError>;
}
