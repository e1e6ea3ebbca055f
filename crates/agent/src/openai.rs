use async_trait::async_trait;
use quoteflow_core::config::LlmConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::StructuredOutputExtractor;
use crate::llm::{GatewayError, ModelGateway};

/// Gateway for OpenAI-compatible `chat/completions` endpoints with JSON
/// object response mode.
pub struct HttpModelGateway {
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    extractor: StructuredOutputExtractor,
}

impl HttpModelGateway {
    pub fn new(config: &LlmConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &LlmConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            extractor: StructuredOutputExtractor::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim().trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn service_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()?
        .error?
        .message
        .filter(|message| !message.trim().is_empty())
}

#[async_trait]
impl ModelGateway for HttpModelGateway {
    async fn complete(
        &self,
        user_prompt: &str,
        system_instruction: &str,
    ) -> Result<Value, GatewayError> {
        let api_key = self
            .api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GatewayError::Config("llm.api_key is not set".to_string()))?;
        if self.base_url.trim().is_empty() {
            return Err(GatewayError::Config("llm.base_url is not set".to_string()));
        }

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system_instruction },
                ChatMessage { role: "user", content: user_prompt },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        debug!(event_name = "llm.request.start", model = %self.model, "sending completion request");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| GatewayError::Transport(error.to_string()))?;

        if !status.is_success() {
            let message = service_error_message(&body)
                .unwrap_or_else(|| format!("API Error: {}", status.as_u16()));
            warn!(
                event_name = "llm.request.rejected",
                status = status.as_u16(),
                error = %message,
                "completion service returned an error status"
            );
            return Err(GatewayError::Http { status: status.as_u16(), message });
        }

        let parsed = serde_json::from_str::<ChatResponse>(&body).map_err(|error| {
            GatewayError::Transport(format!("completion body could not be decoded: {error}"))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)?;

        let object = self.extractor.extract(&content)?;
        debug!(event_name = "llm.request.completed", model = %self.model, "completion decoded");
        Ok(Value::Object(object))
    }
}
