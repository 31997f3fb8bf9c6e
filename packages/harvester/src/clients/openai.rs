//! OpenAI-compatible [`StructuringModel`].
//!
//! Requires the `openai` feature. Works against any chat-completions
//! endpoint that honors `response_format: json_object`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::security::ModelCredentials;
use crate::traits::model::StructuringModel;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You are a precise data-extraction engine. You output only \
JSON conforming to the schema you are given, with no prose and no markdown fences.";

/// Chat-completions client for structuring.
pub struct OpenAiModel {
    client: Client,
    credentials: ModelCredentials,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: serde_json::Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiModel {
    pub fn new(credentials: ModelCredentials) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| ClientError::Http(Box::new(e)))?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Create from `OPENAI_API_KEY` and an optional `OPENAI_MODEL`.
    pub fn from_env() -> ClientResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ClientError::Api {
            status: 0,
            message: "OPENAI_API_KEY environment variable not set".to_string(),
        })?;
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self::new(ModelCredentials::new(api_key, model))
    }

    fn base_url(&self) -> &str {
        self.credentials.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }
}

#[async_trait]
impl StructuringModel for OpenAiModel {
    async fn structure(&self, _schema: &serde_json::Value, content: &str) -> ClientResult<String> {
        debug!(model = %self.credentials.model, "chat completion request");

        let request = ChatRequest {
            model: &self.credentials.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
            temperature: 0.0,
            response_format: json!({"type": "json_object"}),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url()))
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.api_key.expose()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Http(Box::new(e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ClientError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Http(Box::new(e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ClientError::Api {
                status: 0,
                message: "completion contained no content".to_string(),
            })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
