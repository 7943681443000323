//! OpenAI chat-completions summary service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use readgap_core::error::ServiceError;
use readgap_core::traits::{
    build_summary_prompt, parse_service_reply, ServiceAssessment, SummaryRequest, SummaryService,
    SUMMARY_SYSTEM_PROMPT,
};

use crate::http;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";
const TEMPERATURE: f64 = 0.1;
const MAX_TOKENS: u32 = 150;

/// Summary service backed by an OpenAI-compatible API.
pub struct OpenAiSummaryService {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiSummaryService {
    pub fn new(api_key: &str, base_url: Option<String>, model: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: http::client()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl SummaryService for OpenAiSummaryService {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn assess(&self, request: &SummaryRequest) -> anyhow::Result<ServiceAssessment> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SUMMARY_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_summary_prompt(request),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;
        let response = http::check_status(response, &self.model).await?;

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidReply(format!("failed to parse response: {e}")))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        tracing::debug!(chars = content.len(), "received summary reply");

        Ok(parse_service_reply(&content)?)
    }
}
