//! Anthropic messages-API summary service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use readgap_core::error::ServiceError;
use readgap_core::traits::{
    build_summary_prompt, parse_service_reply, ServiceAssessment, SummaryRequest, SummaryService,
    SUMMARY_SYSTEM_PROMPT,
};

use crate::http;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const TEMPERATURE: f64 = 0.1;
const MAX_TOKENS: u32 = 150;

/// Summary service backed by the Anthropic messages API.
pub struct AnthropicSummaryService {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicSummaryService {
    pub fn new(api_key: &str, base_url: Option<String>, model: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: http::client()?,
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'static str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SummaryService for AnthropicSummaryService {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn assess(&self, request: &SummaryRequest) -> anyhow::Result<ServiceAssessment> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: SUMMARY_SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: build_summary_prompt(request),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;
        let response = http::check_status(response, &self.model).await?;

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidReply(format!("failed to parse response: {e}")))?;

        let content: String = api_response
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();

        Ok(parse_service_reply(&content)?)
    }
}
