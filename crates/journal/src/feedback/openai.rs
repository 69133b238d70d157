use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FeedbackError, FeedbackService, TradeSummary, SYSTEM_PROMPT};
use crate::config::FeedbackConfig;

/// OpenAI 호환 chat completions 클라이언트
pub struct OpenAiFeedback {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    language: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAiFeedback {
    pub fn new(config: &FeedbackConfig) -> Result<Self, FeedbackError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
        })
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl FeedbackService for OpenAiFeedback {
    async fn feedback(&self, summary: &TradeSummary) -> Result<String, FeedbackError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(summary.prompt(&self.language)),
                },
            ],
        };

        debug!("Requesting coach feedback from {}", self.url);

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedbackError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        first_content(parsed).ok_or(FeedbackError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_content_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"  1. good\n2. ok\n3. fine  "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_content(parsed).as_deref(), Some("1. good\n2. ok\n3. fine"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_content(empty).is_none());

        let null: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(first_content(null).is_none());
    }
}
