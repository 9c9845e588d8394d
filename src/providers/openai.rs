use crate::core::config::InsightConfig;
use crate::core::insight::{InsightKind, InsightProvider};
use crate::providers::util::with_retry;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const SYSTEM_PROMPT: &str = "You are a senior data analyst providing business insights.";
pub const UNAVAILABLE_MESSAGE: &str = "AI Insights unavailable. Please provide an OpenAI API Key.";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Chat-completions client for any OpenAI compatible endpoint.
pub struct OpenAiInsightProvider {
    config: InsightConfig,
    client: reqwest::Client,
}

impl OpenAiInsightProvider {
    pub fn new(config: InsightConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("salesight/1.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    /// Uses the `insight` section of the config when present. The API key
    /// falls back to the `OPENAI_API_KEY` environment variable.
    pub fn from_config(config: Option<&InsightConfig>) -> Result<Self> {
        let mut config = config.cloned().unwrap_or_default();
        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
        if config.api_key.is_none() {
            warn!("No OpenAI API key configured, insights are disabled");
        }
        Self::new(config)
    }
}

#[async_trait]
impl InsightProvider for OpenAiInsightProvider {
    #[instrument(skip(self, context), fields(model = %self.config.model))]
    async fn generate(&self, kind: InsightKind, context: &str) -> Result<String> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(UNAVAILABLE_MESSAGE.to_string());
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let prompt = kind.prompt(context);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        debug!("Requesting {kind} insight from {url}");

        let response = with_retry(
            || async {
                self.client
                    .post(&url)
                    .bearer_auth(api_key)
                    .json(&request)
                    .send()
                    .await
            },
            2,
            500,
        )
        .await
        .with_context(|| format!("Failed to send {kind} insight request"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read {kind} insight response"))?;
        if !status.is_success() {
            return Err(anyhow!(
                "Insight service returned {status} for {kind}: '{body}'"
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse insight response: '{body}'"))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("Insight response for {kind} has no content"))?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, api_key: Option<&str>) -> InsightConfig {
        InsightConfig {
            base_url: server.uri(),
            api_key: api_key.map(str::to_string),
            ..InsightConfig::default()
        }
    }

    async fn create_chat_mock_server(status_code: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_generate_returns_trimmed_completion() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "max_tokens": 200,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": "Identify any anomalies or outliers in this data: {}"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"choices": [{"message": {"role": "assistant", "content": "  Sales dipped in March.\n"}}]}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = OpenAiInsightProvider::new(config_for(&mock_server, Some("sk-test"))).unwrap();
        let insight = provider
            .generate(InsightKind::AnomalyDetection, "{}")
            .await
            .unwrap();

        assert_eq!(insight, "Sales dipped in March.");
    }

    #[tokio::test]
    async fn test_from_config_prefers_configured_key() {
        let mock_server = MockServer::start().await;
        let provider =
            OpenAiInsightProvider::from_config(Some(&config_for(&mock_server, Some("sk-config"))))
                .unwrap();
        assert_eq!(provider.config.api_key.as_deref(), Some("sk-config"));
        assert_eq!(provider.config.base_url, mock_server.uri());
    }

    #[tokio::test]
    async fn test_generate_without_key_skips_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider = OpenAiInsightProvider::new(config_for(&mock_server, None)).unwrap();
        let insight = provider
            .generate(InsightKind::ExecutiveSummary, "{}")
            .await
            .unwrap();

        assert_eq!(insight, UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_generate_reports_http_errors() {
        let mock_server = create_chat_mock_server(401, r#"{"error": "bad key"}"#).await;
        let provider = OpenAiInsightProvider::new(config_for(&mock_server, Some("sk-bad"))).unwrap();

        let err = provider
            .generate(InsightKind::TrendSummary, "{}")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_choices() {
        let mock_server = create_chat_mock_server(200, r#"{"choices": []}"#).await;
        let provider = OpenAiInsightProvider::new(config_for(&mock_server, Some("sk-test"))).unwrap();

        let err = provider
            .generate(InsightKind::RootCause, "{}")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no content"));
    }
}
