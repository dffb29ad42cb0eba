//! OpenRouter Provider
//!
//! OpenAI-compatible Chat Completions through OpenRouter. Token usage is
//! turned into an estimated USD cost from the configured per-million prices.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    ApiKey, FinishReason, ProviderRequest, ProviderResponse, ReliableClient, TokenUsage,
    WireFormat,
};
use crate::ai::queue::RequestQueue;
use crate::ai::retry::RetryPolicy;
use crate::ai::transport::{HttpRequest, ReqwestTransport};
use crate::config::{CallDefaults, Config, OpenRouterConfig};
use crate::types::{EwhError, Result};

const PROVIDER: &str = "OpenRouter";

pub type OpenRouterClient = ReliableClient<OpenRouterWire>;

#[derive(Debug, Clone)]
pub struct OpenRouterWire {
    config: OpenRouterConfig,
}

impl OpenRouterWire {
    pub fn new(config: OpenRouterConfig) -> Self {
        Self { config }
    }
}

impl WireFormat for OpenRouterWire {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn text_defaults(&self) -> &CallDefaults {
        &self.config.defaults
    }

    fn build_request(&self, request: &ProviderRequest, key: &ApiKey) -> Result<HttpRequest> {
        if request.attachment.is_some() || request.code_execution {
            return Err(EwhError::Config(
                "OpenRouter supports plain text prompts only".to_string(),
            ));
        }

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.generation.temperature,
            max_tokens: request.generation.max_output_tokens,
            top_p: request.generation.top_p,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );

        Ok(HttpRequest::post(url, serde_json::to_value(&body)?)
            .header("Authorization", format!("Bearer {}", key.expose()))
            .header("HTTP-Referer", self.config.referer.as_str())
            .header("X-Title", self.config.title.as_str()))
    }

    fn parse_response(&self, body: &str) -> Result<ProviderResponse> {
        let data: ChatCompletionResponse =
            serde_json::from_str(body).map_err(|e| EwhError::InvalidResponse {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EwhError::NoCandidates {
                provider: PROVIDER.to_string(),
            })?;

        // Missing usage is reported as zeros so cost tracking stays uniform
        let usage = data.usage.unwrap_or_default();
        let usage = TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            estimated_cost_usd: Some(
                self.config
                    .pricing
                    .estimate(usage.prompt_tokens, usage.completion_tokens),
            ),
        };

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            finish_reason: FinishReason::from_openai(choice.finish_reason.as_deref()),
            raw_finish_reason: choice.finish_reason,
            usage: Some(usage),
            code_artifacts: Vec::new(),
        })
    }
}

impl ReliableClient<OpenRouterWire> {
    /// Production client: reqwest transport, configured interval and retry policy
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport =
            ReqwestTransport::new(Duration::from_secs(config.openrouter.timeout_secs))?;
        Ok(Self::new(
            OpenRouterWire::new(config.openrouter.clone()),
            Arc::new(transport),
            Arc::new(RequestQueue::new(
                "openrouter",
                config.openrouter.min_interval(),
            )),
            RetryPolicy::from(&config.retry),
        ))
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{Attachment, CallOptions};
    use mockito::Matcher;
    use serde_json::json;

    fn wire() -> OpenRouterWire {
        OpenRouterWire::new(Config::default().openrouter)
    }

    fn key() -> ApiKey {
        ApiKey::new("or-key").unwrap()
    }

    #[test]
    fn test_request_shape_and_headers() {
        let wire = wire();
        let options = CallOptions {
            max_output_tokens: Some(4000),
            ..Default::default()
        };
        let request = ProviderRequest::text("Solve", &options, wire.text_defaults());
        let http = wire.build_request(&request, &key()).unwrap();

        assert_eq!(http.url, "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(http.body["model"], "deepseek/deepseek-r1");
        assert_eq!(http.body["messages"], json!([{"role": "user", "content": "Solve"}]));
        assert_eq!(http.body["max_tokens"], 4000);
        assert!(http.body.get("top_k").is_none());

        let header = |name: &str| {
            http.headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(header("Authorization").as_deref(), Some("Bearer or-key"));
        assert_eq!(header("HTTP-Referer").as_deref(), Some("https://ewhgen3.vercel.app"));
        assert_eq!(header("X-Title").as_deref(), Some("EWHgen3 Math Generator"));
    }

    #[test]
    fn test_attachments_rejected() {
        let wire = wire();
        let mut request = ProviderRequest::text("x", &CallOptions::default(), wire.text_defaults());
        request.attachment = Some(Attachment::pdf("AAAA"));
        assert!(matches!(
            wire.build_request(&request, &key()),
            Err(EwhError::Config(_))
        ));
    }

    #[test]
    fn test_parse_usage_and_cost() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "{}"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 2_000_000, "completion_tokens": 1_000_000, "total_tokens": 3_000_000}
        })
        .to_string();

        let response = wire().parse_response(&body).unwrap();

        assert!(response.finish_reason.is_truncated());
        assert_eq!(response.raw_finish_reason.as_deref(), Some("length"));
        let usage = response.usage.unwrap();
        assert_eq!(usage.total_tokens, 3_000_000);
        // 2M * 0.50 + 1M * 2.00
        assert!((usage.estimated_cost_usd.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_without_usage_reports_zero_cost() {
        let body = r#"{"choices": [{"message": {"content": "ok"}, "finish_reason": "stop"}]}"#;
        let response = wire().parse_response(body).unwrap();
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 0);
        assert_eq!(usage.estimated_cost_usd, Some(0.0));
        assert_eq!(response.finish_reason, FinishReason::Complete);
    }

    #[test]
    fn test_null_content_is_empty_text() {
        let body = r#"{"choices": [{"message": {"content": null}, "finish_reason": "stop"}]}"#;
        assert_eq!(wire().parse_response(body).unwrap().text, "");
    }

    #[tokio::test]
    async fn test_call_against_local_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer or-key")
            .match_header("x-title", "EWHgen3 Math Generator")
            .match_body(Matcher::PartialJson(json!({
                "model": "deepseek/deepseek-r1",
                "messages": [{"role": "user", "content": "Compute the rubric"}]
            })))
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{"message": {"content": "{\"points\": 12}"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut config = Config::default();
        config.openrouter.api_base = server.url();
        let client = OpenRouterClient::from_config(&config).unwrap();

        let response = client
            .call("Compute the rubric", &key(), &CallOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "{\"points\": 12}");
        assert_eq!(response.usage.unwrap().total_tokens, 120);
    }
}
