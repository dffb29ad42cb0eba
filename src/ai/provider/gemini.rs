//! Google Gemini Provider
//!
//! `generateContent` over REST. Three call shapes share one wire format:
//! plain text, text + inline PDF (vision model), and text with the
//! code execution tool enabled.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{
    ApiKey, Attachment, CallOptions, CodeArtifact, FinishReason, ProviderRequest,
    ProviderResponse, ReliableClient, TokenUsage, WireFormat,
};
use crate::ai::queue::RequestQueue;
use crate::ai::retry::RetryPolicy;
use crate::ai::transport::{HttpRequest, ReqwestTransport};
use crate::config::{CallDefaults, Config, GeminiConfig};
use crate::types::{EwhError, Result};

const PROVIDER: &str = "Gemini";

pub type GeminiClient = ReliableClient<GeminiWire>;

#[derive(Debug, Clone)]
pub struct GeminiWire {
    config: GeminiConfig,
}

impl GeminiWire {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str, key: &ApiKey) -> Result<String> {
        let base = self.config.api_base.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/models/{}:generateContent", base, model))
            .map_err(|e| {
                EwhError::Config(format!("Invalid Gemini api_base '{}': {}", base, e))
            })?;
        url.query_pairs_mut().append_pair("key", key.expose());
        Ok(url.into())
    }
}

impl WireFormat for GeminiWire {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn text_defaults(&self) -> &CallDefaults {
        &self.config.text
    }

    fn build_request(&self, request: &ProviderRequest, key: &ApiKey) -> Result<HttpRequest> {
        let mut parts = Vec::with_capacity(2);
        if let Some(attachment) = &request.attachment {
            parts.push(RequestPart {
                inline_data: Some(InlineData {
                    mime_type: &attachment.mime_type,
                    data: &attachment.data_base64,
                }),
                text: None,
            });
        }
        parts.push(RequestPart {
            inline_data: None,
            text: Some(&request.prompt),
        });

        let tools = if request.code_execution {
            vec![Tool {
                code_execution: CodeExecutionTool {},
            }]
        } else {
            Vec::new()
        };

        let body = GenerateContentRequest {
            contents: vec![RequestContent { parts }],
            generation_config: WireGenerationConfig {
                temperature: request.generation.temperature,
                max_output_tokens: request.generation.max_output_tokens,
                top_p: request.generation.top_p,
                top_k: request.generation.top_k,
            },
            tools,
        };

        Ok(HttpRequest::post(
            self.endpoint(&request.model, key)?,
            serde_json::to_value(&body)?,
        ))
    }

    fn parse_response(&self, body: &str) -> Result<ProviderResponse> {
        let data: GenerateContentResponse =
            serde_json::from_str(body).map_err(|e| EwhError::InvalidResponse {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;

        let candidate = data
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| EwhError::NoCandidates {
                provider: PROVIDER.to_string(),
            })?;

        // Code execution replies interleave text, code and results
        let mut text = String::new();
        let mut code_artifacts = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(code) = part.executable_code {
                code_artifacts.push(CodeArtifact::Code {
                    language: code.language,
                    code: code.code,
                });
            }
            if let Some(result) = part.code_execution_result {
                code_artifacts.push(CodeArtifact::ExecutionResult {
                    outcome: result.outcome,
                    output: result.output,
                });
            }
        }

        let usage = data.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
            estimated_cost_usd: None,
        });

        Ok(ProviderResponse {
            text,
            finish_reason: FinishReason::from_gemini(candidate.finish_reason.as_deref()),
            raw_finish_reason: candidate.finish_reason,
            usage,
            code_artifacts,
        })
    }
}

impl ReliableClient<GeminiWire> {
    /// Production client: reqwest transport, configured interval and retry policy
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.gemini.timeout_secs))?;
        Ok(Self::new(
            GeminiWire::new(config.gemini.clone()),
            Arc::new(transport),
            Arc::new(RequestQueue::new("gemini", config.gemini.min_interval())),
            RetryPolicy::from(&config.retry),
        ))
    }

    /// Prompt plus an inline PDF, sent to the vision model
    pub async fn call_with_attachment(
        &self,
        prompt: &str,
        pdf_base64: &str,
        key: &ApiKey,
        options: &CallOptions,
    ) -> Result<ProviderResponse> {
        let mut request = ProviderRequest::text(prompt, options, &self.wire().config().vision);
        request.attachment = Some(Attachment::pdf(pdf_base64));
        debug!(pdf_base64_len = pdf_base64.len(), "Attaching PDF");
        self.execute(request, key).await
    }

    /// Prompt with the code execution tool; text parts are concatenated and
    /// executed code/results are returned as `code_artifacts`
    pub async fn call_with_code_execution(
        &self,
        prompt: &str,
        key: &ApiKey,
        options: &CallOptions,
    ) -> Result<ProviderResponse> {
        let mut request =
            ProviderRequest::text(prompt, options, &self.wire().config().code_execution);
        request.code_execution = true;
        self.execute(request, key).await
    }
}

// Request types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: WireGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Tool {
    code_execution: CodeExecutionTool,
}

#[derive(Debug, Serialize)]
struct CodeExecutionTool {}

// Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    executable_code: Option<ExecutableCode>,
    code_execution_result: Option<CodeExecutionResult>,
}

#[derive(Debug, Deserialize)]
struct ExecutableCode {
    #[serde(default)]
    language: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct CodeExecutionResult {
    #[serde(default)]
    outcome: String,
    #[serde(default)]
    output: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn wire() -> GeminiWire {
        GeminiWire::new(Config::default().gemini)
    }

    fn key() -> ApiKey {
        ApiKey::new("test-key").unwrap()
    }

    #[test]
    fn test_text_request_shape() {
        let wire = wire();
        let request = ProviderRequest::text("Grade this", &CallOptions::default(), wire.text_defaults());
        let http = wire.build_request(&request, &key()).unwrap();

        assert!(http.url.starts_with(
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent?"
        ));
        assert!(http.url.ends_with("key=test-key"));
        assert_eq!(http.body["contents"][0]["parts"][0]["text"], "Grade this");
        assert_eq!(http.body["generationConfig"]["maxOutputTokens"], 16384);
        assert_eq!(http.body["generationConfig"]["topK"], 64);
        assert!(http.body.get("tools").is_none());
    }

    #[test]
    fn test_attachment_precedes_prompt() {
        let wire = wire();
        let mut request =
            ProviderRequest::text("Read the PDF", &CallOptions::default(), &wire.config().vision);
        request.attachment = Some(Attachment::pdf("JVBERi0x"));
        let http = wire.build_request(&request, &key()).unwrap();

        assert!(http.url.contains("/models/gemini-3-flash-preview:generateContent"));
        let parts = &http.body["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(parts[0]["inline_data"]["data"], "JVBERi0x");
        assert_eq!(parts[1]["text"], "Read the PDF");
        assert_eq!(http.body["generationConfig"]["maxOutputTokens"], 65536);
    }

    #[test]
    fn test_code_execution_enables_tool() {
        let wire = wire();
        let mut request =
            ProviderRequest::text("x", &CallOptions::default(), &wire.config().code_execution);
        request.code_execution = true;
        let http = wire.build_request(&request, &key()).unwrap();

        assert_eq!(http.body["tools"], json!([{"code_execution": {}}]));
        assert_eq!(http.body["generationConfig"]["topK"], 40);
        assert!(http.url.contains("gemini-2.0-flash"));
    }

    #[test]
    fn test_top_k_omitted_when_unset() {
        let wire = wire();
        let mut defaults = wire.config().text.clone();
        defaults.top_k = None;
        let request = ProviderRequest::text("x", &CallOptions::default(), &defaults);
        let http = wire.build_request(&request, &key()).unwrap();
        assert!(http.body["generationConfig"].get("topK").is_none());
    }

    #[test]
    fn test_key_is_url_encoded() {
        let wire = wire();
        let request = ProviderRequest::text("x", &CallOptions::default(), wire.text_defaults());
        let http = wire
            .build_request(&request, &ApiKey::new("a&b=c").unwrap())
            .unwrap();
        assert!(http.url.ends_with("key=a%26b%3Dc"));
    }

    #[test]
    fn test_parse_code_execution_parts() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Computing. "},
                    {"executableCode": {"language": "PYTHON", "code": "print(2**10)"}},
                    {"codeExecutionResult": {"outcome": "OUTCOME_OK", "output": "1024\n"}},
                    {"text": "{\"result\": 1024}"}
                ]},
                "finishReason": "STOP"
            }]
        })
        .to_string();

        let response = wire().parse_response(&body).unwrap();

        assert_eq!(response.text, "Computing. {\"result\": 1024}");
        assert_eq!(
            response.code_artifacts,
            vec![
                CodeArtifact::Code {
                    language: "PYTHON".into(),
                    code: "print(2**10)".into()
                },
                CodeArtifact::ExecutionResult {
                    outcome: "OUTCOME_OK".into(),
                    output: "1024\n".into()
                },
            ]
        );
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_parse_missing_candidates() {
        let err = wire().parse_response(r#"{"promptFeedback": {}}"#).unwrap_err();
        assert!(matches!(err, EwhError::NoCandidates { .. }));
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        let err = wire().parse_response("<html>").unwrap_err();
        assert!(matches!(err, EwhError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_call_with_attachment_against_local_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-3-flash-preview:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(json!({
                "contents": [{"parts": [
                    {"inline_data": {"mime_type": "application/pdf", "data": "JVBERi0x"}},
                    {"text": "Extract the tasks"}
                ]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{
                        "content": {"parts": [{"text": "```json\n{\"tasks\": []}\n```"}]},
                        "finishReason": "STOP"
                    }],
                    "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 30, "totalTokenCount": 1230}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut config = Config::default();
        config.gemini.api_base = server.url();
        let client = GeminiClient::from_config(&config).unwrap();

        let response = client
            .call_with_attachment("Extract the tasks", "JVBERi0x", &key(), &CallOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.text.contains("\"tasks\""));
        assert_eq!(response.finish_reason, FinishReason::Complete);
        assert_eq!(response.usage.unwrap().prompt_tokens, 1200);
    }

    #[tokio::test]
    async fn test_upstream_error_message_from_local_server() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error": {"code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let mut config = Config::default();
        config.gemini.api_base = server.url();
        let client = GeminiClient::from_config(&config).unwrap();

        let err = client
            .call("x", &key(), &CallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, EwhError::PermanentUpstream { status: 403, .. }));
        assert_eq!(err.user_message(), "Permission denied");
    }
}
