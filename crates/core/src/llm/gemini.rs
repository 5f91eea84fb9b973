use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{GenerateRequest, GenerativeModel, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiOptions {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GeminiOptions {
    pub fn from_env() -> Self {
        let base_url = std::env::var("GEMINI_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: &str, options: GeminiOptions) -> anyhow::Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                "credentials",
                "missing API key: no Google AI API key was supplied",
            )
            .into());
        }

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: options.base_url,
        })
    }

    fn url(&self, model: &str) -> String {
        let model = model.trim().trim_start_matches("models/");
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate_content(
        &self,
        model: &str,
        req: &GenerateContentRequest<'_>,
    ) -> anyhow::Result<GenerateContentResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(&self.api_key)?);

        let res = self
            .http
            .post(self.url(model))
            .headers(headers)
            .json(req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            tracing::debug!(%status, body = %text, "Gemini returned an error response");
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                "http",
                http_error_detail(status, &text),
            )
            .into());
        }

        serde_json::from_str::<GenerateContentResponse>(&text)
            .with_context(|| format!("failed to decode Gemini response: {text}"))
    }

    fn response_text(res: GenerateContentResponse) -> anyhow::Result<String> {
        let Some(candidate) = res.candidates.into_iter().next() else {
            let reason = res
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                "response",
                format!("Gemini returned no candidates (block_reason={reason})"),
            )
            .into());
        };

        // A blank candidate is still a model reply; decoding reports it.
        let mut out = String::new();
        for part in candidate.content.into_iter().flat_map(|c| c.parts) {
            if let Some(text) = part.text {
                out.push_str(&text);
            }
        }
        if out.trim().is_empty() {
            tracing::debug!(finish_reason = ?candidate.finish_reason, "Gemini returned a blank candidate");
        }
        Ok(out)
    }
}

fn http_error_detail(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => {
            let reasons: Vec<&str> = error
                .details
                .iter()
                .filter_map(|d| d.reason.as_deref())
                .collect();
            let mut detail = format!(
                "status={status} {}: {}",
                error.status.as_deref().unwrap_or("UNKNOWN"),
                error.message
            );
            if !reasons.is_empty() {
                detail.push_str(&format!(" (reason={})", reasons.join(",")));
            }
            detail
        }
        Err(_) => format!("status={status}: {}", body.trim()),
    }
}

#[async_trait::async_trait]
impl GenerativeModel for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<String> {
        let body = GenerateContentRequest::from_request(req);
        tracing::debug!(model = %req.model, prompt_chars = req.user_prompt.len(), "sending Gemini generateContent");
        let res = self.generate_content(&req.model, &body).await?;
        Self::response_text(res)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_request(req: &'a GenerateRequest) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &req.system_instruction,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &req.user_prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: req.temperature,
                response_mime_type: req.response_mime_type,
                response_schema: &req.response_schema,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    response_mime_type: &'static str,
    response_schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}
