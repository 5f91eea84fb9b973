//! Contract risk analysis over a generative model.
//!
//! Every entry point returns an [`AnalysisResult`]. Transport, decoding and
//! validation failures come back as a single sentinel finding instead of an error.

pub mod classify;
pub mod prompt;

use crate::config::Settings;
use crate::domain::risk::{AnalysisResult, JSON_DECODE_ERROR_TYPE, SYSTEM_ERROR_TYPE};
use crate::llm::gemini::{GeminiClient, GeminiOptions};
use crate::llm::json::{self, NormalizeError};
use crate::llm::{GenerateRequest, GenerativeModel};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const PRO_MODEL: &str = "gemini-1.5-pro-latest";

const RAW_EXCERPT_CHARS: usize = 100;

#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// An unset key yields empty credentials; analysis reports it as an auth failure.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.google_api_key.clone().unwrap_or_default())
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Analyzes `document_text` with the Gemini model `model_name`.
pub async fn analyze(
    document_text: &str,
    credentials: &Credentials,
    model_name: &str,
) -> AnalysisResult {
    let client = match GeminiClient::new(credentials.api_key(), GeminiOptions::from_env()) {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(model = model_name, error = %err, "could not build Gemini client");
            return system_failure(&format!("{err:#}"));
        }
    };
    analyze_with(&client, document_text, model_name).await
}

/// Same as [`analyze`] with [`PRO_MODEL`].
pub async fn analyze_pro(document_text: &str, credentials: &Credentials) -> AnalysisResult {
    analyze(document_text, credentials, PRO_MODEL).await
}

pub async fn analyze_with(
    model: &dyn GenerativeModel,
    document_text: &str,
    model_name: &str,
) -> AnalysisResult {
    let req = build_request(document_text, model_name);

    let raw = match model.generate(&req).await {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(
                provider = %model.provider(),
                model = model_name,
                error = %err,
                "generative model call failed"
            );
            return system_failure(&format!("{err:#}"));
        }
    };

    match json::parse_analysis(&raw) {
        Ok(result) => {
            tracing::info!(
                model = model_name,
                risks = result.len(),
                "contract analysis completed"
            );
            result
        }
        Err(err @ NormalizeError::Decode(_)) => {
            tracing::warn!(model = model_name, error = %err, "model response is not valid JSON");
            decode_failure(json::strip_code_fence(&raw), &err)
        }
        Err(err @ NormalizeError::Schema(_)) => {
            tracing::warn!(model = model_name, error = %err, "model response does not match schema");
            system_failure(&err.to_string())
        }
    }
}

pub fn build_request(document_text: &str, model_name: &str) -> GenerateRequest {
    GenerateRequest {
        model: model_name.to_string(),
        system_instruction: prompt::system_prompt(),
        user_prompt: prompt::user_prompt(document_text),
        temperature: prompt::TEMPERATURE,
        response_mime_type: prompt::RESPONSE_MIME_TYPE,
        response_schema: prompt::response_schema(),
    }
}

fn decode_failure(cleaned: &str, err: &NormalizeError) -> AnalysisResult {
    let excerpt: String = cleaned.chars().take(RAW_EXCERPT_CHARS).collect();
    AnalysisResult::sentinel(
        JSON_DECODE_ERROR_TYPE,
        format!("Raw Response Start: {excerpt}..."),
        format!(
            "Failed to analyze LLM response. The model did not return valid JSON. Error: {err}"
        ),
        "Try again or use a 'Pro' model.",
    )
}

fn system_failure(message: &str) -> AnalysisResult {
    AnalysisResult::sentinel(
        SYSTEM_ERROR_TYPE,
        "N/A",
        format!(
            "Error during analysis: {}",
            classify::describe_failure(message)
        ),
        "Verify API key and connection. If LLM fails, try a more robust model (Pro).",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::risk::RiskFinding;
    use crate::llm::Provider;
    use serde_json::json;
    use std::sync::Mutex;

    struct MockModel {
        response: Result<String, String>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    impl MockModel {
        fn replying(text: impl Into<String>) -> Self {
            Self {
                response: Ok(text.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl GenerativeModel for MockModel {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(req.clone());
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(anyhow::anyhow!("{message}")),
            }
        }
    }

    fn finding(risk_type: &str, clause_text: &str) -> serde_json::Value {
        json!({
            "risk_type": risk_type,
            "clause_text": clause_text,
            "explanation": "Exposure is open-ended.",
            "remediation_suggestion": "Narrow the clause.",
        })
    }

    fn risk_types(result: &AnalysisResult) -> Vec<&str> {
        result.risks.iter().map(|r| r.risk_type.as_str()).collect()
    }

    #[tokio::test]
    async fn returns_well_formed_findings_in_order() {
        let body = json!({
            "risks": [
                finding("Vague Payment Terms", "payable \"upon satisfactory progress.\""),
                finding("Uncapped Liability", "Contractor shall be liable for any and all damages..."),
            ]
        });
        let model = MockModel::replying(body.to_string());

        let result = analyze_with(&model, "Some contract text", DEFAULT_MODEL).await;

        assert_eq!(risk_types(&result), ["Vague Payment Terms", "Uncapped Liability"]);
        assert!(result.risks[1]
            .clause_text
            .contains("liable for any and all damages"));
        assert_eq!(result.risks[0].explanation, "Exposure is open-ended.");
    }

    #[tokio::test]
    async fn liability_scenario_keeps_exact_fields() {
        let text = "Contractor shall be liable for any and all damages arising from any cause whatsoever.";
        let model = MockModel::replying(
            r#"{"risks":[{"risk_type":"Uncapped Liability","clause_text":"...any and all damages...","explanation":"Unlimited exposure.","remediation_suggestion":"Cap liability at contract value."}]}"#,
        );

        let result = analyze_with(&model, text, DEFAULT_MODEL).await;

        assert_eq!(
            result.risks,
            vec![RiskFinding {
                risk_type: "Uncapped Liability".to_string(),
                clause_text: "...any and all damages...".to_string(),
                explanation: "Unlimited exposure.".to_string(),
                remediation_suggestion: "Cap liability at contract value.".to_string(),
            }]
        );

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].user_prompt.ends_with(text));
        assert_eq!(seen[0].response_mime_type, "application/json");
        assert!((seen[0].temperature - 0.2).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn unwraps_envelope_key() {
        let body = json!({
            "contract_analysis": {
                "risks": [finding("Missing Termination Clause", "No termination clause is provided.")]
            }
        });
        let model = MockModel::replying(body.to_string());

        let result = analyze_with(&model, "Another contract text", DEFAULT_MODEL).await;

        assert_eq!(risk_types(&result), ["Missing Termination Clause"]);
    }

    #[tokio::test]
    async fn discards_sibling_keys() {
        let body = json!({
            "summary": "One issue found.",
            "risks": [finding("Broad Indemnification", "indemnify and hold harmless")],
        });
        let model = MockModel::replying(body.to_string());

        let result = analyze_with(&model, "text", DEFAULT_MODEL).await;

        assert_eq!(risk_types(&result), ["Broad Indemnification"]);
    }

    #[tokio::test]
    async fn treats_bare_array_as_findings() {
        let body = json!([finding("A", "a"), finding("B", "b")]);
        let model = MockModel::replying(body.to_string());

        let result = analyze_with(&model, "text", DEFAULT_MODEL).await;

        assert_eq!(risk_types(&result), ["A", "B"]);
    }

    #[tokio::test]
    async fn fenced_response_matches_unfenced() {
        let body = json!({"risks": [finding("A", "a")]}).to_string();
        let plain = analyze_with(&MockModel::replying(body.clone()), "t", DEFAULT_MODEL).await;
        let fenced = analyze_with(
            &MockModel::replying(format!("```json\n{body}\n```")),
            "t",
            DEFAULT_MODEL,
        )
        .await;
        assert_eq!(plain, fenced);
    }

    #[tokio::test]
    async fn non_json_response_yields_decode_sentinel() {
        let model = MockModel::replying("ERROR: The model failed to generate JSON output.");

        let result = analyze_with(&model, "Contract text", DEFAULT_MODEL).await;

        assert_eq!(result.len(), 1);
        let risk = &result.risks[0];
        assert_eq!(risk.risk_type, JSON_DECODE_ERROR_TYPE);
        assert!(risk.explanation.contains("Failed to analyze LLM response"));
        assert!(risk.clause_text.starts_with("Raw Response Start: ERROR: The model"));
        assert!(result.is_diagnostic());
    }

    #[tokio::test]
    async fn decode_sentinel_truncates_raw_response() {
        let raw = "é".repeat(500);
        let result = analyze_with(&MockModel::replying(raw), "t", DEFAULT_MODEL).await;

        let clause = &result.risks[0].clause_text;
        let excerpt = clause
            .strip_prefix("Raw Response Start: ")
            .and_then(|s| s.strip_suffix("..."))
            .unwrap();
        assert_eq!(excerpt.chars().count(), 100);
    }

    #[tokio::test]
    async fn auth_failure_hides_provider_message() {
        let model = MockModel::failing("401 UNAUTHENTICATED: API key not valid");

        let result = analyze_with(&model, "Contract text", DEFAULT_MODEL).await;

        assert_eq!(result.len(), 1);
        let risk = &result.risks[0];
        assert_eq!(risk.risk_type, SYSTEM_ERROR_TYPE);
        assert!(risk
            .explanation
            .contains("Invalid or missing Google AI API key"));
        assert!(!risk.explanation.contains("401"));
    }

    #[tokio::test]
    async fn transport_failure_passes_message_through() {
        let model = MockModel::failing("Gemini request failed: connection refused");

        let result = analyze_with(&model, "text", DEFAULT_MODEL).await;

        assert_eq!(result.risks[0].risk_type, SYSTEM_ERROR_TYPE);
        assert_eq!(result.risks[0].clause_text, "N/A");
        assert_eq!(
            result.risks[0].explanation,
            "Error during analysis: Gemini request failed: connection refused"
        );
    }

    #[tokio::test]
    async fn schema_mismatch_is_prefixed() {
        let cases = [
            json!({"risks": "none"}).to_string(),
            json!({"risks": [{"risk_type": "A", "clause_text": "a"}]}).to_string(),
            json!({"risks": [{"risk_type": 1, "clause_text": "a", "explanation": "b", "remediation_suggestion": "c"}]}).to_string(),
            json!({"findings": []}).to_string(),
            "42".to_string(),
        ];
        for raw in cases {
            let result = analyze_with(&MockModel::replying(raw.clone()), "t", DEFAULT_MODEL).await;
            assert_eq!(result.len(), 1, "{raw}");
            assert_eq!(result.risks[0].risk_type, SYSTEM_ERROR_TYPE, "{raw}");
            assert!(
                result.risks[0]
                    .explanation
                    .starts_with("Error during analysis: Schema validation error"),
                "{raw}"
            );
        }
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_results() {
        let body = json!({"risks": [finding("A", "a")]}).to_string();
        let model = MockModel::replying(body);

        let first = analyze_with(&model, "same text", DEFAULT_MODEL).await;
        let second = analyze_with(&model, "same text", DEFAULT_MODEL).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_api_key_yields_auth_sentinel() {
        let result = analyze("text", &Credentials::new(""), DEFAULT_MODEL).await;

        assert_eq!(result.risks[0].risk_type, SYSTEM_ERROR_TYPE);
        assert_eq!(
            result.risks[0].explanation,
            "Error during analysis: Invalid or missing Google AI API key."
        );
    }

    #[tokio::test]
    async fn blank_reply_yields_decode_sentinel() {
        for raw in ["", "  ", "```json\n```"] {
            let result = analyze_with(&MockModel::replying(raw), "t", DEFAULT_MODEL).await;
            assert_eq!(result.len(), 1, "{raw:?}");
            assert_eq!(result.risks[0].risk_type, JSON_DECODE_ERROR_TYPE, "{raw:?}");
            assert_eq!(result.risks[0].clause_text, "Raw Response Start: ...");
        }
    }

    #[tokio::test]
    async fn unset_key_in_settings_yields_auth_sentinel() {
        let settings = Settings {
            google_api_key: None,
            gemini_model: None,
            sentry_dsn: None,
        };
        let creds = Credentials::from_settings(&settings);
        assert_eq!(creds.api_key(), "");

        let result = analyze("text", &creds, DEFAULT_MODEL).await;
        assert_eq!(
            result.risks[0].explanation,
            "Error during analysis: Invalid or missing Google AI API key."
        );
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("AIza-secret");
        assert!(!format!("{creds:?}").contains("AIza-secret"));
    }

    #[test]
    fn build_request_uses_requested_model() {
        let req = build_request("text", PRO_MODEL);
        assert_eq!(req.model, PRO_MODEL);
        assert_eq!(req.response_schema, prompt::response_schema());
    }
}
