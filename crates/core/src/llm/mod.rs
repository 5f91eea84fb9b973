pub mod error;
pub mod gemini;
pub mod json;

use std::fmt;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub response_mime_type: &'static str,
    /// Structured-output hint. Providers may still ignore it.
    pub response_schema: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => f.write_str("gemini"),
        }
    }
}

/// One remote text-generation call. Returns the raw response text.
#[async_trait::async_trait]
pub trait GenerativeModel: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<String>;
}
