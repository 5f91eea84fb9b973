//! Maps provider and validation error text to a failure kind.
//!
//! Provider errors arrive as free text, so this is substring matching. Keep every
//! rule here so the markers can change without touching the analysis flow.

use crate::llm::json::SCHEMA_ERROR_MARKER;

const AUTH_MARKERS: &[&str] = &[
    "API key not valid",
    "API_KEY_INVALID",
    "UNAUTHENTICATED",
    "missing API key",
];

const SCHEMA_MARKERS: &[&str] = &[SCHEMA_ERROR_MARKER];

pub const AUTH_EXPLANATION: &str = "Invalid or missing Google AI API key.";
pub const SCHEMA_PREFIX: &str =
    "Schema validation error: JSON structure does not match expected schema.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Authentication,
    SchemaMismatch,
    Other,
}

pub fn classify_failure(message: &str) -> FailureKind {
    if AUTH_MARKERS.iter().any(|m| message.contains(m)) {
        FailureKind::Authentication
    } else if SCHEMA_MARKERS.iter().any(|m| message.contains(m)) {
        FailureKind::SchemaMismatch
    } else {
        FailureKind::Other
    }
}

/// The user-facing detail for a failure message.
pub fn describe_failure(message: &str) -> String {
    match classify_failure(message) {
        FailureKind::Authentication => AUTH_EXPLANATION.to_string(),
        FailureKind::SchemaMismatch => format!("{SCHEMA_PREFIX} {message}"),
        FailureKind::Other => message.to_string(),
    }
}
