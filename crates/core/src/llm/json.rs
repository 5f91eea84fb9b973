use crate::domain::risk::AnalysisResult;
use serde_json::{Map, Value};
use thiserror::Error;

const RISKS_KEY: &str = "risks";

/// Leading text of every [`NormalizeError::Schema`] message.
pub const SCHEMA_ERROR_MARKER: &str = "validation error for AnalysisResult";

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The cleaned response is not JSON at all.
    #[error("{0}")]
    Decode(#[source] serde_json::Error),

    /// Valid JSON that still does not fit `AnalysisResult` after shape normalization.
    #[error("{}: {}", SCHEMA_ERROR_MARKER, .0)]
    Schema(#[source] serde_json::Error),
}

/// Removes a Markdown code fence (```json ... ``` or ``` ... ```) around the payload.
pub fn strip_code_fence(text: &str) -> &str {
    let mut inner = text.trim();
    if let Some(rest) = inner.strip_prefix("```json") {
        inner = rest;
    }
    if let Some(rest) = inner.strip_prefix("```") {
        inner = rest;
    }
    if let Some(rest) = inner.strip_suffix("```") {
        inner = rest;
    }
    inner.trim()
}

/// Coerces the known ways a model deviates from `{"risks": [...]}` back into that shape.
///
/// The steps compose: an envelope is unwrapped first, then sibling keys next to
/// `risks` are dropped. A bare array is taken as the findings list. Anything else
/// is returned untouched and left for schema validation to reject.
pub fn normalize_shape(value: Value) -> Value {
    match value {
        Value::Object(map) => keep_only_risks(unwrap_envelope(map)),
        Value::Array(items) => risks_object(items),
        other => other,
    }
}

fn unwrap_envelope(map: Map<String, Value>) -> Map<String, Value> {
    if map.len() != 1 {
        return map;
    }
    let wraps_risks = matches!(
        map.values().next(),
        Some(Value::Object(inner)) if inner.contains_key(RISKS_KEY)
    );
    if !wraps_risks {
        return map;
    }
    match map.into_iter().next() {
        Some((_, Value::Object(inner))) => inner,
        // Checked above; the single value is an object.
        _ => Map::new(),
    }
}

fn keep_only_risks(mut map: Map<String, Value>) -> Value {
    if !matches!(map.get(RISKS_KEY), Some(Value::Array(_))) {
        return Value::Object(map);
    }
    match map.remove(RISKS_KEY) {
        Some(Value::Array(items)) => risks_object(items),
        _ => Value::Object(map),
    }
}

fn risks_object(items: Vec<Value>) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(RISKS_KEY.to_string(), Value::Array(items));
    Value::Object(map)
}

pub fn parse_analysis(text: &str) -> Result<AnalysisResult, NormalizeError> {
    let cleaned = strip_code_fence(text);
    let parsed = serde_json::from_str::<Value>(cleaned).map_err(NormalizeError::Decode)?;
    serde_json::from_value::<AnalysisResult>(normalize_shape(parsed)).map_err(NormalizeError::Schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finding(risk_type: &str) -> Value {
        json!({
            "risk_type": risk_type,
            "clause_text": "Contractor shall be liable for any and all damages...",
            "explanation": "Unlimited exposure.",
            "remediation_suggestion": "Cap liability at contract value.",
        })
    }

    #[test]
    fn strip_code_fence_handles_tagged_and_generic_fences() {
        let body = "{\"risks\":[]}";
        assert_eq!(strip_code_fence(&format!("```json\n{body}\n```\n")), body);
        assert_eq!(strip_code_fence(&format!("```\n{body}\n```")), body);
        assert_eq!(strip_code_fence(&format!("  {body}  ")), body);
    }

    #[test]
    fn strip_code_fence_leaves_unfenced_text_alone() {
        assert_eq!(
            strip_code_fence("ERROR: no JSON here"),
            "ERROR: no JSON here"
        );
    }

    #[test]
    fn fenced_and_bare_payloads_parse_identically() {
        let body = json!({"risks": [finding("Uncapped Liability")]}).to_string();
        let bare = parse_analysis(&body).unwrap();
        let tagged = parse_analysis(&format!("```json\n{body}\n```")).unwrap();
        let generic = parse_analysis(&format!("```\n{body}\n```")).unwrap();
        assert_eq!(bare, tagged);
        assert_eq!(bare, generic);
    }

    #[test]
    fn normalize_unwraps_single_envelope() {
        let v = json!({"contract_analysis": {"risks": [finding("Missing Termination Clause")]}});
        let out = normalize_shape(v);
        assert_eq!(out, json!({"risks": [finding("Missing Termination Clause")]}));
    }

    #[test]
    fn normalize_drops_sibling_keys() {
        let v = json!({
            "summary": "two issues",
            "risks": [finding("A"), finding("B")],
            "confidence": 0.8,
        });
        let out = normalize_shape(v);
        assert_eq!(out, json!({"risks": [finding("A"), finding("B")]}));
    }

    #[test]
    fn normalize_unwraps_envelope_then_drops_siblings() {
        let v = json!({"analysis": {"notes": "x", "risks": [finding("A")]}});
        assert_eq!(normalize_shape(v), json!({"risks": [finding("A")]}));
    }

    #[test]
    fn normalize_wraps_bare_array() {
        let v = json!([finding("A")]);
        assert_eq!(normalize_shape(v), json!({"risks": [finding("A")]}));
    }

    #[test]
    fn normalize_keeps_envelope_without_risks() {
        let v = json!({"analysis": {"findings": []}});
        assert_eq!(normalize_shape(v.clone()), v);
    }

    #[test]
    fn normalize_keeps_non_array_risks_for_validation() {
        let v = json!({"risks": "none", "note": "x"});
        assert_eq!(normalize_shape(v.clone()), v);
    }

    #[test]
    fn parse_analysis_reports_decode_failure() {
        let err = parse_analysis("ERROR: The model failed to generate JSON output.").unwrap_err();
        assert!(matches!(err, NormalizeError::Decode(_)));
    }

    #[test]
    fn parse_analysis_reports_schema_failure() {
        let err = parse_analysis(r#"{"risks": [{"risk_type": 3}]}"#).unwrap_err();
        assert!(matches!(err, NormalizeError::Schema(_)));
        assert!(err.to_string().starts_with("validation error for AnalysisResult"));

        let err = parse_analysis(r#""just a string""#).unwrap_err();
        assert!(matches!(err, NormalizeError::Schema(_)));
    }

    #[test]
    fn parse_analysis_accepts_empty_risks() {
        let result = parse_analysis(r#"{"risks": []}"#).unwrap();
        assert!(result.is_empty());
    }
}
