use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const JSON_DECODE_ERROR_TYPE: &str = "Analysis Error (JSON Decode)";
pub const SYSTEM_ERROR_TYPE: &str = "System/Validation Error";

/// One contractual risk identified by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFinding {
    /// Short category label, e.g. "Uncapped Liability". Model-assigned free text.
    pub risk_type: String,
    /// Verbatim excerpt from the contract.
    pub clause_text: String,
    pub explanation: String,
    pub remediation_suggestion: String,
}

/// Root value of an analysis. Serializes as `{"risks": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub risks: Vec<RiskFinding>,
}

impl AnalysisResult {
    pub fn new(risks: Vec<RiskFinding>) -> Self {
        Self { risks }
    }

    /// A result carrying a single diagnostic finding in place of an error.
    pub fn sentinel(
        risk_type: &str,
        clause_text: impl Into<String>,
        explanation: impl Into<String>,
        remediation_suggestion: impl Into<String>,
    ) -> Self {
        Self {
            risks: vec![RiskFinding {
                risk_type: risk_type.to_string(),
                clause_text: clause_text.into(),
                explanation: explanation.into(),
                remediation_suggestion: remediation_suggestion.into(),
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.risks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.risks.is_empty()
    }

    pub fn unique_risk_types(&self) -> usize {
        self.risks
            .iter()
            .map(|r| r.risk_type.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// True when this result stands for a failed analysis rather than real findings.
    pub fn is_diagnostic(&self) -> bool {
        match self.risks.as_slice() {
            [only] => {
                only.risk_type == JSON_DECODE_ERROR_TYPE || only.risk_type == SYSTEM_ERROR_TYPE
            }
            _ => false,
        }
    }
}
