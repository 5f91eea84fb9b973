pub const TEMPERATURE: f32 = 0.2;
pub const RESPONSE_MIME_TYPE: &str = "application/json";

pub fn system_prompt() -> String {
    [
        "You are a highly experienced and meticulous Senior Contract Risk Analyst, specializing in complex Construction and Enterprise IT agreements. Your tone must be authoritative, objective, and detailed.",
        "",
        "Your core mission is to critically review the provided contract and identify EVERY instance of an unfavorable or ambiguous term. Focus on the financial and legal exposure for the client.",
        "",
        "TARGET RISKS:",
        "- Vague payment terms (Lacking specific dates, milestones, or conditions)",
        "- Uncapped liability (Any \"any and all damages\" clauses)",
        "- Ambiguous scope of work (Subject to change, undefined deliverables)",
        "- Missing termination terms (No \"with or without cause\" options)",
        "- Missing insurance requirements (Critical in Construction Subcontracts)",
        "- Broad indemnification clauses (Transferring excessive risk)",
        "- Overly unilateral terms (Heavily favoring one party, e.g., in termination or payment)",
        "",
        "CRITICAL OUTPUT GUIDELINES:",
        "1. CLAUSE TEXT: The 'clause_text' field MUST be the precise, verbatim text block from the contract that contains the risk.",
        "2. REMEDIATION: The 'remediation_suggestion' field MUST provide a concrete, actionable revision that mitigates the risk.",
        "3. SCHEMA: You MUST respond ONLY with a valid JSON object strictly matching the required schema. The root object MUST contain the key 'risks'. If NO significant risks are identified, return {\"risks\": []}.",
    ]
    .join("\n")
}

pub fn user_prompt(document_text: &str) -> String {
    format!(
        "Analyze this contract and identify all significant risks. CONTRACT TEXT:\n\n{document_text}"
    )
}

/// Structured-output hint in the Gemini schema dialect, mirroring `AnalysisResult`.
pub fn response_schema() -> serde_json::Value {
    let string_field = |description: &str| {
        serde_json::json!({"type": "STRING", "description": description})
    };

    serde_json::json!({
        "type": "OBJECT",
        "description": "Root schema containing all identified risks.",
        "required": ["risks"],
        "properties": {
            "risks": {
                "type": "ARRAY",
                "description": "List of all identified risks",
                "items": {
                    "type": "OBJECT",
                    "required": ["risk_type", "clause_text", "explanation", "remediation_suggestion"],
                    "properties": {
                        "risk_type": string_field("Type of risk (e.g., 'Uncapped Liability', 'Vague Payment Terms')"),
                        "clause_text": string_field("Text of the clause that contains the risk"),
                        "explanation": string_field("Why this is a risk and its potential legal/financial impact"),
                        "remediation_suggestion": string_field("How the clause could be modified to mitigate the risk"),
                    }
                }
            }
        }
    })
}
