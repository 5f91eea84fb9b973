use crate::domain::risk::AnalysisResult;
use anyhow::Context;
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Markdown => "text/markdown; charset=utf-8",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            other => anyhow::bail!("unknown report format: {other} (expected json or markdown)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportMeta<'a> {
    pub file_name: &'a str,
    pub model: &'a str,
}

pub fn render(
    result: &AnalysisResult,
    format: ReportFormat,
    meta: &ReportMeta<'_>,
) -> anyhow::Result<String> {
    match format {
        ReportFormat::Json => to_json(result),
        ReportFormat::Markdown => Ok(to_markdown(result, meta)),
    }
}

pub fn to_json(result: &AnalysisResult) -> anyhow::Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize analysis result")
}

pub fn to_markdown(result: &AnalysisResult, meta: &ReportMeta<'_>) -> String {
    let mut out = String::from("# Contract Risk Analysis\n\n");
    // Writing into a String cannot fail.
    let _ = writeln!(out, "**File:** {}", meta.file_name);
    let _ = writeln!(out, "**Model:** {}", meta.model);
    let _ = writeln!(out, "**Risks Found:** {}\n", result.len());

    for (idx, risk) in result.risks.iter().enumerate() {
        let _ = writeln!(out, "## Risk {}: {}\n", idx + 1, risk.risk_type);
        let _ = writeln!(out, "**Clause:** {}\n", risk.clause_text);
        let _ = writeln!(out, "**Explanation:** {}\n", risk.explanation);
        let _ = writeln!(out, "**Remediation:** {}\n", risk.remediation_suggestion);
        out.push_str("---\n\n");
    }
    out
}
