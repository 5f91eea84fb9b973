use crate::domain::risk::AnalysisResult;
use serde::Serialize;

/// Running totals across analyses. Owned by the caller; nothing in the core keeps one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub contracts_analyzed: u64,
    pub risks_found: u64,
}

impl SessionStats {
    pub fn record(&mut self, result: &AnalysisResult) {
        self.contracts_analyzed += 1;
        self.risks_found += result.len() as u64;
    }
}
