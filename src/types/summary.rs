use serde::Serialize;

/// Most improvement lines kept from one analysis.
pub const MAX_IMPROVEMENTS: usize = 3;
pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAnalysis {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualitySummary {
    pub score: Option<u8>,
    pub improvements: Vec<String>,
}

/// Wire shape of a summary as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub consolidated_score: Option<u8>,
    pub consolidated_improvements: Vec<String>,
}

impl From<&QualitySummary> for AnalysisReport {
    fn from(summary: &QualitySummary) -> Self {
        Self {
            consolidated_score: summary.score,
            consolidated_improvements: summary.improvements.clone(),
        }
    }
}
