use crate::types::summary::{AnalysisReport, QualitySummary};

pub fn to_json(summary: &QualitySummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&AnalysisReport::from(summary))
}
