pub mod json;
pub mod text;

use crate::error::CheckerError;
use crate::types::summary::QualitySummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Text,
}

pub fn render(summary: &QualitySummary, format: OutputFormat) -> Result<String, CheckerError> {
    match format {
        OutputFormat::Json => json::to_json(summary).map_err(CheckerError::Json),
        OutputFormat::Text => Ok(text::to_text(summary)),
    }
}
