use crate::types::summary::QualitySummary;

pub fn to_text(summary: &QualitySummary) -> String {
    let mut output = String::new();
    output.push_str("===== CONSOLIDATED CODE QUALITY SUMMARY =====\n");
    match summary.score {
        Some(score) => output.push_str(&format!("Consolidated Score: {score}\n")),
        None => output.push_str("Consolidated Score: N/A\n"),
    }
    output.push_str("Improvements:\n");
    if summary.improvements.is_empty() {
        output.push_str("  - none\n");
    } else {
        for (idx, improvement) in summary.improvements.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", idx + 1, improvement));
        }
    }
    output.push_str("===== END OF SUMMARY =====");
    output
}
