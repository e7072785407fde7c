//! Markdown output

use super::DecisionReport;

/// Render a decision as a Markdown section with a parameter table
pub fn render(report: &DecisionReport) -> String {
    let mut out = String::new();
    out.push_str("## Optimization Recommendation\n\n");
    out.push_str("| Parameter | Value |\n");
    out.push_str("|-----------|-------|\n");
    out.push_str(&format!("| Mode | {} |\n", report.mode));
    out.push_str(&format!("| Workers (n_jobs) | {} |\n", report.n_jobs));
    out.push_str(&format!("| Chunksize | {} |\n", report.chunksize));
    out.push_str(&format!("| Dispatcher | {} |\n", report.dispatcher));
    out.push_str(&format!(
        "| Estimated speedup | {:.2}x |\n",
        report.estimated_speedup
    ));
    if let Some(buffer_size) = report.buffer_size {
        out.push_str(&format!("| Buffer size | {buffer_size} |\n"));
    }
    if let Some(policy) = &report.adaptive_chunking {
        out.push_str(&format!(
            "| Adaptive chunking | {}..{} (rate {:.2}) |\n",
            policy.min_chunksize, policy.max_chunksize, policy.adaptation_rate
        ));
    }
    if let Some(enabled) = report.memory_backpressure_enabled {
        out.push_str(&format!("| Memory backpressure | {enabled} |\n"));
    }
    out.push_str(&format!(
        "| Cache | {} |\n",
        if report.cache_hit { "hit" } else { "miss" }
    ));

    out.push_str(&format!("\n**Reason:** {}\n", report.reason));

    if !report.warnings.is_empty() {
        out.push_str("\n**Warnings:**\n\n");
        for warning in &report.warnings {
            out.push_str(&format!("- {warning}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_report;
    use super::*;

    #[test]
    fn test_render_is_markdown_table() {
        let rendered = render(&sample_report());
        assert!(rendered.starts_with("## "));
        assert!(rendered.contains("| Parameter | Value |"));
        assert!(rendered.contains("| Workers (n_jobs) | 4 |"));
        assert!(rendered.contains("**Reason:**"));
        assert!(rendered.contains("- a warning"));
    }
}
