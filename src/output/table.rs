//! Aligned key/value table output

use super::DecisionReport;

/// Render a decision as an aligned two-column table
pub fn render(report: &DecisionReport) -> String {
    let mut rows: Vec<(String, String)> = vec![
        ("mode".to_string(), report.mode.clone()),
        ("n_jobs".to_string(), report.n_jobs.to_string()),
        ("chunksize".to_string(), report.chunksize.to_string()),
        ("dispatcher".to_string(), report.dispatcher.clone()),
        (
            "estimated_speedup".to_string(),
            format!("{:.2}x", report.estimated_speedup),
        ),
        ("cache_hit".to_string(), report.cache_hit.to_string()),
        ("reason".to_string(), report.reason.clone()),
    ];
    if let Some(buffer_size) = report.buffer_size {
        rows.push(("buffer_size".to_string(), buffer_size.to_string()));
    }
    if let Some(enabled) = report.memory_backpressure_enabled {
        rows.push(("memory_backpressure".to_string(), enabled.to_string()));
    }
    if let Some(policy) = &report.adaptive_chunking {
        rows.push((
            "adaptive_chunking".to_string(),
            format!(
                "{}..{} (rate {:.2})",
                policy.min_chunksize, policy.max_chunksize, policy.adaptation_rate
            ),
        ));
    }
    for (index, warning) in report.warnings.iter().enumerate() {
        rows.push((format!("warning[{index}]"), warning.clone()));
    }

    let key_width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

    let border = format!("+-{}-+-{}-+", "-".repeat(key_width), "-".repeat(value_width));
    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    for (key, value) in &rows {
        out.push_str(&format!("| {key:<key_width$} | {value:<value_width$} |\n"));
    }
    out.push_str(&border);
    out.push('\n');
    out
}
