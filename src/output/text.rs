//! Human-readable text output

use super::DecisionReport;

/// Render a decision as a console report
pub fn render(report: &DecisionReport) -> String {
    let mut out = String::new();
    out.push_str("═══════════════════════════════════════════════════════════\n");
    out.push_str("              OPTIMIZATION RECOMMENDATION\n");
    out.push_str("═══════════════════════════════════════════════════════════\n");
    out.push('\n');
    out.push_str(&format!("Mode:              {}\n", report.mode));
    out.push_str(&format!("Workers (n_jobs):  {}\n", report.n_jobs));
    out.push_str(&format!("Chunksize:         {}\n", report.chunksize));
    out.push_str(&format!("Dispatcher:        {}\n", report.dispatcher));
    out.push_str(&format!(
        "Estimated speedup: {:.2}x\n",
        report.estimated_speedup
    ));
    if let Some(buffer_size) = report.buffer_size {
        out.push_str(&format!("Buffer size:       {buffer_size}\n"));
    }
    if let Some(policy) = &report.adaptive_chunking {
        out.push_str(&format!(
            "Adaptive chunks:   {}..{} (rate {:.2})\n",
            policy.min_chunksize, policy.max_chunksize, policy.adaptation_rate
        ));
    }
    if report.memory_backpressure_enabled == Some(true) {
        out.push_str("Backpressure:      enabled\n");
    }
    out.push_str(&format!(
        "Cache:             {}\n",
        if report.cache_hit { "hit" } else { "miss" }
    ));
    out.push('\n');
    out.push_str(&format!("Reason: {}\n", report.reason));

    if !report.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &report.warnings {
            out.push_str(&format!("  - {warning}\n"));
        }
    }

    if let Some(profile) = &report.profile {
        out.push('\n');
        out.push_str(&profile.explain());
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_report;
    use super::*;

    #[test]
    fn test_render_contains_sections() {
        let rendered = render(&sample_report());
        assert!(rendered.contains("OPTIMIZATION RECOMMENDATION"));
        assert!(rendered.contains("Workers (n_jobs):  4"));
        assert!(rendered.contains("Estimated speedup: 3.14x"));
        assert!(rendered.contains("Warnings:"));
        assert!(rendered.contains("a warning"));
    }

    #[test]
    fn test_render_includes_profile_when_present() {
        let mut report = sample_report();
        report.profile = Some(crate::profile::DiagnosticProfile::new());
        let rendered = render(&report);
        assert!(rendered.contains("DIAGNOSTIC PROFILE"));
    }
}
