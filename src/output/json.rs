//! JSON output

use super::DecisionReport;

/// Render a decision as pretty-printed JSON
pub fn render(report: &DecisionReport) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_report;
    use super::*;

    #[test]
    fn test_render_is_valid_json() {
        let rendered = render(&sample_report());
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["n_jobs"], 4);
        assert_eq!(value["chunksize"], 50);
        assert_eq!(value["dispatcher"], "map");
        assert_eq!(value["cache_hit"], false);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let rendered = render(&sample_report());
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert!(value.get("buffer_size").is_none());
        assert!(value.get("profile").is_none());
    }
}
