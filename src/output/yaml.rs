//! YAML output

use super::DecisionReport;

/// Render a decision as YAML
pub fn render(report: &DecisionReport) -> String {
    serde_yaml::to_string(report).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_report;
    use super::*;

    #[test]
    fn test_render_is_valid_yaml() {
        let rendered = render(&sample_report());
        let value: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(value["n_jobs"], serde_yaml::Value::from(4));
        assert_eq!(value["mode"], serde_yaml::Value::from("batch"));
    }
}
