//! Output formatting
//!
//! One decision, five renderings: human text, JSON, YAML, an aligned
//! key/value table, and Markdown. Every renderer works from the same
//! [`DecisionReport`], a flattened, serializable view of either engine's
//! result, so machine formats and human formats can never drift apart.

pub mod json;
pub mod markdown;
pub mod table;
pub mod text;
pub mod yaml;

use crate::optimizer::streaming::{AdaptiveChunkingPolicy, StreamingOptimizationResult};
use crate::optimizer::OptimizationResult;
use crate::profile::DiagnosticProfile;
use clap::ValueEnum;
use serde::Serialize;

/// Rendering target for CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
    Table,
    Markdown,
}

/// Flattened view of an optimization decision, ready to render
#[derive(Debug, Clone, Serialize)]
pub struct DecisionReport {
    /// "batch" or "streaming"
    pub mode: String,
    pub n_jobs: usize,
    pub chunksize: usize,
    /// map, imap, or imap_unordered
    pub dispatcher: String,
    pub estimated_speedup: f64,
    pub reason: String,
    pub warnings: Vec<String>,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_backpressure_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive_chunking: Option<AdaptiveChunkingPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<DiagnosticProfile>,
}

impl DecisionReport {
    /// Flatten a batch-engine result
    pub fn from_batch<T, R>(result: &OptimizationResult<T, R>) -> Self {
        Self {
            mode: "batch".to_string(),
            n_jobs: result.n_jobs,
            chunksize: result.chunksize,
            dispatcher: "map".to_string(),
            estimated_speedup: result.estimated_speedup,
            reason: result.reason.clone(),
            warnings: result.warnings.clone(),
            cache_hit: result.cache_hit,
            buffer_size: None,
            memory_backpressure_enabled: None,
            adaptive_chunking: None,
            profile: result.profile.clone(),
        }
    }

    /// Flatten a streaming-engine result
    pub fn from_streaming<T, R>(result: &StreamingOptimizationResult<T, R>) -> Self {
        Self {
            mode: "streaming".to_string(),
            n_jobs: result.n_jobs,
            chunksize: result.chunksize,
            dispatcher: result.dispatcher_kind().to_string(),
            estimated_speedup: result.estimated_speedup,
            reason: result.reason.clone(),
            warnings: result.warnings.clone(),
            cache_hit: result.cache_hit,
            buffer_size: Some(result.buffer_size),
            memory_backpressure_enabled: Some(result.memory_backpressure_enabled),
            adaptive_chunking: result.adaptive_chunking.clone(),
            profile: result.profile.clone(),
        }
    }

    /// Render in the requested format
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => text::render(self),
            OutputFormat::Json => json::render(self),
            OutputFormat::Yaml => yaml::render(self),
            OutputFormat::Table => table::render(self),
            OutputFormat::Markdown => markdown::render(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_report() -> DecisionReport {
        DecisionReport {
            mode: "batch".to_string(),
            n_jobs: 4,
            chunksize: 50,
            dispatcher: "map".to_string(),
            estimated_speedup: 3.14,
            reason: "parallelization beneficial: 4 workers with chunks of 50".to_string(),
            warnings: vec!["a warning".to_string()],
            cache_hit: false,
            buffer_size: None,
            memory_backpressure_enabled: None,
            adaptive_chunking: None,
            profile: None,
        }
    }

    #[test]
    fn test_every_format_renders_core_fields() {
        let report = sample_report();
        for format in [
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::Yaml,
            OutputFormat::Table,
            OutputFormat::Markdown,
        ] {
            let rendered = report.render(format);
            assert!(rendered.contains('4'), "{format:?} missing n_jobs");
            assert!(rendered.contains("50"), "{format:?} missing chunksize");
        }
    }
}
