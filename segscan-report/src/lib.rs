#![warn(missing_docs)]
//! Segscan Report - Reporting and Output
//!
//! Generates output from a completed scan run:
//! - JSON (machine-readable)
//! - Human-readable terminal text

mod human;
mod json;
mod report;

pub use human::format_human_output;
pub use json::generate_json_report;
pub use report::{
    HiddenKeyFinding, Report, ReportConfig, ReportMeta, ReportSummary, SystemInfo,
    WorkerReportResult, WorkerStatus,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
