//! Report Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete scan report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Run metadata
    pub meta: ReportMeta,
    /// Per-worker results in worker-index order
    pub workers: Vec<WorkerReportResult>,
    /// Hidden-key findings, ascending worker-index order, capped globally
    pub findings: Vec<HiddenKeyFinding>,
    /// Global aggregates
    pub summary: ReportSummary,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Crate version that produced the report
    pub version: String,
    /// UTC time of report generation
    pub timestamp: DateTime<Utc>,
    /// Host information
    pub system: SystemInfo,
    /// Run configuration captured for reproducibility
    pub config: ReportConfig,
}

/// Run configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Array length
    pub length: usize,
    /// Worker count
    pub workers: usize,
    /// Global cap on reported hidden-key findings
    pub hidden_cap: usize,
    /// Isolation mode used ("process", "thread", "in-process")
    pub isolation: String,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// CPU model, "Unknown" when unavailable
    pub cpu: String,
    /// Logical CPU count
    pub cpu_cores: u32,
}

/// Per-worker execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Record received and aggregated
    Completed,
    /// Record missing or short; segment excluded from aggregation
    Failed,
}

/// One worker's echo data and segment statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReportResult {
    /// Coordinator-assigned 1-based worker id
    pub worker_id: u32,
    /// Execution status
    pub status: WorkerStatus,
    /// Segment start index (inclusive)
    pub segment_start: usize,
    /// Segment end index (exclusive)
    pub segment_end: usize,
    /// Worker process id (0 when the record never arrived)
    pub pid: i32,
    /// Worker parent process id
    pub ppid: i32,
    /// Return argument echoed by the worker
    pub return_arg: i32,
    /// Segment maximum
    pub max: Option<i32>,
    /// Segment mean (sentinels included)
    pub avg: Option<f32>,
    /// Hidden keys recorded by this worker (pre-cap)
    pub found_keys: u32,
    /// Failure description for failed workers
    pub failure: Option<String>,
}

/// One reported hidden-key location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HiddenKeyFinding {
    /// 1-based id of the worker that found the key
    pub worker_id: u32,
    /// Process id of that worker
    pub pid: i32,
    /// Return argument of that worker
    pub return_arg: i32,
    /// Absolute index into the original array
    pub index: usize,
}

/// Global aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Maximum over every contributing segment
    pub global_max: i32,
    /// Weighted average-of-averages over contributing segments
    pub global_avg: f64,
    /// Workers spawned
    pub workers_total: usize,
    /// Workers whose record never arrived intact
    pub workers_failed: usize,
    /// Findings surfaced after the global cap
    pub hidden_keys_reported: usize,
    /// Wall-clock duration of the whole run in milliseconds
    pub total_duration_ms: f64,
}
