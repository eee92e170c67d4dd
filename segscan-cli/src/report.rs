//! Report Assembly
//!
//! Aggregates drained worker outcomes and builds the final [`Report`],
//! including system metadata for reproducibility.

use crate::config::SegscanConfig;
use crate::coordinator::WorkerOutcome;
use chrono::Utc;
use segscan_core::{Aggregator, GlobalStats};
use segscan_report::{
    HiddenKeyFinding, Report, ReportConfig, ReportMeta, ReportSummary, SystemInfo,
    WorkerReportResult, WorkerStatus,
};

/// Reduce outcomes in receipt order into global statistics.
///
/// Failed workers are skipped; their segments contribute nothing to the
/// max, the mean, or the findings list.
pub fn aggregate_outcomes(outcomes: &[WorkerOutcome], hidden_cap: usize, total_len: usize) -> GlobalStats {
    let mut aggregator = Aggregator::new(hidden_cap);
    for outcome in outcomes {
        if let Ok(record) = &outcome.result {
            aggregator.absorb(outcome.worker_id, outcome.segment, record);
        }
    }
    aggregator.finalize(total_len)
}

/// Build the full report from outcomes and aggregated statistics.
pub fn build_report(
    outcomes: &[WorkerOutcome],
    stats: &GlobalStats,
    config: &SegscanConfig,
    total_duration_ms: f64,
) -> Report {
    let workers: Vec<WorkerReportResult> = outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(record) => WorkerReportResult {
                worker_id: outcome.worker_id,
                status: WorkerStatus::Completed,
                segment_start: outcome.segment.start,
                segment_end: outcome.segment.end,
                pid: record.pid,
                ppid: record.ppid,
                return_arg: record.return_arg,
                max: Some(record.max),
                avg: Some(record.avg),
                found_keys: record.found_keys.max(0) as u32,
                failure: None,
            },
            Err(reason) => WorkerReportResult {
                worker_id: outcome.worker_id,
                status: WorkerStatus::Failed,
                segment_start: outcome.segment.start,
                segment_end: outcome.segment.end,
                pid: 0,
                ppid: 0,
                return_arg: 0,
                max: None,
                avg: None,
                found_keys: 0,
                failure: Some(reason.clone()),
            },
        })
        .collect();

    let findings: Vec<HiddenKeyFinding> = stats
        .findings
        .iter()
        .map(|finding| {
            let worker = &workers[(finding.worker_id - 1) as usize];
            HiddenKeyFinding {
                worker_id: finding.worker_id,
                pid: worker.pid,
                return_arg: worker.return_arg,
                index: finding.index,
            }
        })
        .collect();

    let workers_failed = workers
        .iter()
        .filter(|w| w.status == WorkerStatus::Failed)
        .count();

    Report {
        meta: build_report_meta(config),
        findings,
        summary: ReportSummary {
            global_max: stats.global_max,
            global_avg: stats.global_avg,
            workers_total: workers.len(),
            workers_failed,
            hidden_keys_reported: stats.findings.len(),
            total_duration_ms,
        },
        workers,
    }
}

/// Build report metadata including system info.
fn build_report_meta(config: &SegscanConfig) -> ReportMeta {
    ReportMeta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        system: SystemInfo {
            os: std::env::consts::OS.to_string(),
            cpu: get_cpu_model().unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: num_cpus(),
        },
        config: ReportConfig {
            length: config.input.length,
            workers: config.scan.workers,
            hidden_cap: config.scan.hidden_cap,
            isolation: config.scan.isolation.as_str().to_string(),
        },
    }
}

/// Get CPU model name from /proc/cpuinfo (Linux only)
fn get_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|p| p.get() as u32)
        .unwrap_or(1)
}
