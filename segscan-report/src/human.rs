//! Output Formatting
//!
//! Human-readable terminal output: one identity line per worker, one line
//! per surfaced hidden key, per-segment stats, then the global summary.

use crate::report::{Report, WorkerStatus};

/// Format a report for human-readable terminal display.
pub fn format_human_output(report: &Report) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("Segscan Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for worker in &report.workers {
        match worker.status {
            WorkerStatus::Completed => {
                output.push_str(&format!(
                    "Hi, I am process {} with return arg {} and my parent is {}.\n",
                    worker.pid, worker.return_arg, worker.ppid
                ));

                for finding in report.findings.iter().filter(|f| f.worker_id == worker.worker_id) {
                    output.push_str(&format!(
                        "Hi, I am process {} with return arg {} and I found the hidden key in position A[{}].\n",
                        finding.pid, finding.return_arg, finding.index
                    ));
                }

                if let (Some(max), Some(avg)) = (worker.max, worker.avg) {
                    output.push_str(&format!("Max={max}, Avg={avg:.0}\n"));
                }
            }
            WorkerStatus::Failed => {
                output.push_str(&format!(
                    "Worker {} (segment [{}, {})) failed: {}\n",
                    worker.worker_id,
                    worker.segment_start,
                    worker.segment_end,
                    worker.failure.as_deref().unwrap_or("no record received"),
                ));
            }
        }
    }

    output.push('\n');
    output.push_str("Summary\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "Max={}, Avg={:.2}\n",
        report.summary.global_max, report.summary.global_avg
    ));
    output.push_str(&format!(
        "Workers: {} total, {} failed. Hidden keys reported: {}.\n",
        report.summary.workers_total,
        report.summary.workers_failed,
        report.summary.hidden_keys_reported
    ));
    output.push_str(&format!(
        "Execution Time: {:.2} seconds\n",
        report.summary.total_duration_ms / 1000.0
    ));

    output
}
