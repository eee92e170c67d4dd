//! JSON Output

use crate::report::Report;

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use crate::report::*;
    use chrono::Utc;

    pub(crate) fn sample_report() -> Report {
        Report {
            meta: ReportMeta {
                version: "0.1.0".to_string(),
                timestamp: Utc::now(),
                system: SystemInfo {
                    os: "linux".to_string(),
                    cpu: "test".to_string(),
                    cpu_cores: 4,
                },
                config: ReportConfig {
                    length: 10,
                    workers: 2,
                    hidden_cap: 5,
                    isolation: "process".to_string(),
                },
            },
            workers: vec![
                WorkerReportResult {
                    worker_id: 1,
                    status: WorkerStatus::Completed,
                    segment_start: 0,
                    segment_end: 5,
                    pid: 4001,
                    ppid: 4000,
                    return_arg: 1,
                    max: Some(8),
                    avg: Some(3.4),
                    found_keys: 1,
                    failure: None,
                },
                WorkerReportResult {
                    worker_id: 2,
                    status: WorkerStatus::Failed,
                    segment_start: 5,
                    segment_end: 10,
                    pid: 0,
                    ppid: 0,
                    return_arg: 0,
                    max: None,
                    avg: None,
                    found_keys: 0,
                    failure: Some("truncated record: got 100 of 344 bytes".to_string()),
                },
            ],
            findings: vec![HiddenKeyFinding {
                worker_id: 1,
                pid: 4001,
                return_arg: 1,
                index: 2,
            }],
            summary: ReportSummary {
                global_max: 8,
                global_avg: 1.7,
                workers_total: 2,
                workers_failed: 1,
                hidden_keys_reported: 1,
                total_duration_ms: 12.5,
            },
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let report = sample_report();
        let json = super::generate_json_report(&report).unwrap();
        let decoded: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.summary.global_max, 8);
        assert_eq!(decoded.workers.len(), 2);
        assert_eq!(decoded.workers[1].status, WorkerStatus::Failed);
        assert_eq!(decoded.findings, report.findings);
    }
}
