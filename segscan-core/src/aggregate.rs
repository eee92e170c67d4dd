//! Result Aggregation
//!
//! Reduces per-worker records, in receipt order, into global statistics and
//! a capped findings list. The coordinator drains channels in worker-index
//! order, so with the cap exhausted earlier workers' findings always win —
//! the same input yields the same report on every run.

use crate::segment::Segment;
use segscan_ipc::{MAX_SENTINEL, MetricsRecord};

/// One reported hidden-key location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finding {
    /// 1-based id of the worker that found the key.
    pub worker_id: u32,
    /// Absolute index into the original array.
    pub index: usize,
}

/// Finalized global statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStats {
    /// Maximum over every contributing segment.
    pub global_max: i32,
    /// Weighted average-of-averages over contributing segments.
    pub global_avg: f64,
    /// Hidden-key findings, ascending worker-index order, capped.
    pub findings: Vec<Finding>,
    /// Number of records absorbed.
    pub segments_absorbed: usize,
}

/// Stateful reducer over the ordered stream of worker records.
///
/// The mean is reconstructed from each record's per-segment average weighted
/// by that segment's actual length, which equals the true array mean when
/// every segment contributes. Segments that fail to report are simply never
/// absorbed and contribute nothing.
#[derive(Debug)]
pub struct Aggregator {
    global_max: i32,
    weighted_sum: f64,
    findings: Vec<Finding>,
    hidden_cap: usize,
    segments_absorbed: usize,
}

impl Aggregator {
    /// Create an aggregator with a global cap on reported findings.
    pub fn new(hidden_cap: usize) -> Self {
        Self {
            global_max: MAX_SENTINEL,
            weighted_sum: 0.0,
            findings: Vec::with_capacity(hidden_cap),
            hidden_cap,
            segments_absorbed: 0,
        }
    }

    /// Fold one worker's record into the running state.
    pub fn absorb(&mut self, worker_id: u32, segment: Segment, record: &MetricsRecord) {
        if record.max > self.global_max {
            self.global_max = record.max;
        }
        self.weighted_sum += f64::from(record.avg) * segment.len() as f64;

        for &index in record.found_hidden_keys() {
            if self.findings.len() >= self.hidden_cap {
                break;
            }
            self.findings.push(Finding {
                worker_id,
                index: index as usize,
            });
        }

        self.segments_absorbed += 1;
    }

    /// Finalize over the full array length.
    ///
    /// `total_len` is the original array length, not the sum of absorbed
    /// segment lengths: a degraded run divides by the full length just as a
    /// complete one does, so failed segments depress the mean visibly
    /// instead of silently renormalizing.
    pub fn finalize(self, total_len: usize) -> GlobalStats {
        GlobalStats {
            global_max: self.global_max,
            global_avg: if total_len == 0 {
                0.0
            } else {
                self.weighted_sum / total_len as f64
            },
            findings: self.findings,
            segments_absorbed: self.segments_absorbed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan_segment;
    use crate::segment::segment_bounds;

    fn scan_all(values: &[i32], workers: usize) -> Vec<(u32, Segment, MetricsRecord)> {
        segment_bounds(values.len(), workers)
            .into_iter()
            .enumerate()
            .map(|(i, segment)| {
                let id = (i + 1) as u32;
                let record = scan_segment(
                    &values[segment.start..segment.end],
                    segment,
                    MetricsRecord::new(0, 0, id as i32),
                );
                (id, segment, record)
            })
            .collect()
    }

    fn aggregate(values: &[i32], workers: usize, cap: usize) -> GlobalStats {
        let mut aggregator = Aggregator::new(cap);
        for (id, segment, record) in scan_all(values, workers) {
            aggregator.absorb(id, segment, &record);
        }
        aggregator.finalize(values.len())
    }

    #[test]
    fn test_two_worker_scenario() {
        let values = [5, 3, -1, 8, 2, -2, 9, 1, 4, 7];
        let stats = aggregate(&values, 2, 5);
        assert_eq!(stats.global_max, 9);
        assert_eq!(
            stats.findings,
            vec![
                Finding { worker_id: 1, index: 2 },
                Finding { worker_id: 2, index: 5 },
            ]
        );
    }

    #[test]
    fn test_global_max_matches_true_max() {
        let values: Vec<i32> = (0..97).map(|i| (i * 37) % 101 - 50).collect();
        let stats = aggregate(&values, 4, 10);
        assert_eq!(stats.global_max, *values.iter().max().unwrap());
    }

    #[test]
    fn test_global_avg_matches_true_mean() {
        let values: Vec<i32> = (0..1000).map(|i| (i * 13) % 200 - 40).collect();
        let true_mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64;
        for workers in [1, 3, 7] {
            let stats = aggregate(&values, workers, 10);
            // f32 per-segment averages limit precision
            assert!(
                (stats.global_avg - true_mean).abs() < 1e-3,
                "workers={workers}: {} vs {true_mean}",
                stats.global_avg
            );
        }
    }

    #[test]
    fn test_cap_favors_lower_worker_index() {
        // Every element negative: each of 3 workers finds 3 keys; cap 4
        // takes all of worker 1 and one from worker 2, none from worker 3.
        let values = [-1; 9];
        let stats = aggregate(&values, 3, 4);
        assert_eq!(stats.findings.len(), 4);
        assert_eq!(
            stats.findings,
            vec![
                Finding { worker_id: 1, index: 0 },
                Finding { worker_id: 1, index: 1 },
                Finding { worker_id: 1, index: 2 },
                Finding { worker_id: 2, index: 3 },
            ]
        );
    }

    #[test]
    fn test_deterministic_across_runs() {
        let values: Vec<i32> = (0..200).map(|i| if i % 7 == 0 { -1 } else { i }).collect();
        let first = aggregate(&values, 5, 6);
        let second = aggregate(&values, 5, 6);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_findings_still_contributes_stats() {
        let values = [10, 20, 30, 40];
        let stats = aggregate(&values, 2, 5);
        assert!(stats.findings.is_empty());
        assert_eq!(stats.global_max, 40);
        assert!((stats.global_avg - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_failed_segment_excluded() {
        let values = [5, 3, -1, 8, 2, -2, 9, 1, 4, 7];
        let scans = scan_all(&values, 2);

        // Drop worker 2's record as if its channel read failed.
        let mut aggregator = Aggregator::new(5);
        let (id, segment, record) = &scans[0];
        aggregator.absorb(*id, *segment, record);
        let stats = aggregator.finalize(values.len());

        assert_eq!(stats.segments_absorbed, 1);
        assert_eq!(stats.global_max, 8);
        assert_eq!(stats.findings, vec![Finding { worker_id: 1, index: 2 }]);
        // Mean still divides by the full length.
        assert!((stats.global_avg - 17.0 / 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_worker_equals_single_pass() {
        let values = [5, 3, -1, 8, 2, -2, 9, 1, 4, 7];
        let stats = aggregate(&values, 1, 80);
        assert_eq!(stats.global_max, 9);
        let true_mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64;
        assert!((stats.global_avg - true_mean).abs() < 1e-5);
        assert_eq!(
            stats.findings,
            vec![
                Finding { worker_id: 1, index: 2 },
                Finding { worker_id: 1, index: 5 },
            ]
        );
    }
}
