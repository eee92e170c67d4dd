//! Segment Scan
//!
//! The single pass a worker makes over its slice: running max, running sum,
//! and absolute positions of hidden keys (negative sentinel values planted
//! in the input). Hidden keys count toward the mean; the original data
//! format defines the mean over raw values, so the negative sentinels skew
//! it slightly. That is intentional and covered by tests.

use crate::segment::Segment;
use segscan_ipc::{MAX_HIDDEN_KEYS, MAX_SENTINEL, MetricsRecord};

/// Scan one segment and produce its result record.
///
/// `values` is the worker's slice (`segment.len()` elements); indices in the
/// record are absolute, offset by `segment.start`. The identity fields
/// (`pid`, `ppid`, `return_arg`) are taken from `record_identity` so the
/// same scan serves every isolation backend.
///
/// At most [`MAX_HIDDEN_KEYS`] positions are recorded per segment;
/// `found_keys` only counts written slots, so excess keys in a dense
/// segment are silently dropped.
pub fn scan_segment(values: &[i32], segment: Segment, record_identity: MetricsRecord) -> MetricsRecord {
    debug_assert_eq!(values.len(), segment.len());

    let mut record = record_identity;
    record.max = MAX_SENTINEL;
    record.found_keys = 0;

    let mut sum: i64 = 0;
    for (offset, &value) in values.iter().enumerate() {
        if value > record.max {
            record.max = value;
        }
        sum += i64::from(value);
        if value < 0 && (record.found_keys as usize) < MAX_HIDDEN_KEYS {
            record.hidden_keys[record.found_keys as usize] = (segment.start + offset) as i32;
            record.found_keys += 1;
        }
    }

    record.avg = if values.is_empty() {
        0.0
    } else {
        sum as f32 / values.len() as f32
    };

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> MetricsRecord {
        MetricsRecord::new(1000, 999, 1)
    }

    fn whole(values: &[i32]) -> Segment {
        Segment {
            start: 0,
            end: values.len(),
        }
    }

    #[test]
    fn test_basic_scan() {
        let values = [5, 3, -1, 8, 2];
        let record = scan_segment(&values, whole(&values), identity());
        assert_eq!(record.max, 8);
        assert_eq!(record.found_keys, 1);
        assert_eq!(record.found_hidden_keys(), &[2]);
        // Sum includes the -1 sentinel: 17 / 5
        assert!((record.avg - 3.4).abs() < 1e-6);
    }

    #[test]
    fn test_absolute_indices() {
        let values = [9, -4, 1];
        let segment = Segment { start: 5, end: 8 };
        let record = scan_segment(&values, segment, identity());
        assert_eq!(record.found_hidden_keys(), &[6]);
        assert_eq!(record.max, 9);
    }

    #[test]
    fn test_all_negative_segment() {
        let values = [-2, -7, -1];
        let record = scan_segment(&values, whole(&values), identity());
        assert_eq!(record.max, -1);
        assert_eq!(record.found_keys, 3);
        assert!((record.avg - (-10.0 / 3.0)).abs() < 1e-5);
    }

    #[test]
    fn test_hidden_key_cap_drops_excess() {
        // 100 hidden keys in one segment; only the first 80 are recorded
        // and found_keys never exceeds the cap.
        let values: Vec<i32> = (0..100).map(|i| -(i + 1)).collect();
        let record = scan_segment(&values, whole(&values), identity());
        assert_eq!(record.found_keys as usize, MAX_HIDDEN_KEYS);
        let expected: Vec<i32> = (0..MAX_HIDDEN_KEYS as i32).collect();
        assert_eq!(record.found_hidden_keys(), expected.as_slice());
    }

    #[test]
    fn test_identity_preserved() {
        let values = [1, 2];
        let record = scan_segment(&values, whole(&values), MetricsRecord::new(77, 76, 4));
        assert_eq!(record.pid, 77);
        assert_eq!(record.ppid, 76);
        assert_eq!(record.return_arg, 4);
    }
}
