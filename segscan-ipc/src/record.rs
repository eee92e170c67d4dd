//! Fixed-Layout Result Record
//!
//! One `MetricsRecord` is produced per worker and carries that worker's
//! segment statistics back to the coordinator. The encoding is a fixed
//! 344-byte little-endian layout:
//!
//! ```text
//! +-----+-----+------------------+------------+-----+------+------------+
//! | max | avg | hidden_keys x 80 | found_keys | pid | ppid | return_arg |
//! | i32 | f32 | i32 each         | i32        | i32 | i32  | i32        |
//! +-----+-----+------------------+------------+-----+------+------------+
//! ```
//!
//! `pid`/`ppid` are `pid_t`-sized (i32 on every supported platform). Because
//! the size is constant, the reader can detect a partial write by counting
//! the bytes it actually received.

use crate::MAX_HIDDEN_KEYS;

/// Encoded size of a [`MetricsRecord`] in bytes.
pub const RECORD_SIZE: usize = 4 + 4 + MAX_HIDDEN_KEYS * 4 + 4 + 4 + 4 + 4;

/// Sentinel seed for max tracking; below any value a generator can produce.
pub const MAX_SENTINEL: i32 = -99999;

/// Per-worker scan results in wire layout.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    /// Maximum value observed in the segment (MAX_SENTINEL if it never moved).
    pub max: i32,
    /// Mean of the segment's raw values, sentinels included.
    pub avg: f32,
    /// Absolute array indices of hidden keys; only the first `found_keys`
    /// slots are meaningful, the rest are zero on the wire.
    pub hidden_keys: [i32; MAX_HIDDEN_KEYS],
    /// Number of populated `hidden_keys` slots (<= MAX_HIDDEN_KEYS).
    pub found_keys: i32,
    /// OS process id of the producing worker (informational).
    pub pid: i32,
    /// Parent process id of the producing worker (informational).
    pub ppid: i32,
    /// Coordinator-assigned 1-based worker id, echoed back for reporting.
    pub return_arg: i32,
}

impl MetricsRecord {
    /// Create an empty record for the given worker identity.
    pub fn new(pid: i32, ppid: i32, return_arg: i32) -> Self {
        Self {
            max: MAX_SENTINEL,
            avg: 0.0,
            hidden_keys: [0; MAX_HIDDEN_KEYS],
            found_keys: 0,
            pid,
            ppid,
            return_arg,
        }
    }

    /// Encode into the fixed wire layout.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        let mut off = 0;
        put_i32(&mut buf, &mut off, self.max);
        put_f32(&mut buf, &mut off, self.avg);
        for &key in &self.hidden_keys {
            put_i32(&mut buf, &mut off, key);
        }
        put_i32(&mut buf, &mut off, self.found_keys);
        put_i32(&mut buf, &mut off, self.pid);
        put_i32(&mut buf, &mut off, self.ppid);
        put_i32(&mut buf, &mut off, self.return_arg);
        debug_assert_eq!(off, RECORD_SIZE);
        buf
    }

    /// Decode from the fixed wire layout.
    pub fn from_bytes(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut off = 0;
        let max = get_i32(buf, &mut off);
        let avg = get_f32(buf, &mut off);
        let mut hidden_keys = [0i32; MAX_HIDDEN_KEYS];
        for slot in hidden_keys.iter_mut() {
            *slot = get_i32(buf, &mut off);
        }
        let found_keys = get_i32(buf, &mut off);
        let pid = get_i32(buf, &mut off);
        let ppid = get_i32(buf, &mut off);
        let return_arg = get_i32(buf, &mut off);
        Self {
            max,
            avg,
            hidden_keys,
            found_keys,
            pid,
            ppid,
            return_arg,
        }
    }

    /// The populated hidden-key slots.
    pub fn found_hidden_keys(&self) -> &[i32] {
        let count = (self.found_keys.max(0) as usize).min(MAX_HIDDEN_KEYS);
        &self.hidden_keys[..count]
    }
}

fn put_i32(buf: &mut [u8], off: &mut usize, value: i32) {
    buf[*off..*off + 4].copy_from_slice(&value.to_le_bytes());
    *off += 4;
}

fn put_f32(buf: &mut [u8], off: &mut usize, value: f32) {
    buf[*off..*off + 4].copy_from_slice(&value.to_le_bytes());
    *off += 4;
}

fn get_i32(buf: &[u8], off: &mut usize) -> i32 {
    let value = i32::from_le_bytes(buf[*off..*off + 4].try_into().expect("4-byte slice"));
    *off += 4;
    value
}

fn get_f32(buf: &[u8], off: &mut usize) -> f32 {
    let value = f32::from_le_bytes(buf[*off..*off + 4].try_into().expect("4-byte slice"));
    *off += 4;
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut record = MetricsRecord::new(4321, 4320, 3);
        record.max = 97;
        record.avg = 51.25;
        record.hidden_keys[0] = 17;
        record.hidden_keys[1] = 902;
        record.found_keys = 2;

        let decoded = MetricsRecord::from_bytes(&record.to_bytes());
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_empty_record_roundtrip() {
        let record = MetricsRecord::new(1, 0, 1);
        let decoded = MetricsRecord::from_bytes(&record.to_bytes());
        assert_eq!(decoded.max, MAX_SENTINEL);
        assert_eq!(decoded.found_keys, 0);
        assert!(decoded.found_hidden_keys().is_empty());
    }

    #[test]
    fn test_layout_is_little_endian() {
        let mut record = MetricsRecord::new(0, 0, 0);
        record.max = 0x0102_0304;
        let bytes = record.to_bytes();
        assert_eq!(&bytes[..4], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_found_hidden_keys_clamps_bad_count() {
        // A corrupted count must not index out of bounds.
        let mut record = MetricsRecord::new(0, 0, 0);
        record.found_keys = 500;
        assert_eq!(record.found_hidden_keys().len(), MAX_HIDDEN_KEYS);
        record.found_keys = -3;
        assert!(record.found_hidden_keys().is_empty());
    }
}
