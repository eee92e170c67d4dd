#![warn(missing_docs)]
//! Segscan IPC Protocol
//!
//! Fixed-layout binary contract for coordinator-worker communication.
//! The result record uses explicit little-endian fixed-width fields so the
//! layout is bit-stable across writer and reader regardless of compiler or
//! platform; scan requests use length-prefixed frames over the same pipes.

mod framing;
mod record;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, ScanRequest};
pub use record::{MAX_SENTINEL, MetricsRecord, RECORD_SIZE};

/// Per-worker cap on recorded hidden-key positions.
pub const MAX_HIDDEN_KEYS: usize = 80;

/// Environment variable carrying the worker's inherited fd pair ("read,write").
pub const IPC_FD_ENV: &str = "SEGSCAN_IPC_FD";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size() {
        // max + avg + 80 hidden keys + found_keys + pid + ppid + return_arg
        assert_eq!(RECORD_SIZE, 4 + 4 + MAX_HIDDEN_KEYS * 4 + 4 + 4 + 4 + 4);
        assert_eq!(RECORD_SIZE, 344);
    }
}
