//! Frame Encoding over Byte-Stream Channels
//!
//! Scan requests are length-prefixed (the payload size depends on the
//! segment length); result records need no prefix because their size is
//! fixed, but the read is length-checked so a short write by a dying worker
//! surfaces as a truncation error rather than garbage.

use crate::record::{MetricsRecord, RECORD_SIZE};
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Maximum request frame size (8 MB) to prevent memory exhaustion.
/// Covers the 1M-element array cap with room for the header.
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Truncated record: got {got} of {expected} bytes")]
    TruncatedRecord { got: usize, expected: usize },

    #[error("End of stream")]
    EndOfStream,
}

/// A scan assignment sent from the coordinator to one worker.
///
/// Carries the worker's read-only copy of its slice along with the absolute
/// bounds, so hidden-key positions can be reported as indices into the
/// original array.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Coordinator-assigned 1-based worker id.
    pub worker_id: u32,
    /// Absolute start index of the segment (inclusive).
    pub start: u64,
    /// Absolute end index of the segment (exclusive).
    pub end: u64,
    /// The segment's values, in array order.
    pub values: Vec<i32>,
}

impl ScanRequest {
    fn encoded_len(&self) -> usize {
        // worker_id + start + end + count + values
        4 + 8 + 8 + 4 + self.values.len() * 4
    }
}

/// Write a length-prefixed scan request.
///
/// Frame format:
/// ```text
/// +----------------+-----------+-------+-----+-------+------------+
/// | length (4 LE)  | worker_id | start | end | count | values...  |
/// +----------------+-----------+-------+-----+-------+------------+
/// ```
pub fn write_request<W: Write>(
    writer: &mut BufWriter<W>,
    request: &ScanRequest,
) -> Result<(), FrameError> {
    let len = request.encoded_len();
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_le_bytes())?;
    writer.write_all(&request.worker_id.to_le_bytes())?;
    writer.write_all(&request.start.to_le_bytes())?;
    writer.write_all(&request.end.to_le_bytes())?;
    writer.write_all(&(request.values.len() as u32).to_le_bytes())?;
    for value in &request.values {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;

    Ok(())
}

/// Read a length-prefixed scan request.
pub fn read_request<R: Read>(reader: &mut BufReader<R>) -> Result<ScanRequest, FrameError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::EndOfStream);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    if len < 24 {
        return Err(FrameError::InvalidFrame(format!(
            "request frame too short: {len} bytes"
        )));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    let worker_id = u32::from_le_bytes(buf[0..4].try_into().expect("4-byte slice"));
    let start = u64::from_le_bytes(buf[4..12].try_into().expect("8-byte slice"));
    let end = u64::from_le_bytes(buf[12..20].try_into().expect("8-byte slice"));
    let count = u32::from_le_bytes(buf[20..24].try_into().expect("4-byte slice")) as usize;

    if len != 24 + count * 4 {
        return Err(FrameError::InvalidFrame(format!(
            "value count {count} does not match frame length {len}"
        )));
    }
    if end < start || (end - start) as usize != count {
        return Err(FrameError::InvalidFrame(format!(
            "segment [{start}, {end}) does not match value count {count}"
        )));
    }

    let values = buf[24..]
        .chunks_exact(4)
        .map(|chunk| i32::from_le_bytes(chunk.try_into().expect("4-byte chunk")))
        .collect();

    Ok(ScanRequest {
        worker_id,
        start,
        end,
        values,
    })
}

/// Write a fixed-size result record. No length prefix: both sides know
/// [`RECORD_SIZE`].
pub fn write_record<W: Write>(
    writer: &mut BufWriter<W>,
    record: &MetricsRecord,
) -> Result<(), FrameError> {
    writer.write_all(&record.to_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read a fixed-size result record, counting bytes so a partial write is
/// reported as [`FrameError::TruncatedRecord`] with both byte counts.
pub fn read_record<R: Read>(reader: &mut BufReader<R>) -> Result<MetricsRecord, FrameError> {
    let mut buf = [0u8; RECORD_SIZE];
    let mut got = 0;
    while got < RECORD_SIZE {
        match reader.read(&mut buf[got..]) {
            Ok(0) if got == 0 => return Err(FrameError::EndOfStream),
            Ok(0) => {
                return Err(FrameError::TruncatedRecord {
                    got,
                    expected: RECORD_SIZE,
                });
            }
            Ok(n) => got += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FrameError::Io(e)),
        }
    }
    Ok(MetricsRecord::from_bytes(&buf))
}

/// Frame writer wrapper for one end of a channel.
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Create a new frame writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
        }
    }

    /// Write a scan request.
    pub fn write_request(&mut self, request: &ScanRequest) -> Result<(), FrameError> {
        write_request(&mut self.writer, request)
    }

    /// Write a result record.
    pub fn write_record(&mut self, record: &MetricsRecord) -> Result<(), FrameError> {
        write_record(&mut self.writer, record)
    }
}

/// Frame reader wrapper for one end of a channel.
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Create a new frame reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader),
        }
    }

    /// Read a scan request.
    pub fn read_request(&mut self) -> Result<ScanRequest, FrameError> {
        read_request(&mut self.reader)
    }

    /// Read a result record.
    pub fn read_record(&mut self) -> Result<MetricsRecord, FrameError> {
        read_record(&mut self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_request_roundtrip() {
        let original = ScanRequest {
            worker_id: 2,
            start: 100,
            end: 105,
            values: vec![5, -3, 42, 0, -1],
        };

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer.write_request(&original).unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let decoded = reader.read_request().unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_record_roundtrip_over_stream() {
        let mut record = MetricsRecord::new(100, 99, 1);
        record.max = 88;
        record.avg = 12.5;
        record.hidden_keys[0] = 7;
        record.found_keys = 1;

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer.write_record(&record).unwrap();
        }
        assert_eq!(buffer.len(), RECORD_SIZE);

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let decoded = reader.read_record().unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn test_truncated_record_reports_byte_counts() {
        let record = MetricsRecord::new(1, 0, 1);
        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer.write_record(&record).unwrap();
        }
        buffer.truncate(100);

        let mut reader = FrameReader::new(Cursor::new(buffer));
        match reader.read_record() {
            Err(FrameError::TruncatedRecord { got, expected }) => {
                assert_eq!(got, 100);
                assert_eq!(expected, RECORD_SIZE);
            }
            other => panic!("expected TruncatedRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_channel_is_end_of_stream() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        assert!(matches!(reader.read_record(), Err(FrameError::EndOfStream)));
        assert!(matches!(
            reader.read_request(),
            Err(FrameError::EndOfStream)
        ));
    }

    #[test]
    fn test_request_count_mismatch_rejected() {
        let original = ScanRequest {
            worker_id: 1,
            start: 0,
            end: 3,
            values: vec![1, 2, 3],
        };
        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer.write_request(&original).unwrap();
        }
        // Corrupt the declared bounds so they no longer match the count.
        buffer[16] = 9;

        let mut reader = FrameReader::new(Cursor::new(buffer));
        assert!(matches!(
            reader.read_request(),
            Err(FrameError::InvalidFrame(_))
        ));
    }
}
