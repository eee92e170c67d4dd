//! Worker Process Entry Point
//!
//! The coordinator spawns this binary with `--scan-worker` and an inherited
//! fd pair: fd 3 carries the scan request in, fd 4 carries the single result
//! record out (set via `SEGSCAN_IPC_FD`). On non-Unix or when the variable
//! is absent, falls back to stdin/stdout.
//!
//! A worker handles exactly one request: read assignment, scan, write one
//! record, exit. Its exit code is the assigned worker id, mirrored in the
//! record's `return_arg`.

use crate::scan::scan_segment;
use crate::segment::Segment;
use segscan_ipc::{FrameError, FrameReader, FrameWriter, IPC_FD_ENV, MetricsRecord};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// IPC transport: either inherited fd pair or stdin/stdout fallback.
enum IpcTransport {
    #[cfg(unix)]
    Fds {
        read_fd: i32,
        write_fd: i32,
    },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        let parts: Vec<&str> = val.split(',').collect();
        if parts.len() == 2 {
            if let (Ok(r), Ok(w)) = (parts[0].parse::<i32>(), parts[1].parse::<i32>()) {
                return IpcTransport::Fds {
                    read_fd: r,
                    write_fd: w,
                };
            }
        }
        eprintln!(
            "segscan: warning: invalid {IPC_FD_ENV}={val:?} (expected format: <read_fd>,<write_fd>), falling back to stdio"
        );
    }
    IpcTransport::Stdio
}

fn parent_pid() -> i32 {
    #[cfg(unix)]
    {
        unsafe { libc::getppid() }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

/// One-shot worker loop.
pub struct WorkerMain {
    reader: FrameReader<Box<dyn std::io::Read>>,
    writer: FrameWriter<Box<dyn std::io::Write>>,
}

impl WorkerMain {
    /// Create a worker bound to the inherited fd pair, or stdio as fallback.
    pub fn new() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self {
                    reader: FrameReader::new(Box::new(read_file) as Box<dyn std::io::Read>),
                    writer: FrameWriter::new(Box::new(write_file) as Box<dyn std::io::Write>),
                }
            }
            IpcTransport::Stdio => Self {
                reader: FrameReader::new(Box::new(std::io::stdin()) as Box<dyn std::io::Read>),
                writer: FrameWriter::new(Box::new(std::io::stdout()) as Box<dyn std::io::Write>),
            },
        }
    }

    /// Read one assignment, scan it, write the single result record.
    ///
    /// Returns the worker id to use as the process exit code.
    pub fn run(&mut self) -> Result<i32, FrameError> {
        let request = self.reader.read_request()?;

        let segment = Segment {
            start: request.start as usize,
            end: request.end as usize,
        };
        let identity = MetricsRecord::new(
            std::process::id() as i32,
            parent_pid(),
            request.worker_id as i32,
        );

        let record = scan_segment(&request.values, segment, identity);

        // The single write on this worker's dedicated channel. The channel
        // closes when the process exits and drops the fd.
        self.writer.write_record(&record)?;

        Ok(request.worker_id as i32)
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}
