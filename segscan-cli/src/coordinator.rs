//! Worker Coordinator
//!
//! Fans the array out to isolated workers and fans their result records back
//! in. Every worker gets a dedicated result channel, established before the
//! worker starts so a fast worker can never write before the coordinator is
//! listening. Records are drained in fixed worker-index order, not
//! completion order: the global hidden-key cap must favor lower-indexed
//! workers deterministically, and that is worth the head-of-line blocking.
//!
//! A worker that delivers a short record, times out, or dies is demoted to a
//! per-segment failure; the run continues and still joins every worker.

use crate::config::IsolationMode;
use segscan_core::{Segment, scan_segment, segment_bounds};
use segscan_ipc::{
    FrameError, FrameReader, FrameWriter, IPC_FD_ENV, MetricsRecord, RECORD_SIZE, ScanRequest,
};
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Fatal coordinator errors. Per-worker failures are not errors; they are
/// recorded in the worker's [`WorkerOutcome`] and the run continues.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to establish worker channel: {0}")]
    ChannelSetup(#[source] std::io::Error),

    #[error("Failed to spawn worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// What the coordinator got back from one worker.
#[derive(Debug)]
pub struct WorkerOutcome {
    /// Coordinator-assigned 1-based worker id.
    pub worker_id: u32,
    /// The segment this worker was bound to.
    pub segment: Segment,
    /// The record, or a reason the segment contributed nothing.
    pub result: Result<MetricsRecord, String>,
    /// Worker exit code where the backend has one (informational only).
    pub exit_code: Option<i32>,
}

/// Run one worker per segment and collect outcomes in worker-index order.
///
/// The caller has already validated `1 <= workers <= values.len()`.
pub fn run_workers(
    values: &[i32],
    workers: usize,
    mode: IsolationMode,
    timeout: Duration,
) -> Result<Vec<WorkerOutcome>, ScanError> {
    let segments = segment_bounds(values.len(), workers);
    debug!(workers, mode = mode.as_str(), "starting scan workers");

    match mode {
        IsolationMode::Process => run_process_workers(values, &segments, timeout),
        IsolationMode::Thread => run_thread_workers(values, &segments, timeout),
        IsolationMode::InProcess => Ok(run_in_process(values, &segments)),
    }
}

// --- process backend ---------------------------------------------------

/// Result of polling for data
#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

/// Wait for data to be available on a file descriptor with timeout
fn wait_for_data(fd: RawFd, timeout_ms: i32) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        // Data first: even a closing pipe may still hold the record.
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Create a pipe pair, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // Close-on-exec on both ends by default; the child clears it for the
    // two fds it keeps, so no worker inherits another worker's channel.
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Close a raw file descriptor.
fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// One worker's channel endpoints, created before the worker is spawned.
struct ChannelPair {
    req_read: RawFd,
    req_write: RawFd,
    res_read: RawFd,
    res_write: RawFd,
}

impl ChannelPair {
    fn close_all(&self) {
        close_fd(self.req_read);
        close_fd(self.req_write);
        close_fd(self.res_read);
        close_fd(self.res_write);
    }
}

/// Spawned worker process bound to its dedicated result channel.
struct WorkerHandle {
    worker_id: u32,
    segment: Segment,
    child: Child,
    reader: FrameReader<std::fs::File>,
    res_read_fd: RawFd,
    /// Error delivering the scan request, if any; the worker will never
    /// produce a record in that case.
    request_error: Option<String>,
}

fn run_process_workers(
    values: &[i32],
    segments: &[Segment],
    timeout: Duration,
) -> Result<Vec<WorkerOutcome>, ScanError> {
    let binary = std::env::current_exe().map_err(ScanError::WorkerSpawn)?;

    // Establish the whole channel set before spawning any worker.
    let mut channels: Vec<ChannelPair> = Vec::with_capacity(segments.len());
    for _ in segments {
        let pair = create_channel_pair().inspect_err(|_| {
            for open in &channels {
                open.close_all();
            }
        })?;
        channels.push(pair);
    }

    let mut handles: Vec<WorkerHandle> = Vec::with_capacity(segments.len());
    for (i, (&segment, pair)) in segments.iter().zip(&channels).enumerate() {
        let worker_id = (i + 1) as u32;
        match spawn_worker(&binary, worker_id, segment, values, pair) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                // No partial coverage: tear everything down and abort.
                for handle in &mut handles {
                    let _ = handle.child.kill();
                    let _ = handle.child.wait();
                }
                for open in &channels[i..] {
                    open.close_all();
                }
                return Err(e);
            }
        }
    }
    drop(channels); // fds now owned by the handles / already closed

    // Drain exactly one record per worker, in worker-index order.
    let mut drained: Vec<(Result<MetricsRecord, String>, WorkerHandle)> =
        Vec::with_capacity(handles.len());
    for mut handle in handles {
        let result = read_record_bounded(&mut handle, timeout);
        if result.is_err() {
            // A stalled worker must not block the join step.
            let _ = handle.child.kill();
        }
        drained.push((result, handle));
    }

    // Join every spawned worker, even ones already read.
    let mut outcomes = Vec::with_capacity(drained.len());
    for (result, mut handle) in drained {
        let exit_code = match handle.child.wait() {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(worker_id = handle.worker_id, error = %e, "failed to join worker");
                None
            }
        };
        debug!(worker_id = handle.worker_id, ?exit_code, "worker joined");

        if let Ok(record) = &result {
            if record.return_arg != handle.worker_id as i32 {
                warn!(
                    worker_id = handle.worker_id,
                    return_arg = record.return_arg,
                    "worker echoed unexpected return arg"
                );
            }
        }

        outcomes.push(WorkerOutcome {
            worker_id: handle.worker_id,
            segment: handle.segment,
            result,
            exit_code,
        });
    }

    Ok(outcomes)
}

fn create_channel_pair() -> Result<ChannelPair, ScanError> {
    let (req_read, req_write) = create_pipe().map_err(ScanError::ChannelSetup)?;
    let (res_read, res_write) = match create_pipe() {
        Ok(fds) => fds,
        Err(e) => {
            close_fd(req_read);
            close_fd(req_write);
            return Err(ScanError::ChannelSetup(e));
        }
    };
    Ok(ChannelPair {
        req_read,
        req_write,
        res_read,
        res_write,
    })
}

fn spawn_worker(
    binary: &std::path::Path,
    worker_id: u32,
    segment: Segment,
    values: &[i32],
    pair: &ChannelPair,
) -> Result<WorkerHandle, ScanError> {
    let ChannelPair {
        req_read,
        req_write,
        res_read,
        res_write,
    } = *pair;

    let mut command = Command::new(binary);
    command
        .arg("--scan-worker")
        .env(IPC_FD_ENV, "3,4")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit());

    // In the child: dup req_read→3, res_write→4. The parent-side ends are
    // closed first so a pipe that landed on fd 3 or 4 cannot be clobbered
    // by the dups below.
    unsafe {
        command.pre_exec(move || {
            libc::close(req_write);
            libc::close(res_read);

            if req_read != 3 {
                libc::dup2(req_read, 3);
                libc::close(req_read);
            }
            let flags = libc::fcntl(3, libc::F_GETFD);
            libc::fcntl(3, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

            if res_write != 4 {
                libc::dup2(res_write, 4);
                libc::close(res_write);
            }
            let flags = libc::fcntl(4, libc::F_GETFD);
            libc::fcntl(4, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

            Ok(())
        });
    }

    let child = command.spawn().map_err(ScanError::WorkerSpawn)?;

    // Close the child-side ends in the parent.
    close_fd(req_read);
    close_fd(res_write);

    let writer_file = unsafe { std::fs::File::from_raw_fd(req_write) };
    let reader_file = unsafe { std::fs::File::from_raw_fd(res_read) };

    // Send the assignment, then drop the writer so the request channel
    // closes after its single use.
    let mut writer = FrameWriter::new(writer_file);
    let request = ScanRequest {
        worker_id,
        start: segment.start as u64,
        end: segment.end as u64,
        values: values[segment.start..segment.end].to_vec(),
    };
    let request_error = writer.write_request(&request).err().map(|e| e.to_string());
    drop(writer);

    Ok(WorkerHandle {
        worker_id,
        segment,
        child,
        reader: FrameReader::new(reader_file),
        res_read_fd: res_read,
        request_error,
    })
}

/// Block for this worker's single record, bounded by `timeout`.
fn read_record_bounded(
    handle: &mut WorkerHandle,
    timeout: Duration,
) -> Result<MetricsRecord, String> {
    if let Some(e) = &handle.request_error {
        return Err(format!("scan request not delivered: {e}"));
    }

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(format!(
                "timed out after {:.1}s waiting for record",
                timeout.as_secs_f64()
            ));
        }

        let poll_timeout = remaining.min(Duration::from_millis(100));
        match wait_for_data(handle.res_read_fd, poll_timeout.as_millis() as i32) {
            PollResult::DataAvailable | PollResult::PipeClosed => break,
            PollResult::Timeout => continue,
            PollResult::Error(e) => return Err(format!("pipe error: {e}")),
        }
    }

    match handle.reader.read_record() {
        Ok(record) => Ok(record),
        Err(FrameError::EndOfStream) => Err("worker closed channel without a record".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

// --- thread backend ----------------------------------------------------

/// Decode one record delivered as raw bytes over an in-memory channel,
/// applying the same length check a pipe read would.
fn decode_record_bytes(bytes: &[u8]) -> Result<MetricsRecord, String> {
    let buf: &[u8; RECORD_SIZE] = bytes.try_into().map_err(|_| {
        FrameError::TruncatedRecord {
            got: bytes.len(),
            expected: RECORD_SIZE,
        }
        .to_string()
    })?;
    Ok(MetricsRecord::from_bytes(buf))
}

fn parent_pid() -> i32 {
    unsafe { libc::getppid() }
}

fn run_thread_workers(
    values: &[i32],
    segments: &[Segment],
    timeout: Duration,
) -> Result<Vec<WorkerOutcome>, ScanError> {
    let shared: Arc<[i32]> = Arc::from(values);

    // One dedicated channel per worker, created before its thread starts.
    let mut receivers = Vec::with_capacity(segments.len());
    let mut threads = Vec::with_capacity(segments.len());
    for (i, &segment) in segments.iter().enumerate() {
        let worker_id = (i + 1) as u32;
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(1);
        let shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name(format!("segscan-worker-{worker_id}"))
            .spawn(move || {
                let identity = MetricsRecord::new(
                    std::process::id() as i32,
                    parent_pid(),
                    worker_id as i32,
                );
                let record =
                    scan_segment(&shared[segment.start..segment.end], segment, identity);
                // Single send on the dedicated channel; dropping the sender
                // closes it.
                let _ = sender.send(record.to_bytes().to_vec());
            })
            .map_err(ScanError::WorkerSpawn)?;
        receivers.push(receiver);
        threads.push(thread);
    }

    // Drain in worker-index order.
    let mut results = Vec::with_capacity(segments.len());
    for receiver in &receivers {
        let result = match receiver.recv_timeout(timeout) {
            Ok(bytes) => decode_record_bytes(&bytes),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(format!(
                "timed out after {:.1}s waiting for record",
                timeout.as_secs_f64()
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err("worker closed channel without a record".to_string())
            }
        };
        results.push(result);
    }

    // Join every worker after all reads.
    for thread in threads {
        if thread.join().is_err() {
            warn!("worker thread panicked during join");
        }
    }

    Ok(segments
        .iter()
        .zip(results)
        .enumerate()
        .map(|(i, (&segment, result))| WorkerOutcome {
            worker_id: (i + 1) as u32,
            segment,
            result,
            exit_code: None,
        })
        .collect())
}

// --- in-process backend ------------------------------------------------

fn run_in_process(values: &[i32], segments: &[Segment]) -> Vec<WorkerOutcome> {
    segments
        .iter()
        .enumerate()
        .map(|(i, &segment)| {
            let worker_id = (i + 1) as u32;
            let identity =
                MetricsRecord::new(std::process::id() as i32, parent_pid(), worker_id as i32);
            let record = scan_segment(&values[segment.start..segment.end], segment, identity);
            WorkerOutcome {
                worker_id,
                segment,
                result: Ok(record),
                exit_code: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ARRAY: [i32; 10] = [5, 3, -1, 8, 2, -2, 9, 1, 4, 7];

    #[test]
    fn test_thread_workers_end_to_end() {
        let outcomes = run_workers(
            &SAMPLE_ARRAY,
            2,
            IsolationMode::Thread,
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(outcomes.len(), 2);
        let first = outcomes[0].result.as_ref().unwrap();
        assert_eq!(first.max, 8);
        assert_eq!(first.found_hidden_keys(), &[2]);
        assert_eq!(first.return_arg, 1);

        let second = outcomes[1].result.as_ref().unwrap();
        assert_eq!(second.max, 9);
        assert_eq!(second.found_hidden_keys(), &[5]);
        assert_eq!(second.return_arg, 2);
    }

    #[test]
    fn test_thread_workers_deterministic() {
        let values: Vec<i32> = (0..500).map(|i| if i % 9 == 0 { -1 } else { i % 50 }).collect();
        let run = || {
            run_workers(&values, 5, IsolationMode::Thread, Duration::from_secs(5))
                .unwrap()
                .into_iter()
                .map(|o| o.result.unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_in_process_matches_thread_mode() {
        let threaded = run_workers(
            &SAMPLE_ARRAY,
            2,
            IsolationMode::Thread,
            Duration::from_secs(5),
        )
        .unwrap();
        let serial = run_workers(&SAMPLE_ARRAY, 2, IsolationMode::InProcess, Duration::ZERO).unwrap();

        for (a, b) in threaded.iter().zip(&serial) {
            let (ra, rb) = (a.result.as_ref().unwrap(), b.result.as_ref().unwrap());
            assert_eq!(ra.max, rb.max);
            assert_eq!(ra.avg, rb.avg);
            assert_eq!(ra.found_hidden_keys(), rb.found_hidden_keys());
        }
    }

    #[test]
    fn test_single_worker_covers_whole_array() {
        let outcomes =
            run_workers(&SAMPLE_ARRAY, 1, IsolationMode::Thread, Duration::from_secs(5)).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].segment, Segment { start: 0, end: 10 });
        let record = outcomes[0].result.as_ref().unwrap();
        assert_eq!(record.max, 9);
        assert_eq!(record.found_hidden_keys(), &[2, 5]);
    }

    #[test]
    fn test_decode_rejects_short_record() {
        let err = decode_record_bytes(&[0u8; 100]).unwrap_err();
        assert!(err.contains("got 100 of 344 bytes"), "{err}");
    }

    #[test]
    #[ignore] // Requires the built segscan binary as current_exe
    fn test_process_workers_end_to_end() {
        let outcomes = run_workers(
            &SAMPLE_ARRAY,
            2,
            IsolationMode::Process,
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(outcomes.len(), 2);
        for (i, outcome) in outcomes.iter().enumerate() {
            let record = outcome.result.as_ref().unwrap();
            assert_eq!(record.return_arg, (i + 1) as i32);
            assert_eq!(outcome.exit_code, Some((i + 1) as i32));
        }
    }
}
