//! Array Segmentation
//!
//! Divides `[0, len)` into contiguous, non-overlapping index ranges, one per
//! worker. The last segment absorbs the integer-division remainder.

/// A half-open index range `[start, end)` into the input array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Inclusive start index.
    pub start: usize,
    /// Exclusive end index.
    pub end: usize,
}

impl Segment {
    /// Number of elements covered by this segment.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the segment covers no elements.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `len` elements into `workers` contiguous segments.
///
/// Segment `i` is `[i*chunk, (i+1)*chunk)` with `chunk = len / workers`,
/// except the last segment which runs to `len` and so may be up to
/// `chunk + workers - 1` elements long.
///
/// # Panics
///
/// Panics if `workers == 0` or `workers > len`. Callers validate the worker
/// count before any worker exists; reaching this with a bad count is a
/// configuration bug, not a runtime condition.
pub fn segment_bounds(len: usize, workers: usize) -> Vec<Segment> {
    assert!(workers >= 1, "worker count must be at least 1");
    assert!(
        workers <= len,
        "worker count {workers} exceeds array length {len}"
    );

    let chunk = len / workers;
    (0..workers)
        .map(|i| Segment {
            start: i * chunk,
            end: if i == workers - 1 { len } else { (i + 1) * chunk },
        })
        .collect()
}
