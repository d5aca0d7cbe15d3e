//! Progress accounting for actions.

/// Counts bytes toward a notification threshold.
#[derive(Debug, Clone)]
pub(crate) struct ByteThreshold {
    threshold: u64,
    pending: u64,
}

impl ByteThreshold {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            pending: 0,
        }
    }

    /// Record written bytes. Returns true when the threshold was crossed,
    /// in which case the running count starts over.
    pub fn record(&mut self, bytes: u64) -> bool {
        self.pending += bytes;
        if self.pending >= self.threshold {
            self.pending = 0;
            true
        } else {
            false
        }
    }
}

/// Percent of work done, by bytes when `by_bytes` and a total is known,
/// by items otherwise.
///
/// Never reports 0 once work has started; the initial `progress(0, n, 0)`
/// is emitted explicitly by the scheduler.
pub(crate) fn percent_done(
    by_bytes: bool,
    current_item: usize,
    total_items: usize,
    bytes_written: u64,
    total_bytes: u64,
) -> u8 {
    let percent = if by_bytes && total_bytes > 0 {
        bytes_written.saturating_mul(100) / total_bytes
    } else if total_items > 0 {
        (current_item as u64).saturating_mul(100) / total_items as u64
    } else {
        0
    };
    percent.clamp(1, 100) as u8
}
