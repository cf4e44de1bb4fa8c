//! Progress reporting during an import.

/// Receives the running totals of an import.
///
/// `bytes` is what the destination store reports as written so far, `rows`
/// the number of committed rows.
pub trait ProgressObserver {
    /// Called after every committed row. Rate limiting is up to the observer.
    fn on_progress(&mut self, bytes: u64, rows: u64);

    /// Called exactly once, after the last row has been flushed.
    fn on_finish(&mut self, bytes: u64, rows: u64);
}

/// Logs a status line whenever another 50 MB have been written.
#[derive(Debug, Clone)]
pub struct DefaultProgress {
    next_report: u64,
}

impl DefaultProgress {
    pub const UPDATE_FREQUENCY_BYTES: u64 = 50 * 1000 * 1000;

    pub fn new() -> Self {
        Self {
            next_report: Self::UPDATE_FREQUENCY_BYTES,
        }
    }
}

impl Default for DefaultProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for DefaultProgress {
    fn on_progress(&mut self, bytes: u64, rows: u64) {
        if bytes < self.next_report {
            return;
        }
        tracing::info!("Wrote {}MB, {} entries", bytes / 1000 / 1000, rows);
        while self.next_report <= bytes {
            self.next_report += Self::UPDATE_FREQUENCY_BYTES;
        }
    }

    fn on_finish(&mut self, bytes: u64, rows: u64) {
        tracing::info!("Done, wrote {}MB, {} entries", bytes / 1000 / 1000, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_threshold() {
        let mut p = DefaultProgress::new();
        p.on_progress(10, 1);
        assert_eq!(p.next_report, DefaultProgress::UPDATE_FREQUENCY_BYTES);
        p.on_progress(120 * 1000 * 1000, 2);
        assert_eq!(p.next_report, 150 * 1000 * 1000);
        p.on_progress(140 * 1000 * 1000, 3);
        assert_eq!(p.next_report, 150 * 1000 * 1000);
    }
}
