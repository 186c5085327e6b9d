//! Receive statistics — what the transport loop saw and did.

use ferry_core::Action;

/// Counters for one run of the transport loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub datagrams: u64,
    /// Datagrams too short to carry a sequence number.
    pub noise: u64,
    pub accepted: u64,
    /// Buffered chunks appended by a cascade.
    pub drained: u64,
    pub buffered: u64,
    pub duplicate_stale: u64,
    pub duplicate_out_of_order: u64,
    pub beyond_window: u64,
    pub eof: u64,
    pub acks_sent: u64,
    pub ack_failures: u64,
    pub files_written: u64,
    pub write_failures: u64,
}

impl ReceiverStats {
    /// Count the engine's classification of one chunk.
    pub fn record(&mut self, action: &Action) {
        match action {
            Action::Accepted { drained, .. } => {
                self.accepted += 1;
                self.drained += u64::from(*drained);
            }
            Action::Buffered { .. } => self.buffered += 1,
            Action::DuplicateOutOfOrder { .. } => self.duplicate_out_of_order += 1,
            Action::DuplicateStale { .. } => self.duplicate_stale += 1,
            Action::BeyondWindow { .. } => self.beyond_window += 1,
            Action::Finalize { .. } => self.eof += 1,
        }
    }

    /// Chunks that carried data already seen.
    pub fn duplicates(&self) -> u64 {
        self.duplicate_stale + self.duplicate_out_of_order
    }

    pub fn log(&self) {
        tracing::info!(
            datagrams = self.datagrams,
            noise = self.noise,
            accepted = self.accepted,
            drained = self.drained,
            buffered = self.buffered,
            duplicates = self.duplicates(),
            beyond_window = self.beyond_window,
            eof = self.eof,
            acks_sent = self.acks_sent,
            ack_failures = self.ack_failures,
            files_written = self.files_written,
            write_failures = self.write_failures,
            "receiver stats"
        );
    }
}
