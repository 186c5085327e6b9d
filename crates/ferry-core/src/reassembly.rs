//! Reassembly engine — turns numbered chunks arriving in any order into
//! the original byte stream.
//!
//! A [`ReassemblySession`] is the whole state of one logical transfer:
//! the expected cursor, the reorder buffer and the output assembled so far.
//! [`ReassemblySession::process`] classifies one chunk against that state
//! and returns an [`Action`] telling the caller what to acknowledge and
//! whether a file is ready to be written. The engine does no I/O.
//!
//! Invariants:
//! - every buffered key is strictly greater than the cursor;
//! - a key enters the buffer at most once and leaves it exactly once,
//!   when the cursor reaches it;
//! - output bytes are appended in increasing sequence order and never
//!   touched again until the session resets.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::wire::{Chunk, EOF_SENTINEL};

/// What happened to a chunk fed to [`ReassemblySession::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The chunk was the next expected one. Its payload and `drained`
    /// buffered successors were appended to the output.
    Accepted { sequence: u32, drained: u32 },

    /// Arrived early and is now waiting in the reorder buffer.
    Buffered { sequence: u32 },

    /// Arrived early but the same sequence number is already buffered.
    DuplicateOutOfOrder { sequence: u32 },

    /// Already appended to the output.
    DuplicateStale { sequence: u32 },

    /// Too far ahead of the cursor for the configured reorder window.
    /// Not buffered and not acknowledged, so the sender retries later.
    BeyondWindow { sequence: u32 },

    /// End of file. Carries the assembled output; the session is reset.
    Finalize { output: Vec<u8> },
}

impl Action {
    /// Sequence number to acknowledge, if any.
    ///
    /// Receipt is acknowledged, not novelty: duplicates are acked too.
    pub fn ack(&self) -> Option<u32> {
        match self {
            Action::Accepted { sequence, .. }
            | Action::Buffered { sequence }
            | Action::DuplicateOutOfOrder { sequence }
            | Action::DuplicateStale { sequence } => Some(*sequence),
            Action::Finalize { .. } => Some(EOF_SENTINEL),
            Action::BeyondWindow { .. } => None,
        }
    }
}

/// State of one logical file transfer.
#[derive(Debug, Default)]
pub struct ReassemblySession {
    cursor: u32,
    buffer: BTreeMap<u32, Bytes>,
    output: Vec<u8>,
    /// Maximum distance ahead of the cursor that may be buffered.
    /// 0 = unbounded.
    window: u32,
}

impl ReassemblySession {
    /// A fresh session with an unbounded reorder buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh session that refuses to buffer chunks `window` or more
    /// sequence numbers ahead of the cursor. `0` means unbounded.
    pub fn with_window(window: u32) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    /// Merge one chunk into the session.
    pub fn process(&mut self, chunk: Chunk) -> Action {
        let Chunk { sequence, payload } = chunk;

        if sequence == EOF_SENTINEL {
            let output = std::mem::take(&mut self.output);
            self.reset();
            return Action::Finalize { output };
        }

        if sequence == self.cursor {
            self.output.extend_from_slice(&payload);
            // sequence < EOF_SENTINEL, so this cannot overflow.
            self.cursor += 1;
            let mut drained = 0;
            while let Some(next) = self.buffer.remove(&self.cursor) {
                self.output.extend_from_slice(&next);
                self.cursor += 1;
                drained += 1;
            }
            return Action::Accepted { sequence, drained };
        }

        if sequence > self.cursor {
            if self.window != 0 && sequence - self.cursor >= self.window {
                return Action::BeyondWindow { sequence };
            }
            if self.buffer.contains_key(&sequence) {
                return Action::DuplicateOutOfOrder { sequence };
            }
            self.buffer.insert(sequence, payload);
            return Action::Buffered { sequence };
        }

        Action::DuplicateStale { sequence }
    }

    /// Hand back whatever has been assembled without an EOF, and reset.
    ///
    /// Used on shutdown so an interrupted transfer is not lost. Returns
    /// `None` when nothing has been assembled yet.
    pub fn take_partial(&mut self) -> Option<Vec<u8>> {
        let output = std::mem::take(&mut self.output);
        self.reset();
        if output.is_empty() {
            None
        } else {
            Some(output)
        }
    }

    /// Next sequence number that will be appended directly.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Number of chunks waiting in the reorder buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Payload bytes held in the reorder buffer.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.values().map(Bytes::len).sum()
    }

    /// Output assembled so far.
    pub fn assembled(&self) -> &[u8] {
        &self.output
    }

    /// True when the session is in its initial state.
    pub fn is_idle(&self) -> bool {
        self.cursor == 0 && self.buffer.is_empty() && self.output.is_empty()
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.buffer.clear();
        self.output.clear();
    }
}
