//! Ferry wire format — on-wire types for chunk and acknowledgment datagrams.
//!
//! These types ARE the protocol. A chunk datagram is a 4-byte big-endian
//! sequence number followed by the payload; an acknowledgment is the same
//! 4-byte header with nothing after it. There is no version byte, no length
//! field and no checksum: the datagram boundary is the frame boundary.
//!
//! Headers use zerocopy derives for safe, allocation-free serialization.
//! There is no unsafe code in this module.

use bytes::Bytes;
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

// ── Headers ──────────────────────────────────────────────────────────────────

/// Prefix of every chunk datagram.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct ChunkHeader {
    /// Position of this chunk in the file, starting at 0.
    /// `EOF_SENTINEL` marks the end of the transfer.
    pub sequence: U32<BigEndian>,
}

assert_eq_size!(ChunkHeader, [u8; 4]);

/// Acknowledgment datagram, sent back to the chunk's source address.
///
/// Acknowledges receipt of exactly one sequence number. There is no
/// cumulative, selective or negative acknowledgment.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct AckDatagram {
    pub sequence: U32<BigEndian>,
}

assert_eq_size!(AckDatagram, [u8; 4]);

// ── Constants ─────────────────────────────────────────────────────────────────

/// Sequence number reserved for "end of file". Its payload is ignored.
pub const EOF_SENTINEL: u32 = 0xFFFF_FFFF;

/// Length of the chunk header. Shorter datagrams are transport noise.
pub const HEADER_LEN: usize = 4;

/// Receive buffer size. Any UDP datagram fits.
pub const MAX_DATAGRAM: usize = 65_535;

// ── Chunk ─────────────────────────────────────────────────────────────────────

/// A decoded chunk datagram. Lives for one receive-and-process step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence: u32,
    pub payload: Bytes,
}

impl Chunk {
    pub fn new(sequence: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    /// The end-of-file chunk, with an empty payload.
    pub fn eof() -> Self {
        Self::new(EOF_SENTINEL, Bytes::new())
    }

    pub fn is_eof(&self) -> bool {
        self.sequence == EOF_SENTINEL
    }

    /// Decode a raw datagram. The first four bytes are the sequence number,
    /// everything after them is payload.
    pub fn decode(datagram: &[u8]) -> Result<Self, WireError> {
        let header =
            ChunkHeader::read_from_prefix(datagram).ok_or(WireError::Truncated(datagram.len()))?;
        Ok(Self {
            sequence: header.sequence.get(),
            payload: Bytes::copy_from_slice(&datagram[HEADER_LEN..]),
        })
    }

    /// Encode into a datagram ready for `send_to`.
    pub fn encode(&self) -> Vec<u8> {
        let header = ChunkHeader {
            sequence: U32::new(self.sequence),
        };
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

// ── Acknowledgments ───────────────────────────────────────────────────────────

/// Encode the acknowledgment for `sequence`.
pub fn encode_ack(sequence: u32) -> [u8; 4] {
    let ack = AckDatagram {
        sequence: U32::new(sequence),
    };
    let mut out = [0u8; 4];
    out.copy_from_slice(ack.as_bytes());
    out
}

/// Decode an acknowledgment datagram. Trailing bytes are ignored.
pub fn decode_ack(datagram: &[u8]) -> Result<u32, WireError> {
    AckDatagram::read_from_prefix(datagram)
        .map(|ack| ack.sequence.get())
        .ok_or(WireError::Truncated(datagram.len()))
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("datagram of {0} bytes is shorter than the {}-byte header", HEADER_LEN)]
    Truncated(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
