use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::{parse_data, ParsedFrame, HEADER_MAGIC, MAX_PACKET_SIZE};
use crate::error::ProtocolError;

const INITIAL_BUFFER_CAPACITY: usize = 2 * MAX_PACKET_SIZE;

/// Counters for what the scanner kept and what it threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Frames decoded successfully.
    pub frames: u64,
    /// Bytes skipped one at a time while hunting for a header.
    pub resync_bytes: u64,
    /// Frames dropped after their header validated.
    pub corrupt_frames: u64,
}

/// Pulls complete frames out of an arbitrarily chunked byte stream.
///
/// Bytes are pushed in as they arrive from the transport. [`next_frame`]
/// applies the resynchronization policy: a missing header drops a single
/// byte, a corrupt frame drops its header magic, and scanning resumes on the
/// rest of the buffer. Once `next_frame` returns `None` the buffer holds at
/// most one partial frame, so it never grows past a packet plus one chunk.
///
/// [`next_frame`]: FrameScanner::next_frame
#[derive(Debug)]
pub struct FrameScanner {
    buf: BytesMut,
    stats: ScanStats,
}

impl FrameScanner {
    /// Create an empty scanner.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            stats: ScanStats::default(),
        }
    }

    /// Append freshly received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Decode the next complete frame, skipping anything unparseable.
    ///
    /// Returns `None` when the remaining bytes are empty or a partial frame.
    pub fn next_frame(&mut self) -> Option<ParsedFrame> {
        while !self.buf.is_empty() {
            match parse_data(&self.buf) {
                Ok(Some(parsed)) => {
                    self.buf.advance(parsed.consumed);
                    self.stats.frames += 1;
                    return Some(parsed.frame);
                }
                Ok(None) => return None,
                Err(ProtocolError::Framing) => {
                    self.buf.advance(1);
                    self.stats.resync_bytes += 1;
                }
                Err(err) => {
                    trace!(error = %err, "dropping corrupt frame");
                    self.buf.advance(HEADER_MAGIC.len());
                    self.stats.corrupt_frames += 1;
                }
            }
        }
        None
    }

    /// Discard everything buffered. Counters are kept.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Counters since creation or the last [`reset_stats`](Self::reset_stats).
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Zero the counters.
    pub fn reset_stats(&mut self) {
        self.stats = ScanStats::default();
    }
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new()
    }
}
