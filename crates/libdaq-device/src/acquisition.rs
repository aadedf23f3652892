//! The acquisition loop: receive, resynchronize, decode, deliver.
//!
//! [`SampleStream`] is a pull iterator. Each call to `next` drains frames
//! already buffered in the scanner and only touches the transport when the
//! buffer holds no complete sample frame. A stream belongs to one acquisition
//! session; once the session is stopped the stream ends, even if the device
//! is restarted later.

use std::collections::HashMap;
use std::sync::Arc;

use libdaq_frame::command::command_name;
use libdaq_frame::{ParsedFrame, RawSamples};
use libdaq_transport::{Transport, TransportError};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::device::{Link, Shared};
use crate::error::{DeviceError, Result};
use crate::params::VoltageRange;

/// One decoded sample frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleBatch {
    /// Acquisition session this batch belongs to.
    pub session: u64,
    /// Zero-based input the samples were taken on.
    pub channel: u8,
    /// Per-channel frame counter (wraps at 256).
    pub sequence: u8,
    /// Raw signed ADC counts.
    pub counts: Vec<i16>,
    /// Counts scaled to volts for the configured range.
    pub volts: Vec<f64>,
}

impl SampleBatch {
    /// Mean voltage of the batch, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.volts.is_empty() {
            return 0.0;
        }
        self.volts.iter().sum::<f64>() / self.volts.len() as f64
    }

    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.volts.len()
    }

    /// True when the frame carried no samples.
    pub fn is_empty(&self) -> bool {
        self.volts.is_empty()
    }
}

/// Counters for one acquisition session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionStats {
    /// Receive calls that returned data.
    pub receives: u64,
    /// Frames decoded, control frames included.
    pub frames: u64,
    /// Sample batches delivered.
    pub batches: u64,
    /// Bytes discarded while hunting for a header.
    pub resync_bytes: u64,
    /// Frames dropped for an unknown command or bad tail.
    pub corrupt_frames: u64,
    /// Receive calls that timed out.
    pub timeouts: u64,
    /// Batches whose sequence did not follow the previous one on that channel.
    pub sequence_gaps: u64,
}

enum Received {
    Data,
    TimedOut,
    Failed(TransportError),
}

/// Sample batches of one acquisition session.
///
/// Yields `Ok` batches until the session is stopped. A fatal condition
/// (device unresponsive, transport failure) is yielded once as `Err`, after
/// which the session has already been halted and the stream is finished.
pub struct SampleStream<T: Transport> {
    shared: Arc<Shared<T>>,
    generation: u64,
    voltage: VoltageRange,
    consecutive_timeouts: u32,
    last_sequence: HashMap<u8, u8>,
    finished: bool,
}

impl<T: Transport> SampleStream<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, generation: u64, voltage: VoltageRange) -> Self {
        Self {
            shared,
            generation,
            voltage,
            consecutive_timeouts: 0,
            last_sequence: HashMap::new(),
            finished: false,
        }
    }

    /// Session this stream reads.
    pub fn session(&self) -> u64 {
        self.generation
    }

    fn poll(&mut self) -> Result<Option<SampleBatch>> {
        let timeout = self.shared.config.receive_timeout;
        let limit = self.shared.config.max_consecutive_timeouts;

        loop {
            // A halted session never takes the link again.
            if !self.shared.is_live(self.generation) {
                return Ok(None);
            }
            let mut link = self.shared.lock_link();
            if !self.shared.is_live(self.generation) {
                return Ok(None);
            }

            if let Some(raw) = drain(&mut *link) {
                let scan = link.scanner.stats();
                drop(link);
                self.shared.record(|stats| {
                    stats.frames = scan.frames;
                    stats.resync_bytes = scan.resync_bytes;
                    stats.corrupt_frames = scan.corrupt_frames;
                });
                return Ok(Some(self.deliver(raw)));
            }

            let received = match link.transport.receive(timeout) {
                Ok(bytes) => {
                    trace!(len = bytes.len(), "received chunk");
                    link.scanner.push(&bytes);
                    Received::Data
                }
                Err(TransportError::Timeout(_)) => Received::TimedOut,
                Err(err) => Received::Failed(err),
            };
            drop(link);

            // Stopped while blocked in receive: the caller ended the session.
            if !self.shared.is_live(self.generation) {
                return Ok(None);
            }

            match received {
                Received::Data => {
                    self.consecutive_timeouts = 0;
                    self.shared.record(|stats| stats.receives += 1);
                }
                Received::TimedOut => {
                    self.consecutive_timeouts += 1;
                    self.shared.record(|stats| stats.timeouts += 1);
                    debug!(
                        consecutive = self.consecutive_timeouts,
                        limit, "receive timed out"
                    );
                    if self.consecutive_timeouts > limit {
                        warn!(
                            timeouts = self.consecutive_timeouts,
                            "device unresponsive; halting acquisition"
                        );
                        self.shared
                            .halt_session(self.generation, "device unresponsive");
                        return Err(DeviceError::DeviceUnresponsive {
                            timeouts: self.consecutive_timeouts,
                        });
                    }
                }
                Received::Failed(err) => {
                    warn!(error = %err, "transport failed; halting acquisition");
                    self.shared.halt_session(self.generation, "transport error");
                    return Err(err.into());
                }
            }
        }
    }

    fn deliver(&mut self, raw: RawSamples) -> SampleBatch {
        let gap = match self.last_sequence.insert(raw.channel, raw.sequence) {
            Some(previous) if raw.sequence != previous.wrapping_add(1) => {
                debug!(
                    channel = raw.channel,
                    expected = previous.wrapping_add(1),
                    got = raw.sequence,
                    "sequence gap"
                );
                true
            }
            _ => false,
        };
        self.shared.record(|stats| {
            stats.batches += 1;
            if gap {
                stats.sequence_gaps += 1;
            }
        });

        let volts = raw
            .counts
            .iter()
            .map(|&count| self.voltage.count_to_volts(count))
            .collect();
        SampleBatch {
            session: self.generation,
            channel: raw.channel,
            sequence: raw.sequence,
            counts: raw.counts,
            volts,
        }
    }
}

/// Next buffered sample frame; ACK and control frames are skipped.
fn drain<T>(link: &mut Link<T>) -> Option<RawSamples> {
    while let Some(frame) = link.scanner.next_frame() {
        match frame {
            ParsedFrame::Samples(raw) => return Some(raw),
            other => trace!(
                command = command_name(other.command()),
                "ignoring non-sample frame"
            ),
        }
    }
    None
}

impl<T: Transport> Iterator for SampleStream<T> {
    type Item = Result<SampleBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.poll() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for SampleStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStream")
            .field("session", &self.generation)
            .field("finished", &self.finished)
            .finish()
    }
}
