//! An in-process DAQ122 that speaks the wire protocol over the
//! [`Transport`] trait.
//!
//! The simulator parses host frames with the same [`FrameScanner`] the host
//! uses, acknowledges commands, and streams sine-wave sample frames for every
//! selected channel while collection is running. Faults can be injected to
//! exercise resynchronization, rejection, and timeout handling.

use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use libdaq_frame::command::{
    command_name, ACK, CONFIGURE_ADC, SAMPLES_PER_FRAME, SAMPLE_DATA, SELECT_CHANNEL,
    START_COLLECTION, STOP_COLLECTION,
};
use libdaq_frame::{encode_frame, Ack, CodecConfig, FrameScanner, ParsedFrame, RawSamples};
use libdaq_transport::{Result, Transport, TransportError};
use tracing::{debug, trace};

use crate::params::{SampleRate, VoltageRange};

/// Status byte the simulator uses for rejected commands.
pub const STATUS_REJECTED: u8 = 0x01;

const CHANNELS: u8 = 8;
const SIGNAL_HZ: f64 = 10.0;
const AMPLITUDE: f64 = 16384.0;
/// Rounds generated per receive at most when catching up on a paced stream.
const MAX_CATCH_UP_ROUNDS: u64 = 8;

/// Faults to inject into the simulated device.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Never acknowledge anything.
    pub silent: bool,
    /// Commands acknowledged with [`STATUS_REJECTED`].
    pub reject: Vec<u16>,
    /// Emit one junk byte before every n-th sample frame.
    pub garbage_every: Option<u64>,
    /// Break the tail of every n-th sample frame.
    pub corrupt_every: Option<u64>,
    /// Advance the sequence counter by two on every n-th sample frame.
    pub skip_sequence_every: Option<u64>,
    /// Stop producing sample frames after this many.
    pub stall_after_frames: Option<u64>,
    /// Drop the link once this many sample frames have been read out.
    pub close_after_frames: Option<u64>,
    /// Refuse to open.
    pub fail_open: bool,
}

/// Commands the simulator has received, in order. Shared between clones.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<u16>>>);

impl CommandLog {
    fn push(&self, command: u16) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    /// Every command received so far.
    pub fn snapshot(&self) -> Vec<u16> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How many times `command` was received.
    pub fn count(&self, command: u16) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|&&c| c == command)
            .count()
    }
}

/// Simulated DAQ122.
pub struct SimulatedDaq122 {
    open: bool,
    faults: Faults,
    leading_garbage: Vec<u8>,
    paced: bool,
    chunk_size: usize,
    codec: CodecConfig,
    scanner: FrameScanner,
    outbound: BytesMut,
    log: CommandLog,

    rate: SampleRate,
    voltage: VoltageRange,
    mask: u8,
    streaming: bool,
    started_at: Instant,
    rounds: u64,
    frames: u64,
    sequences: [u8; CHANNELS as usize],
}

impl SimulatedDaq122 {
    /// An unpaced simulator: every receive while streaming yields one round
    /// of frames immediately.
    pub fn new() -> Self {
        Self {
            open: false,
            faults: Faults::default(),
            leading_garbage: Vec::new(),
            paced: false,
            chunk_size: libdaq_frame::MAX_PACKET_SIZE,
            codec: CodecConfig::default(),
            scanner: FrameScanner::new(),
            outbound: BytesMut::new(),
            log: CommandLog::default(),
            rate: SampleRate::Hz1k,
            voltage: VoltageRange::Bipolar10V,
            mask: 0,
            streaming: false,
            started_at: Instant::now(),
            rounds: 0,
            frames: 0,
            sequences: [0; CHANNELS as usize],
        }
    }

    /// Emit frames at the configured sample rate instead of on demand.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Inject `faults` into everything the device does from now on.
    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Bytes the device emits right after the link opens.
    pub fn with_leading_garbage(mut self, bytes: &[u8]) -> Self {
        self.leading_garbage = bytes.to_vec();
        self
    }

    /// Largest chunk returned by one receive.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Handle to the command log; stays valid after the simulator is moved.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Whether collection is running.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn handle(&mut self, frame: ParsedFrame) {
        let (command, payload) = match frame {
            ParsedFrame::Control { command, payload } => (command, payload),
            other => {
                trace!(
                    command = command_name(other.command()),
                    "simulator ignoring response frame from host"
                );
                return;
            }
        };
        self.log.push(command);

        if self.faults.silent {
            return;
        }
        if self.faults.reject.contains(&command) {
            debug!(command = command_name(command), "simulator rejecting command");
            self.queue_ack(Ack {
                command,
                status: STATUS_REJECTED,
            });
            return;
        }

        match command {
            CONFIGURE_ADC => {
                if let Some(rate) = payload.first().copied().and_then(SampleRate::from_code) {
                    self.rate = rate;
                }
                if let Some(voltage) = payload.get(1).copied().and_then(VoltageRange::from_code) {
                    self.voltage = voltage;
                }
            }
            SELECT_CHANNEL => self.mask = payload.first().copied().unwrap_or(0),
            START_COLLECTION => {
                self.streaming = true;
                self.started_at = Instant::now();
                self.rounds = 0;
                self.frames = 0;
                self.sequences = [0; CHANNELS as usize];
            }
            STOP_COLLECTION => self.streaming = false,
            _ => {}
        }
        debug!(command = command_name(command), "simulator acknowledged command");
        self.queue_ack(Ack::ok(command));
    }

    fn queue_ack(&mut self, ack: Ack) {
        if let Err(err) = encode_frame(ACK, &ack.to_payload(), &self.codec, &mut self.outbound) {
            debug!(error = %err, "simulator failed to encode ack");
        }
    }

    /// Rounds due now, sleeping until the next one when paced. `None` means
    /// nothing came due within `timeout` and the full timeout was spent.
    fn due_rounds(&self, timeout: Duration) -> Option<u64> {
        if !self.paced {
            return Some(1);
        }
        let period = Duration::from_secs_f64(
            SAMPLES_PER_FRAME as f64 / f64::from(self.rate.hz()),
        );
        let next_due = self.started_at + period.mul_f64((self.rounds + 1) as f64);
        let now = Instant::now();
        if next_due > now {
            let wait = next_due - now;
            if wait > timeout {
                thread::sleep(timeout);
                return None;
            }
            thread::sleep(wait);
        }
        let elapsed = self.started_at.elapsed().as_secs_f64();
        let due = (elapsed / period.as_secs_f64()) as u64;
        Some(due.saturating_sub(self.rounds).clamp(1, MAX_CATCH_UP_ROUNDS))
    }

    /// Queue due sample frames. Returns false if the timeout was already
    /// spent waiting.
    fn generate(&mut self, timeout: Duration) -> bool {
        if let Some(limit) = self.faults.stall_after_frames {
            if self.frames >= limit {
                return true;
            }
        }
        let Some(rounds) = self.due_rounds(timeout) else {
            return false;
        };
        for _ in 0..rounds {
            self.emit_round();
        }
        true
    }

    fn emit_round(&mut self) {
        let rate_hz = f64::from(self.rate.hz());
        let base = self.rounds * SAMPLES_PER_FRAME as u64;
        for channel in 0..CHANNELS {
            if self.mask & (1 << channel) == 0 {
                continue;
            }
            if let Some(limit) = self.faults.stall_after_frames {
                if self.frames >= limit {
                    break;
                }
            }
            self.frames += 1;

            let phase = f64::from(channel) * PI / 8.0;
            let counts = (0..SAMPLES_PER_FRAME as u64)
                .map(|i| {
                    let t = (base + i) as f64 / rate_hz;
                    (AMPLITUDE * (2.0 * PI * SIGNAL_HZ * t + phase).sin()) as i16
                })
                .collect();

            let slot = &mut self.sequences[usize::from(channel)];
            let sequence = *slot;
            let step = if every(self.faults.skip_sequence_every, self.frames) {
                2
            } else {
                1
            };
            *slot = slot.wrapping_add(step);

            if every(self.faults.garbage_every, self.frames) {
                self.outbound.extend_from_slice(&[0x00]);
            }
            let raw = RawSamples {
                channel,
                sequence,
                counts,
            };
            if let Err(err) =
                encode_frame(SAMPLE_DATA, &raw.to_payload(), &self.codec, &mut self.outbound)
            {
                debug!(error = %err, "simulator failed to encode samples");
                continue;
            }
            if every(self.faults.corrupt_every, self.frames) {
                if let Some(last) = self.outbound.last_mut() {
                    *last ^= 0xFF;
                }
                trace!(channel, sequence, "corrupted frame tail");
            }
        }
        self.rounds += 1;
    }
}

fn every(n: Option<u64>, count: u64) -> bool {
    matches!(n, Some(n) if n > 0 && count % n == 0)
}

impl Default for SimulatedDaq122 {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulatedDaq122 {
    fn open(&mut self) -> Result<()> {
        if self.faults.fail_open {
            return Err(TransportError::Open {
                endpoint: "simulator".into(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "simulated device unplugged",
                ),
            });
        }
        self.open = true;
        self.scanner.clear();
        self.outbound.clear();
        self.outbound.extend_from_slice(&self.leading_garbage);
        self.streaming = false;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.streaming = false;
        self.outbound.clear();
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.scanner.push(data);
        while let Some(frame) = self.scanner.next_frame() {
            self.handle(frame);
        }
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if self.outbound.is_empty() && self.streaming {
            if let Some(limit) = self.faults.close_after_frames {
                if self.frames >= limit {
                    debug!(frames = self.frames, "simulated link dropped");
                    return Err(TransportError::Closed);
                }
            }
        }
        let mut must_wait = true;
        if self.outbound.is_empty() && self.streaming {
            must_wait = self.generate(timeout);
        }
        if self.outbound.is_empty() {
            if must_wait {
                thread::sleep(timeout);
            }
            return Err(TransportError::Timeout(timeout));
        }
        let take = self.outbound.len().min(self.chunk_size);
        Ok(self.outbound.split_to(take).freeze())
    }

    fn transport_name(&self) -> &'static str {
        "simulator"
    }
}

impl std::fmt::Debug for SimulatedDaq122 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDaq122")
            .field("open", &self.open)
            .field("streaming", &self.streaming)
            .field("rate", &self.rate)
            .field("voltage", &self.voltage)
            .field("mask", &self.mask)
            .finish()
    }
}

/// Serve `sim` to one host connected over a Unix domain socket until the
/// host disconnects or `running` is cleared.
#[cfg(unix)]
pub fn serve(
    mut sim: SimulatedDaq122,
    mut stream: std::os::unix::net::UnixStream,
    running: &std::sync::atomic::AtomicBool,
) -> Result<()> {
    use std::io::{ErrorKind, Read, Write};
    use std::sync::atomic::Ordering;

    const POLL: Duration = Duration::from_millis(5);

    sim.open()?;
    stream.set_read_timeout(Some(POLL))?;
    let mut buf = [0u8; libdaq_frame::MAX_PACKET_SIZE];

    while running.load(Ordering::SeqCst) {
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("host disconnected");
                break;
            }
            Ok(n) => sim.send(&buf[..n])?,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }

        match sim.receive(POLL) {
            Ok(bytes) => stream.write_all(&bytes)?,
            Err(TransportError::Timeout(_)) => {}
            Err(err) => return Err(err),
        }
    }

    sim.close();
    Ok(())
}
