use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use libdaq_frame::command::{
    command_name, expects_ack, CONFIGURE_ADC, CONNECT, INITIALIZE, SELECT_CHANNEL,
    START_COLLECTION, STOP_COLLECTION,
};
use libdaq_frame::{encode_frame, CodecConfig, FrameScanner, ParsedFrame};
use libdaq_transport::{Transport, TransportError};
use tracing::{debug, info, trace, warn};

use crate::acquisition::{AcquisitionStats, SampleStream};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, Result};
use crate::model::{Daq122, DeviceModel};
use crate::params::{ChannelConfig, ChannelSelection, SampleRate, VoltageRange};
use crate::state::{guard, DeviceState, Operation};

/// Handle to one DAQ device and its lifecycle.
///
/// Cloning the handle is cheap; clones share the same session, so one thread
/// can drain [`samples`](Device::samples) while another calls
/// [`stop_acquisition`](Device::stop_acquisition). Dropping the last handle
/// stops any acquisition and closes the transport.
pub struct Device<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for Device<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

pub(crate) struct Shared<T: Transport> {
    pub(crate) model: Arc<dyn DeviceModel>,
    pub(crate) config: DeviceConfig,
    codec: CodecConfig,
    session: Mutex<Session>,
    link: Mutex<Link<T>>,
    /// Generation of the live acquisition session; 0 when not acquiring.
    active_session: AtomicU64,
    stats: Mutex<AcquisitionStats>,
}

struct Session {
    state: DeviceState,
    channel_config: Option<ChannelConfig>,
    generation: u64,
    stream_taken: bool,
}

pub(crate) struct Link<T> {
    pub(crate) transport: T,
    pub(crate) scanner: FrameScanner,
    encode_buf: BytesMut,
}

impl<T: Transport> Link<T> {
    /// Encode, write, and (for acknowledged commands) wait for the ACK.
    ///
    /// Every command the lifecycle emits goes through here.
    fn send_command(
        &mut self,
        command: u16,
        payload: &[u8],
        codec: &CodecConfig,
        ack_timeout: Duration,
    ) -> Result<()> {
        self.encode_buf.clear();
        encode_frame(command, payload, codec, &mut self.encode_buf)?;
        self.transport.send(&self.encode_buf)?;
        debug!(
            command = command_name(command),
            payload_len = payload.len(),
            "sent command"
        );

        if !expects_ack(command) {
            return Ok(());
        }
        self.wait_for_ack(command, ack_timeout)
    }

    fn wait_for_ack(&mut self, command: u16, timeout: Duration) -> Result<()> {
        let name = command_name(command);
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(frame) = self.scanner.next_frame() {
                match frame {
                    ParsedFrame::Ack(ack) if ack.command == command => {
                        if ack.is_ok() {
                            trace!(command = name, "command acknowledged");
                            return Ok(());
                        }
                        return Err(DeviceError::CommandRejected {
                            command: name,
                            status: ack.status,
                        });
                    }
                    other => {
                        trace!(
                            awaiting = name,
                            got = command_name(other.command()),
                            "discarding frame while awaiting ack"
                        );
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DeviceError::AckTimeout {
                    command: name,
                    timeout,
                });
            }

            match self.transport.receive(remaining) {
                Ok(bytes) => self.scanner.push(&bytes),
                Err(TransportError::Timeout(_)) => {
                    return Err(DeviceError::AckTimeout {
                        command: name,
                        timeout,
                    })
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport> Shared<T> {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    pub(crate) fn lock_link(&self) -> MutexGuard<'_, Link<T>> {
        lock(&self.link)
    }

    pub(crate) fn record(&self, update: impl FnOnce(&mut AcquisitionStats)) {
        update(&mut lock(&self.stats));
    }

    pub(crate) fn is_live(&self, generation: u64) -> bool {
        self.active_session.load(Ordering::SeqCst) == generation
    }

    fn send_command(&self, link: &mut Link<T>, command: u16, payload: &[u8]) -> Result<()> {
        link.send_command(command, payload, &self.codec, self.config.ack_timeout)
    }

    /// Leave Acquiring. The state flips first; the STOP command is
    /// best-effort and its failure is only logged.
    fn halt(&self, session: &mut Session, reason: &str) {
        self.active_session.store(0, Ordering::SeqCst);
        session.state = DeviceState::ChannelSelected;

        let mut link = self.lock_link();
        if let Err(err) = self.send_command(&mut link, STOP_COLLECTION, &[]) {
            warn!(error = %err, "stop command failed; state forced to channel_selected");
        }
        link.scanner.clear();
        drop(link);

        let stats = *lock(&self.stats);
        info!(
            reason,
            session = session.generation,
            batches = stats.batches,
            frames = stats.frames,
            timeouts = stats.timeouts,
            resync_bytes = stats.resync_bytes,
            corrupt_frames = stats.corrupt_frames,
            sequence_gaps = stats.sequence_gaps,
            "acquisition stopped"
        );
    }

    /// Halt `generation` if it is still the live session.
    pub(crate) fn halt_session(&self, generation: u64, reason: &str) {
        let mut session = self.lock_session();
        if session.state == DeviceState::Acquiring && session.generation == generation {
            self.halt(&mut session, reason);
        }
    }
}

impl<T: Transport> Drop for Shared<T> {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if session.state == DeviceState::Disconnected {
            return;
        }

        let link = self.link.get_mut().unwrap_or_else(PoisonError::into_inner);
        if session.state == DeviceState::Acquiring {
            if let Err(err) = link.send_command(
                STOP_COLLECTION,
                &[],
                &self.codec,
                self.config.ack_timeout,
            ) {
                debug!(error = %err, "stop on drop failed");
            }
        }
        link.transport.close();
        session.state = DeviceState::Disconnected;
        debug!("device dropped; transport closed");
    }
}

impl<T: Transport> Device<T> {
    /// Create a disconnected device over `transport`.
    ///
    /// `config` is validated by [`Device::connect`], which refuses to open
    /// the transport with an unusable config.
    pub fn new(transport: T, model: Arc<dyn DeviceModel>, config: DeviceConfig) -> Self {
        let codec = config.codec();
        Self {
            shared: Arc::new(Shared {
                model,
                config,
                codec,
                session: Mutex::new(Session {
                    state: DeviceState::Disconnected,
                    channel_config: None,
                    generation: 0,
                    stream_taken: false,
                }),
                link: Mutex::new(Link {
                    transport,
                    scanner: FrameScanner::new(),
                    encode_buf: BytesMut::new(),
                }),
                active_session: AtomicU64::new(0),
                stats: Mutex::new(AcquisitionStats::default()),
            }),
        }
    }

    /// A DAQ122 with default configuration.
    pub fn daq122(transport: T) -> Self {
        Self::new(transport, Arc::new(Daq122), DeviceConfig::default())
    }

    /// The model this device speaks for.
    pub fn model(&self) -> &dyn DeviceModel {
        &*self.shared.model
    }

    /// Session configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.shared.lock_session().state
    }

    /// ADC settings and channel selection, once configured.
    pub fn channel_config(&self) -> Option<ChannelConfig> {
        self.shared.lock_session().channel_config
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.state() != DeviceState::Disconnected
    }

    /// Counters for the current or most recent acquisition session.
    pub fn acquisition_stats(&self) -> AcquisitionStats {
        *lock(&self.shared.stats)
    }

    /// Open the transport and probe the device.
    pub fn connect(&self) -> Result<()> {
        let mut session = self.shared.lock_session();
        guard(session.state, Operation::Connect)?;
        self.shared.config.validate()?;

        let mut link = self.shared.lock_link();
        if let Err(err) = link.transport.open() {
            warn!(error = %err, "transport open failed");
            return Err(DeviceError::ConnectionFailed(Box::new(err.into())));
        }
        link.scanner.clear();

        if let Err(err) = self.shared.send_command(&mut link, CONNECT, &[]) {
            warn!(error = %err, "device did not answer connect probe");
            link.transport.close();
            return Err(DeviceError::ConnectionFailed(Box::new(err)));
        }

        session.state = DeviceState::Connected;
        info!(
            model = self.shared.model.name(),
            transport = link.transport.transport_name(),
            "device connected"
        );
        Ok(())
    }

    /// Run the device's initialization handshake. State stays Connected.
    pub fn initialize(&self) -> Result<()> {
        let session = self.shared.lock_session();
        guard(session.state, Operation::Initialize)?;

        let mut link = self.shared.lock_link();
        self.shared
            .send_command(&mut link, INITIALIZE, &[])
            .map_err(|err| {
                warn!(error = %err, "initialization failed");
                DeviceError::InitializationFailed(Box::new(err))
            })?;

        info!("device initialized");
        Ok(())
    }

    /// Set the ADC sample rate and input range.
    pub fn configure(&self, rate: SampleRate, voltage: VoltageRange) -> Result<()> {
        let mut session = self.shared.lock_session();
        guard(session.state, Operation::Configure)?;
        self.shared.model.validate_adc(rate, voltage)?;

        let payload = self.shared.model.adc_payload(rate, voltage);
        let mut link = self.shared.lock_link();
        if let Err(err) = self.shared.send_command(&mut link, CONFIGURE_ADC, &payload) {
            warn!(error = %err, %rate, %voltage, "configure failed; still connected");
            return Err(err);
        }

        session.channel_config = Some(ChannelConfig {
            rate,
            voltage,
            selection: None,
        });
        session.state = DeviceState::Configured;
        info!(%rate, %voltage, "adc configured");
        Ok(())
    }

    /// Select a single zero-based input channel.
    pub fn select_channel(&self, channel: u8) -> Result<()> {
        self.select_channels(ChannelSelection::Single(channel))
    }

    /// Select the inputs the ADC scans.
    pub fn select_channels(&self, selection: ChannelSelection) -> Result<()> {
        let mut session = self.shared.lock_session();
        guard(session.state, Operation::SelectChannel)?;
        self.shared.model.validate_channel(selection)?;

        let payload = self.shared.model.channel_payload(selection);
        let mut link = self.shared.lock_link();
        self.shared
            .send_command(&mut link, SELECT_CHANNEL, &payload)?;

        if let Some(config) = session.channel_config.as_mut() {
            config.selection = Some(selection);
        }
        session.state = DeviceState::ChannelSelected;
        info!(%selection, "channel selected");
        Ok(())
    }

    /// Ask the device to start streaming and open a new acquisition session.
    pub fn start_acquisition(&self) -> Result<()> {
        let mut session = self.shared.lock_session();
        guard(session.state, Operation::StartAcquisition)?;

        let mut link = self.shared.lock_link();
        link.scanner.clear();
        link.scanner.reset_stats();
        self.shared
            .send_command(&mut link, START_COLLECTION, &[])
            .map_err(|err| {
                warn!(error = %err, "start collection failed");
                DeviceError::StartFailed(Box::new(err))
            })?;
        drop(link);

        session.generation += 1;
        session.stream_taken = false;
        *lock(&self.shared.stats) = AcquisitionStats::default();
        self.shared
            .active_session
            .store(session.generation, Ordering::SeqCst);
        session.state = DeviceState::Acquiring;
        info!(session = session.generation, "acquisition started");
        Ok(())
    }

    /// Stop streaming.
    ///
    /// The state always ends up ChannelSelected, even if the device never
    /// acknowledges the STOP. Calling this while already ChannelSelected is a
    /// successful no-op.
    pub fn stop_acquisition(&self) -> Result<()> {
        let mut session = self.shared.lock_session();
        if session.state == DeviceState::ChannelSelected {
            debug!("stop requested while not acquiring");
            return Ok(());
        }
        guard(session.state, Operation::StopAcquisition)?;
        self.shared.halt(&mut session, "stop requested");
        Ok(())
    }

    /// Lazily decoded sample batches for the current acquisition session.
    ///
    /// One stream per session. It ends when the session is stopped, or
    /// yields a single fatal error and then ends.
    pub fn samples(&self) -> Result<SampleStream<T>> {
        let mut session = self.shared.lock_session();
        guard(session.state, Operation::ReadSamples)?;
        let Some(channel_config) = session.channel_config else {
            return Err(DeviceError::InvalidStateTransition {
                operation: Operation::ReadSamples,
                state: session.state,
            });
        };
        if session.stream_taken {
            return Err(DeviceError::StreamInUse);
        }
        session.stream_taken = true;

        Ok(SampleStream::new(
            Arc::clone(&self.shared),
            session.generation,
            channel_config.voltage,
        ))
    }

    /// Tear the session down and close the transport.
    ///
    /// Valid from every state; a no-op when already disconnected.
    pub fn disconnect(&self) -> Result<()> {
        let mut session = self.shared.lock_session();
        if session.state == DeviceState::Disconnected {
            return Ok(());
        }
        if session.state == DeviceState::Acquiring {
            self.shared.halt(&mut session, "disconnect");
        }

        let mut link = self.shared.lock_link();
        link.transport.close();
        link.scanner.clear();
        session.state = DeviceState::Disconnected;
        session.channel_config = None;
        info!("device disconnected");
        Ok(())
    }
}

impl<T: Transport> std::fmt::Debug for Device<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("model", &self.shared.model.name())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::simulator::{CommandLog, Faults, SimulatedDaq122};

    fn test_config() -> DeviceConfig {
        DeviceConfig {
            ack_timeout: Duration::from_millis(200),
            receive_timeout: Duration::from_millis(20),
            max_consecutive_timeouts: 3,
            ..DeviceConfig::default()
        }
    }

    fn device_with(faults: Faults) -> (Device<SimulatedDaq122>, CommandLog) {
        let sim = SimulatedDaq122::new().with_faults(faults);
        let log = sim.command_log();
        let device = Device::new(sim, Arc::new(Daq122), test_config());
        (device, log)
    }

    fn device_in(state: DeviceState) -> Device<SimulatedDaq122> {
        let (device, _) = device_with(Faults::default());
        let steps: &[Operation] = match state {
            DeviceState::Disconnected => &[],
            DeviceState::Connected => &[Operation::Connect],
            DeviceState::Configured => &[Operation::Connect, Operation::Configure],
            DeviceState::ChannelSelected => &[
                Operation::Connect,
                Operation::Configure,
                Operation::SelectChannel,
            ],
            DeviceState::Acquiring => &[
                Operation::Connect,
                Operation::Configure,
                Operation::SelectChannel,
                Operation::StartAcquisition,
            ],
        };
        for step in steps {
            apply(&device, *step).expect("setup step should succeed");
        }
        assert_eq!(device.state(), state);
        device
    }

    fn apply(device: &Device<SimulatedDaq122>, operation: Operation) -> Result<()> {
        match operation {
            Operation::Connect => device.connect(),
            Operation::Initialize => device.initialize(),
            Operation::Configure => device.configure(SampleRate::Hz1k, VoltageRange::Bipolar10V),
            Operation::SelectChannel => device.select_channel(0),
            Operation::StartAcquisition => device.start_acquisition(),
            Operation::StopAcquisition => device.stop_acquisition(),
            Operation::ReadSamples => device.samples().map(|_| ()),
        }
    }

    #[test]
    fn full_lifecycle_reaches_acquiring() {
        let (device, log) = device_with(Faults::default());
        assert!(!device.is_connected());

        device.connect().unwrap();
        device.initialize().unwrap();
        assert_eq!(device.state(), DeviceState::Connected);
        device
            .configure(SampleRate::Hz1k, VoltageRange::Bipolar10V)
            .unwrap();
        assert_eq!(device.state(), DeviceState::Configured);
        device.select_channel(0).unwrap();
        assert_eq!(device.state(), DeviceState::ChannelSelected);
        device.start_acquisition().unwrap();
        assert_eq!(device.state(), DeviceState::Acquiring);

        assert_eq!(
            device.channel_config(),
            Some(ChannelConfig {
                rate: SampleRate::Hz1k,
                voltage: VoltageRange::Bipolar10V,
                selection: Some(ChannelSelection::Single(0)),
            })
        );
        assert_eq!(
            log.snapshot(),
            vec![
                CONNECT,
                INITIALIZE,
                CONFIGURE_ADC,
                SELECT_CHANNEL,
                START_COLLECTION
            ]
        );

        device.stop_acquisition().unwrap();
        assert_eq!(device.state(), DeviceState::ChannelSelected);
        assert_eq!(log.count(STOP_COLLECTION), 1);
    }

    #[test]
    fn every_out_of_order_operation_is_rejected_without_state_change() {
        for state in DeviceState::ALL {
            for operation in Operation::ALL {
                if operation.source() == state {
                    continue;
                }
                if operation == Operation::StopAcquisition
                    && state == DeviceState::ChannelSelected
                {
                    continue;
                }

                let device = device_in(state);
                let err = apply(&device, operation).unwrap_err();
                assert!(
                    matches!(err, DeviceError::InvalidStateTransition { .. }),
                    "{operation} from {state}: {err}"
                );
                assert_eq!(device.state(), state, "{operation} from {state}");
            }
        }
    }

    #[test]
    fn stop_while_channel_selected_is_a_noop() {
        let (device, log) = device_with(Faults::default());
        device.connect().unwrap();
        device
            .configure(SampleRate::Hz1k, VoltageRange::Bipolar10V)
            .unwrap();
        device.select_channel(0).unwrap();

        device.stop_acquisition().unwrap();
        device.stop_acquisition().unwrap();
        assert_eq!(device.state(), DeviceState::ChannelSelected);
        assert_eq!(log.count(STOP_COLLECTION), 0);
    }

    #[test]
    fn connect_rejects_unusable_config() {
        let sim = SimulatedDaq122::new();
        let log = sim.command_log();
        let config = DeviceConfig {
            max_packet_size: 8,
            ..test_config()
        };
        let device = Device::new(sim, Arc::new(Daq122), config);

        let err = device.connect().unwrap_err();
        assert!(matches!(err, DeviceError::Config(_)));
        assert_eq!(device.state(), DeviceState::Disconnected);
        assert!(!device.is_connected());
        assert!(log.snapshot().is_empty());

        let device = Device::new(
            SimulatedDaq122::new(),
            Arc::new(Daq122),
            DeviceConfig {
                receive_timeout: Duration::ZERO,
                ..test_config()
            },
        );
        assert!(matches!(device.connect(), Err(DeviceError::Config(_))));
    }

    #[test]
    fn connect_fails_when_transport_will_not_open() {
        let (device, _) = device_with(Faults {
            fail_open: true,
            ..Faults::default()
        });
        let err = device.connect().unwrap_err();
        assert!(matches!(err, DeviceError::ConnectionFailed(_)));
        assert_eq!(device.state(), DeviceState::Disconnected);
    }

    #[test]
    fn connect_fails_when_device_is_silent() {
        let (device, log) = device_with(Faults {
            silent: true,
            ..Faults::default()
        });
        let start = Instant::now();
        let err = device.connect().unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(2));

        match err {
            DeviceError::ConnectionFailed(inner) => {
                assert!(matches!(*inner, DeviceError::AckTimeout { .. }))
            }
            other => panic!("expected connection failure, got {other}"),
        }
        assert_eq!(device.state(), DeviceState::Disconnected);
        assert_eq!(log.snapshot(), vec![CONNECT]);
    }

    #[test]
    fn initialize_failure_keeps_connected() {
        let (device, _) = device_with(Faults {
            reject: vec![INITIALIZE],
            ..Faults::default()
        });
        device.connect().unwrap();
        let err = device.initialize().unwrap_err();
        match err {
            DeviceError::InitializationFailed(inner) => {
                assert!(matches!(*inner, DeviceError::CommandRejected { .. }))
            }
            other => panic!("expected initialization failure, got {other}"),
        }
        assert_eq!(device.state(), DeviceState::Connected);
    }

    #[test]
    fn unsupported_parameters_are_rejected_before_sending() {
        let (device, log) = device_with(Faults::default());
        device.connect().unwrap();

        let err = device
            .configure(SampleRate::Hz200k, VoltageRange::Bipolar10V)
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidParameter(_)));
        let err = device
            .configure(SampleRate::Hz1k, VoltageRange::Bipolar15V)
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidParameter(_)));

        assert_eq!(device.state(), DeviceState::Connected);
        assert_eq!(log.count(CONFIGURE_ADC), 0);
        assert_eq!(device.channel_config(), None);
    }

    #[test]
    fn configure_send_failure_stays_connected() {
        let (device, _) = device_with(Faults {
            reject: vec![CONFIGURE_ADC],
            ..Faults::default()
        });
        device.connect().unwrap();
        let err = device
            .configure(SampleRate::Hz1k, VoltageRange::Bipolar10V)
            .unwrap_err();
        assert!(matches!(err, DeviceError::CommandRejected { .. }));
        assert_eq!(device.state(), DeviceState::Connected);
    }

    #[test]
    fn channel_out_of_range_is_rejected() {
        let device = device_in(DeviceState::Configured);
        let err = device.select_channel(8).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidChannel {
                channel: 8,
                count: 8
            }
        ));
        assert_eq!(device.state(), DeviceState::Configured);

        device.select_channels(ChannelSelection::All).unwrap();
        assert_eq!(
            device.channel_config().and_then(|c| c.selection),
            Some(ChannelSelection::All)
        );
    }

    #[test]
    fn start_failure_stays_channel_selected() {
        let (device, _) = device_with(Faults {
            reject: vec![START_COLLECTION],
            ..Faults::default()
        });
        device.connect().unwrap();
        device
            .configure(SampleRate::Hz1k, VoltageRange::Bipolar10V)
            .unwrap();
        device.select_channel(0).unwrap();

        let err = device.start_acquisition().unwrap_err();
        assert!(matches!(err, DeviceError::StartFailed(_)));
        assert_eq!(device.state(), DeviceState::ChannelSelected);
    }

    #[test]
    fn stop_is_forced_even_without_ack() {
        let (device, _) = device_with(Faults {
            reject: vec![STOP_COLLECTION],
            ..Faults::default()
        });
        device.connect().unwrap();
        device
            .configure(SampleRate::Hz1k, VoltageRange::Bipolar10V)
            .unwrap();
        device.select_channel(0).unwrap();
        device.start_acquisition().unwrap();

        device.stop_acquisition().unwrap();
        assert_eq!(device.state(), DeviceState::ChannelSelected);
    }

    #[test]
    fn disconnect_from_acquiring_stops_and_closes() {
        let (device, log) = device_with(Faults::default());
        device.connect().unwrap();
        device
            .configure(SampleRate::Hz1k, VoltageRange::Bipolar10V)
            .unwrap();
        device.select_channel(0).unwrap();
        device.start_acquisition().unwrap();

        device.disconnect().unwrap();
        assert_eq!(device.state(), DeviceState::Disconnected);
        assert_eq!(device.channel_config(), None);
        assert_eq!(log.count(STOP_COLLECTION), 1);

        device.disconnect().unwrap();
        device.connect().unwrap();
        assert_eq!(device.state(), DeviceState::Connected);
    }

    #[test]
    fn dropping_last_handle_stops_acquisition() {
        let (device, log) = device_with(Faults::default());
        device.connect().unwrap();
        device
            .configure(SampleRate::Hz1k, VoltageRange::Bipolar10V)
            .unwrap();
        device.select_channel(0).unwrap();
        device.start_acquisition().unwrap();

        let clone = device.clone();
        drop(device);
        assert_eq!(log.count(STOP_COLLECTION), 0);
        drop(clone);
        assert_eq!(log.count(STOP_COLLECTION), 1);
    }

    #[test]
    fn control_operations_from_another_thread() {
        let device = device_in(DeviceState::ChannelSelected);
        let remote = device.clone();

        thread::spawn(move || remote.start_acquisition())
            .join()
            .expect("thread should finish")
            .unwrap();
        assert_eq!(device.state(), DeviceState::Acquiring);
    }
}
