use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use libdaq_device::{model, Device, DeviceConfig, SampleRate, SimulatedDaq122, VoltageRange};
use libdaq_transport::Transport;

use crate::exit::{config_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod acquire;
pub mod emulate;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a device, initialize it, and print what it reports.
    Probe(ProbeArgs),
    /// Configure a device and stream sample batches to stdout.
    Acquire(AcquireArgs),
    /// Serve a simulated DAQ122 on a Unix socket.
    Emulate(EmulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format),
        Command::Acquire(args) => acquire::run(args, format),
        Command::Emulate(args) => emulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the device. Shared by every command that talks to one.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Unix socket exposed by a USB bridge or `libdaq emulate`.
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "simulate",
        required_unless_present = "simulate"
    )]
    pub socket: Option<PathBuf>,
    /// Use the in-process simulated DAQ122.
    #[arg(long)]
    pub simulate: bool,
    /// Device model.
    #[arg(long, default_value = "daq122", env = "LIBDAQ_MODEL")]
    pub model: String,
    /// Device config file (JSON). Flags below override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Acknowledgement timeout (e.g. 500ms, 2s).
    #[arg(long)]
    pub ack_timeout: Option<String>,
    /// Per-receive timeout while acquiring (e.g. 1s).
    #[arg(long)]
    pub receive_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct AcquireArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Sample rate (e.g. 1khz, 500hz, 10k).
    #[arg(long, default_value = "1khz")]
    pub rate: SampleRate,
    /// Input range (e.g. 10v, 5v, 2.5v).
    #[arg(long, default_value = "10v")]
    pub voltage: VoltageRange,
    /// Zero-based input channel.
    #[arg(long, short = 'c', default_value = "0", conflicts_with = "all")]
    pub channel: u8,
    /// Scan every input of the model.
    #[arg(long)]
    pub all: bool,
    /// Exit after N batches.
    #[arg(long)]
    pub count: Option<usize>,
    /// Stop after this long (e.g. 10s, 250ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Print only the mean of each batch.
    #[arg(long)]
    pub average: bool,
}

#[derive(Args, Debug)]
pub struct EmulateArgs {
    /// Socket path to bind.
    #[arg(long, value_name = "PATH")]
    pub socket: PathBuf,
    /// Stream frames as fast as the host reads instead of at the sample rate.
    #[arg(long)]
    pub unpaced: bool,
    /// Inject a junk byte before every N-th sample frame.
    #[arg(long, value_name = "N")]
    pub garbage_every: Option<u64>,
    /// Corrupt the tail of every N-th sample frame.
    #[arg(long, value_name = "N")]
    pub corrupt_every: Option<u64>,
    /// Exit when the first host disconnects.
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// The device described by `args`, not yet connected.
pub fn open_device(args: &DeviceArgs) -> CliResult<Device<Box<dyn Transport>>> {
    let device_model = model::lookup(&args.model).ok_or_else(|| {
        CliError::new(
            USAGE,
            format!(
                "unknown model {:?} (available: {})",
                args.model,
                model::available().collect::<Vec<_>>().join(", ")
            ),
        )
    })?;

    let mut config = match &args.config {
        Some(path) => DeviceConfig::from_json_file(path).map_err(config_error)?,
        None => DeviceConfig::default(),
    };
    if let Some(value) = &args.ack_timeout {
        config.ack_timeout = parse_duration(value)?;
    }
    if let Some(value) = &args.receive_timeout {
        config.receive_timeout = parse_duration(value)?;
    }
    config.validate().map_err(config_error)?;

    let transport: Box<dyn Transport> = match &args.socket {
        Some(path) => socket_transport(path)?,
        None => Box::new(SimulatedDaq122::new().paced(true)),
    };
    Ok(Device::new(transport, device_model, config))
}

/// Human-readable endpoint for output.
pub fn endpoint(args: &DeviceArgs) -> String {
    match &args.socket {
        Some(path) => path.display().to_string(),
        None => "simulator".to_string(),
    }
}

#[cfg(unix)]
fn socket_transport(path: &Path) -> CliResult<Box<dyn Transport>> {
    Ok(Box::new(libdaq_transport::UnixSocketTransport::new(path)))
}

#[cfg(not(unix))]
fn socket_transport(path: &Path) -> CliResult<Box<dyn Transport>> {
    Err(CliError::new(
        USAGE,
        format!("--socket {} requires a Unix platform", path.display()),
    ))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub fn install_ctrlc_handler(handler: impl FnMut() + Send + 'static) -> CliResult<()> {
    ctrlc::set_handler(handler).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
