use std::fmt;
use std::io;

use libdaq_device::{ConfigError, DeviceError};
use libdaq_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// Map a device error to an exit code.
///
/// Wrapped failures (`ConnectionFailed`, `StartFailed`, ...) take the code of
/// their cause but keep the full message.
pub fn device_error(context: &str, err: DeviceError) -> CliError {
    let code = device_code(&err);
    CliError::new(code, format!("{context}: {err}"))
}

fn device_code(err: &DeviceError) -> i32 {
    match err {
        DeviceError::ConnectionFailed(inner)
        | DeviceError::InitializationFailed(inner)
        | DeviceError::StartFailed(inner) => device_code(inner),
        DeviceError::Config(_)
        | DeviceError::InvalidParameter(_)
        | DeviceError::InvalidChannel { .. } => USAGE,
        DeviceError::AckTimeout { .. } | DeviceError::DeviceUnresponsive { .. } => TIMEOUT,
        DeviceError::CommandRejected { .. } => FAILURE,
        DeviceError::Protocol(_) => DATA_INVALID,
        DeviceError::Transport(TransportError::Timeout(_)) => TIMEOUT,
        DeviceError::Transport(TransportError::Open { source, .. })
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            PERMISSION_DENIED
        }
        DeviceError::Transport(_) => TRANSPORT_ERROR,
        DeviceError::InvalidStateTransition { .. } | DeviceError::StreamInUse => INTERNAL,
    }
}

pub fn config_error(err: ConfigError) -> CliError {
    match err {
        ConfigError::Read { source, path } => {
            io_error(&format!("failed reading {}", path.display()), source)
        }
        other => CliError::new(USAGE, other.to_string()),
    }
}
