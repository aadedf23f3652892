use std::time::Duration;

use libdaq_frame::ProtocolError;
use libdaq_transport::TransportError;

use crate::config::ConfigError;
use crate::state::{DeviceState, Operation};

/// Errors that can occur in device operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The transport would not open or the device did not answer CONNECT.
    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] Box<DeviceError>),

    /// The device did not complete INITIALIZE.
    #[error("initialization failed: {0}")]
    InitializationFailed(#[source] Box<DeviceError>),

    /// The device config is unusable.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A rate/voltage pair the model does not support.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A channel index beyond the model's channel count.
    #[error("invalid channel {channel} (device has {count} channels)")]
    InvalidChannel { channel: u8, count: u8 },

    /// The operation is not legal in the current state.
    #[error("operation {operation} not allowed in state {state}")]
    InvalidStateTransition {
        operation: Operation,
        state: DeviceState,
    },

    /// No acknowledgement arrived for a command.
    #[error("no acknowledgement for {command} within {timeout:?}")]
    AckTimeout {
        command: &'static str,
        timeout: Duration,
    },

    /// The device acknowledged a command with a failure status.
    #[error("device rejected {command} (status {status:#04x})")]
    CommandRejected { command: &'static str, status: u8 },

    /// The device did not confirm START_COLLECTION.
    #[error("start collection failed: {0}")]
    StartFailed(#[source] Box<DeviceError>),

    /// Too many consecutive receive timeouts while acquiring.
    #[error("device unresponsive after {timeouts} consecutive receive timeouts")]
    DeviceUnresponsive { timeouts: u32 },

    /// A sample stream for this acquisition session is already live.
    #[error("sample stream already taken for this acquisition session")]
    StreamInUse,

    /// Packet encoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl DeviceError {
    /// Errors after which the acquisition session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeviceError::DeviceUnresponsive { .. } | DeviceError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
