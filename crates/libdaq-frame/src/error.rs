use std::fmt;

/// Why a frame with a valid header was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptReason {
    /// The command ID is not in the command table.
    UnknownCommand,
    /// The tail magic did not match at the expected offset.
    TailMismatch,
    /// The payload length disagrees with the command table.
    LengthMismatch,
}

impl fmt::Display for CorruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorruptReason::UnknownCommand => write!(f, "unknown command"),
            CorruptReason::TailMismatch => write!(f, "tail magic mismatch"),
            CorruptReason::LengthMismatch => write!(f, "payload length mismatch"),
        }
    }
}

/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The buffer does not start with the header magic (4C 52 AA 55).
    #[error("framing error: header magic not found at buffer start")]
    Framing,

    /// A header was found but the frame failed validation.
    #[error("corrupt frame for command {command:#06x}: {reason}")]
    CorruptFrame { command: u16, reason: CorruptReason },

    /// The frame would exceed the device's maximum packet size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

impl ProtocolError {
    /// Framing and corruption errors are handled by resynchronizing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::Framing | ProtocolError::CorruptFrame { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
