use std::fmt;

use serde::Serialize;

use crate::error::{DeviceError, Result};

/// Lifecycle state of an open device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Disconnected,
    Connected,
    Configured,
    ChannelSelected,
    Acquiring,
}

impl DeviceState {
    /// Every state, in lifecycle order.
    pub const ALL: [DeviceState; 5] = [
        DeviceState::Disconnected,
        DeviceState::Connected,
        DeviceState::Configured,
        DeviceState::ChannelSelected,
        DeviceState::Acquiring,
    ];
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Disconnected => "disconnected",
            DeviceState::Connected => "connected",
            DeviceState::Configured => "configured",
            DeviceState::ChannelSelected => "channel_selected",
            DeviceState::Acquiring => "acquiring",
        };
        f.write_str(name)
    }
}

/// Guarded caller operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Initialize,
    Configure,
    SelectChannel,
    StartAcquisition,
    StopAcquisition,
    ReadSamples,
}

impl Operation {
    /// Every guarded operation.
    pub const ALL: [Operation; 7] = [
        Operation::Connect,
        Operation::Initialize,
        Operation::Configure,
        Operation::SelectChannel,
        Operation::StartAcquisition,
        Operation::StopAcquisition,
        Operation::ReadSamples,
    ];

    /// The only state this operation may start from.
    pub fn source(self) -> DeviceState {
        match self {
            Operation::Connect => DeviceState::Disconnected,
            Operation::Initialize | Operation::Configure => DeviceState::Connected,
            Operation::SelectChannel => DeviceState::Configured,
            Operation::StartAcquisition => DeviceState::ChannelSelected,
            Operation::StopAcquisition | Operation::ReadSamples => DeviceState::Acquiring,
        }
    }

    /// The state a successful operation leaves behind.
    pub fn target(self) -> DeviceState {
        match self {
            Operation::Connect | Operation::Initialize => DeviceState::Connected,
            Operation::Configure => DeviceState::Configured,
            Operation::SelectChannel | Operation::StopAcquisition => {
                DeviceState::ChannelSelected
            }
            Operation::StartAcquisition | Operation::ReadSamples => DeviceState::Acquiring,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::Initialize => "initialize",
            Operation::Configure => "configure",
            Operation::SelectChannel => "select_channel",
            Operation::StartAcquisition => "start_acquisition",
            Operation::StopAcquisition => "stop_acquisition",
            Operation::ReadSamples => "read_samples",
        };
        f.write_str(name)
    }
}

/// Reject `operation` unless `state` is its source state.
pub fn guard(state: DeviceState, operation: Operation) -> Result<()> {
    if state == operation.source() {
        Ok(())
    } else {
        Err(DeviceError::InvalidStateTransition { operation, state })
    }
}
