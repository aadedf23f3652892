//! Host-side driver for the DAQ122 USB data acquisition device.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte transport capability and the Unix-socket bridge
//! - [`frame`]: wire codec, command table, and stream resynchronization
//! - [`device`]: lifecycle state machine, acquisition stream, and simulator

/// Re-export transport types.
pub mod transport {
    pub use libdaq_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use libdaq_frame::*;
}

/// Re-export device types.
pub mod device {
    pub use libdaq_device::*;
}

pub use libdaq_device::{
    AcquisitionStats, ChannelSelection, Device, DeviceConfig, DeviceError, DeviceState,
    SampleBatch, SampleRate, VoltageRange,
};
