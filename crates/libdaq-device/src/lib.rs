//! Device lifecycle and acquisition for the DAQ122 family.
//!
//! A [`Device`] owns one [`Transport`](libdaq_transport::Transport) and walks
//! it through the fixed lifecycle:
//!
//! ```text
//! Disconnected -connect-> Connected -configure-> Configured
//!     -select_channel-> ChannelSelected -start_acquisition-> Acquiring
//!     -stop_acquisition-> ChannelSelected
//! ```
//!
//! Every operation is guarded against the current state; an out-of-order
//! call fails with [`DeviceError::InvalidStateTransition`] and changes
//! nothing. While acquiring, [`Device::samples`] hands out a
//! [`SampleStream`] that resynchronizes on corrupt input and reports a
//! silent device as [`DeviceError::DeviceUnresponsive`].
//!
//! ```no_run
//! use libdaq_device::{Device, SampleRate, VoltageRange};
//! use libdaq_transport::UnixSocketTransport;
//!
//! let device = Device::daq122(UnixSocketTransport::new("/tmp/daq122.sock"));
//! device.connect()?;
//! device.initialize()?;
//! device.configure(SampleRate::Hz1k, VoltageRange::Bipolar10V)?;
//! device.select_channel(0)?;
//! device.start_acquisition()?;
//! for batch in device.samples()?.take(10) {
//!     println!("mean {:.4} V", batch?.mean());
//! }
//! device.stop_acquisition()?;
//! # Ok::<(), libdaq_device::DeviceError>(())
//! ```

pub mod acquisition;
pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod params;
pub mod simulator;
pub mod state;

pub use acquisition::{AcquisitionStats, SampleBatch, SampleStream};
pub use config::{ConfigError, DeviceConfig};
pub use device::Device;
pub use error::{DeviceError, Result};
pub use model::{Daq122, DeviceModel};
pub use params::{ChannelConfig, ChannelSelection, SampleRate, VoltageRange};
pub use simulator::{CommandLog, Faults, SimulatedDaq122};
pub use state::{DeviceState, Operation};
