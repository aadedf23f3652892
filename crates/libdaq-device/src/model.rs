//! Per-model capabilities and the built-in model registry.
//!
//! The wire protocol is shared by the whole device family. What varies per
//! model is how many inputs it has, which ADC settings it accepts, and how
//! those settings are packed into command payloads.

use std::fmt;
use std::sync::Arc;

use crate::error::{DeviceError, Result};
use crate::params::{ChannelSelection, SampleRate, VoltageRange};

/// Capability set a device model provides to the lifecycle.
pub trait DeviceModel: Send + Sync + fmt::Debug {
    /// Registry identifier, lowercase.
    fn name(&self) -> &'static str;

    /// Number of analog inputs.
    fn channel_count(&self) -> u8;

    /// Sample rates the ADC accepts.
    fn supported_rates(&self) -> &'static [SampleRate];

    /// Input ranges the front end accepts.
    fn supported_voltages(&self) -> &'static [VoltageRange];

    /// Reject rate/voltage pairs this model cannot run.
    fn validate_adc(&self, rate: SampleRate, voltage: VoltageRange) -> Result<()> {
        if !self.supported_rates().contains(&rate) {
            return Err(DeviceError::InvalidParameter(format!(
                "{} does not support sample rate {rate}",
                self.name()
            )));
        }
        if !self.supported_voltages().contains(&voltage) {
            return Err(DeviceError::InvalidParameter(format!(
                "{} does not support voltage range {voltage}",
                self.name()
            )));
        }
        Ok(())
    }

    /// `CONFIGURE_ADC` payload for a validated pair.
    fn adc_payload(&self, rate: SampleRate, voltage: VoltageRange) -> Vec<u8> {
        vec![rate.code(), voltage.code()]
    }

    /// Reject selections naming inputs the model does not have.
    fn validate_channel(&self, selection: ChannelSelection) -> Result<()> {
        match selection {
            ChannelSelection::Single(channel) if channel >= self.channel_count() => {
                Err(DeviceError::InvalidChannel {
                    channel,
                    count: self.channel_count(),
                })
            }
            _ => Ok(()),
        }
    }

    /// `SELECT_CHANNEL` payload for a validated selection.
    fn channel_payload(&self, selection: ChannelSelection) -> Vec<u8> {
        vec![selection.mask(self.channel_count())]
    }
}

/// The DAQ122: 8 bipolar inputs, up to 100 kHz, ±2.5 V to ±10 V.
#[derive(Debug, Clone, Copy, Default)]
pub struct Daq122;

impl Daq122 {
    const RATES: [SampleRate; 7] = [
        SampleRate::Hz100,
        SampleRate::Hz500,
        SampleRate::Hz1k,
        SampleRate::Hz5k,
        SampleRate::Hz10k,
        SampleRate::Hz50k,
        SampleRate::Hz100k,
    ];
    const VOLTAGES: [VoltageRange; 3] = [
        VoltageRange::Bipolar2V5,
        VoltageRange::Bipolar5V,
        VoltageRange::Bipolar10V,
    ];
}

impl DeviceModel for Daq122 {
    fn name(&self) -> &'static str {
        "daq122"
    }

    fn channel_count(&self) -> u8 {
        8
    }

    fn supported_rates(&self) -> &'static [SampleRate] {
        &Self::RATES
    }

    fn supported_voltages(&self) -> &'static [VoltageRange] {
        &Self::VOLTAGES
    }
}

type ModelConstructor = fn() -> Arc<dyn DeviceModel>;

fn daq122() -> Arc<dyn DeviceModel> {
    Arc::new(Daq122)
}

const REGISTRY: &[(&str, ModelConstructor)] = &[("daq122", daq122 as ModelConstructor)];

/// Construct a built-in model by identifier (case-insensitive).
pub fn lookup(name: &str) -> Option<Arc<dyn DeviceModel>> {
    REGISTRY
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(name))
        .map(|(_, construct)| construct())
}

/// Identifiers of every built-in model.
pub fn available() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(id, _)| *id)
}
