use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// ADC sample rates the protocol can express.
///
/// Whether a given model supports a rate is a separate question answered by
/// [`DeviceModel`](crate::model::DeviceModel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRate {
    #[serde(rename = "100hz")]
    Hz100,
    #[serde(rename = "500hz")]
    Hz500,
    #[serde(rename = "1khz")]
    Hz1k,
    #[serde(rename = "5khz")]
    Hz5k,
    #[serde(rename = "10khz")]
    Hz10k,
    #[serde(rename = "50khz")]
    Hz50k,
    #[serde(rename = "100khz")]
    Hz100k,
    #[serde(rename = "200khz")]
    Hz200k,
}

impl SampleRate {
    /// Every rate, slowest first.
    pub const ALL: [SampleRate; 8] = [
        SampleRate::Hz100,
        SampleRate::Hz500,
        SampleRate::Hz1k,
        SampleRate::Hz5k,
        SampleRate::Hz10k,
        SampleRate::Hz50k,
        SampleRate::Hz100k,
        SampleRate::Hz200k,
    ];

    /// Samples per second.
    pub fn hz(self) -> u32 {
        match self {
            SampleRate::Hz100 => 100,
            SampleRate::Hz500 => 500,
            SampleRate::Hz1k => 1_000,
            SampleRate::Hz5k => 5_000,
            SampleRate::Hz10k => 10_000,
            SampleRate::Hz50k => 50_000,
            SampleRate::Hz100k => 100_000,
            SampleRate::Hz200k => 200_000,
        }
    }

    /// Rate code sent in the `CONFIGURE_ADC` payload.
    pub fn code(self) -> u8 {
        match self {
            SampleRate::Hz100 => 0x00,
            SampleRate::Hz500 => 0x01,
            SampleRate::Hz1k => 0x02,
            SampleRate::Hz5k => 0x03,
            SampleRate::Hz10k => 0x04,
            SampleRate::Hz50k => 0x05,
            SampleRate::Hz100k => 0x06,
            SampleRate::Hz200k => 0x07,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.code() == code)
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.hz();
        if hz >= 1_000 {
            write!(f, "{}kHz", hz / 1_000)
        } else {
            write!(f, "{hz}Hz")
        }
    }
}

impl FromStr for SampleRate {
    type Err = String;

    /// Accepts `1000`, `1k`, `1khz`, `1kHz`, `500hz`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower.strip_suffix("hz").unwrap_or(&lower);
        let (number, scale) = match digits.strip_suffix('k') {
            Some(number) => (number, 1_000),
            None => (digits, 1),
        };
        let hz = number
            .parse::<u32>()
            .ok()
            .and_then(|n| n.checked_mul(scale))
            .ok_or_else(|| format!("invalid sample rate: {s}"))?;
        Self::ALL
            .into_iter()
            .find(|rate| rate.hz() == hz)
            .ok_or_else(|| format!("unsupported sample rate: {s}"))
    }
}

/// Bipolar ADC input ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoltageRange {
    /// ±2.5 V
    #[serde(rename = "2.5v")]
    Bipolar2V5,
    /// ±5 V
    #[serde(rename = "5v")]
    Bipolar5V,
    /// ±10 V
    #[serde(rename = "10v")]
    Bipolar10V,
    /// ±15 V
    #[serde(rename = "15v")]
    Bipolar15V,
}

impl VoltageRange {
    /// Every range, narrowest first.
    pub const ALL: [VoltageRange; 4] = [
        VoltageRange::Bipolar2V5,
        VoltageRange::Bipolar5V,
        VoltageRange::Bipolar10V,
        VoltageRange::Bipolar15V,
    ];

    /// Full-scale magnitude in volts.
    pub fn full_scale(self) -> f64 {
        match self {
            VoltageRange::Bipolar2V5 => 2.5,
            VoltageRange::Bipolar5V => 5.0,
            VoltageRange::Bipolar10V => 10.0,
            VoltageRange::Bipolar15V => 15.0,
        }
    }

    /// Range code sent in the `CONFIGURE_ADC` payload.
    pub fn code(self) -> u8 {
        match self {
            VoltageRange::Bipolar2V5 => 0x00,
            VoltageRange::Bipolar5V => 0x01,
            VoltageRange::Bipolar10V => 0x02,
            VoltageRange::Bipolar15V => 0x03,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|range| range.code() == code)
    }

    /// Scale a raw signed count to volts.
    pub fn count_to_volts(self, count: i16) -> f64 {
        f64::from(count) / 32_768.0 * self.full_scale()
    }
}

impl fmt::Display for VoltageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "±{}V", self.full_scale())
    }
}

impl FromStr for VoltageRange {
    type Err = String;

    /// Accepts `10`, `10v`, `±10V`, `+-10v`, `2.5v`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let trimmed = lower
            .trim_start_matches('±')
            .trim_start_matches("+-")
            .trim_end_matches('v');
        let volts: f64 = trimmed
            .parse()
            .map_err(|_| format!("invalid voltage range: {s}"))?;
        Self::ALL
            .into_iter()
            .find(|range| (range.full_scale() - volts).abs() < f64::EPSILON)
            .ok_or_else(|| format!("unsupported voltage range: {s}"))
    }
}

/// Which inputs the ADC scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelection {
    /// One zero-based input.
    Single(u8),
    /// Every input the model has.
    All,
}

impl ChannelSelection {
    /// Channel bit mask for a device with `channel_count` inputs.
    ///
    /// Callers validate `Single` indexes against the model first.
    pub fn mask(self, channel_count: u8) -> u8 {
        match self {
            ChannelSelection::Single(index) => 1u8.checked_shl(u32::from(index)).unwrap_or(0),
            ChannelSelection::All => match channel_count {
                0 => 0,
                n if n >= 8 => 0xFF,
                n => (1u8 << n) - 1,
            },
        }
    }

    /// Zero-based channels this selection enables.
    pub fn channels(self, channel_count: u8) -> Vec<u8> {
        match self {
            ChannelSelection::Single(index) => vec![index],
            ChannelSelection::All => (0..channel_count).collect(),
        }
    }
}

impl fmt::Display for ChannelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSelection::Single(index) => write!(f, "AIN{index}"),
            ChannelSelection::All => write!(f, "AIN_ALL"),
        }
    }
}

/// ADC settings and channel selection for an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelConfig {
    pub rate: SampleRate,
    pub voltage: VoltageRange,
    /// Set once a channel has been selected.
    pub selection: Option<ChannelSelection>,
}
