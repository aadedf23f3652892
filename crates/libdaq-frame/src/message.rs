use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{
    ACK, ACK_PAYLOAD_LEN, ACK_STATUS_OK, SAMPLES_PER_FRAME, SAMPLE_DATA, SAMPLE_DATA_PAYLOAD_LEN,
};
use crate::error::{CorruptReason, ProtocolError, Result};

/// Device acknowledgement of a host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// The command being acknowledged.
    pub command: u16,
    /// Device status; [`ACK_STATUS_OK`] on success.
    pub status: u8,
}

impl Ack {
    /// A successful acknowledgement for `command`.
    pub fn ok(command: u16) -> Self {
        Self {
            command,
            status: ACK_STATUS_OK,
        }
    }

    /// Whether the device accepted the command.
    pub fn is_ok(&self) -> bool {
        self.status == ACK_STATUS_OK
    }

    pub(crate) fn decode(mut payload: &[u8]) -> Result<Self> {
        if payload.len() != ACK_PAYLOAD_LEN {
            return Err(ProtocolError::CorruptFrame {
                command: ACK,
                reason: CorruptReason::LengthMismatch,
            });
        }
        let command = payload.get_u16();
        let status = payload.get_u8();
        Ok(Self { command, status })
    }

    /// Encode as an `ACK` payload.
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ACK_PAYLOAD_LEN);
        buf.put_u16(self.command);
        buf.put_u8(self.status);
        buf.freeze()
    }
}

/// Undecoded ADC counts for one channel, as carried by `SAMPLE_DATA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSamples {
    /// Zero-based input channel.
    pub channel: u8,
    /// Per-channel frame counter, wraps at 256.
    pub sequence: u8,
    /// Signed ADC counts, full scale at ±32768.
    pub counts: Vec<i16>,
}

impl RawSamples {
    pub(crate) fn decode(mut payload: &[u8]) -> Result<Self> {
        if payload.len() != SAMPLE_DATA_PAYLOAD_LEN {
            return Err(ProtocolError::CorruptFrame {
                command: SAMPLE_DATA,
                reason: CorruptReason::LengthMismatch,
            });
        }
        let channel = payload.get_u8();
        let sequence = payload.get_u8();
        let counts = (0..SAMPLES_PER_FRAME).map(|_| payload.get_i16()).collect();
        Ok(Self {
            channel,
            sequence,
            counts,
        })
    }

    /// Encode as a `SAMPLE_DATA` payload.
    ///
    /// Short count vectors are zero-padded and long ones truncated to
    /// [`SAMPLES_PER_FRAME`].
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SAMPLE_DATA_PAYLOAD_LEN);
        buf.put_u8(self.channel);
        buf.put_u8(self.sequence);
        for i in 0..SAMPLES_PER_FRAME {
            buf.put_i16(self.counts.get(i).copied().unwrap_or(0));
        }
        buf.freeze()
    }
}
