use bytes::{BufMut, Bytes, BytesMut};

use crate::command::{payload_len, ACK, SAMPLE_DATA};
use crate::error::{CorruptReason, ProtocolError, Result};
use crate::message::{Ack, RawSamples};

/// Header magic: 4C 52 AA 55.
pub const HEADER_MAGIC: [u8; 4] = [0x4C, 0x52, 0xAA, 0x55];

/// Tail magic: AA 55 55 AA.
pub const TAIL_MAGIC: [u8; 4] = [0xAA, 0x55, 0x55, 0xAA];

/// Header: magic (4) + command (2) = 6 bytes.
pub const HEADER_SIZE: usize = HEADER_MAGIC.len() + 2;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + TAIL_MAGIC.len();

/// Device maximum packet size (one USB high-speed bulk packet).
pub const MAX_PACKET_SIZE: usize = 512;

/// Largest payload that fits in [`MAX_PACKET_SIZE`].
pub const MAX_PAYLOAD: usize = MAX_PACKET_SIZE - FRAME_OVERHEAD;

/// A decoded frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFrame {
    /// Device acknowledgement.
    Ack(Ack),
    /// One channel's worth of streamed samples.
    Samples(RawSamples),
    /// Any other known command with its payload.
    Control { command: u16, payload: Bytes },
}

impl ParsedFrame {
    /// The command ID this frame was sent with.
    pub fn command(&self) -> u16 {
        match self {
            ParsedFrame::Ack(_) => ACK,
            ParsedFrame::Samples(_) => SAMPLE_DATA,
            ParsedFrame::Control { command, .. } => *command,
        }
    }
}

/// A successful parse together with the bytes it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    /// The decoded frame.
    pub frame: ParsedFrame,
    /// Wire length of the frame, starting at buffer offset 0.
    pub consumed: usize,
}

/// Configuration for the packet codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Largest frame the device accepts, overhead included. Default: 512.
    pub max_packet_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl CodecConfig {
    /// Largest payload under this configuration.
    pub fn max_payload(&self) -> usize {
        self.max_packet_size.saturating_sub(FRAME_OVERHEAD)
    }
}

/// Encode a command frame into `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬──────────────┬──────────────┐
/// │ Header (4B)  │ Command   │ Payload      │ Tail (4B)    │
/// │ 4C 52 AA 55  │ (2B BE)   │ (table len)  │ AA 55 55 AA  │
/// └──────────────┴───────────┴──────────────┴──────────────┘
/// ```
pub fn encode_frame(
    command: u16,
    payload: &[u8],
    config: &CodecConfig,
    dst: &mut BytesMut,
) -> Result<()> {
    let max = config.max_payload();
    if payload.len() > max {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }
    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_slice(&HEADER_MAGIC);
    dst.put_u16(command);
    dst.put_slice(payload);
    dst.put_slice(&TAIL_MAGIC);
    Ok(())
}

/// Build a complete frame for `command` with the default configuration.
pub fn build_send_packet(command: u16, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_frame(command, payload, &CodecConfig::default(), &mut buf)?;
    Ok(buf.freeze())
}

/// Decode the frame at the start of `raw`.
///
/// - `Err(Framing)`: `raw` does not begin with the header magic. Drop one
///   byte and retry.
/// - `Err(CorruptFrame)`: the header is present but the frame is invalid.
///   Drop the header magic and retry.
/// - `Ok(None)`: `raw` is a valid prefix of a frame. Wait for more bytes.
/// - `Ok(Some(parsed))`: `parsed.consumed` bytes form a valid frame.
pub fn parse_data(raw: &[u8]) -> Result<Option<Parsed>> {
    let magic_len = HEADER_MAGIC.len().min(raw.len());
    if raw[..magic_len] != HEADER_MAGIC[..magic_len] {
        return Err(ProtocolError::Framing);
    }
    if raw.len() < HEADER_SIZE {
        return Ok(None);
    }

    let command = u16::from_be_bytes([raw[4], raw[5]]);
    let len = payload_len(command).ok_or(ProtocolError::CorruptFrame {
        command,
        reason: CorruptReason::UnknownCommand,
    })?;

    let total = FRAME_OVERHEAD + len;
    if raw.len() < total {
        return Ok(None);
    }

    if raw[HEADER_SIZE + len..total] != TAIL_MAGIC {
        return Err(ProtocolError::CorruptFrame {
            command,
            reason: CorruptReason::TailMismatch,
        });
    }

    let payload = &raw[HEADER_SIZE..HEADER_SIZE + len];
    let frame = match command {
        ACK => ParsedFrame::Ack(Ack::decode(payload)?),
        SAMPLE_DATA => ParsedFrame::Samples(RawSamples::decode(payload)?),
        _ => ParsedFrame::Control {
            command,
            payload: Bytes::copy_from_slice(payload),
        },
    };

    Ok(Some(Parsed {
        frame,
        consumed: total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{
        ACK_STATUS_OK, CONFIGURE_ADC, CONNECT, INITIALIZE, SAMPLES_PER_FRAME, SELECT_CHANNEL,
        START_COLLECTION, STOP_COLLECTION,
    };

    #[test]
    fn build_connect_is_byte_exact() {
        let frame = build_send_packet(CONNECT, &[]).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[0x4C, 0x52, 0xAA, 0x55, 0x00, 0x01, 0xAA, 0x55, 0x55, 0xAA]
        );
    }

    #[test]
    fn build_configure_places_payload_between_magics() {
        let frame = build_send_packet(CONFIGURE_ADC, &[0x02, 0x03]).unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD + 2);
        assert_eq!(&frame[..4], &HEADER_MAGIC);
        assert_eq!(&frame[4..6], &[0x00, 0x03]);
        assert_eq!(&frame[6..8], &[0x02, 0x03]);
        assert_eq!(&frame[8..], &TAIL_MAGIC);
    }

    #[test]
    fn roundtrip_every_host_command() {
        let cases: [(u16, &[u8]); 6] = [
            (CONNECT, &[]),
            (INITIALIZE, &[]),
            (CONFIGURE_ADC, &[0x02, 0x02]),
            (SELECT_CHANNEL, &[0b0000_0001]),
            (START_COLLECTION, &[]),
            (STOP_COLLECTION, &[]),
        ];

        for (command, payload) in cases {
            let wire = build_send_packet(command, payload).unwrap();
            let parsed = parse_data(&wire).unwrap().unwrap();
            assert_eq!(parsed.consumed, wire.len());
            assert_eq!(
                parsed.frame,
                ParsedFrame::Control {
                    command,
                    payload: Bytes::copy_from_slice(payload),
                }
            );
        }
    }

    #[test]
    fn roundtrip_ack_and_samples() {
        let ack = Ack::ok(START_COLLECTION);
        let wire = build_send_packet(ACK, &ack.to_payload()).unwrap();
        let parsed = parse_data(&wire).unwrap().unwrap();
        assert_eq!(parsed.frame, ParsedFrame::Ack(ack));
        assert_eq!(parsed.frame.command(), ACK);

        let samples = RawSamples {
            channel: 1,
            sequence: 200,
            counts: (0..SAMPLES_PER_FRAME as i16).map(|i| i * 100 - 1600).collect(),
        };
        let wire = build_send_packet(SAMPLE_DATA, &samples.to_payload()).unwrap();
        let parsed = parse_data(&wire).unwrap().unwrap();
        assert_eq!(parsed.frame, ParsedFrame::Samples(samples));
        assert_eq!(parsed.frame.command(), SAMPLE_DATA);
    }

    #[test]
    fn payload_too_large_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let err = build_send_packet(CONNECT, &payload).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooLarge {
                size: MAX_PAYLOAD + 1,
                max: MAX_PAYLOAD,
            }
        );
        assert!(!err.is_recoverable());

        let exact = vec![0u8; MAX_PAYLOAD];
        let frame = build_send_packet(CONNECT, &exact).unwrap();
        assert_eq!(frame.len(), MAX_PACKET_SIZE);
    }

    #[test]
    fn custom_packet_size_limits_payload() {
        let config = CodecConfig {
            max_packet_size: 16,
        };
        let mut buf = BytesMut::new();
        assert!(encode_frame(CONNECT, &[0u8; 6], &config, &mut buf).is_ok());
        assert!(matches!(
            encode_frame(CONNECT, &[0u8; 7], &config, &mut buf),
            Err(ProtocolError::PayloadTooLarge { size: 7, max: 6 })
        ));
    }

    #[test]
    fn leading_garbage_is_a_framing_error() {
        let mut wire = vec![0x00];
        wire.extend_from_slice(&build_send_packet(CONNECT, &[]).unwrap());
        let err = parse_data(&wire).unwrap_err();
        assert_eq!(err, ProtocolError::Framing);
        assert!(err.is_recoverable());

        let parsed = parse_data(&wire[1..]).unwrap().unwrap();
        assert_eq!(parsed.frame.command(), CONNECT);
    }

    #[test]
    fn partial_frames_need_more_data() {
        let wire = build_send_packet(CONFIGURE_ADC, &[1, 2]).unwrap();
        for cut in 0..wire.len() {
            assert_eq!(parse_data(&wire[..cut]).unwrap(), None, "cut at {cut}");
        }
    }

    #[test]
    fn short_non_magic_prefix_is_a_framing_error() {
        assert_eq!(parse_data(&[0x4C, 0x00]), Err(ProtocolError::Framing));
    }

    #[test]
    fn tail_mismatch_is_corrupt() {
        let mut wire = build_send_packet(SELECT_CHANNEL, &[0x01]).unwrap().to_vec();
        let last = wire.len() - 1;
        wire[last] = 0x00;
        assert_eq!(
            parse_data(&wire),
            Err(ProtocolError::CorruptFrame {
                command: SELECT_CHANNEL,
                reason: CorruptReason::TailMismatch,
            })
        );
    }

    #[test]
    fn unknown_command_is_corrupt() {
        let wire = build_send_packet(0x4242, &[]).unwrap();
        assert_eq!(
            parse_data(&wire),
            Err(ProtocolError::CorruptFrame {
                command: 0x4242,
                reason: CorruptReason::UnknownCommand,
            })
        );
    }

    #[test]
    fn trailing_bytes_are_not_consumed() {
        let mut wire = build_send_packet(ACK, &Ack::ok(CONNECT).to_payload())
            .unwrap()
            .to_vec();
        let frame_len = wire.len();
        wire.extend_from_slice(&[0xDE, 0xAD]);
        let parsed = parse_data(&wire).unwrap().unwrap();
        assert_eq!(parsed.consumed, frame_len);
        assert_eq!(
            parsed.frame,
            ParsedFrame::Ack(Ack {
                command: CONNECT,
                status: ACK_STATUS_OK,
            })
        );
    }
}
