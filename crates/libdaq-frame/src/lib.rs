//! Packet codec for the DAQ122 USB protocol.
//!
//! Every packet is framed with:
//! - A 4-byte header magic (4C 52 AA 55)
//! - A 2-byte big-endian command ID
//! - A payload whose length is fixed by the command ID
//! - A 4-byte tail magic (AA 55 55 AA)
//!
//! Magics at both ends make resynchronization cheap: [`FrameScanner`] turns
//! a noisy, arbitrarily chunked byte stream back into frames.

pub mod codec;
pub mod command;
pub mod error;
pub mod message;
pub mod scanner;

pub use codec::{
    build_send_packet, encode_frame, parse_data, CodecConfig, Parsed, ParsedFrame,
    FRAME_OVERHEAD, HEADER_MAGIC, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD, TAIL_MAGIC,
};
pub use error::{CorruptReason, ProtocolError, Result};
pub use message::{Ack, RawSamples};
pub use scanner::{FrameScanner, ScanStats};
