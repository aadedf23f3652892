//! Command identifiers and their payload lengths.
//!
//! The frame header carries no length field, so the decoder takes every
//! payload length from this table. IDs below `0x8000` travel host to device;
//! IDs from `0x8000` travel device to host.

/// "Are you there" probe sent right after the transport opens.
pub const CONNECT: u16 = 0x0001;

/// Handshake/initialization request.
pub const INITIALIZE: u16 = 0x0002;

/// ADC parameters: `[rate code, voltage code]`.
pub const CONFIGURE_ADC: u16 = 0x0003;

/// Channel selection: `[channel bit mask]`.
pub const SELECT_CHANNEL: u16 = 0x0004;

/// Begin streaming sample frames.
pub const START_COLLECTION: u16 = 0x0005;

/// Stop streaming sample frames.
pub const STOP_COLLECTION: u16 = 0x0006;

/// Acknowledgement: `[acked command (BE u16), status]`.
pub const ACK: u16 = 0x8000;

/// One batch of samples for one channel.
pub const SAMPLE_DATA: u16 = 0x8001;

/// Ack status for an accepted command.
pub const ACK_STATUS_OK: u8 = 0x00;

/// Samples carried by one `SAMPLE_DATA` frame.
pub const SAMPLES_PER_FRAME: usize = 32;

/// `ACK` payload length.
pub const ACK_PAYLOAD_LEN: usize = 3;

/// `SAMPLE_DATA` payload length: channel, sequence, then big-endian `i16` counts.
pub const SAMPLE_DATA_PAYLOAD_LEN: usize = 2 + SAMPLES_PER_FRAME * 2;

/// Payload length for a command ID, or `None` for IDs outside the protocol.
pub fn payload_len(command: u16) -> Option<usize> {
    match command {
        CONNECT | INITIALIZE | START_COLLECTION | STOP_COLLECTION => Some(0),
        CONFIGURE_ADC => Some(2),
        SELECT_CHANNEL => Some(1),
        ACK => Some(ACK_PAYLOAD_LEN),
        SAMPLE_DATA => Some(SAMPLE_DATA_PAYLOAD_LEN),
        _ => None,
    }
}

/// Returns a human-readable name for a command ID.
pub fn command_name(command: u16) -> &'static str {
    match command {
        CONNECT => "CONNECT",
        INITIALIZE => "INITIALIZE",
        CONFIGURE_ADC => "CONFIGURE_ADC",
        SELECT_CHANNEL => "SELECT_CHANNEL",
        START_COLLECTION => "START_COLLECTION",
        STOP_COLLECTION => "STOP_COLLECTION",
        ACK => "ACK",
        SAMPLE_DATA => "SAMPLE_DATA",
        _ => "UNKNOWN",
    }
}

/// Returns true for host-to-device commands the device acknowledges.
pub fn expects_ack(command: u16) -> bool {
    matches!(
        command,
        CONNECT | INITIALIZE | CONFIGURE_ADC | SELECT_CHANNEL | START_COLLECTION | STOP_COLLECTION
    )
}

/// Returns true if the command travels device to host.
pub fn is_response(command: u16) -> bool {
    command >= ACK
}

/// Largest payload any known command carries.
pub const MAX_KNOWN_PAYLOAD_LEN: usize = SAMPLE_DATA_PAYLOAD_LEN;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_command_has_a_length() {
        for command in [
            CONNECT,
            INITIALIZE,
            CONFIGURE_ADC,
            SELECT_CHANNEL,
            START_COLLECTION,
            STOP_COLLECTION,
            ACK,
            SAMPLE_DATA,
        ] {
            assert!(payload_len(command).is_some(), "{}", command_name(command));
            assert_ne!(command_name(command), "UNKNOWN");
        }
        assert_eq!(payload_len(0x7777), None);
        assert_eq!(command_name(0x7777), "UNKNOWN");
    }

    #[test]
    fn only_host_commands_expect_ack() {
        assert!(expects_ack(CONNECT));
        assert!(expects_ack(STOP_COLLECTION));
        assert!(!expects_ack(ACK));
        assert!(!expects_ack(SAMPLE_DATA));
        assert!(is_response(ACK));
        assert!(is_response(SAMPLE_DATA));
        assert!(!is_response(START_COLLECTION));
    }

    #[test]
    fn sample_payload_fits_largest_entry() {
        assert_eq!(SAMPLE_DATA_PAYLOAD_LEN, 66);
        assert_eq!(MAX_KNOWN_PAYLOAD_LEN, payload_len(SAMPLE_DATA).unwrap());
    }
}
