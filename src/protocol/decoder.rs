//! # Command Decoder
//!
//! Decodes one datagram into an [`InboundCommand`]. Decoding is all-or-nothing:
//! anything but an exact, well-formed command is an error and nothing is applied.

use bytes::Buf;
use thiserror::Error;

use super::command::*;
use crate::controller::{Stick, StickPosition};

/// Reasons a datagram is dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("empty datagram")]
    Empty,

    #[error("unknown command kind 0x{0:02X}")]
    UnknownKind(u8),

    #[error("short payload for kind 0x{kind:02X}: expected {expected} bytes, got {actual}")]
    ShortPayload {
        kind: u8,
        expected: usize,
        actual: usize,
    },

    #[error("trailing bytes for kind 0x{kind:02X}: expected {expected} bytes, got {actual}")]
    TrailingBytes {
        kind: u8,
        expected: usize,
        actual: usize,
    },

    #[error("invalid stick selector {0}")]
    InvalidStick(u8),

    #[error("non-finite stick axis")]
    NonFiniteAxis,
}

/// Decode a complete datagram
///
/// # Arguments
///
/// * `datagram` - Raw bytes received from the transport (kind byte + payload)
///
/// # Errors
///
/// Returns error if:
/// - Datagram is empty or its kind is unknown
/// - Payload length differs from the kind's fixed size
/// - Stick selector or axis values are invalid
///
/// # Examples
///
/// ```
/// use hidplus_bridge::protocol::{decode_command, DecodeError, InboundCommand};
///
/// let cmd = decode_command(&[0x01, 0x01, 0, 0, 0, 0, 0, 0, 0]).unwrap();
/// assert_eq!(cmd, InboundCommand::SetButtons(0x0001));
///
/// assert_eq!(decode_command(&[0x7F]), Err(DecodeError::UnknownKind(0x7F)));
/// ```
pub fn decode_command(datagram: &[u8]) -> Result<InboundCommand, DecodeError> {
    let mut buf = datagram;
    if !buf.has_remaining() {
        return Err(DecodeError::Empty);
    }

    let kind = buf.get_u8();
    let expected = payload_size(kind).ok_or(DecodeError::UnknownKind(kind))?;
    let actual = buf.remaining();

    if actual < expected {
        return Err(DecodeError::ShortPayload {
            kind,
            expected,
            actual,
        });
    }
    if actual > expected {
        return Err(DecodeError::TrailingBytes {
            kind,
            expected,
            actual,
        });
    }

    match kind {
        CMD_SET_BUTTONS => Ok(InboundCommand::SetButtons(buf.get_u64_le())),
        CMD_SET_STICK => decode_set_stick(&mut buf),
        CMD_KEEPALIVE => Ok(InboundCommand::Keepalive),
        other => Err(DecodeError::UnknownKind(other)),
    }
}

fn decode_set_stick(buf: &mut &[u8]) -> Result<InboundCommand, DecodeError> {
    let selector = buf.get_u8();
    let stick = Stick::from_selector(selector).ok_or(DecodeError::InvalidStick(selector))?;

    let x = buf.get_f32_le();
    let y = buf.get_f32_le();
    if !x.is_finite() || !y.is_finite() {
        return Err(DecodeError::NonFiniteAxis);
    }

    Ok(InboundCommand::SetStick {
        stick,
        position: StickPosition::new(x, y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::BUTTON_A;

    fn stick_datagram(selector: u8, x: f32, y: f32) -> Vec<u8> {
        let mut datagram = vec![CMD_SET_STICK, selector];
        datagram.extend_from_slice(&x.to_le_bytes());
        datagram.extend_from_slice(&y.to_le_bytes());
        datagram
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode_command(&[]), Err(DecodeError::Empty));
    }

    #[test]
    fn test_decode_unknown_kind() {
        assert_eq!(decode_command(&[0x00]), Err(DecodeError::UnknownKind(0x00)));
        assert_eq!(decode_command(&[0xAB, 1, 2, 3]), Err(DecodeError::UnknownKind(0xAB)));
    }

    #[test]
    fn test_decode_set_buttons() {
        let datagram = encode_command(&InboundCommand::SetButtons(BUTTON_A));
        assert_eq!(decode_command(&datagram), Ok(InboundCommand::SetButtons(BUTTON_A)));
    }

    #[test]
    fn test_decode_set_buttons_short() {
        let datagram = [CMD_SET_BUTTONS, 0x01, 0x00, 0x00];
        assert_eq!(
            decode_command(&datagram),
            Err(DecodeError::ShortPayload {
                kind: CMD_SET_BUTTONS,
                expected: 8,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_decode_header_only_set_stick_is_short() {
        assert!(matches!(
            decode_command(&[CMD_SET_STICK]),
            Err(DecodeError::ShortPayload { actual: 0, .. })
        ));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut datagram = encode_command(&InboundCommand::SetButtons(1));
        datagram.push(0xFF);
        assert!(matches!(
            decode_command(&datagram),
            Err(DecodeError::TrailingBytes { expected: 8, actual: 9, .. })
        ));

        assert!(matches!(
            decode_command(&[CMD_KEEPALIVE, 0x00]),
            Err(DecodeError::TrailingBytes { expected: 0, actual: 1, .. })
        ));
    }

    #[test]
    fn test_decode_set_stick_left() {
        let cmd = decode_command(&stick_datagram(0, 1.0, 0.0)).unwrap();
        assert_eq!(
            cmd,
            InboundCommand::SetStick {
                stick: Stick::Left,
                position: StickPosition { x: 1.0, y: 0.0 },
            }
        );
    }

    #[test]
    fn test_decode_set_stick_clamps_out_of_range() {
        let cmd = decode_command(&stick_datagram(1, 3.5, -9.0)).unwrap();
        assert_eq!(
            cmd,
            InboundCommand::SetStick {
                stick: Stick::Right,
                position: StickPosition { x: 1.0, y: -1.0 },
            }
        );
    }

    #[test]
    fn test_decode_set_stick_invalid_selector() {
        assert_eq!(
            decode_command(&stick_datagram(2, 0.0, 0.0)),
            Err(DecodeError::InvalidStick(2))
        );
    }

    #[test]
    fn test_decode_set_stick_non_finite() {
        assert_eq!(
            decode_command(&stick_datagram(0, f32::NAN, 0.0)),
            Err(DecodeError::NonFiniteAxis)
        );
        assert_eq!(
            decode_command(&stick_datagram(0, 0.0, f32::INFINITY)),
            Err(DecodeError::NonFiniteAxis)
        );
    }

    #[test]
    fn test_decode_keepalive() {
        assert_eq!(decode_command(&[CMD_KEEPALIVE]), Ok(InboundCommand::Keepalive));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(DecodeError::UnknownKind(0x7F).to_string(), "unknown command kind 0x7F");
        assert_eq!(
            DecodeError::ShortPayload { kind: 1, expected: 8, actual: 2 }.to_string(),
            "short payload for kind 0x01: expected 8 bytes, got 2"
        );
    }
}
