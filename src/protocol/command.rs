//! # Command Protocol Constants and Types
//!
//! Each UDP datagram carries exactly one command:
//!
//! ```text
//! +------+---------------------------+
//! | kind | fixed payload for `kind`  |
//! +------+---------------------------+
//!   1 B        0, 8 or 9 bytes
//! ```
//!
//! | Kind | Byte | Payload (little-endian) |
//! |------|------|-------------------------|
//! | set-buttons | `0x01` | `u64` button bit-set |
//! | set-stick | `0x02` | `u8` selector, `f32` x, `f32` y |
//! | keepalive | `0x03` | none |

use bytes::{BufMut, BytesMut};

use crate::controller::{Stick, StickPosition};

/// Replace the whole button bit-set
pub const CMD_SET_BUTTONS: u8 = 0x01;

/// Replace one stick's position
pub const CMD_SET_STICK: u8 = 0x02;

/// Liveness only, no state change
pub const CMD_KEEPALIVE: u8 = 0x03;

/// Header size (command kind byte)
pub const HEADER_SIZE: usize = 1;

/// Set-buttons payload size (u64)
pub const SET_BUTTONS_PAYLOAD_SIZE: usize = 8;

/// Set-stick payload size (selector + 2 × f32)
pub const SET_STICK_PAYLOAD_SIZE: usize = 9;

/// Keepalive payload size
pub const KEEPALIVE_PAYLOAD_SIZE: usize = 0;

/// Largest complete command on the wire
pub const MAX_COMMAND_SIZE: usize = HEADER_SIZE + SET_STICK_PAYLOAD_SIZE;

/// Payload size required by a command kind, or `None` for unknown kinds.
pub fn payload_size(kind: u8) -> Option<usize> {
    match kind {
        CMD_SET_BUTTONS => Some(SET_BUTTONS_PAYLOAD_SIZE),
        CMD_SET_STICK => Some(SET_STICK_PAYLOAD_SIZE),
        CMD_KEEPALIVE => Some(KEEPALIVE_PAYLOAD_SIZE),
        _ => None,
    }
}

/// One decoded datagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InboundCommand {
    /// Replace the entire button bit-set
    SetButtons(u64),

    /// Replace one stick, leaving everything else as is
    SetStick { stick: Stick, position: StickPosition },

    /// Peer liveness
    Keepalive,
}

impl InboundCommand {
    /// Wire kind byte.
    pub fn kind(&self) -> u8 {
        match self {
            InboundCommand::SetButtons(_) => CMD_SET_BUTTONS,
            InboundCommand::SetStick { .. } => CMD_SET_STICK,
            InboundCommand::Keepalive => CMD_KEEPALIVE,
        }
    }

    /// Short human-readable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            InboundCommand::SetButtons(_) => "set-buttons",
            InboundCommand::SetStick { .. } => "set-stick",
            InboundCommand::Keepalive => "keepalive",
        }
    }
}

/// Encode a command into a datagram
///
/// Used by clients and by tests; the service itself only decodes.
///
/// # Examples
///
/// ```
/// use hidplus_bridge::protocol::{encode_command, InboundCommand, CMD_SET_BUTTONS};
///
/// let datagram = encode_command(&InboundCommand::SetButtons(0x0001));
/// assert_eq!(datagram.len(), 9);
/// assert_eq!(datagram[0], CMD_SET_BUTTONS);
/// ```
pub fn encode_command(command: &InboundCommand) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(MAX_COMMAND_SIZE);
    buf.put_u8(command.kind());

    match *command {
        InboundCommand::SetButtons(buttons) => buf.put_u64_le(buttons),
        InboundCommand::SetStick { stick, position } => {
            buf.put_u8(stick.selector());
            buf.put_f32_le(position.x);
            buf.put_f32_le(position.y);
        }
        InboundCommand::Keepalive => {}
    }

    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_sizes() {
        assert_eq!(payload_size(CMD_SET_BUTTONS), Some(8));
        assert_eq!(payload_size(CMD_SET_STICK), Some(9));
        assert_eq!(payload_size(CMD_KEEPALIVE), Some(0));
        assert_eq!(payload_size(0x00), None);
        assert_eq!(payload_size(0xFF), None);
        assert_eq!(MAX_COMMAND_SIZE, 10);
    }

    #[test]
    fn test_encode_set_buttons_layout() {
        let datagram = encode_command(&InboundCommand::SetButtons(0x0102_0304_0506_0708));
        assert_eq!(
            datagram,
            vec![0x01, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_encode_set_stick_layout() {
        let datagram = encode_command(&InboundCommand::SetStick {
            stick: Stick::Right,
            position: StickPosition::new(1.0, 0.0),
        });
        assert_eq!(datagram.len(), HEADER_SIZE + SET_STICK_PAYLOAD_SIZE);
        assert_eq!(datagram[0], CMD_SET_STICK);
        assert_eq!(datagram[1], 1);
        assert_eq!(&datagram[2..6], &1.0f32.to_le_bytes());
        assert_eq!(&datagram[6..10], &0.0f32.to_le_bytes());
    }

    #[test]
    fn test_encode_keepalive() {
        assert_eq!(encode_command(&InboundCommand::Keepalive), vec![CMD_KEEPALIVE]);
    }

    #[test]
    fn test_command_names() {
        assert_eq!(InboundCommand::Keepalive.name(), "keepalive");
        assert_eq!(InboundCommand::SetButtons(0).name(), "set-buttons");
        assert_eq!(InboundCommand::SetButtons(0).kind(), CMD_SET_BUTTONS);
    }
}
