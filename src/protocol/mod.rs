//! # Command Protocol Module
//!
//! The datagram command format used by remote clients.
//!
//! This module handles:
//! - Command kind and payload size definitions
//! - Length-and-tag decoding with all-or-nothing rejection
//! - Encoding, for clients and tests

pub mod command;
pub mod decoder;

pub use command::{encode_command, InboundCommand, CMD_KEEPALIVE, CMD_SET_BUTTONS, CMD_SET_STICK};
pub use decoder::{decode_command, DecodeError};
