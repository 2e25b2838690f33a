//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding client packets.
///
/// None of these are fatal to a connection: the dispatcher drops the
/// offending packet and keeps going. Only [`ProtocolError::UnsupportedProtocol`]
/// leads to the connection being closed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown packet opcode: {0:#04x}")]
    UnknownOpcode(u8),

    #[error("Unexpected end of data")]
    UnexpectedEof,

    #[error("Malformed packet {opcode:#04x} ({len} bytes)")]
    MalformedPacket { opcode: u8, len: usize },

    #[error("Unsupported protocol version: {0}")]
    UnsupportedProtocol(u32),
}
