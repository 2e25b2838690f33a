//! Client -> Server packet decoding.

use bytes::Bytes;

use super::Protocol;
use crate::revision::{OPCODES, TargetWidth};
use crate::{BinaryReader, BinaryWriter, ProtocolError};

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Join the game as `name` (may carry a `<skin>` prefix).
    Spawn { name: String },
    Spectate,
    /// Mouse position in world coordinates.
    SetTarget { x: i32, y: i32 },
    Split,
    Eject,
    QKeyPressed,
    QKeyReleased,
    Pong,
    /// Protocol version negotiation (0xFE).
    EstablishConnection { version: u32 },
    /// Opaque key completing the handshake (0xFF).
    ConnectionKey { key: u32 },
}

impl Intent {
    /// Decode one of the two handshake packets. These have the same layout
    /// in every revision, so no protocol is needed yet.
    pub fn decode_handshake(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = BinaryReader::new(Bytes::copy_from_slice(data));
        let opcode = reader.get_u8()?;
        if opcode != OPCODES.establish_connection && opcode != OPCODES.connection_key {
            return Err(ProtocolError::UnknownOpcode(opcode));
        }
        if data.len() != 5 {
            return Err(ProtocolError::MalformedPacket {
                opcode,
                len: data.len(),
            });
        }
        let value = reader.get_u32()?;
        if opcode == OPCODES.establish_connection {
            Ok(Intent::EstablishConnection { version: value })
        } else {
            Ok(Intent::ConnectionKey { key: value })
        }
    }
}

impl Protocol {
    /// Decode a client packet in this protocol's revision.
    pub fn decode(&self, data: &[u8]) -> Result<Intent, ProtocolError> {
        let revision = self.revision();
        let ops = revision.opcodes;
        let mut reader = BinaryReader::new(Bytes::copy_from_slice(data));
        let opcode = reader.get_u8()?;

        let intent = match opcode {
            op if op == ops.spawn => Intent::Spawn {
                name: reader.get_string(revision.strings),
            },
            op if op == ops.spectate => Intent::Spectate,
            op if op == ops.set_target => {
                // Clients of every generation are accepted regardless of the
                // negotiated width; the length tells them apart.
                let (x, y) = match data.len() {
                    9 => (reader.get_i16()? as i32, reader.get_i16()? as i32),
                    13 => (reader.get_i32()?, reader.get_i32()?),
                    21 => (reader.get_f64()? as i32, reader.get_f64()? as i32),
                    len => return Err(ProtocolError::MalformedPacket { opcode, len }),
                };
                Intent::SetTarget { x, y }
            }
            op if op == ops.split => Intent::Split,
            op if op == ops.eject => Intent::Eject,
            op if op == ops.qkey_pressed => Intent::QKeyPressed,
            op if op == ops.qkey_released => Intent::QKeyReleased,
            op if op == ops.pong => Intent::Pong,
            op if op == ops.establish_connection || op == ops.connection_key => {
                return Intent::decode_handshake(data);
            }
            _ => return Err(ProtocolError::UnknownOpcode(opcode)),
        };
        Ok(intent)
    }

    /// Encode an intent the way a client of this revision would send it.
    pub fn encode_intent(&self, intent: &Intent) -> Bytes {
        let revision = self.revision();
        let ops = revision.opcodes;
        let mut w = BinaryWriter::with_capacity(21);
        match intent {
            Intent::Spawn { name } => {
                w.put_u8(ops.spawn);
                w.put_string(name, revision.strings);
            }
            Intent::Spectate => w.put_u8(ops.spectate),
            Intent::SetTarget { x, y } => {
                w.put_u8(ops.set_target);
                match revision.target {
                    TargetWidth::F64 => {
                        w.put_f64(*x as f64);
                        w.put_f64(*y as f64);
                    }
                    TargetWidth::I32 => {
                        w.put_i32(*x);
                        w.put_i32(*y);
                    }
                }
                w.put_u32(0);
            }
            Intent::Split => w.put_u8(ops.split),
            Intent::Eject => w.put_u8(ops.eject),
            Intent::QKeyPressed => w.put_u8(ops.qkey_pressed),
            Intent::QKeyReleased => w.put_u8(ops.qkey_released),
            Intent::Pong => w.put_u8(ops.pong),
            Intent::EstablishConnection { version } => {
                w.put_u8(ops.establish_connection);
                w.put_u32(*version);
            }
            Intent::ConnectionKey { key } => {
                w.put_u8(ops.connection_key);
                w.put_u32(*key);
            }
        }
        w.finish()
    }
}
