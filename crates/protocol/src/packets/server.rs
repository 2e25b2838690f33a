//! Server -> Client packet encoding.

use bytes::Bytes;

use super::Protocol;
use crate::revision::{CountWidth, NodeLayout, Revision};
use crate::{BinaryWriter, Color};

const FLAG_SPIKED: u8 = 0x01;
const FLAG_COLOR: u8 = 0x02;
const FLAG_SKIN: u8 = 0x04;
const FLAG_NAME: u8 = 0x08;
const FLAG_EJECTED: u8 = 0x20;
const FLAG_EXTENDED: u8 = 0x80;

/// Kind of a node as the client renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Player,
    Food,
    Virus,
    Ejected,
}

/// One node in an UpdateNodes packet.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub size: u16,
    pub color: Color,
    pub kind: NodeKind,
    pub name: Option<String>,
    pub skin: Option<String>,
}

/// Eat record (cell was eaten by another).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EatRecord {
    pub eater: u32,
    pub eaten: u32,
}

/// One FFA leaderboard line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub is_me: bool,
    pub name: String,
}

/// Arena bounds as sent in SetBorder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Protocol {
    /// ClearAll (0x12).
    pub fn encode_clear_all(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(1);
        w.put_u8(self.revision().opcodes.clear_all);
        w.finish()
    }

    /// AddNode (0x20): tells the client it owns `id`.
    pub fn encode_add_node(&self, id: u32) -> Bytes {
        let mut w = BinaryWriter::with_capacity(5);
        w.put_u8(self.revision().opcodes.add_node);
        w.put_u32(id);
        w.finish()
    }

    /// SetBorder (0x40).
    pub fn encode_set_border(&self, border: BorderRect, game_type: u32, server_name: &str) -> Bytes {
        let revision = self.revision();
        let mut w = BinaryWriter::with_capacity(38 + server_name.len() * 2);
        w.put_u8(revision.opcodes.set_border);
        w.put_f64(border.min_x);
        w.put_f64(border.min_y);
        w.put_f64(border.max_x);
        w.put_f64(border.max_y);
        w.put_u32(game_type);
        w.put_string(server_name, revision.strings);
        w.finish()
    }

    /// UpdateViewport (0x11), sent to spectators.
    pub fn encode_update_viewport(&self, x: f32, y: f32, scale: f32) -> Bytes {
        let mut w = BinaryWriter::with_capacity(13);
        w.put_u8(self.revision().opcodes.update_viewport);
        w.put_f32(x);
        w.put_f32(y);
        w.put_f32(scale);
        w.finish()
    }

    /// FFA leaderboard (0x31).
    pub fn encode_leaderboard(&self, entries: &[LeaderboardEntry]) -> Bytes {
        let revision = self.revision();
        let mut w = BinaryWriter::new();
        w.put_u8(revision.opcodes.leaderboard);
        w.put_u32(entries.len() as u32);
        for entry in entries {
            w.put_u32(entry.is_me as u32);
            w.put_string(&entry.name, revision.strings);
        }
        w.finish()
    }

    /// UpdateNodes (0x10).
    ///
    /// Layout: eat count (u16) and `(eater, eaten)` pairs, node records
    /// (updates then adds) closed by a zero id, then the remove count
    /// followed by eaten ids and deleted ids.
    pub fn encode_update_nodes(
        &self,
        eat: &[EatRecord],
        update: &[NodeRecord],
        delete: &[u32],
        add: &[NodeRecord],
    ) -> Bytes {
        let revision = self.revision();
        let mut w = BinaryWriter::with_capacity(16 + (update.len() + add.len()) * 20);
        w.put_u8(revision.opcodes.update_nodes);

        w.put_u16(eat.len() as u16);
        for record in eat {
            w.put_u32(record.eater);
            w.put_u32(record.eaten);
        }

        for node in update {
            write_node(&mut w, revision, node, false);
        }
        for node in add {
            write_node(&mut w, revision, node, true);
        }
        w.put_u32(0);

        let remove_count = eat.len() + delete.len();
        match revision.remove_count {
            CountWidth::U16 => w.put_u16(remove_count as u16),
            CountWidth::U32 => w.put_u32(remove_count as u32),
        }
        for record in eat {
            w.put_u32(record.eaten);
        }
        for &id in delete {
            w.put_u32(id);
        }

        w.finish()
    }
}

fn write_node(w: &mut BinaryWriter, revision: &Revision, node: &NodeRecord, is_add: bool) {
    w.put_u32(node.id);
    w.put_i32(node.x);
    w.put_i32(node.y);
    w.put_u16(node.size);

    let mut flags = 0u8;
    if node.kind == NodeKind::Virus {
        flags |= FLAG_SPIKED;
    }
    if node.kind == NodeKind::Ejected {
        flags |= FLAG_EJECTED;
    }

    match revision.node_layout {
        NodeLayout::Legacy | NodeLayout::LegacySkins => {
            put_color(w, node.color);
            let skin = match (revision.node_layout, is_add) {
                (NodeLayout::LegacySkins, true) => node.skin.as_deref(),
                _ => None,
            };
            if skin.is_some() {
                flags |= FLAG_SKIN;
            }
            w.put_u8(flags);
            if let Some(skin) = skin {
                w.put_string_utf8(skin);
            }
            // Names ride on every record; updates carry an empty one.
            let name = if is_add { node.name.as_deref() } else { None };
            w.put_string_ucs2(name.unwrap_or(""));
        }
        NodeLayout::Flagged | NodeLayout::Extended => {
            let extended = revision.node_layout == NodeLayout::Extended;
            if node.kind == NodeKind::Player || is_add {
                flags |= FLAG_COLOR;
            }
            if extended && node.kind == NodeKind::Food {
                flags |= FLAG_EXTENDED;
            }
            let skin = if is_add { node.skin.as_deref() } else { None };
            let name = if is_add { node.name.as_deref() } else { None };
            if skin.is_some() {
                flags |= FLAG_SKIN;
            }
            if name.is_some() {
                flags |= FLAG_NAME;
            }
            w.put_u8(flags);
            if flags & FLAG_EXTENDED != 0 {
                w.put_u8(0x01);
            }
            if flags & FLAG_COLOR != 0 {
                put_color(w, node.color);
            }
            if let Some(skin) = skin {
                match revision.skin_prefix {
                    Some(prefix) => w.put_string_utf8(&format!("{prefix}{skin}")),
                    None => w.put_string_utf8(skin),
                }
            }
            if let Some(name) = name {
                w.put_string_utf8(name);
            }
        }
    }
}

#[inline]
fn put_color(w: &mut BinaryWriter, color: Color) {
    w.put_u8(color.r);
    w.put_u8(color.g);
    w.put_u8(color.b);
}
