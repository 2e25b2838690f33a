//! Per-revision capability table.
//!
//! Every supported client revision is described by one [`Revision`] row.
//! Encoders and decoders never branch on the raw version number; they read
//! the capabilities of the row they were handed.

/// Wire encoding of null-terminated strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Ucs2,
    Utf8,
}

/// Coordinate width used by the client's SET_TARGET packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetWidth {
    /// 21 bytes: opcode, two f64, u32.
    F64,
    /// 13 bytes: opcode, two i32, u32.
    I32,
}

/// Layout of a single node record inside UpdateNodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLayout {
    /// Color and UCS-2 name on every record.
    Legacy,
    /// Legacy plus a UTF-8 skin on added records.
    LegacySkins,
    /// Flag byte selects color, skin and name.
    Flagged,
    /// Flagged plus an extended byte for food and `%`-prefixed skins.
    Extended,
}

/// Width of the remove count in UpdateNodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountWidth {
    U16,
    U32,
}

/// Opcode assignments shared by a set of revisions.
#[derive(Debug, PartialEq, Eq)]
pub struct OpcodeMap {
    pub spawn: u8,
    pub spectate: u8,
    pub set_target: u8,
    pub split: u8,
    pub qkey_pressed: u8,
    pub qkey_released: u8,
    pub eject: u8,
    pub pong: u8,
    pub establish_connection: u8,
    pub connection_key: u8,

    pub update_nodes: u8,
    pub update_viewport: u8,
    pub clear_all: u8,
    pub add_node: u8,
    pub leaderboard: u8,
    pub set_border: u8,
}

/// Opcodes used by every revision in the table.
pub static OPCODES: OpcodeMap = OpcodeMap {
    spawn: 0x00,
    spectate: 0x01,
    set_target: 0x10,
    split: 0x11,
    qkey_pressed: 0x12,
    qkey_released: 0x13,
    eject: 0x15,
    pong: 0xE3,
    establish_connection: 0xFE,
    connection_key: 0xFF,

    update_nodes: 0x10,
    update_viewport: 0x11,
    clear_all: 0x12,
    add_node: 0x20,
    leaderboard: 0x31,
    set_border: 0x40,
};

/// Capabilities of one protocol revision.
#[derive(Debug, PartialEq, Eq)]
pub struct Revision {
    pub version: u32,
    pub strings: StringEncoding,
    pub target: TargetWidth,
    pub node_layout: NodeLayout,
    pub remove_count: CountWidth,
    /// Prefix written before skin names, if any.
    pub skin_prefix: Option<char>,
    pub opcodes: &'static OpcodeMap,
}

const fn legacy(version: u32, node_layout: NodeLayout) -> Revision {
    Revision {
        version,
        strings: StringEncoding::Ucs2,
        target: TargetWidth::F64,
        node_layout,
        remove_count: CountWidth::U32,
        skin_prefix: None,
        opcodes: &OPCODES,
    }
}

const fn flagged(version: u32) -> Revision {
    Revision {
        version,
        strings: StringEncoding::Utf8,
        target: TargetWidth::I32,
        node_layout: NodeLayout::Flagged,
        remove_count: CountWidth::U16,
        skin_prefix: None,
        opcodes: &OPCODES,
    }
}

const fn extended(version: u32) -> Revision {
    Revision {
        version,
        strings: StringEncoding::Utf8,
        target: TargetWidth::I32,
        node_layout: NodeLayout::Extended,
        remove_count: CountWidth::U16,
        skin_prefix: Some('%'),
        opcodes: &OPCODES,
    }
}

/// All revisions the server can speak, ascending by version.
pub static REVISIONS: [Revision; 15] = [
    legacy(4, NodeLayout::Legacy),
    legacy(5, NodeLayout::LegacySkins),
    flagged(6),
    flagged(7),
    flagged(8),
    flagged(9),
    flagged(10),
    extended(11),
    extended(12),
    extended(13),
    extended(14),
    extended(15),
    extended(16),
    extended(17),
    extended(18),
];

impl Revision {
    /// Find the row for an exact version.
    pub fn lookup(version: u32) -> Option<&'static Revision> {
        REVISIONS.iter().find(|r| r.version == version)
    }

    /// The lowest revision in the table, used when a version is accepted but
    /// has no row of its own.
    pub fn fallback() -> &'static Revision {
        &REVISIONS[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_ascending_and_complete() {
        let versions: Vec<u32> = REVISIONS.iter().map(|r| r.version).collect();
        assert_eq!(versions, (4..=18).collect::<Vec<_>>());
    }

    #[test]
    fn test_capability_boundaries() {
        let v5 = Revision::lookup(5).unwrap();
        let v6 = Revision::lookup(6).unwrap();
        let v10 = Revision::lookup(10).unwrap();
        let v11 = Revision::lookup(11).unwrap();

        assert_eq!(v5.strings, StringEncoding::Ucs2);
        assert_eq!(v5.remove_count, CountWidth::U32);
        assert_eq!(v6.strings, StringEncoding::Utf8);
        assert_eq!(v6.target, TargetWidth::I32);
        assert_eq!(v10.node_layout, NodeLayout::Flagged);
        assert_eq!(v11.node_layout, NodeLayout::Extended);
        assert_eq!(v11.skin_prefix, Some('%'));
    }

    #[test]
    fn test_unknown_version_has_no_row() {
        assert!(Revision::lookup(3).is_none());
        assert!(Revision::lookup(19).is_none());
        assert_eq!(Revision::fallback().version, 4);
    }
}
