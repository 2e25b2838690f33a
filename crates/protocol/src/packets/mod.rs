//! Packet definitions for the cell game wire protocol.
//!
//! Client packets decode into an [`Intent`]; server packets are built by
//! the `encode_*` methods of [`Protocol`]. A `Protocol` is bound to one
//! [`Revision`] row for the life of a connection, so a connection never
//! mixes encodings.

mod client;
mod server;

pub use client::*;
pub use server::*;

use crate::revision::Revision;

/// Encoder/decoder bound to a single protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    revision: &'static Revision,
}

impl Protocol {
    /// Bind to `version`. Returns the protocol and whether the version had
    /// an exact row; unmapped versions fall back to the lowest revision.
    pub fn for_version(version: u32) -> (Self, bool) {
        match Revision::lookup(version) {
            Some(revision) => (Self { revision }, true),
            None => (
                Self {
                    revision: Revision::fallback(),
                },
                false,
            ),
        }
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.revision.version
    }

    #[inline]
    pub fn revision(&self) -> &'static Revision {
        self.revision
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            revision: Revision::fallback(),
        }
    }
}
