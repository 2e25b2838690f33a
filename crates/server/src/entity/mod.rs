//! Game entities.
//!
//! Every entity is an [`Entity`] whose [`Body`] tags it as a player cell,
//! virus, food pellet or ejected mass. Cross references between entities
//! and connections are plain ids.

mod base;
mod ejected_mass;
mod food;
mod player_cell;
mod virus;

pub use base::{Body, Boost, ConsumeRules, EJECT_GRACE_TICKS, Entity, Kind, SPLIT_RESTORE_TICKS};
pub use player_cell::PlayerCell;
pub use virus::{VIRUS_COLOR, pop_split_masses, shot_directions};

/// Stable entity id. Never 0.
pub type EntityId = u32;

/// Connection id.
pub type ClientId = u32;
