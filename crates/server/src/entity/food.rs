//! Food pellet.

use glam::Vec2;
use protocol::Color;

use super::{Body, Entity, EntityId};

impl Entity {
    /// Create a new food pellet. Food never moves or eats.
    pub fn food(id: EntityId, position: Vec2, size: f32, color: Color, tick: u64) -> Self {
        Entity::new(id, Body::Food, position, size, color, tick)
    }
}
