//! Ejected mass.

use glam::Vec2;
use protocol::Color;

use super::{Body, Entity, EntityId};

impl Entity {
    /// Create new ejected mass. It is unowned once fired and usually
    /// inherits the color of the cell that ejected it.
    pub fn ejected(id: EntityId, position: Vec2, size: f32, color: Color, tick: u64) -> Self {
        Entity::new(id, Body::Ejected, position, size, color, tick)
    }

    /// Direction the entity is travelling in, if boosted.
    #[inline]
    pub fn heading(&self) -> Option<Vec2> {
        self.boost.map(|b| b.direction)
    }
}
