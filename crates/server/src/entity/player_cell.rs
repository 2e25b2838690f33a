//! Player cell.

use glam::Vec2;
use protocol::Color;

use super::base::SPLIT_RESTORE_TICKS;
use super::{Body, ClientId, Entity, EntityId};

/// State carried only by cells a player controls.
#[derive(Debug, Clone, Default)]
pub struct PlayerCell {
    /// Whether this cell can remerge with siblings.
    pub can_remerge: bool,
}

impl PlayerCell {
    /// Movement speed for a cell of `size` that is `distance` away from its
    /// target: `2.2 * size^-0.439 * 40 * (speed / 30)`, eased in over the
    /// last 32 units.
    #[inline]
    pub fn move_speed(size: f32, speed: f32, distance: f32) -> f32 {
        let base = 2.2 * size.powf(-0.439) * 40.0 * (speed / 30.0);
        base * (distance.min(32.0) / 32.0)
    }
}

impl Entity {
    /// Create a new player cell.
    pub fn player_cell(id: EntityId, owner: ClientId, position: Vec2, size: f32, color: Color, tick: u64) -> Self {
        let mut cell = Entity::new(id, Body::PlayerCell(PlayerCell::default()), position, size, color, tick);
        cell.owner = Some(owner);
        cell
    }

    /// Refresh `can_remerge` from age and the merge timer.
    /// Returns true if the cell can now remerge.
    pub fn update_merge(&mut self, current_tick: u64, merge_time: f32) -> bool {
        let age = self.age(current_tick);
        let size = self.size();
        let boosting = self.boost.is_some_and(|b| b.distance >= 100.0);
        let Body::PlayerCell(cell) = &mut self.body else {
            return false;
        };

        cell.can_remerge = if age < SPLIT_RESTORE_TICKS {
            false
        } else if merge_time <= 0.0 {
            // No timer: merge as soon as the split boost is spent.
            !boosting
        } else {
            let time = (merge_time.max(size * 0.2) * 25.0) as u64;
            age >= time
        };
        cell.can_remerge
    }

    /// Whether this is a player cell that may currently remerge.
    #[inline]
    pub fn can_remerge(&self) -> bool {
        matches!(&self.body, Body::PlayerCell(cell) if cell.can_remerge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_shrinks_with_size() {
        let small = PlayerCell::move_speed(30.0, 30.0, 100.0);
        let large = PlayerCell::move_speed(300.0, 30.0, 100.0);
        assert!(small > large);
        // Eased in close to the target.
        assert!((PlayerCell::move_speed(30.0, 30.0, 16.0) - small / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_merge_timer() {
        let mut cell = Entity::player_cell(1, 1, Vec2::ZERO, 100.0, Color::default(), 0);
        // max(30, 100 * 0.2) * 25 = 750 ticks.
        assert!(!cell.update_merge(12, 30.0));
        assert!(!cell.update_merge(749, 30.0));
        assert!(cell.update_merge(750, 30.0));
        assert!(cell.can_remerge());
    }

    #[test]
    fn test_merge_without_timer_waits_for_boost() {
        let mut cell = Entity::player_cell(1, 1, Vec2::ZERO, 100.0, Color::default(), 0);
        cell.set_boost(500.0, Vec2::X);
        assert!(!cell.update_merge(20, 0.0));
        cell.boost = None;
        assert!(cell.update_merge(20, 0.0));
    }
}
