//! Base entity type and common functionality.

use glam::Vec2;
use protocol::{Color, NodeKind};

use super::{ClientId, EntityId, PlayerCell};
use crate::collision::{mass_to_size, size_to_mass};
use crate::spatial::Bounds;
use crate::world::WorldBorder;

/// Ticks a freshly split cell must live before it can merge or be merged.
pub const SPLIT_RESTORE_TICKS: u64 = 13;
/// Ticks ejected mass must live before anything can eat it.
pub const EJECT_GRACE_TICKS: u64 = 2;

/// Kind tag of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    PlayerCell,
    Virus,
    Food,
    Ejected,
}

impl From<Kind> for NodeKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::PlayerCell => NodeKind::Player,
            Kind::Virus => NodeKind::Virus,
            Kind::Food => NodeKind::Food,
            Kind::Ejected => NodeKind::Ejected,
        }
    }
}

/// Variant-specific state.
#[derive(Debug, Clone)]
pub enum Body {
    PlayerCell(PlayerCell),
    Virus,
    Food,
    Ejected,
}

/// Boost movement data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boost {
    /// Remaining distance to travel.
    pub distance: f32,
    /// Direction vector (normalized).
    pub direction: Vec2,
}

/// Inputs to [`Entity::can_consume`] that live outside the two entities.
#[derive(Debug, Clone, Copy)]
pub struct ConsumeRules {
    pub tick: u64,
    /// Size ratio a cell needs over a virus or a foreign cell.
    pub eat_mult: f32,
    pub virus_count: usize,
    pub virus_max_amount: usize,
}

/// A single entity in the world arena.
///
/// Wire-visible fields (position, size, color) are only changed through
/// setters so that `needs_update` is never missed.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub body: Body,
    position: Vec2,
    size: f32,
    color: Color,
    /// Owning connection. Only player cells carry one.
    pub owner: Option<ClientId>,
    pub needs_update: bool,
    pub is_removed: bool,
    /// Id of the entity that consumed this one, 0 if none.
    pub killer_id: EntityId,
    pub boost: Option<Boost>,
    pub tick_of_birth: u64,
}

impl Entity {
    pub fn new(id: EntityId, body: Body, position: Vec2, size: f32, color: Color, tick: u64) -> Self {
        Self {
            id,
            body,
            position,
            size,
            color,
            owner: None,
            needs_update: true,
            is_removed: false,
            killer_id: 0,
            boost: None,
            tick_of_birth: tick,
        }
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        match self.body {
            Body::PlayerCell(_) => Kind::PlayerCell,
            Body::Virus => Kind::Virus,
            Body::Food => Kind::Food,
            Body::Ejected => Kind::Ejected,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn size(&self) -> f32 {
        self.size
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        size_to_mass(self.size)
    }

    /// Get the entity's age in ticks.
    #[inline]
    pub fn age(&self, current_tick: u64) -> u64 {
        current_tick.saturating_sub(self.tick_of_birth)
    }

    /// Bounding box used by the spatial index.
    #[inline]
    pub fn bounds(&self) -> Bounds {
        Bounds::from_center(self.position.x, self.position.y, self.size)
    }

    pub fn set_position(&mut self, position: Vec2) {
        if position != self.position {
            self.position = position;
            self.needs_update = true;
        }
    }

    pub fn set_size(&mut self, size: f32) {
        if size != self.size {
            self.size = size;
            self.needs_update = true;
        }
    }

    pub fn set_color(&mut self, color: Color) {
        if color != self.color {
            self.color = color;
            self.needs_update = true;
        }
    }

    /// Set boost with a direction vector. A zero vector boosts along +x.
    #[inline]
    pub fn set_boost(&mut self, distance: f32, direction: Vec2) {
        self.boost = Some(Boost {
            distance,
            direction: direction.try_normalize().unwrap_or(Vec2::X),
        });
    }

    #[inline]
    pub fn is_boosting(&self) -> bool {
        self.boost.is_some()
    }

    /// Clamp a position so the entity stays inside the border.
    #[inline]
    pub fn clamp_to_border(&self, position: Vec2, border: &WorldBorder) -> Vec2 {
        let half = self.size / 2.0;
        Vec2::new(
            position.x.clamp(border.min_x + half, (border.max_x - half).max(border.min_x + half)),
            position.y.clamp(border.min_y + half, (border.max_y - half).max(border.min_y + half)),
        )
    }

    /// Integrate one tick of motion. Returns true if the entity moved.
    ///
    /// Player cells seek `target`; anything with a boost also slides along it,
    /// covering a tenth of the remaining distance per tick.
    pub fn step(&mut self, target: Option<Vec2>, speed: f32, border: &WorldBorder) -> bool {
        if self.is_removed {
            return false;
        }
        let mut position = self.position;

        if let (Body::PlayerCell(_), Some(target)) = (&self.body, target) {
            let delta = target - position;
            let dist = delta.length();
            if dist >= 1.0 {
                position += delta / dist * PlayerCell::move_speed(self.size, speed, dist);
            }
        }

        if let Some(boost) = &mut self.boost {
            if boost.distance < 1.0 {
                self.boost = None;
            } else {
                let travel = boost.distance / 10.0;
                boost.distance -= travel;
                position += boost.direction * travel;
            }
        }

        let position = self.clamp_to_border(position, border);
        if position == self.position {
            return false;
        }
        self.set_position(position);
        true
    }

    /// Mark this entity as consumed by `by`.
    pub fn on_consumed(&mut self, by: EntityId) {
        self.is_removed = true;
        self.killer_id = by;
    }

    /// Whether this entity is allowed to eat `other`, ignoring distance.
    pub fn can_consume(&self, other: &Entity, rules: &ConsumeRules) -> bool {
        if self.is_removed || other.is_removed || self.id == other.id {
            return false;
        }
        match (&self.body, &other.body) {
            (Body::Food | Body::Ejected, _) => false,
            (Body::Virus, Body::Ejected) => {
                other.age(rules.tick) >= EJECT_GRACE_TICKS
                    && rules.virus_count < rules.virus_max_amount
            }
            (Body::Virus, _) => false,
            (Body::PlayerCell(_), Body::Food) => self.size > other.size,
            (Body::PlayerCell(_), Body::Ejected) => {
                self.size > other.size && other.age(rules.tick) >= EJECT_GRACE_TICKS
            }
            (Body::PlayerCell(_), Body::Virus) => self.size >= rules.eat_mult * other.size,
            (Body::PlayerCell(mine), Body::PlayerCell(theirs)) => {
                if self.owner.is_some() && self.owner == other.owner {
                    mine.can_remerge
                        && theirs.can_remerge
                        && self.age(rules.tick) >= SPLIT_RESTORE_TICKS
                        && other.age(rules.tick) >= SPLIT_RESTORE_TICKS
                        && (self.size > other.size || (self.size == other.size && self.id > other.id))
                } else {
                    self.size >= rules.eat_mult * other.size
                }
            }
        }
    }

    /// Split off a boosted child of `child_size`. The parent keeps the rest
    /// of its mass, so the pair's total mass is unchanged.
    pub fn split(&mut self, new_id: EntityId, direction: Vec2, child_size: f32, boost: f32, tick: u64) -> Entity {
        let child_size = child_size.min(self.size);
        let remaining = (self.size * self.size - child_size * child_size).max(0.0);
        self.set_size(remaining.sqrt());

        let mut child = Entity::new(new_id, self.body.clone(), self.position, child_size, self.color, tick);
        if let Body::PlayerCell(cell) = &mut child.body {
            cell.can_remerge = false;
        }
        child.owner = self.owner;
        child.set_boost(boost, direction);
        child
    }

    /// Gain `fraction` of `mass`.
    pub fn absorb(&mut self, mass: f32, fraction: f32) {
        let gained = mass * fraction.clamp(0.0, 1.0);
        self.set_size(mass_to_size(self.mass() + gained));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(tick: u64) -> ConsumeRules {
        ConsumeRules {
            tick,
            eat_mult: 1.15,
            virus_count: 0,
            virus_max_amount: 100,
        }
    }

    fn cell(id: EntityId, owner: ClientId, size: f32) -> Entity {
        Entity::player_cell(id, owner, Vec2::ZERO, size, Color::new(1, 2, 3), 0)
    }

    #[test]
    fn test_setters_flag_updates() {
        let mut e = Entity::food(1, Vec2::ZERO, 10.0, Color::default(), 0);
        e.needs_update = false;
        e.set_size(10.0);
        assert!(!e.needs_update);
        e.set_position(Vec2::new(1.0, 0.0));
        assert!(e.needs_update);
    }

    #[test]
    fn test_food_and_ejected_never_eat() {
        let food = Entity::food(1, Vec2::ZERO, 100.0, Color::default(), 0);
        let ejected = Entity::ejected(2, Vec2::ZERO, 100.0, Color::default(), 0);
        let small = cell(3, 1, 10.0);
        assert!(!food.can_consume(&small, &rules(10)));
        assert!(!ejected.can_consume(&small, &rules(10)));
    }

    #[test]
    fn test_eat_multiplier_between_players() {
        let big = cell(1, 1, 116.0);
        let small = cell(2, 2, 100.0);
        assert!(big.can_consume(&small, &rules(0)));

        let almost = cell(3, 1, 114.0);
        assert!(!almost.can_consume(&small, &rules(0)));
        assert!(!small.can_consume(&big, &rules(0)));
    }

    #[test]
    fn test_sibling_merge_requires_remerge_and_age() {
        let mut a = cell(1, 7, 60.0);
        let mut b = cell(2, 7, 50.0);
        assert!(!a.can_consume(&b, &rules(100)));

        for e in [&mut a, &mut b] {
            if let Body::PlayerCell(pc) = &mut e.body {
                pc.can_remerge = true;
            }
        }
        assert!(!a.can_consume(&b, &rules(SPLIT_RESTORE_TICKS - 1)));
        assert!(a.can_consume(&b, &rules(SPLIT_RESTORE_TICKS)));
        assert!(!b.can_consume(&a, &rules(SPLIT_RESTORE_TICKS)));

        // Equal sizes: the higher id wins.
        b.set_size(60.0);
        assert!(!a.can_consume(&b, &rules(100)));
        assert!(b.can_consume(&a, &rules(100)));
    }

    #[test]
    fn test_virus_eats_only_aged_ejected_below_cap() {
        let virus = Entity::virus(1, Vec2::ZERO, 100.0, 0);
        let ejected = Entity::ejected(2, Vec2::ZERO, 36.0, Color::default(), 10);
        let food = Entity::food(3, Vec2::ZERO, 10.0, Color::default(), 0);

        assert!(!virus.can_consume(&ejected, &rules(11)));
        assert!(virus.can_consume(&ejected, &rules(12)));
        assert!(!virus.can_consume(&food, &rules(12)));

        let full = ConsumeRules {
            virus_count: 100,
            ..rules(12)
        };
        assert!(!virus.can_consume(&ejected, &full));
    }

    #[test]
    fn test_split_conserves_mass() {
        let mut parent = cell(1, 9, 100.0);
        let before = parent.mass();
        let child = parent.split(2, Vec2::new(0.0, 3.0), 100.0 / 2f32.sqrt(), 780.0, 5);

        assert!((parent.mass() + child.mass() - before).abs() < 0.01);
        assert_eq!(child.owner, Some(9));
        assert_eq!(child.tick_of_birth, 5);
        let boost = child.boost.unwrap();
        assert_eq!(boost.direction, Vec2::Y);
        assert_eq!(boost.distance, 780.0);
    }

    #[test]
    fn test_absorb_and_consume() {
        let mut eater = cell(1, 1, 100.0);
        let mut prey = cell(2, 2, 50.0);
        eater.absorb(prey.mass(), 0.5);
        prey.on_consumed(eater.id);

        assert!((eater.mass() - 112.5).abs() < 0.01);
        assert!(prey.is_removed);
        assert_eq!(prey.killer_id, 1);
        assert!(!eater.can_consume(&prey, &rules(0)));
    }

    #[test]
    fn test_step_follows_boost_and_border() {
        let border = WorldBorder::new(1000.0, 1000.0);
        let mut e = Entity::ejected(1, Vec2::ZERO, 10.0, Color::default(), 0);
        e.set_boost(100.0, Vec2::X);
        assert!(e.step(None, 30.0, &border));
        assert_eq!(e.position(), Vec2::new(10.0, 0.0));

        e.set_boost(10_000.0, Vec2::X);
        for _ in 0..100 {
            e.step(None, 30.0, &border);
        }
        assert_eq!(e.position().x, 495.0);

        let mut food = Entity::food(2, Vec2::ZERO, 10.0, Color::default(), 0);
        assert!(!food.step(Some(Vec2::new(100.0, 0.0)), 30.0, &border));
    }
}
