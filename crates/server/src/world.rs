//! World state management.
//!
//! Owns every entity, the spatial index and the per-tick physics.

use std::collections::HashMap;

use glam::Vec2;
use protocol::Color;
use rand::Rng;
use tracing::trace;

use crate::collision::{check_cell_collision, mass_to_size};
use crate::config::Config;
use crate::entity::{ClientId, ConsumeRules, Entity, EntityId, Kind, pop_split_masses, shot_directions};
use crate::spatial::{Bounds, QuadTree};

/// Ticks between two decay passes.
const DECAY_INTERVAL: u64 = 25;

/// World border bounds.
#[derive(Debug, Clone, Copy)]
pub struct WorldBorder {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub width: f32,
    pub height: f32,
}

impl WorldBorder {
    pub fn new(width: f32, height: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self {
            min_x: -half_w,
            min_y: -half_h,
            max_x: half_w,
            max_y: half_h,
            width,
            height,
        }
    }

    /// Get a random position within the border.
    #[inline]
    pub fn random_position(&self) -> Vec2 {
        let mut rng = rand::rng();
        Vec2::new(
            rng.random_range(self.min_x..self.max_x),
            rng.random_range(self.min_y..self.max_y),
        )
    }
}

/// Id list with O(1) membership and swap-remove.
#[derive(Debug, Default)]
pub struct IdList {
    ids: Vec<EntityId>,
    positions: HashMap<EntityId, usize>,
}

impl IdList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, id: EntityId) {
        if !self.positions.contains_key(&id) {
            self.positions.insert(id, self.ids.len());
            self.ids.push(id);
        }
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(pos) = self.positions.remove(&id) else {
            return false;
        };
        let last_pos = self.ids.len() - 1;
        if pos != last_pos {
            let swapped_id = self.ids[last_pos];
            self.ids.swap(pos, last_pos);
            self.positions.insert(swapped_id, pos);
        }
        self.ids.pop();
        true
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.positions.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[EntityId] {
        &self.ids
    }
}

/// What a tick produced that the session layer has to announce.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Cells created for an owner during the tick (virus pops).
    pub new_owned: Vec<(ClientId, EntityId)>,
}

/// Outcome of two overlapping entities meeting.
enum Contact {
    Eat { eater: EntityId, prey: EntityId },
    Push { a: EntityId, b: EntityId, offset_a: Vec2, offset_b: Vec2 },
}

/// The game world containing all entities.
#[derive(Debug)]
pub struct World {
    next_node_id: EntityId,
    tick: u64,
    entities: HashMap<EntityId, Entity>,

    pub player_cells: IdList,
    pub food: IdList,
    pub viruses: IdList,
    pub ejected: IdList,
    /// Boosted entities that are not player cells.
    pub moving: IdList,

    owned: HashMap<ClientId, Vec<EntityId>>,
    /// Entities purged this tick, mapped to their killer (0 if none).
    graveyard: HashMap<EntityId, EntityId>,

    pub border: WorldBorder,
    quad_tree: QuadTree,
    config: Config,
}

impl World {
    pub fn new(config: &Config) -> Self {
        let border = WorldBorder::new(config.border.width as f32, config.border.height as f32);
        Self {
            next_node_id: 1,
            tick: 0,
            entities: HashMap::with_capacity(2048),
            player_cells: IdList::with_capacity(256),
            food: IdList::with_capacity(config.food.max_amount),
            viruses: IdList::with_capacity(config.virus.max_amount),
            ejected: IdList::with_capacity(256),
            moving: IdList::with_capacity(256),
            owned: HashMap::new(),
            graveyard: HashMap::new(),
            quad_tree: QuadTree::for_world(border.min_x, border.min_y, border.max_x, border.max_y),
            border,
            config: config.clone(),
        }
    }

    /// Get the next node ID. Never returns 0.
    pub fn next_id(&mut self) -> EntityId {
        let id = self.next_node_id;
        self.next_node_id = self.next_node_id.wrapping_add(1);
        if self.next_node_id == 0 {
            self.next_node_id = 1;
        }
        id
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    #[inline]
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Ids of every entity whose box intersects `region`.
    #[inline]
    pub fn query(&self, region: &Bounds) -> Vec<EntityId> {
        self.quad_tree.query(region)
    }

    #[inline]
    pub fn quad_tree(&self) -> &QuadTree {
        &self.quad_tree
    }

    /// Killer of an entity purged during the current tick.
    #[inline]
    pub fn killer_of(&self, id: EntityId) -> Option<EntityId> {
        self.graveyard.get(&id).copied()
    }

    /// Cells currently owned by `owner`.
    #[inline]
    pub fn cells_of(&self, owner: ClientId) -> &[EntityId] {
        self.owned.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add an entity to the arena, the index, its kind list and, when
    /// owned, its owner's cell list.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.quad_tree.insert(id, entity.bounds());
        match entity.kind() {
            Kind::PlayerCell => self.player_cells.push(id),
            Kind::Food => self.food.push(id),
            Kind::Virus => self.viruses.push(id),
            Kind::Ejected => self.ejected.push(id),
        }
        if entity.is_boosting() && entity.kind() != Kind::PlayerCell {
            self.moving.push(id);
        }
        if let Some(owner) = entity.owner {
            self.owned.entry(owner).or_default().push(id);
        }
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity. The index entry goes first, then the arena entry
    /// and every list referencing it.
    fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.quad_tree.remove(id);
        let entity = self.entities.remove(&id)?;
        match entity.kind() {
            Kind::PlayerCell => self.player_cells.remove(id),
            Kind::Food => self.food.remove(id),
            Kind::Virus => self.viruses.remove(id),
            Kind::Ejected => self.ejected.remove(id),
        };
        self.moving.remove(id);
        if let Some(owner) = entity.owner {
            if let Some(cells) = self.owned.get_mut(&owner) {
                cells.retain(|&c| c != id);
                if cells.is_empty() {
                    self.owned.remove(&owner);
                }
            }
        }
        Some(entity)
    }

    /// Sync an entity's index entry with its current box.
    fn reindex(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get(&id) {
            self.quad_tree.update(id, entity.bounds());
        }
    }

    /// Generate a random color.
    #[inline]
    pub fn random_color() -> Color {
        let mut rng = rand::rng();
        Color::new(
            rng.random_range(50..=255),
            rng.random_range(50..=255),
            rng.random_range(50..=255),
        )
    }

    /// Spawn the first cell of `owner` at a random position.
    pub fn spawn_player_cell(&mut self, owner: ClientId, color: Color) -> EntityId {
        let position = self.border.random_position();
        let id = self.next_id();
        let size = self.config.player.start_size as f32;
        self.insert(Entity::player_cell(id, owner, position, size, color, self.tick))
    }

    /// Remove every cell of `owner` at once.
    pub fn release_owner(&mut self, owner: ClientId) -> usize {
        let cells = self.owned.remove(&owner).unwrap_or_default();
        for &id in &cells {
            self.remove(id);
        }
        cells.len()
    }

    /// Split every cell of `owner` large enough towards `target`, up to the
    /// cell cap. Returns the ids of the new cells.
    pub fn split_cells(&mut self, owner: ClientId, target: Vec2) -> Vec<EntityId> {
        let max_cells = self.config.player.max_cells;
        let min_split_size = self.config.player.min_split_size as f32;
        let loss = self.config.player.split_loss.clamp(0.0, 1.0) as f32;

        let mut created = Vec::new();
        for id in self.cells_of(owner).to_vec() {
            if self.cells_of(owner).len() >= max_cells {
                break;
            }
            let Some(cell) = self.entities.get_mut(&id) else {
                continue;
            };
            let size = cell.size();
            if size < min_split_size {
                continue;
            }

            let delta = target - cell.position();
            let direction = if delta.length_squared() < 1.0 { Vec2::X } else { delta };
            let mass = cell.mass() * (1.0 - loss);
            cell.set_size(mass_to_size(mass));

            match self.split_off(id, direction, mass_to_size(mass / 2.0)) {
                Some(child) => created.push(child),
                None => {
                    if let Some(cell) = self.entities.get_mut(&id) {
                        cell.set_size(size);
                    }
                }
            }
        }
        created
    }

    /// Split a boosted child of `child_size` off `parent_id`, respecting
    /// the owner's cell cap and the minimum cell size.
    fn split_off(&mut self, parent_id: EntityId, direction: Vec2, child_size: f32) -> Option<EntityId> {
        let min_size = self.config.player.min_size as f32;
        let split_speed = self.config.player.split_speed as f32;

        let parent = self.entities.get(&parent_id)?;
        let owner = parent.owner?;
        if self.cells_of(owner).len() >= self.config.player.max_cells || child_size < min_size {
            return None;
        }
        let remaining = parent.size() * parent.size() - child_size * child_size;
        if remaining <= 0.0 || remaining.sqrt() < min_size {
            return None;
        }

        let id = self.next_id();
        let tick = self.tick;
        let boost = split_speed * child_size.powf(0.0122);
        let child = self.entities.get_mut(&parent_id)?.split(id, direction, child_size, boost, tick);
        self.reindex(parent_id);
        Some(self.insert(child))
    }

    /// Fire ejected mass from every cell of `owner` large enough, towards
    /// `target`. Returns the ids of the ejected pellets.
    pub fn eject_mass(&mut self, owner: ClientId, target: Vec2) -> Vec<EntityId> {
        let min_eject_size = self.config.player.min_eject_size as f32;
        let size_loss = self.config.eject.size_loss as f32;
        let eject_size = self.config.eject.size as f32;
        let eject_speed = self.config.eject.speed as f32;

        let mut created = Vec::new();
        for id in self.cells_of(owner).to_vec() {
            let Some(cell) = self.entities.get_mut(&id) else {
                continue;
            };
            if cell.size() < min_eject_size {
                continue;
            }
            let remaining = cell.size() * cell.size() - size_loss * size_loss;
            if remaining <= 0.0 {
                continue;
            }
            let new_size = remaining.sqrt();
            cell.set_size(new_size);

            let heading = (target - cell.position()).try_normalize();
            let spawn_pos = cell.position() + heading.unwrap_or(Vec2::ZERO) * new_size;
            let direction = match heading {
                Some(dir) => Vec2::from_angle(rand::rng().random_range(-0.3..0.3)).rotate(dir),
                None => Vec2::Y,
            };
            let color = cell.color();
            self.reindex(id);

            let eject_id = self.next_id();
            let mut pellet = Entity::ejected(eject_id, spawn_pos, eject_size, color, self.tick);
            pellet.set_position(pellet.clamp_to_border(spawn_pos, &self.border));
            pellet.set_boost(eject_speed, direction);
            created.push(self.insert(pellet));
        }
        created
    }

    /// Advance the world by one tick. `targets` holds each owner's mouse
    /// position in world coordinates.
    pub fn tick(&mut self, targets: &HashMap<ClientId, Vec2>) -> TickReport {
        let mut report = TickReport::default();

        self.tick += 1;
        self.graveyard.clear();
        self.update_merge_status();

        let movers = self.integrate_motion(targets);
        let removed = self.resolve_collisions(&movers, &mut report);
        self.purge(removed);

        if self.tick % DECAY_INTERVAL == 0 {
            self.decay();
        }
        self.spawn_food();
        self.spawn_viruses();

        report
    }

    fn update_merge_status(&mut self) {
        let merge_time = self.config.player.merge_time as f32;
        let tick = self.tick;
        for &id in self.player_cells.as_slice() {
            if let Some(cell) = self.entities.get_mut(&id) {
                cell.update_merge(tick, merge_time);
            }
        }
    }

    /// Step every player cell and boosted entity. Returns the ids that
    /// took part in motion this tick.
    fn integrate_motion(&mut self, targets: &HashMap<ClientId, Vec2>) -> Vec<EntityId> {
        let speed = self.config.player.speed as f32;
        let border = self.border;

        let mut movers: Vec<EntityId> = self.player_cells.as_slice().to_vec();
        movers.extend_from_slice(self.moving.as_slice());

        for &id in &movers {
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };
            let target = entity.owner.and_then(|owner| targets.get(&owner).copied());
            let moved = entity.step(target, speed, &border);
            let stopped = !entity.is_boosting();
            if moved {
                self.reindex(id);
            }
            if stopped {
                self.moving.remove(id);
            }
        }
        movers
    }

    /// Test every mover against its neighbours. Returns the ids marked
    /// removed.
    fn resolve_collisions(&mut self, movers: &[EntityId], report: &mut TickReport) -> Vec<EntityId> {
        let mut removed = Vec::new();
        let mut pops: Vec<(ClientId, EntityId)> = Vec::new();
        let mut feeds: Vec<(EntityId, Vec2)> = Vec::new();

        for &id in movers {
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            if entity.is_removed {
                continue;
            }
            for other in self.quad_tree.query(&entity.bounds()) {
                if other == id {
                    continue;
                }
                let Some(contact) = self.contact(id, other) else {
                    continue;
                };
                match contact {
                    Contact::Eat { eater, prey } => {
                        self.consume(eater, prey, &mut pops, &mut feeds);
                        removed.push(prey);
                        if prey == id {
                            break;
                        }
                    }
                    Contact::Push { a, b, offset_a, offset_b } => {
                        self.nudge(a, offset_a);
                        self.nudge(b, offset_b);
                    }
                }
            }
        }

        for (owner, cell_id) in pops {
            self.pop_cell(owner, cell_id, report);
        }
        for (virus_id, heading) in feeds {
            self.shoot_viruses(virus_id, heading);
        }
        removed
    }

    /// Decide what happens between two entities, if they overlap.
    fn contact(&self, a_id: EntityId, b_id: EntityId) -> Option<Contact> {
        let a = self.entities.get(&a_id)?;
        let b = self.entities.get(&b_id)?;
        if a.is_removed || b.is_removed {
            return None;
        }
        let collision = check_cell_collision(a.position(), a.size(), b.position(), b.size());
        if !collision.is_colliding() {
            return None;
        }

        let rules = ConsumeRules {
            tick: self.tick,
            eat_mult: self.config.player.eat_mult as f32,
            virus_count: self.viruses.len(),
            virus_max_amount: self.config.virus.max_amount,
        };
        if a.can_consume(b, &rules) && collision.can_swallow(a.size(), b.size()) {
            return Some(Contact::Eat { eater: a_id, prey: b_id });
        }
        if b.can_consume(a, &rules) && collision.can_swallow(b.size(), a.size()) {
            return Some(Contact::Eat { eater: b_id, prey: a_id });
        }

        // Siblings that cannot merge yet push each other apart.
        let siblings = a.kind() == Kind::PlayerCell
            && b.kind() == Kind::PlayerCell
            && a.owner.is_some()
            && a.owner == b.owner;
        if !siblings || (a.can_remerge() && b.can_remerge()) || collision.d < 0.01 {
            return None;
        }
        let total = a.mass() + b.mass();
        if total <= 0.0 {
            return None;
        }
        let push = collision.push_vector();
        Some(Contact::Push {
            a: a_id,
            b: b_id,
            offset_a: -push * (b.mass() / total),
            offset_b: push * (a.mass() / total),
        })
    }

    fn consume(
        &mut self,
        eater_id: EntityId,
        prey_id: EntityId,
        pops: &mut Vec<(ClientId, EntityId)>,
        feeds: &mut Vec<(EntityId, Vec2)>,
    ) {
        let Some(prey) = self.entities.get_mut(&prey_id) else {
            return;
        };
        prey.on_consumed(eater_id);
        let (prey_kind, prey_mass, prey_owner, heading) = (prey.kind(), prey.mass(), prey.owner, prey.heading());

        let absorb_fraction = self.config.player.absorb_fraction as f32;
        let max_size = self.config.player.max_size as f32;
        let virus_max_size = self.config.virus.max_size as f32;
        let Some(eater) = self.entities.get_mut(&eater_id) else {
            return;
        };

        match (eater.kind(), prey_kind) {
            (Kind::Virus, _) => {
                eater.absorb(prey_mass, 1.0);
                if eater.size() >= virus_max_size {
                    feeds.push((eater_id, heading.unwrap_or(Vec2::X)));
                }
            }
            (Kind::PlayerCell, _) => {
                let merge = prey_owner.is_some() && prey_owner == eater.owner;
                eater.absorb(prey_mass, if merge { 1.0 } else { absorb_fraction });
                if eater.size() > max_size {
                    eater.set_size(max_size);
                }
                if prey_kind == Kind::Virus {
                    if let Some(owner) = eater.owner {
                        pops.push((owner, eater_id));
                    }
                }
            }
            _ => {}
        }
        trace!("Entity {} consumed {}", eater_id, prey_id);
        self.reindex(eater_id);
    }

    fn nudge(&mut self, id: EntityId, offset: Vec2) {
        let border = self.border;
        if let Some(entity) = self.entities.get_mut(&id) {
            let position = entity.clamp_to_border(entity.position() + offset, &border);
            entity.set_position(position);
            self.reindex(id);
        }
    }

    /// Break a cell that ate a virus into fragments at random angles.
    fn pop_cell(&mut self, owner: ClientId, cell_id: EntityId, report: &mut TickReport) {
        let Some(cell) = self.entities.get(&cell_id) else {
            return;
        };
        if cell.is_removed {
            return;
        }
        let cells_left = self.config.virus.max_cells.saturating_sub(self.cells_of(owner).len());
        let splits = pop_split_masses(cell.mass(), cells_left, self.config.virus.split_div as f32);

        for mass in splits {
            let angle = rand::rng().random::<f32>() * std::f32::consts::TAU;
            if let Some(child) = self.split_off(cell_id, Vec2::from_angle(angle), mass_to_size(mass)) {
                report.new_owned.push((owner, child));
            }
        }
    }

    /// Reset an overfed virus and shoot new ones along `heading`.
    fn shoot_viruses(&mut self, virus_id: EntityId, heading: Vec2) {
        let min_size = self.config.virus.min_size as f32;
        let speed = self.config.virus.eject_speed as f32;
        let Some(virus) = self.entities.get_mut(&virus_id) else {
            return;
        };
        if virus.is_removed {
            return;
        }
        virus.set_size(min_size);
        let position = virus.position();
        self.reindex(virus_id);

        for direction in shot_directions(heading, self.config.virus.split_count) {
            if self.viruses.len() >= self.config.virus.max_amount {
                break;
            }
            let id = self.next_id();
            let mut shot = Entity::virus(id, position, min_size, self.tick);
            shot.set_boost(speed, direction);
            self.insert(shot);
        }
    }

    /// Drop consumed entities and remember who ate them.
    fn purge(&mut self, removed: Vec<EntityId>) {
        for id in removed {
            if let Some(entity) = self.remove(id) {
                self.graveyard.insert(id, entity.killer_id);
            }
        }
    }

    /// Shrink every player cell above the minimum size.
    fn decay(&mut self) {
        let min_size = self.config.player.min_size as f32;
        let factor = (1.0 - self.config.player.decay_rate as f32).max(0.0).sqrt();

        for id in self.player_cells.as_slice().to_vec() {
            let Some(cell) = self.entities.get_mut(&id) else {
                continue;
            };
            let size = cell.size();
            if size <= min_size {
                continue;
            }
            let new_size = (size * factor).max(min_size);
            if size - new_size > 0.01 {
                cell.set_size(new_size);
                self.reindex(id);
            }
        }
    }

    /// Top food up towards its configured population.
    pub fn spawn_food(&mut self) {
        let food = &self.config.food;
        let (min_amount, max_amount) = (food.min_amount, food.max_amount);
        let (min_size, max_size) = (food.min_size as f32, food.max_size as f32);
        let current = self.food.len();
        if current >= max_amount {
            return;
        }

        let to_spawn = food.spawn_amount.min(max_amount - current);
        let count = if current < min_amount {
            (min_amount - current).min(to_spawn * 2)
        } else {
            to_spawn
        };

        let mut rng = rand::rng();
        for _ in 0..count {
            let position = self.border.random_position();
            let size = if max_size > min_size {
                rng.random_range(min_size..max_size)
            } else {
                min_size
            };
            let id = self.next_id();
            self.insert(Entity::food(id, position, size, Self::random_color(), self.tick));
        }
    }

    /// Top viruses up to their minimum population.
    pub fn spawn_viruses(&mut self) {
        let (min_amount, max_amount) = (self.config.virus.min_amount, self.config.virus.max_amount);
        let size = self.config.virus.min_size as f32;
        while self.viruses.len() < min_amount.min(max_amount) {
            let position = self.border.random_position();
            let id = self.next_id();
            self.insert(Entity::virus(id, position, size, self.tick));
        }
    }

    /// Fill food and viruses up to their minimum populations at once.
    pub fn populate(&mut self) {
        loop {
            let before = self.food.len();
            if before >= self.config.food.min_amount {
                break;
            }
            self.spawn_food();
            if self.food.len() == before {
                break;
            }
        }
        self.spawn_viruses();
    }

    /// Clear `needs_update` once every player has observed the tick.
    pub fn clear_updates(&mut self) {
        for entity in self.entities.values_mut() {
            entity.needs_update = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::size_to_mass;

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.border.width = 2000.0;
        config.border.height = 2000.0;
        config.food.min_amount = 0;
        config.food.max_amount = 0;
        config.virus.min_amount = 0;
        config
    }

    fn place_cell(world: &mut World, owner: ClientId, position: Vec2, size: f32) -> EntityId {
        let id = world.next_id();
        world.insert(Entity::player_cell(id, owner, position, size, Color::new(200, 10, 10), world.tick_count()))
    }

    fn no_targets() -> HashMap<ClientId, Vec2> {
        HashMap::new()
    }

    #[test]
    fn test_id_list_swap_remove() {
        let mut list = IdList::default();
        for id in 1..=4 {
            list.push(id);
        }
        list.push(2);
        assert_eq!(list.len(), 4);
        assert!(list.remove(1));
        assert!(!list.remove(1));
        assert_eq!(list.as_slice(), &[4, 2, 3]);
        assert!(list.remove(3));
        assert!(list.contains(4));
        assert!(!list.contains(3));
    }

    #[test]
    fn test_next_id_skips_zero() {
        let mut world = World::new(&quiet_config());
        world.next_node_id = u32::MAX;
        assert_eq!(world.next_id(), u32::MAX);
        assert_eq!(world.next_id(), 1);
    }

    #[test]
    fn test_spawn_and_release_owner() {
        let mut world = World::new(&quiet_config());
        let id = world.spawn_player_cell(3, Color::new(90, 90, 90));
        assert_eq!(world.cells_of(3), &[id]);
        assert!(world.quad_tree().contains(id));

        assert_eq!(world.release_owner(3), 1);
        assert!(world.cells_of(3).is_empty());
        assert!(world.get(id).is_none());
        assert!(world.quad_tree().is_empty());
        assert!(world.player_cells.is_empty());
    }

    #[test]
    fn test_split_conserves_mass_and_adds_cell() {
        let mut world = World::new(&quiet_config());
        let id = place_cell(&mut world, 1, Vec2::ZERO, 200.0);
        let before = world.get(id).unwrap().mass();

        let created = world.split_cells(1, Vec2::new(500.0, 0.0));
        assert_eq!(created.len(), 1);
        assert_eq!(world.cells_of(1).len(), 2);

        let child = world.get(created[0]).unwrap();
        let parent = world.get(id).unwrap();
        assert!((child.mass() + parent.mass() - before).abs() < 0.1);
        assert_eq!(child.boost.unwrap().direction, Vec2::X);
        assert_eq!(world.player_cells.len(), 2);
    }

    #[test]
    fn test_split_loss() {
        let mut config = quiet_config();
        config.player.split_loss = 0.1;
        let mut world = World::new(&config);
        let id = place_cell(&mut world, 1, Vec2::ZERO, 200.0);

        let created = world.split_cells(1, Vec2::ZERO);
        let total = world.get(id).unwrap().mass() + world.get(created[0]).unwrap().mass();
        assert!((total - size_to_mass(200.0) * 0.9).abs() < 0.1);
    }

    #[test]
    fn test_split_rules() {
        let mut config = quiet_config();
        config.player.max_cells = 2;
        let mut world = World::new(&config);
        place_cell(&mut world, 1, Vec2::ZERO, 200.0);
        place_cell(&mut world, 1, Vec2::new(500.0, 0.0), 200.0);
        assert!(world.split_cells(1, Vec2::ZERO).is_empty());

        place_cell(&mut world, 2, Vec2::new(-500.0, 0.0), 40.0);
        assert!(world.split_cells(2, Vec2::ZERO).is_empty());
    }

    #[test]
    fn test_eject_shrinks_cell_and_fires_pellet() {
        let mut world = World::new(&quiet_config());
        let id = place_cell(&mut world, 1, Vec2::ZERO, 100.0);
        let created = world.eject_mass(1, Vec2::new(0.0, 300.0));
        assert_eq!(created.len(), 1);

        let pellet = world.get(created[0]).unwrap();
        assert_eq!(pellet.kind(), Kind::Ejected);
        assert_eq!(pellet.owner, None);
        assert!(pellet.position().y > 0.0);
        assert!(world.moving.contains(created[0]));
        assert!(world.get(id).unwrap().size() < 100.0);

        place_cell(&mut world, 2, Vec2::new(600.0, 0.0), 40.0);
        assert!(world.eject_mass(2, Vec2::ZERO).is_empty());
    }

    #[test]
    fn test_cell_eats_food() {
        let mut world = World::new(&quiet_config());
        let cell = place_cell(&mut world, 1, Vec2::ZERO, 100.0);
        let food_id = world.next_id();
        world.insert(Entity::food(food_id, Vec2::new(10.0, 0.0), 10.0, Color::default(), 0));
        let before = world.get(cell).unwrap().mass();

        world.tick(&no_targets());

        assert!(world.get(food_id).is_none());
        assert!(!world.quad_tree().contains(food_id));
        assert_eq!(world.killer_of(food_id), Some(cell));
        assert!((world.get(cell).unwrap().mass() - (before + 1.0)).abs() < 0.01);

        world.tick(&no_targets());
        assert_eq!(world.killer_of(food_id), None);
    }

    #[test]
    fn test_absorb_fraction_applies_to_foreign_prey() {
        let mut config = quiet_config();
        config.player.absorb_fraction = 0.5;
        let mut world = World::new(&config);
        let big = place_cell(&mut world, 1, Vec2::ZERO, 200.0);
        let small = place_cell(&mut world, 2, Vec2::new(20.0, 0.0), 100.0);

        world.tick(&no_targets());

        assert!(world.get(small).is_none());
        assert_eq!(world.killer_of(small), Some(big));
        assert!(world.cells_of(2).is_empty());
        assert!((world.get(big).unwrap().mass() - 450.0).abs() < 0.1);
    }

    #[test]
    fn test_young_siblings_are_pushed_apart() {
        let mut world = World::new(&quiet_config());
        let a = place_cell(&mut world, 1, Vec2::ZERO, 50.0);
        let b = place_cell(&mut world, 1, Vec2::new(60.0, 0.0), 50.0);

        world.tick(&no_targets());

        let pa = world.get(a).unwrap().position();
        let pb = world.get(b).unwrap().position();
        assert!((pa.distance(pb) - 100.0).abs() < 0.01);
        assert!((pa.x + 20.0).abs() < 0.01);
        assert_eq!(world.quad_tree().get(a), Some(world.get(a).unwrap().bounds()));
    }

    #[test]
    fn test_siblings_merge_after_restore_ticks() {
        let mut config = quiet_config();
        config.player.merge_time = 0.0;
        let mut world = World::new(&config);
        let big = place_cell(&mut world, 1, Vec2::ZERO, 60.0);
        let small = place_cell(&mut world, 1, Vec2::ZERO, 50.0);
        let total = size_to_mass(60.0) + size_to_mass(50.0);

        for _ in 0..12 {
            world.tick(&no_targets());
        }
        assert_eq!(world.cells_of(1).len(), 2);

        world.tick(&no_targets());
        assert_eq!(world.cells_of(1), &[big]);
        assert_eq!(world.killer_of(small), Some(big));
        assert!((world.get(big).unwrap().mass() - total).abs() < 0.1);
    }

    #[test]
    fn test_virus_pops_large_cell() {
        let mut world = World::new(&quiet_config());
        let cell = place_cell(&mut world, 1, Vec2::ZERO, 300.0);
        let virus_id = world.next_id();
        world.insert(Entity::virus(virus_id, Vec2::new(20.0, 0.0), 100.0, 0));

        let report = world.tick(&no_targets());

        assert!(world.get(virus_id).is_none());
        assert_eq!(world.killer_of(virus_id), Some(cell));
        assert!(!report.new_owned.is_empty());
        assert_eq!(world.cells_of(1).len(), 1 + report.new_owned.len());
        assert!(report.new_owned.iter().all(|&(owner, _)| owner == 1));
    }

    #[test]
    fn test_fed_virus_shoots_new_virus() {
        let mut world = World::new(&quiet_config());
        let virus_id = world.next_id();
        world.insert(Entity::virus(virus_id, Vec2::ZERO, 140.0, 0));
        let pellet_id = world.next_id();
        let mut pellet = Entity::ejected(pellet_id, Vec2::new(-10.0, 0.0), 36.0, Color::default(), 0);
        pellet.set_boost(5.0, Vec2::X);
        world.insert(pellet);

        // Grace age keeps the pellet alive for the first tick.
        world.tick(&no_targets());
        assert!(world.get(pellet_id).is_some());

        world.tick(&no_targets());
        assert_eq!(world.killer_of(pellet_id), Some(virus_id));
        assert_eq!(world.get(virus_id).unwrap().size(), 100.0);
        assert_eq!(world.viruses.len(), 2);

        let shot = world.viruses.as_slice().iter().copied().find(|&id| id != virus_id).unwrap();
        assert_eq!(world.get(shot).unwrap().boost.unwrap().direction, Vec2::X);
        assert!(world.moving.contains(shot));
    }

    #[test]
    fn test_cell_follows_target() {
        let mut world = World::new(&quiet_config());
        let cell = place_cell(&mut world, 1, Vec2::ZERO, 50.0);
        let targets = HashMap::from([(1, Vec2::new(500.0, 0.0))]);

        world.tick(&targets);

        let entity = world.get(cell).unwrap();
        assert!(entity.position().x > 0.0);
        assert!(entity.needs_update);
        assert_eq!(world.quad_tree().get(cell), Some(entity.bounds()));

        world.clear_updates();
        assert!(world.entities().all(|e| !e.needs_update));
    }

    #[test]
    fn test_decay_every_25_ticks() {
        let mut world = World::new(&quiet_config());
        let cell = place_cell(&mut world, 1, Vec2::ZERO, 500.0);
        for _ in 0..24 {
            world.tick(&no_targets());
        }
        assert_eq!(world.get(cell).unwrap().size(), 500.0);
        world.tick(&no_targets());
        assert!(world.get(cell).unwrap().size() < 500.0);
    }

    #[test]
    fn test_spawns_populations() {
        let mut config = quiet_config();
        config.food.min_amount = 10;
        config.food.max_amount = 20;
        config.food.spawn_amount = 4;
        config.virus.min_amount = 3;
        let mut world = World::new(&config);

        world.tick(&no_targets());
        assert_eq!(world.food.len(), 8);
        assert_eq!(world.viruses.len(), 3);
        assert_eq!(world.quad_tree().len(), 11);
    }

    #[test]
    fn test_populate_reaches_minimums() {
        let mut config = quiet_config();
        config.food.min_amount = 100;
        config.food.max_amount = 200;
        config.food.spawn_amount = 7;
        config.virus.min_amount = 5;
        let mut world = World::new(&config);

        world.populate();
        assert_eq!(world.food.len(), 100);
        assert_eq!(world.viruses.len(), 5);
    }
}
