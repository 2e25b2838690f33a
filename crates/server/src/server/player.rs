//! Player session state.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use bytes::Bytes;
use glam::Vec2;
use protocol::{Color, EatRecord, NodeRecord, Protocol};
use tokio::sync::mpsc;

use crate::config::PlayerConfig;
use crate::entity::{ClientId, Entity, EntityId, Kind};
use crate::spatial::Bounds;
use crate::world::World;

/// Name given to players that do not pick one.
pub const DEFAULT_NAME: &str = "An unnamed cell";

/// Free-roam camera speed in world units per tick at scale 1.
const FREE_ROAM_SPEED: f32 = 32.0;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Connected, waiting to spawn (or respawn).
    #[default]
    Spawning,
    Playing,
    /// Following the leader's camera.
    Spectating,
    /// Spectating with a freely moving camera.
    FreeRoam,
    Disconnected,
}

impl PlayerState {
    pub fn on_spawn(self) -> Option<Self> {
        match self {
            Self::Playing | Self::Disconnected => None,
            _ => Some(Self::Playing),
        }
    }

    pub fn on_spectate(self) -> Option<Self> {
        match self {
            Self::Playing | Self::Disconnected => None,
            _ => Some(Self::Spectating),
        }
    }

    pub fn on_qkey(self) -> Option<Self> {
        match self {
            Self::Spectating => Some(Self::FreeRoam),
            Self::FreeRoam => Some(Self::Spectating),
            _ => None,
        }
    }

    /// Last owned cell is gone.
    pub fn on_cells_lost(self) -> Option<Self> {
        match self {
            Self::Playing => Some(Self::Spawning),
            _ => None,
        }
    }

    pub fn on_disconnect(self) -> Option<Self> {
        match self {
            Self::Disconnected => None,
            _ => Some(Self::Disconnected),
        }
    }

    #[inline]
    pub fn is_spectator(self) -> bool {
        matches!(self, Self::Spectating | Self::FreeRoam)
    }
}

/// Something the connection task has to do on the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Packet(Bytes),
    Close { code: u16, reason: String },
}

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

/// Name and skin drawn on a player's cells.
#[derive(Debug, Clone, Default)]
pub struct Label {
    pub name: String,
    pub skin: Option<String>,
}

/// Per-tick visibility delta. The four lists are disjoint.
#[derive(Debug, Default, PartialEq)]
pub struct ViewDiff {
    pub add: Vec<EntityId>,
    pub update: Vec<EntityId>,
    pub eat: Vec<EatRecord>,
    pub delete: Vec<EntityId>,
}

impl ViewDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.eat.is_empty() && self.delete.is_empty()
    }
}

/// A connected player.
#[derive(Debug)]
pub struct Player {
    pub id: ClientId,
    pub addr: SocketAddr,
    outbox: Outbox,

    /// Negotiated protocol, set by the first handshake packet.
    pub protocol: Option<Protocol>,
    /// Whether the connection key has been received.
    pub handshake_complete: bool,

    pub name: String,
    pub skin: Option<String>,
    pub color: Color,
    /// Mouse position in world coordinates.
    pub target: Vec2,
    pub state: PlayerState,

    pub center: Vec2,
    pub scale: f32,
    pub filtered_scale: f32,
    /// Sum of owned cell masses.
    pub score: f32,
    half_extents: Vec2,
    snap_camera: bool,
    /// Entities the client was sent last tick.
    visible: HashSet<EntityId>,

    pub last_eject_tick: u64,
}

impl Player {
    pub fn new(id: ClientId, addr: SocketAddr, outbox: Outbox) -> Self {
        Self {
            id,
            addr,
            outbox,
            protocol: None,
            handshake_complete: false,
            name: String::new(),
            skin: None,
            color: World::random_color(),
            target: Vec2::ZERO,
            state: PlayerState::Spawning,
            center: Vec2::ZERO,
            scale: 1.0,
            filtered_scale: 1.0,
            score: 0.0,
            half_extents: Vec2::ZERO,
            snap_camera: false,
            visible: HashSet::new(),
            last_eject_tick: 0,
        }
    }

    /// Whether the version handshake has happened.
    #[inline]
    pub fn is_established(&self) -> bool {
        self.protocol.is_some()
    }

    /// Queue a packet. Fire and forget: a closed connection drops it.
    pub fn send(&self, packet: Bytes) {
        let _ = self.outbox.send(Outbound::Packet(packet));
    }

    /// Ask the connection task to close the socket.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outbox.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.protocol.unwrap_or_default()
    }

    #[inline]
    pub fn visible(&self) -> &HashSet<EntityId> {
        &self.visible
    }

    pub fn label(&self) -> Label {
        Label {
            name: self.name.clone(),
            skin: self.skin.clone(),
        }
    }

    /// Snap the camera onto the cells on the next update.
    pub fn snap_camera(&mut self) {
        self.snap_camera = true;
    }

    /// Region the client can see.
    pub fn view_bounds(&self) -> Bounds {
        Bounds::new(
            self.center.x - self.half_extents.x,
            self.center.y - self.half_extents.y,
            self.center.x + self.half_extents.x,
            self.center.y + self.half_extents.y,
        )
    }

    fn set_view_box(&mut self, view: &PlayerConfig) {
        self.half_extents = Vec2::new(
            view.view_box_width as f32 / self.filtered_scale / 2.0,
            view.view_box_height as f32 / self.filtered_scale / 2.0,
        );
    }

    /// Recompute score, scale and center from the owned cells.
    pub fn update_camera(&mut self, world: &World, view: &PlayerConfig) {
        let min_scale = view.min_view_box_scale as f32;
        let mut total_size = 0.0;
        let mut score = 0.0;
        let mut centroid = Vec2::ZERO;
        let mut count = 0;
        for cell in world.cells_of(self.id).iter().filter_map(|&id| world.get(id)) {
            total_size += cell.size();
            score += cell.mass();
            centroid += cell.position();
            count += 1;
        }

        self.score = score;
        self.scale = if total_size > 0.0 {
            (64.0 / total_size).min(1.0).powf(0.4).max(min_scale)
        } else {
            min_scale
        };
        self.filtered_scale = (9.0 * self.filtered_scale + self.scale.max(min_scale)) / 10.0;

        if count > 0 {
            let centroid = centroid / count as f32;
            if self.snap_camera {
                self.center = centroid;
                self.snap_camera = false;
            } else {
                self.center = (9.0 * self.center + centroid) / 10.0;
            }
        }
        self.set_view_box(view);
    }

    /// Move a spectator's camera. `leader` is the center and scale of the
    /// top player, if any.
    pub fn update_spectator_camera(&mut self, leader: Option<(Vec2, f32)>, view: &PlayerConfig) {
        let min_scale = view.min_view_box_scale as f32;
        match self.state {
            PlayerState::Spectating => {
                if let Some((center, scale)) = leader {
                    self.center = center;
                    self.scale = scale;
                }
            }
            PlayerState::FreeRoam => {
                let delta = self.target - self.center;
                if delta.length_squared() > 1.0 {
                    self.center += delta.clamp_length_max(FREE_ROAM_SPEED / self.scale.max(min_scale));
                }
            }
            _ => return,
        }
        self.scale = self.scale.max(min_scale);
        self.filtered_scale = self.scale;
        self.score = 0.0;
        self.set_view_box(view);
    }

    /// Diff the current view against the previous visible set. Returns the
    /// diff and the new visible set.
    pub fn compute_diff(&self, world: &World) -> (ViewDiff, HashSet<EntityId>) {
        let mut visible: HashSet<EntityId> = world.query(&self.view_bounds()).into_iter().collect();
        visible.extend(world.cells_of(self.id).iter().copied());

        let mut diff = ViewDiff::default();
        for &id in &visible {
            if !self.visible.contains(&id) {
                diff.add.push(id);
            } else if world.get(id).is_some_and(|e| e.needs_update) {
                diff.update.push(id);
            }
        }
        for &id in &self.visible {
            if visible.contains(&id) {
                continue;
            }
            match world.killer_of(id) {
                Some(eater) if eater != 0 => diff.eat.push(EatRecord { eater, eaten: id }),
                _ => diff.delete.push(id),
            }
        }
        (diff, visible)
    }

    /// Send this tick's UpdateNodes, if anything changed. Returns whether a
    /// packet was queued.
    pub fn sync_view(&mut self, world: &World, labels: &HashMap<ClientId, Label>) -> bool {
        let (diff, visible) = self.compute_diff(world);
        self.visible = visible;
        if diff.is_empty() {
            return false;
        }

        let records = |ids: &[EntityId], with_labels: bool| -> Vec<NodeRecord> {
            ids.iter()
                .filter_map(|&id| world.get(id))
                .map(|entity| node_record(entity, if with_labels { Some(labels) } else { None }))
                .collect()
        };
        let add = records(&diff.add, true);
        let update = records(&diff.update, false);
        self.send(self.protocol().encode_update_nodes(&diff.eat, &update, &diff.delete, &add));
        true
    }

    /// Forget everything the client was sent, after a ClearAll.
    pub fn clear_visible(&mut self) {
        self.visible.clear();
    }
}

/// Wire record of an entity. Player cells carry their owner's label.
pub fn node_record(entity: &Entity, labels: Option<&HashMap<ClientId, Label>>) -> NodeRecord {
    let label = match (entity.kind(), entity.owner, labels) {
        (Kind::PlayerCell, Some(owner), Some(labels)) => labels.get(&owner),
        _ => None,
    };
    let position = entity.position();
    NodeRecord {
        id: entity.id,
        x: position.x as i32,
        y: position.y as i32,
        size: entity.size() as u16,
        color: entity.color(),
        kind: entity.kind().into(),
        name: label.map(|l| l.name.clone()),
        skin: label.and_then(|l| l.skin.clone()),
    }
}

/// Split a spawn string of the form `<skin>name`. Trailing NULs are
/// stripped and both parts are cut to `max_len` characters.
pub fn parse_name(input: &str, max_len: usize) -> (String, Option<String>) {
    let input = input.trim_end_matches('\0');
    let (skin, name) = match input.strip_prefix('<').and_then(|rest| rest.split_once('>')) {
        Some((skin, name)) => (Some(skin), name),
        None => (None, input),
    };

    let name: String = name.chars().take(max_len).collect();
    let name = if name.is_empty() { DEFAULT_NAME.to_string() } else { name };
    let skin = skin
        .map(|s| s.chars().take(max_len).collect::<String>())
        .filter(|s| !s.is_empty());
    (name, skin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.border.width = 4000.0;
        config.border.height = 4000.0;
        config.food.min_amount = 0;
        config.food.max_amount = 0;
        config.virus.min_amount = 0;
        config
    }

    fn player(id: ClientId) -> (Player, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut player = Player::new(id, "127.0.0.1:1000".parse().unwrap(), tx);
        player.protocol = Some(Protocol::for_version(6).0);
        (player, rx)
    }

    fn place(world: &mut World, entity: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = world.next_id();
        world.insert(entity(id))
    }

    #[test]
    fn test_state_machine() {
        use PlayerState::*;
        assert_eq!(Spawning.on_spawn(), Some(Playing));
        assert_eq!(Spectating.on_spawn(), Some(Playing));
        assert_eq!(Playing.on_spawn(), None);
        assert_eq!(Playing.on_spectate(), None);
        assert_eq!(Spawning.on_spectate(), Some(Spectating));
        assert_eq!(Spectating.on_qkey(), Some(FreeRoam));
        assert_eq!(FreeRoam.on_qkey(), Some(Spectating));
        assert_eq!(Playing.on_qkey(), None);
        assert_eq!(Playing.on_cells_lost(), Some(Spawning));
        assert_eq!(Spectating.on_cells_lost(), None);
        assert_eq!(FreeRoam.on_disconnect(), Some(Disconnected));

        for next in [
            Disconnected.on_spawn(),
            Disconnected.on_spectate(),
            Disconnected.on_qkey(),
            Disconnected.on_cells_lost(),
            Disconnected.on_disconnect(),
        ] {
            assert_eq!(next, None);
        }
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(parse_name("Bob", 15), ("Bob".to_string(), None));
        assert_eq!(parse_name("<doge>Bob\0", 15), ("Bob".to_string(), Some("doge".to_string())));
        assert_eq!(parse_name("", 15), (DEFAULT_NAME.to_string(), None));
        assert_eq!(parse_name("<>", 15), (DEFAULT_NAME.to_string(), None));
        assert_eq!(parse_name("abcdefghijklmnopq", 15).0, "abcdefghijklmno");
        assert_eq!(parse_name("<unclosed", 15).0, "<unclosed");
    }

    #[test]
    fn test_scale_shrinks_with_size_and_is_bounded() {
        let config = quiet_config();
        let mut previous = f32::MAX;
        for size in [32.0, 100.0, 400.0, 1500.0] {
            let mut world = World::new(&config);
            let (mut p, _rx) = player(1);
            place(&mut world, |id| Entity::player_cell(id, 1, Vec2::ZERO, size, Color::default(), 0));
            p.update_camera(&world, &config.player);
            assert!(p.scale <= previous);
            assert!(p.scale >= 0.15);
            previous = p.scale;
        }

        let world = World::new(&config);
        let (mut p, _rx) = player(1);
        p.update_camera(&world, &config.player);
        assert_eq!(p.scale, 0.15);
        assert_eq!(p.score, 0.0);
    }

    #[test]
    fn test_camera_snaps_then_eases() {
        let config = quiet_config();
        let mut world = World::new(&config);
        place(&mut world, |id| Entity::player_cell(id, 1, Vec2::new(100.0, 50.0), 40.0, Color::default(), 0));
        let (mut p, _rx) = player(1);

        p.snap_camera();
        p.update_camera(&world, &config.player);
        assert_eq!(p.center, Vec2::new(100.0, 50.0));
        assert!((p.score - 16.0).abs() < 0.01);

        world.release_owner(1);
        place(&mut world, |id| Entity::player_cell(id, 1, Vec2::new(200.0, 50.0), 40.0, Color::default(), 0));
        p.update_camera(&world, &config.player);
        assert_eq!(p.center, Vec2::new(110.0, 50.0));
    }

    #[test]
    fn test_diff_categories() {
        let config = quiet_config();
        let mut world = World::new(&config);
        let own = place(&mut world, |id| Entity::player_cell(id, 1, Vec2::ZERO, 100.0, Color::default(), 0));
        let food = place(&mut world, |id| Entity::food(id, Vec2::new(10.0, 0.0), 10.0, Color::default(), 0));
        let far_food = place(&mut world, |id| Entity::food(id, Vec2::new(300.0, 0.0), 10.0, Color::default(), 0));
        let rival = place(&mut world, |id| Entity::player_cell(id, 2, Vec2::new(-300.0, 0.0), 40.0, Color::default(), 0));

        let (mut p, mut rx) = player(1);
        p.snap_camera();
        p.update_camera(&world, &config.player);
        let (diff, visible) = p.compute_diff(&world);
        assert_eq!(diff.add.len(), 4);
        assert_eq!(visible.len(), 4);
        assert!(p.sync_view(&world, &HashMap::new()));
        assert!(matches!(rx.try_recv(), Ok(Outbound::Packet(_))));
        world.clear_updates();

        // The food is eaten, the rival disconnects, the far food is untouched.
        world.tick(&HashMap::new());
        world.release_owner(2);
        let (diff, visible) = p.compute_diff(&world);

        assert!(diff.add.is_empty());
        assert_eq!(diff.update, vec![own]);
        assert_eq!(diff.eat, vec![EatRecord { eater: own, eaten: food }]);
        assert_eq!(diff.delete, vec![rival]);
        assert!(visible.contains(&far_food));
        assert!(!visible.contains(&food));

        let (diff, _) = p.compute_diff(&world);
        let mut all: Vec<EntityId> = diff.add.iter().chain(&diff.update).chain(&diff.delete).copied().collect();
        all.extend(diff.eat.iter().map(|e| e.eaten));
        let unique: HashSet<EntityId> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_no_packet_when_nothing_changed() {
        let config = quiet_config();
        let mut world = World::new(&config);
        place(&mut world, |id| Entity::food(id, Vec2::ZERO, 10.0, Color::default(), 0));
        let (mut p, mut rx) = player(1);
        p.state = PlayerState::Spectating;
        p.update_spectator_camera(None, &config.player);

        assert!(p.sync_view(&world, &HashMap::new()));
        world.clear_updates();
        assert!(rx.try_recv().is_ok());

        assert!(!p.sync_view(&world, &HashMap::new()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_own_cells_always_visible() {
        let config = quiet_config();
        let mut world = World::new(&config);
        let own = place(&mut world, |id| Entity::player_cell(id, 1, Vec2::new(1500.0, 1500.0), 40.0, Color::default(), 0));
        let (p, _rx) = player(1);
        assert!(p.view_bounds().is_degenerate());

        let (diff, visible) = p.compute_diff(&world);
        assert_eq!(diff.add, vec![own]);
        assert!(visible.contains(&own));
    }

    #[test]
    fn test_node_record_labels() {
        let cell = Entity::player_cell(5, 1, Vec2::new(10.7, -3.2), 40.5, Color::new(1, 2, 3), 0);
        let labels = HashMap::from([(
            1,
            Label {
                name: "Bob".into(),
                skin: Some("doge".into()),
            },
        )]);

        let record = node_record(&cell, Some(&labels));
        assert_eq!((record.id, record.x, record.y, record.size), (5, 10, -3, 40));
        assert_eq!(record.name.as_deref(), Some("Bob"));
        assert_eq!(record.skin.as_deref(), Some("doge"));
        assert_eq!(node_record(&cell, None).name, None);
    }
}
