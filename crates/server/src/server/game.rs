//! Game state and main loop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use glam::Vec2;
use protocol::LeaderboardEntry;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, info, warn};

use super::player::{Label, Outbox, Player, PlayerState, parse_name};
use crate::config::Config;
use crate::entity::ClientId;
use crate::world::World;

/// Ticks between two leaderboard broadcasts.
const LEADERBOARD_INTERVAL: u64 = 25;
/// Entries shown on the leaderboard.
const LEADERBOARD_SIZE: usize = 10;

/// Main game state. Packet handling and ticks both run under the write
/// lock of the shared `RwLock<GameState>`.
pub struct GameState {
    pub config: Config,
    pub world: World,
    pub players: HashMap<ClientId, Player>,

    next_client_id: ClientId,
    last_lb_tick: u64,

    /// Average tick duration in milliseconds (exponential moving average).
    pub update_time_avg: f64,
}

impl GameState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            world: World::new(config),
            players: HashMap::new(),
            next_client_id: 1,
            last_lb_tick: 0,
            update_time_avg: 0.0,
        }
    }

    /// Register a new connection.
    pub fn connect(&mut self, addr: SocketAddr, outbox: Outbox) -> ClientId {
        let id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1).max(1);
        self.players.insert(id, Player::new(id, addr, outbox));
        info!("Client {} connected from {}", id, addr);
        id
    }

    /// Drop a connection and release its cells at once.
    pub fn disconnect(&mut self, id: ClientId) {
        let Some(mut player) = self.players.remove(&id) else {
            return;
        };
        if let Some(next) = player.state.on_disconnect() {
            player.state = next;
        }
        let released = self.world.release_owner(id);
        info!("Client {} ({}) disconnected, released {} cells", id, player.addr, released);
    }

    /// Connections that completed version negotiation.
    pub fn established(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.is_established())
    }

    pub(super) fn handle_spawn(&mut self, id: ClientId, raw_name: &str) {
        let max_len = self.config.player.max_name_length;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let Some(next) = player.state.on_spawn() else {
            debug!("Client {} cannot spawn while {:?}", id, player.state);
            return;
        };

        let (name, skin) = parse_name(raw_name, max_len);
        player.name = name;
        player.skin = skin;
        player.state = next;

        let cell = self.world.spawn_player_cell(id, player.color);
        let protocol = player.protocol();
        player.send(protocol.encode_clear_all());
        player.clear_visible();
        player.send(protocol.encode_add_node(cell));
        player.snap_camera();
        info!("Client {} spawned as {:?}", id, player.name);
    }

    pub(super) fn handle_spectate(&mut self, id: ClientId) {
        if let Some(player) = self.players.get_mut(&id) {
            if let Some(next) = player.state.on_spectate() {
                player.state = next;
            }
        }
    }

    pub(super) fn handle_qkey(&mut self, id: ClientId) {
        if let Some(player) = self.players.get_mut(&id) {
            if let Some(next) = player.state.on_qkey() {
                player.state = next;
            }
        }
    }

    pub(super) fn handle_target(&mut self, id: ClientId, x: i32, y: i32) {
        if let Some(player) = self.players.get_mut(&id) {
            player.target = Vec2::new(x as f32, y as f32);
        }
    }

    pub(super) fn handle_split(&mut self, id: ClientId) {
        let Some(player) = self.players.get(&id) else {
            return;
        };
        if player.state != PlayerState::Playing {
            return;
        }
        let protocol = player.protocol();
        let created = self.world.split_cells(id, player.target);
        for cell in created {
            player.send(protocol.encode_add_node(cell));
        }
    }

    pub(super) fn handle_eject(&mut self, id: ClientId) {
        let cooldown = self.config.eject.cooldown as u64;
        let tick = self.world.tick_count();
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player.state != PlayerState::Playing || tick.saturating_sub(player.last_eject_tick) < cooldown {
            return;
        }
        player.last_eject_tick = tick;
        self.world.eject_mass(id, player.target);
    }

    /// Center and scale of the highest-scoring player.
    fn leader_camera(&self) -> Option<(Vec2, f32)> {
        self.players
            .values()
            .filter(|p| p.state == PlayerState::Playing)
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .map(|p| (p.center, p.scale))
    }

    /// Playing players ordered by score, best first.
    pub fn leaderboard(&self) -> Vec<(ClientId, String)> {
        let mut ranked: Vec<&Player> = self
            .players
            .values()
            .filter(|p| p.state == PlayerState::Playing)
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
            .into_iter()
            .take(LEADERBOARD_SIZE)
            .map(|p| (p.id, p.name.clone()))
            .collect()
    }

    fn send_leaderboard(&self) {
        let ranked = self.leaderboard();
        for player in self.players.values().filter(|p| p.handshake_complete) {
            let entries: Vec<LeaderboardEntry> = ranked
                .iter()
                .map(|(id, name)| LeaderboardEntry {
                    is_me: *id == player.id,
                    name: name.clone(),
                })
                .collect();
            player.send(player.protocol().encode_leaderboard(&entries));
        }
    }

    /// Run one game tick and push every player's view.
    pub fn tick(&mut self) {
        let targets: HashMap<ClientId, Vec2> = self
            .players
            .values()
            .filter(|p| p.state == PlayerState::Playing)
            .map(|p| (p.id, p.target))
            .collect();

        let report = self.world.tick(&targets);
        for (owner, cell) in report.new_owned {
            if let Some(player) = self.players.get(&owner) {
                player.send(player.protocol().encode_add_node(cell));
            }
        }

        for player in self.players.values_mut() {
            if player.state != PlayerState::Playing {
                continue;
            }
            if self.world.cells_of(player.id).is_empty() {
                if let Some(next) = player.state.on_cells_lost() {
                    debug!("Client {} lost its last cell", player.id);
                    player.state = next;
                }
            } else {
                player.update_camera(&self.world, &self.config.player);
            }
        }

        let leader = self.leader_camera();
        let labels: HashMap<ClientId, Label> = self.players.values().map(|p| (p.id, p.label())).collect();
        for player in self.players.values_mut().filter(|p| p.handshake_complete) {
            if player.state.is_spectator() {
                player.update_spectator_camera(leader, &self.config.player);
                let packet = player
                    .protocol()
                    .encode_update_viewport(player.center.x, player.center.y, player.scale);
                player.send(packet);
            }
            player.sync_view(&self.world, &labels);
        }

        let tick = self.world.tick_count();
        if tick - self.last_lb_tick >= LEADERBOARD_INTERVAL {
            self.last_lb_tick = tick;
            self.send_leaderboard();
        }

        self.world.clear_updates();
    }
}

/// Run the main game loop.
pub async fn run_game_loop(state: Arc<RwLock<GameState>>, tick_interval_ms: u64) {
    let start = Instant::now() + Duration::from_millis(tick_interval_ms);
    let mut ticker = interval_at(start, Duration::from_millis(tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    {
        let mut game = state.write().await;
        game.world.populate();
        info!(
            "World initialized: {} food, {} viruses",
            game.world.food.len(),
            game.world.viruses.len()
        );
    }

    loop {
        let scheduled = ticker.tick().await;

        // Hibernate while nobody is connected.
        {
            let game = state.read().await;
            if game.players.is_empty() {
                drop(game);
                sleep(Duration::from_millis((tick_interval_ms * 4).max(100))).await;
                continue;
            }
        }

        // Drain the backlog so the tick runs against the latest inputs.
        let mut skipped = 0u32;
        while ticker.tick().now_or_never().is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!(
                "Skipped {} ticks to stay current (lag: {:?})",
                skipped,
                Instant::now().saturating_duration_since(scheduled)
            );
        }

        let mut game = state.write().await;
        let tick_start = std::time::Instant::now();
        game.tick();
        let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        game.update_time_avg = game.update_time_avg * 0.5 + tick_ms * 0.5;

        let tick_budget = tick_interval_ms as f64 * 0.9;
        if tick_ms > tick_budget {
            warn!(
                "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} players, {} entities",
                game.world.tick_count(),
                tick_ms,
                tick_budget,
                game.players.len(),
                game.world.len()
            );
        }
    }
}
