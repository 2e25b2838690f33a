//! Inbound packet dispatch and protocol negotiation.

use protocol::{BorderRect, Intent, Protocol, ProtocolError};
use tracing::{debug, info, trace, warn};

use super::game::GameState;
use super::player::PlayerState;
use crate::entity::ClientId;

/// WebSocket close code sent for an unsupported protocol version.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;

impl GameState {
    /// Decode and route one inbound packet. Malformed or unknown packets
    /// are dropped, as is everything from a rejected connection.
    pub fn handle_message(&mut self, id: ClientId, data: &[u8]) {
        let Some(player) = self.players.get(&id) else {
            return;
        };
        if player.state == PlayerState::Disconnected {
            return;
        }
        let decoded = match player.protocol {
            Some(protocol) => protocol.decode(data),
            None => Intent::decode_handshake(data),
        };
        match decoded {
            Ok(intent) => self.dispatch(id, intent),
            Err(e) => debug!("Dropping packet from client {}: {}", id, e),
        }
    }

    fn dispatch(&mut self, id: ClientId, intent: Intent) {
        match intent {
            Intent::EstablishConnection { version } => self.establish(id, version),
            Intent::ConnectionKey { .. } => self.complete_handshake(id),
            intent => {
                if !self.players.get(&id).is_some_and(|p| p.handshake_complete) {
                    trace!("Ignoring {:?} from client {} before handshake", intent, id);
                    return;
                }
                match intent {
                    Intent::Spawn { name } => self.handle_spawn(id, &name),
                    Intent::Spectate => self.handle_spectate(id),
                    Intent::SetTarget { x, y } => self.handle_target(id, x, y),
                    Intent::Split => self.handle_split(id),
                    Intent::Eject => self.handle_eject(id),
                    Intent::QKeyPressed => self.handle_qkey(id),
                    Intent::QKeyReleased => {}
                    Intent::Pong => debug!("Pong from client {}", id),
                    Intent::EstablishConnection { .. } | Intent::ConnectionKey { .. } => {}
                }
            }
        }
    }

    /// First handshake step: pick the revision for `version`.
    fn establish(&mut self, id: ClientId, version: u32) {
        let (min, max) = (
            self.config.server.min_supported_protocol,
            self.config.server.max_supported_protocol,
        );
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player.is_established() {
            debug!("Client {} repeated protocol negotiation", id);
            return;
        }
        if !(min..=max).contains(&version) {
            info!("Client {}: {}", id, ProtocolError::UnsupportedProtocol(version));
            player.state = PlayerState::Disconnected;
            player.close(CLOSE_PROTOCOL_ERROR, "Unsupported protocol");
            return;
        }

        let (protocol, exact) = Protocol::for_version(version);
        if !exact {
            warn!(
                "Client {} requested unmapped protocol {}, using {}",
                id,
                version,
                protocol.version()
            );
        }
        player.protocol = Some(protocol);
        debug!("Client {} negotiated protocol {}", id, protocol.version());
    }

    /// Second handshake step: answer the first key with ClearAll and
    /// SetBorder.
    fn complete_handshake(&mut self, id: ClientId) {
        let border = self.world.border;
        let game_type = self.config.server.game_type;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if !player.is_established() || player.handshake_complete {
            return;
        }
        player.handshake_complete = true;

        let protocol = player.protocol();
        let rect = BorderRect {
            min_x: border.min_x as f64,
            min_y: border.min_y as f64,
            max_x: border.max_x as f64,
            max_y: border.max_y as f64,
        };
        player.send(protocol.encode_clear_all());
        player.clear_visible();
        player.send(protocol.encode_set_border(rect, game_type, &self.config.server.name));
    }
}
