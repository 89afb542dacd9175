//! Session roster: endpoint bindings, pending joins, host election, and
//! lobby configuration. Owned exclusively by the game thread.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use starlance::ecs::{Entity, Registry};
use starlance::game::components::{
    ChargeGun, ColorRgba, IsPlayer, Lives, Name, NetType, PlayerInput, Score, Shooter, ShipType,
    Size, Transform, Velocity,
};
use starlance::net::protocol::EntityKind;

pub const SHIP_SLOTS: u8 = 5;

const PLAYER_COLOR: u32 = 0x55AAFFFF;
const SPAWN_X: f32 = 50.0;
const SPAWN_Y_BASE: f32 = 100.0;
const SPAWN_Y_STEP: f32 = 40.0;

/// A player created at stream handshake, waiting for its first datagram.
#[derive(Debug, Clone, Copy)]
pub struct PendingPlayer {
    pub entity: Entity,
    pub token: u32,
}

/// Outcome of a client removal, for the broadcaster to act on.
#[derive(Debug, Clone, Copy)]
pub struct RemovedClient {
    pub entity: Entity,
    pub was_host: bool,
    pub remaining: usize,
    /// The match was running and fell below two players.
    pub stop_game: bool,
    pub all_gone: bool,
}

pub struct SessionState {
    endpoint_to_player: HashMap<String, Entity>,
    key_to_endpoint: HashMap<String, SocketAddr>,
    last_seen: HashMap<String, Instant>,
    pending_by_ip: HashMap<IpAddr, PendingPlayer>,
    pub host: Option<Entity>,
    pub game_started: bool,
    pub base_lives: u8,
    pub difficulty: u8,
    pub last_team_score: i32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            endpoint_to_player: HashMap::new(),
            key_to_endpoint: HashMap::new(),
            last_seen: HashMap::new(),
            pending_by_ip: HashMap::new(),
            host: None,
            game_started: false,
            base_lives: 4,
            difficulty: 1,
            last_team_score: 0,
        }
    }

    pub fn key_for(addr: SocketAddr) -> String {
        format!("{}:{}", addr.ip(), addr.port())
    }

    /// Players known to the session, bound or still pending.
    pub fn player_total(&self) -> usize {
        self.endpoint_to_player.len() + self.pending_by_ip.len()
    }

    pub fn bound_count(&self) -> usize {
        self.endpoint_to_player.len()
    }

    pub fn host_id(&self) -> u32 {
        self.host.map(|e| e.id()).unwrap_or(0)
    }

    /// Creates the player entity for a completed stream handshake and
    /// parks it until the first datagram binds the endpoint. Returns
    /// `None` when the session is full.
    pub fn create_player(
        &mut self,
        registry: &mut Registry,
        name: &str,
        ip: IpAddr,
        token: u32,
        max_players: usize,
    ) -> Option<Entity> {
        if registry.count::<IsPlayer>() >= max_players {
            log::info!("join rejected: session full ({} players)", max_players);
            return None;
        }

        let ship = self.free_ship_slot(registry);
        let spawn_index = self.pending_by_ip.len();

        let entity = registry.create();
        registry.emplace(
            entity,
            Transform::new(SPAWN_X, SPAWN_Y_BASE + spawn_index as f32 * SPAWN_Y_STEP),
        );
        registry.emplace(entity, Velocity::default());
        registry.emplace(entity, NetType(EntityKind::Player));
        registry.emplace(entity, IsPlayer);
        registry.emplace(entity, ShipType { value: ship });
        registry.emplace(entity, ColorRgba(PLAYER_COLOR));
        registry.emplace(entity, PlayerInput::default());
        registry.emplace(entity, Shooter::default());
        registry.emplace(entity, ChargeGun::default());
        registry.emplace(entity, Size::new(20.0, 12.0));
        registry.emplace(entity, Score::default());
        registry.emplace(
            entity,
            Lives {
                value: self.base_lives,
            },
        );
        let display_name = if name.is_empty() {
            format!("Player{}", entity.id())
        } else {
            name.to_string()
        };
        registry.emplace(entity, Name {
            value: display_name.clone(),
        });

        if self.host.is_none() {
            self.host = Some(entity);
            log::info!(
                "first player assigned as host: id={} name='{}'",
                entity.id(),
                display_name
            );
        }

        self.pending_by_ip.insert(ip, PendingPlayer { entity, token });
        Some(entity)
    }

    /// Lowest ship slot not used by a live player.
    fn free_ship_slot(&self, registry: &Registry) -> u8 {
        let mut used = [false; SHIP_SLOTS as usize];
        for (_, ship) in registry.iter::<ShipType>() {
            if ship.value < SHIP_SLOTS {
                used[ship.value as usize] = true;
            }
        }
        used.iter()
            .position(|taken| !taken)
            .map(|slot| slot as u8)
            .unwrap_or(SHIP_SLOTS - 1)
    }

    pub fn pending_for_ip(&self, ip: IpAddr) -> Option<PendingPlayer> {
        self.pending_by_ip.get(&ip).copied()
    }

    pub fn take_pending(&mut self, ip: IpAddr) -> Option<PendingPlayer> {
        self.pending_by_ip.remove(&ip)
    }

    /// Binds a full endpoint to a player entity.
    pub fn bind(&mut self, from: SocketAddr, entity: Entity, now: Instant) {
        let key = Self::key_for(from);
        self.endpoint_to_player.insert(key.clone(), entity);
        self.key_to_endpoint.insert(key.clone(), from);
        self.last_seen.insert(key, now);
        log::info!("player udp bound: id={} from {}", entity.id(), from);
    }

    pub fn player_at(&self, addr: SocketAddr) -> Option<Entity> {
        self.endpoint_to_player.get(&Self::key_for(addr)).copied()
    }

    pub fn touch(&mut self, addr: SocketAddr, now: Instant) {
        if let Some(seen) = self.last_seen.get_mut(&Self::key_for(addr)) {
            *seen = now;
        }
    }

    pub fn timed_out_keys(&self, now: Instant, timeout: Duration) -> Vec<String> {
        self.last_seen
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) > timeout)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn endpoints(&self) -> Vec<SocketAddr> {
        self.key_to_endpoint.values().copied().collect()
    }

    /// Bound player entities in ascending id order.
    pub fn bound_players(&self) -> Vec<Entity> {
        let mut players: Vec<Entity> = self.endpoint_to_player.values().copied().collect();
        players.sort();
        players
    }

    pub fn remove_addr(&mut self, addr: SocketAddr) -> Option<RemovedClient> {
        self.remove_key(&Self::key_for(addr))
    }

    /// Removes a bound client and settles host election and match state.
    /// Safe to call twice; the second call finds nothing.
    pub fn remove_key(&mut self, key: &str) -> Option<RemovedClient> {
        let entity = self.endpoint_to_player.remove(key)?;
        self.key_to_endpoint.remove(key);
        self.last_seen.remove(key);

        let was_host = self.host == Some(entity);
        let remaining = self.endpoint_to_player.len();

        if was_host {
            self.host = self.endpoint_to_player.values().next().copied();
            if let Some(new_host) = self.host {
                log::info!("new host assigned: id={}", new_host.id());
            }
        }

        let all_gone = remaining == 0;
        if all_gone {
            self.host = None;
            self.game_started = false;
        }

        let stop_game = remaining == 1 && self.game_started;
        if stop_game {
            self.game_started = false;
        }

        Some(RemovedClient {
            entity,
            was_host,
            remaining,
            stop_game,
            all_gone,
        })
    }

    pub fn set_lobby_config(&mut self, base_lives: u8, difficulty: u8) {
        self.base_lives = base_lives.clamp(1, 6);
        self.difficulty = difficulty.min(2);
        log::info!(
            "host changed lobby: difficulty={} base_lives={}",
            self.difficulty,
            self.base_lives
        );
    }
}
