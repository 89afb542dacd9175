//! The authoritative game loop: drains network events, steps the
//! simulation at a fixed 60 Hz, and broadcasts snapshots at 20 Hz.
//!
//! The game thread is the single owner of the registry and the session
//! store. I/O threads only touch the two MPSC queues, so no lock ordering
//! exists to get wrong.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;

use starlance::ecs::Registry;
use starlance::game::components::{
    HitFlag, Invincible, LifePickup, Lives, Name, NetType, PlayerInput, Score, ShipType, Transform,
    Velocity,
};
use starlance::game::systems::{install_schedule, ScheduleParams};
use starlance::game::{BOTTOM_MARGIN, TOP_MARGIN, WORLD_H};
use starlance::net::protocol::{
    self, DespawnPayload, EntityKind, GameOverPayload, InputPacket, LivesUpdatePayload,
    LobbyConfigPayload, LobbyStatusPayload, MsgType, PackedEntity, RosterEntry, RosterHeader,
    ScoreUpdatePayload, UdpHelloPayload, WireDecode, WireEncode, GAME_OVER_ALL_DEAD,
};
use starlance::net::snapshot::build_state_packets;

use crate::config::ServerConfig;
use crate::net::{NetEvent, Outgoing, TcpControl};
use crate::session::SessionState;

const PLAYER_H: f32 = 12.0;
const MAX_LIVES: u8 = 10;

pub struct GameServer {
    config: ServerConfig,
    registry: Registry,
    session: SessionState,
    events: Receiver<NetEvent>,
    outgoing: Sender<Outgoing>,
    tcp: TcpControl,
    player_count: Arc<AtomicUsize>,
    last_known_ids: HashSet<u32>,
    last_ping: Instant,
    tick_count: u32,
    running: Arc<AtomicBool>,
}

impl GameServer {
    pub fn new(
        config: ServerConfig,
        events: Receiver<NetEvent>,
        outgoing: Sender<Outgoing>,
        tcp: TcpControl,
        player_count: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            config,
            registry: Registry::new(),
            session: SessionState::new(),
            events,
            outgoing,
            tcp,
            player_count,
            last_known_ids: HashSet::new(),
            last_ping: Instant::now(),
            tick_count: 0,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Fixed-step loop with absolute deadlines: a slow tick eats into the
    /// following sleep instead of shifting the schedule.
    pub fn run(&mut self) {
        let tick = std::time::Duration::from_secs_f64(1.0 / self.config.tick_rate as f64);
        let mut next = Instant::now() + tick;
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            }
            next += tick;
        }
        self.tcp.shutdown();
    }

    pub fn tick_once(&mut self) {
        let dt = self.config.dt();
        self.tick_count = self.tick_count.wrapping_add(1);

        self.drain_events();

        if self.last_ping.elapsed() >= self.config.ping_interval {
            self.last_ping = Instant::now();
            self.send_all(protocol::header_only(MsgType::Ping));
        }

        if self.session.game_started {
            self.registry.update(dt);
            self.post_tick();
        }

        self.check_timeouts();

        if self.tick_count % self.config.broadcast_every_n_ticks == 0 {
            self.broadcast_world();
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                NetEvent::Datagram { from, data } => self.handle_datagram(from, &data),
                NetEvent::TcpHello { name, ip, token } => {
                    self.session.create_player(
                        &mut self.registry,
                        &name,
                        ip,
                        token,
                        self.config.max_players,
                    );
                    self.sync_player_count();
                }
            }
        }
    }

    fn handle_datagram(&mut self, from: SocketAddr, data: &[u8]) {
        let parsed = protocol::parse_message(data);

        if self.session.player_at(from).is_none() {
            let Some(pending) = self.session.pending_for_ip(from.ip()) else {
                return;
            };
            // The first datagram from a pending IP binds the endpoint; a
            // UdpHello must echo the issued token to qualify.
            if let Ok((header, payload)) = &parsed {
                if header.msg == MsgType::Hello {
                    let mut cursor = *payload;
                    match UdpHelloPayload::decode(&mut cursor) {
                        Ok(hello) if hello.token != pending.token => {
                            log::warn!("udp hello from {} with stale token, ignoring", from);
                            return;
                        }
                        _ => {}
                    }
                }
            }
            self.session.take_pending(from.ip());
            self.session.bind(from, pending.entity, Instant::now());
            self.broadcast_roster();
            self.broadcast_lobby_status();
        }

        let Ok((header, payload)) = parsed else {
            return;
        };
        self.session.touch(from, Instant::now());

        match header.msg {
            MsgType::Input => self.apply_input(from, payload),
            MsgType::LobbyConfig => self.apply_lobby_config(from, payload),
            MsgType::StartMatch => self.handle_start_match(from),
            MsgType::Disconnect => self.remove_client(&SessionState::key_for(from)),
            // Hello is consumed by the bind path; Pong only refreshes
            // the timeout, which `touch` already did.
            _ => {}
        }
    }

    fn apply_input(&mut self, from: SocketAddr, payload: &[u8]) {
        let Some(player) = self.session.player_at(from) else {
            return;
        };
        let mut cursor = payload;
        let Ok(packet) = InputPacket::decode(&mut cursor) else {
            return;
        };
        if let Some(input) = self.registry.get_mut::<PlayerInput>(player) {
            input.bits = packet.bits;
        }
    }

    fn apply_lobby_config(&mut self, from: SocketAddr, payload: &[u8]) {
        let Some(player) = self.session.player_at(from) else {
            return;
        };
        if Some(player) != self.session.host {
            return;
        }
        let mut cursor = payload;
        let Ok(config) = LobbyConfigPayload::decode(&mut cursor) else {
            return;
        };
        self.session
            .set_lobby_config(config.base_lives, config.difficulty);
        self.broadcast_lobby_status();
    }

    fn handle_start_match(&mut self, from: SocketAddr) {
        let Some(player) = self.session.player_at(from) else {
            return;
        };
        if Some(player) != self.session.host || self.session.game_started {
            return;
        }
        self.start_match();
    }

    fn start_match(&mut self) {
        self.session.game_started = true;
        self.session.last_team_score = 0;

        let base_lives = self.session.base_lives;
        let players = self.session.bound_players();

        for entity in self.registry.entities_with::<Lives>() {
            if let Some(lives) = self.registry.get_mut::<Lives>(entity) {
                lives.value = base_lives;
            }
        }
        for entity in self.registry.entities_with::<Score>() {
            if let Some(score) = self.registry.get_mut::<Score>(entity) {
                score.value = 0;
            }
        }
        for (index, entity) in players.iter().enumerate() {
            if let Some(transform) = self.registry.get_mut::<Transform>(*entity) {
                transform.pos.x = 50.0;
                transform.pos.y = 100.0 + index as f32 * 40.0;
            }
            if let Some(velocity) = self.registry.get_mut::<Velocity>(*entity) {
                velocity.vel = glam::Vec2::ZERO;
            }
            match self.registry.get_mut::<Invincible>(*entity) {
                Some(inv) => inv.time_left = inv.time_left.max(1.0),
                None => self
                    .registry
                    .emplace(*entity, Invincible { time_left: 1.0 }),
            }
        }

        self.cleanup_world();
        self.last_known_ids.clear();

        let seed = self.config.rng_seed.unwrap_or_else(rand::random);
        self.registry.clear_systems();
        install_schedule(
            &mut self.registry,
            ScheduleParams {
                seed,
                difficulty: self.session.difficulty,
                shooter_percent: self.config.shooter_percent,
                count_multiplier: self.config.count_multiplier,
                boss_score_threshold: self.config.boss_score_threshold,
            },
        );

        log::info!(
            "match started: {} players, difficulty {}, seed {:#x}",
            players.len(),
            self.session.difficulty,
            seed
        );

        self.broadcast_roster();
        self.broadcast_lobby_status();
        self.send_all(protocol::frame(
            MsgType::ScoreUpdate,
            &ScoreUpdatePayload { id: 0, score: 0 },
        ));
        self.tcp.broadcast_start_game();
    }

    /// Applies hit flags and life pickups, then settles the team score.
    fn post_tick(&mut self) {
        for player in self.registry.entities_with::<PlayerInput>() {
            let hit = self
                .registry
                .get::<HitFlag>(player)
                .is_some_and(|flag| flag.value);
            if hit {
                let lives = {
                    let lives = self.registry.get_mut::<Lives>(player);
                    match lives {
                        Some(l) => {
                            if l.value > 0 {
                                l.value -= 1;
                            }
                            l.value
                        }
                        None => 0,
                    }
                };
                self.broadcast_lives(player.id(), lives);

                if let Some(transform) = self.registry.get_mut::<Transform>(player) {
                    transform.pos.x = 50.0;
                    transform.pos.y = transform
                        .pos
                        .y
                        .clamp(TOP_MARGIN, WORLD_H - BOTTOM_MARGIN - PLAYER_H);
                }
                if let Some(velocity) = self.registry.get_mut::<Velocity>(player) {
                    velocity.vel = glam::Vec2::ZERO;
                }
                match self.registry.get_mut::<Invincible>(player) {
                    Some(inv) => inv.time_left = inv.time_left.max(1.0),
                    None => self.registry.emplace(player, Invincible { time_left: 1.0 }),
                }
                if let Some(flag) = self.registry.get_mut::<HitFlag>(player) {
                    flag.value = false;
                }
            }

            let pickup = self
                .registry
                .get::<LifePickup>(player)
                .is_some_and(|p| p.pending);
            if pickup {
                let lives = {
                    let lives = self.registry.get_mut::<Lives>(player);
                    match lives {
                        Some(l) => {
                            if l.value < MAX_LIVES {
                                l.value += 1;
                            }
                            l.value
                        }
                        None => 0,
                    }
                };
                self.broadcast_lives(player.id(), lives);
                if let Some(p) = self.registry.get_mut::<LifePickup>(player) {
                    p.pending = false;
                }
            }
        }

        let team_score: i32 = self
            .registry
            .entities_with::<PlayerInput>()
            .into_iter()
            .filter_map(|e| self.registry.get::<Score>(e).map(|s| s.value))
            .sum();
        if team_score != self.session.last_team_score {
            self.session.last_team_score = team_score;
            self.send_all(protocol::frame(
                MsgType::ScoreUpdate,
                &ScoreUpdatePayload {
                    id: 0,
                    score: team_score,
                },
            ));
        }

        let players = self.session.bound_players();
        let all_dead = !players.is_empty()
            && players.iter().all(|p| {
                self.registry
                    .get::<Lives>(*p)
                    .map(|l| l.value == 0)
                    .unwrap_or(true)
            });
        if all_dead {
            log::info!("all players dead, match over");
            self.send_all(protocol::frame(
                MsgType::GameOver,
                &GameOverPayload {
                    reason: GAME_OVER_ALL_DEAD,
                },
            ));
            self.session.game_started = false;
            self.cleanup_world();
            self.broadcast_lobby_status();
        }
    }

    fn check_timeouts(&mut self) {
        let now = Instant::now();
        for key in self
            .session
            .timed_out_keys(now, self.config.client_timeout)
        {
            log::info!("client timed out: {}", key);
            self.remove_client(&key);
        }
    }

    fn remove_client(&mut self, key: &str) {
        let Some(removed) = self.session.remove_key(key) else {
            return;
        };
        self.registry.destroy(removed.entity);
        self.sync_player_count();

        self.send_all(protocol::frame(
            MsgType::Despawn,
            &DespawnPayload {
                id: removed.entity.id(),
            },
        ));
        log::info!("removed client {} (id={})", key, removed.entity.id());

        if removed.all_gone {
            self.cleanup_world();
            log::info!("all players left, world swept");
        }

        self.broadcast_roster();
        self.broadcast_lobby_status();

        if removed.stop_game {
            log::info!("not enough players to continue, stopping match");
            self.send_all(protocol::header_only(MsgType::ReturnToMenu));
            self.cleanup_world();
            self.broadcast_lobby_status();
        }
    }

    /// Emits despawns for every id that left the world since the previous
    /// broadcast, then the fresh snapshot packets. Order matters: a
    /// receiver must never see a state that silently dropped an id it was
    /// never told died.
    fn broadcast_world(&mut self) {
        let current: HashSet<u32> = self
            .registry
            .iter::<NetType>()
            .map(|(e, _)| e.id())
            .collect();
        let players: HashSet<u32> = self
            .registry
            .iter::<NetType>()
            .filter(|(_, kind)| kind.0 == EntityKind::Player)
            .map(|(e, _)| e.id())
            .collect();

        for id in starlance::diff_despawns(&self.last_known_ids, &current, &players) {
            self.send_all(protocol::frame(MsgType::Despawn, &DespawnPayload { id }));
        }
        self.last_known_ids = current;

        let packed = self.collect_packed();
        for packet in build_state_packets(&packed) {
            self.send_all(packet);
        }
    }

    fn collect_packed(&self) -> Vec<PackedEntity> {
        use starlance::game::components::ColorRgba;
        let mut packed = Vec::with_capacity(self.registry.count::<NetType>());
        for (entity, net_type) in self.registry.iter::<NetType>() {
            let (Some(transform), Some(velocity), Some(color)) = (
                self.registry.get::<Transform>(entity),
                self.registry.get::<Velocity>(entity),
                self.registry.get::<ColorRgba>(entity),
            ) else {
                continue; // incomplete entities stay server-side
            };
            packed.push(PackedEntity {
                id: entity.id(),
                kind: net_type.0,
                x: transform.pos.x,
                y: transform.pos.y,
                vx: velocity.vel.x,
                vy: velocity.vel.y,
                rgba: color.0,
            });
        }
        packed
    }

    /// Destroys every non-player entity, formation origins included, and
    /// resets the team score.
    fn cleanup_world(&mut self) {
        use starlance::game::components::Formation;

        let mut doomed = Vec::new();
        for (entity, net_type) in self.registry.iter::<NetType>() {
            if net_type.0 != EntityKind::Player {
                doomed.push(entity);
            }
        }
        doomed.extend(self.registry.entities_with::<Formation>());

        let count = doomed.len();
        for entity in doomed {
            self.registry.destroy(entity);
        }
        self.session.last_team_score = 0;
        if count > 0 {
            log::info!("world cleaned: {} entities removed", count);
        }
    }

    fn sync_player_count(&self) {
        self.player_count
            .store(self.session.player_total(), Ordering::SeqCst);
    }

    fn send_all(&self, frame: Vec<u8>) {
        for endpoint in self.session.endpoints() {
            let _ = self.outgoing.send((endpoint, frame.clone()));
        }
    }

    fn broadcast_lives(&self, id: u32, lives: u8) {
        self.send_all(protocol::frame(
            MsgType::LivesUpdate,
            &LivesUpdatePayload {
                id,
                lives: lives.min(MAX_LIVES),
            },
        ));
    }

    fn broadcast_roster(&self) {
        let players = self.session.bound_players();
        let frame = protocol::frame_fn(MsgType::Roster, |out| {
            RosterHeader {
                count: players.len() as u8,
            }
            .encode(out);
            for player in &players {
                let lives = self
                    .registry
                    .get::<Lives>(*player)
                    .map(|l| l.value.min(MAX_LIVES))
                    .unwrap_or(0);
                let ship_id = self
                    .registry
                    .get::<ShipType>(*player)
                    .map(|s| s.value)
                    .unwrap_or(0);
                let name = self
                    .registry
                    .get::<Name>(*player)
                    .map(|n| n.value.clone())
                    .unwrap_or_else(|| format!("Player{}", player.id()));
                RosterEntry {
                    id: player.id(),
                    lives,
                    ship_id,
                    name,
                }
                .encode(out);
            }
        });
        self.send_all(frame);
    }

    fn broadcast_lobby_status(&self) {
        self.send_all(protocol::frame(
            MsgType::LobbyStatus,
            &LobbyStatusPayload {
                host_id: self.session.host_id(),
                base_lives: self.session.base_lives,
                difficulty: self.session.difficulty,
                started: self.session.game_started as u8,
                reserved: 0,
            },
        ));
    }
}
