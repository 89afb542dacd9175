//! The network client: handshake, datagram pump, reconciliation, and
//! input transmission.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use glam::Vec2;

use starlance::net::protocol::{
    self, DespawnPayload, GameOverPayload, InputPacket, LivesUpdatePayload, LobbyConfigPayload,
    LobbyStatusPayload, MsgType, PackedEntity, RosterEntry, RosterHeader, ScoreUpdatePayload,
    StateHeader, UdpHelloPayload, WireDecode, WireError, HEADER_LEN,
};

use crate::hud::HudState;

use super::handshake;
use super::input::{gate_bits, InputPacer, PlayableBand};
use super::reconcile::Reconciler;

const RECV_BUFFER_BYTES: usize = 8192;

/// Datagrams drained per pump call; keeps one pump bounded under load.
const MAX_DATAGRAMS_PER_PUMP: usize = 64;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    /// Dev convenience: also leave the waiting state once two players are
    /// visible in snapshots. A conformant server always sets the lobby
    /// started flag first.
    pub presence_fallback: bool,
    pub band: PlayableBand,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            presence_fallback: false,
            band: PlayableBand::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Waiting,
    InGame,
    GameOver,
    Menu,
}

pub struct NetClient {
    udp: UdpSocket,
    server: SocketAddr,
    tcp: TcpStream,
    username: String,
    config: ClientConfig,
    pacer: InputPacer,
    phase: ClientPhase,
    pub reconciler: Reconciler,
    pub hud: HudState,
}

impl NetClient {
    /// Runs the full connect dance: stream handshake, datagram socket,
    /// and the token-bearing UDP hello. Failure tears both sockets down
    /// (drop semantics) and surfaces the error to the caller.
    pub fn connect(
        host: &str,
        udp_port: u16,
        username: &str,
        config: ClientConfig,
    ) -> io::Result<Self> {
        let outcome = handshake::connect(host, udp_port, username, config.connect_timeout)?;
        outcome.stream.set_nonblocking(true)?;

        let udp = UdpSocket::bind("0.0.0.0:0")?;
        udp.set_nonblocking(true)?;
        let server = (host, outcome.udp_port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host did not resolve"))?;

        let hello = protocol::frame(
            MsgType::Hello,
            &UdpHelloPayload {
                token: outcome.token,
                name: username.to_string(),
            },
        );
        udp.send_to(&hello, server)?;
        log::info!("udp hello sent to {}", server);

        Ok(Self {
            udp,
            server,
            tcp: outcome.stream,
            username: username.to_string(),
            config,
            pacer: InputPacer::new(Instant::now()),
            phase: ClientPhase::Waiting,
            reconciler: Reconciler::new(),
            hud: HudState::default(),
        })
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// Drains pending datagrams (and the control stream) and settles the
    /// session phase.
    pub fn pump(&mut self) -> io::Result<()> {
        let mut buf = [0u8; RECV_BUFFER_BYTES];
        for _ in 0..MAX_DATAGRAMS_PER_PUMP {
            match self.udp.recv_from(&mut buf) {
                Ok((len, _from)) => {
                    let data = buf[..len].to_vec();
                    self.handle_frame(&data);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(err),
            }
        }
        self.drain_control_stream();
        self.update_phase();
        Ok(())
    }

    fn drain_control_stream(&mut self) {
        let mut header = [0u8; HEADER_LEN];
        loop {
            match self.tcp.read(&mut header) {
                Ok(0) => break,
                Ok(n) if n == HEADER_LEN => {
                    let mut cursor = &header[..];
                    if let Ok(parsed) = protocol::Header::decode(&mut cursor) {
                        if parsed.msg == MsgType::StartGame {
                            log::info!("server pushed StartGame");
                        }
                    }
                }
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }

    fn handle_frame(&mut self, data: &[u8]) {
        let Ok((header, payload)) = protocol::parse_message(data) else {
            return; // short, stale-versioned, or oversized: drop
        };
        let result = match header.msg {
            MsgType::State => self.on_state(payload),
            MsgType::Despawn => self.on_despawn(payload),
            MsgType::Roster => self.on_roster(payload),
            MsgType::LivesUpdate => self.on_lives(payload),
            MsgType::ScoreUpdate => self.on_score(payload),
            MsgType::LobbyStatus => self.on_lobby_status(payload),
            MsgType::GameOver => self.on_game_over(payload),
            MsgType::ReturnToMenu => {
                self.hud.return_to_menu = true;
                Ok(())
            }
            MsgType::Ping => {
                let _ = self.udp.send_to(&protocol::header_only(MsgType::Pong), self.server);
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::debug!("dropped malformed {:?}: {}", header.msg, err);
        }
    }

    fn on_state(&mut self, payload: &[u8]) -> Result<(), WireError> {
        let mut cursor = payload;
        let state = StateHeader::decode(&mut cursor)?;
        let mut batch = Vec::with_capacity(state.count as usize);
        for _ in 0..state.count {
            batch.push(PackedEntity::decode(&mut cursor)?);
        }
        self.reconciler.ingest_state(&batch, Instant::now());
        Ok(())
    }

    fn on_despawn(&mut self, payload: &[u8]) -> Result<(), WireError> {
        let mut cursor = payload;
        let despawn = DespawnPayload::decode(&mut cursor)?;
        self.reconciler.apply_despawn(despawn.id);
        Ok(())
    }

    fn on_roster(&mut self, payload: &[u8]) -> Result<(), WireError> {
        let mut cursor = payload;
        let header = RosterHeader::decode(&mut cursor)?;
        let mut entries = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            entries.push(RosterEntry::decode(&mut cursor)?);
        }
        self.hud.apply_roster(&entries, &self.username);
        Ok(())
    }

    fn on_lives(&mut self, payload: &[u8]) -> Result<(), WireError> {
        let mut cursor = payload;
        let update = LivesUpdatePayload::decode(&mut cursor)?;
        self.hud.apply_lives(update.id, update.lives);
        Ok(())
    }

    fn on_score(&mut self, payload: &[u8]) -> Result<(), WireError> {
        let mut cursor = payload;
        let update = ScoreUpdatePayload::decode(&mut cursor)?;
        self.hud.team_score = update.score;
        Ok(())
    }

    fn on_lobby_status(&mut self, payload: &[u8]) -> Result<(), WireError> {
        let mut cursor = payload;
        let status = LobbyStatusPayload::decode(&mut cursor)?;
        self.hud.host_id = status.host_id;
        self.hud.base_lives = status.base_lives.clamp(1, 6);
        self.hud.difficulty = status.difficulty.min(2);
        self.hud.started = status.started != 0;
        Ok(())
    }

    fn on_game_over(&mut self, payload: &[u8]) -> Result<(), WireError> {
        let mut cursor = payload;
        let _reason = GameOverPayload::decode(&mut cursor)?;
        self.hud.game_over = true;
        Ok(())
    }

    fn update_phase(&mut self) {
        if self.hud.return_to_menu {
            self.phase = ClientPhase::Menu;
            return;
        }
        match self.phase {
            ClientPhase::Waiting => {
                let fallback =
                    self.config.presence_fallback && self.reconciler.player_count() >= 2;
                if self.hud.started || fallback {
                    self.phase = ClientPhase::InGame;
                    log::info!("entering gameplay");
                }
            }
            ClientPhase::InGame => {
                let observed_wipe = self.hud.self_id != 0 && self.hud.all_players_dead();
                if self.hud.game_over || observed_wipe {
                    self.phase = ClientPhase::GameOver;
                    log::info!("game over");
                }
            }
            _ => {}
        }
    }

    fn self_position(&self) -> Option<Vec2> {
        if self.hud.self_id == 0 {
            return None;
        }
        self.reconciler
            .get(self.hud.self_id)
            .map(|tracked| Vec2::new(tracked.state.x, tracked.state.y))
    }

    /// Encodes and sends the input bitmask, rate-limited to ~30 Hz and
    /// edge-gated against the playable band.
    pub fn send_input(&mut self, bits: u8) -> io::Result<()> {
        let Some(sequence) = self.pacer.try_send(Instant::now()) else {
            return Ok(());
        };
        let gated = gate_bits(bits, self.self_position(), &self.config.band);
        let frame = protocol::frame(
            MsgType::Input,
            &InputPacket {
                sequence,
                bits: gated,
            },
        );
        self.udp.send_to(&frame, self.server)?;
        Ok(())
    }

    /// Host-only request; the server ignores it from anyone else.
    pub fn send_lobby_config(&self, base_lives: u8, difficulty: u8) -> io::Result<()> {
        let frame = protocol::frame(
            MsgType::LobbyConfig,
            &LobbyConfigPayload {
                base_lives,
                difficulty,
            },
        );
        self.udp.send_to(&frame, self.server)?;
        Ok(())
    }

    pub fn send_start_match(&self) -> io::Result<()> {
        self.udp
            .send_to(&protocol::header_only(MsgType::StartMatch), self.server)?;
        Ok(())
    }

    /// Explicit goodbye; the server despawns us right away instead of
    /// waiting out the timeout.
    pub fn disconnect(&mut self) {
        let _ = self
            .udp
            .send_to(&protocol::header_only(MsgType::Disconnect), self.server);
        self.reconciler.clear();
        self.phase = ClientPhase::Menu;
    }
}
