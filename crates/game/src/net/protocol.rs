//! Message definitions for the two-transport session protocol.
//!
//! Every message, on either transport, starts with the same 4-byte header:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┐
//! │ size (u16 LE)│  type (u8)   │ version (u8) │
//! └──────────────┴──────────────┴──────────────┘
//! │          payload (size bytes)              │
//! └────────────────────────────────────────────┘
//! ```
//!
//! `size` counts payload bytes only. Payloads are little-endian and tightly
//! packed; a message whose version does not match [`PROTOCOL_VERSION`], or
//! whose `size` exceeds the remaining buffer, is silently dropped.

use serde::{Deserialize, Serialize};

use super::wire::{get_f32, get_i32, get_name, get_u16, get_u32, get_u8, put_name};

pub use super::wire::{WireDecode, WireEncode, WireError};

/// Wire protocol version carried in every header.
pub const PROTOCOL_VERSION: u8 = 1;

/// Header length in bytes.
pub const HEADER_LEN: usize = 4;

/// Fixed width of every name field on the wire (15 significant bytes + NUL).
pub const NAME_LEN: usize = 16;

/// Default datagram port; the stream listener binds the next port up.
pub const DEFAULT_UDP_PORT: u16 = 4242;

/// Input bitmask, client → server.
pub const INPUT_UP: u8 = 1 << 0;
pub const INPUT_DOWN: u8 = 1 << 1;
pub const INPUT_LEFT: u8 = 1 << 2;
pub const INPUT_RIGHT: u8 = 1 << 3;
pub const INPUT_SHOOT: u8 = 1 << 4;
pub const INPUT_CHARGE: u8 = 1 << 5;

/// `GameOverPayload.reason`: every player reached zero lives.
pub const GAME_OVER_ALL_DEAD: u8 = 0;

/// Message discriminants. `Spawn` is reserved: decodable, never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Hello = 1,
    HelloAck = 2,
    Input = 3,
    State = 4,
    Spawn = 5,
    Despawn = 6,
    Ping = 7,
    Pong = 8,
    Roster = 9,
    LivesUpdate = 10,
    ScoreUpdate = 11,
    LobbyStatus = 12,
    LobbyConfig = 13,
    StartMatch = 14,
    GameOver = 15,
    Disconnect = 16,
    ReturnToMenu = 17,
    TcpWelcome = 100,
    StartGame = 101,
}

impl MsgType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Hello,
            2 => Self::HelloAck,
            3 => Self::Input,
            4 => Self::State,
            5 => Self::Spawn,
            6 => Self::Despawn,
            7 => Self::Ping,
            8 => Self::Pong,
            9 => Self::Roster,
            10 => Self::LivesUpdate,
            11 => Self::ScoreUpdate,
            12 => Self::LobbyStatus,
            13 => Self::LobbyConfig,
            14 => Self::StartMatch,
            15 => Self::GameOver,
            16 => Self::Disconnect,
            17 => Self::ReturnToMenu,
            100 => Self::TcpWelcome,
            101 => Self::StartGame,
            _ => return None,
        })
    }
}

/// Entity classification carried in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    Player = 1,
    Enemy = 2,
    Bullet = 3,
    Powerup = 4,
}

impl EntityKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Player,
            2 => Self::Enemy,
            3 => Self::Bullet,
            4 => Self::Powerup,
            _ => return None,
        })
    }
}

/// Common message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub size: u16,
    pub msg: MsgType,
    pub version: u8,
}

impl Header {
    pub fn new(msg: MsgType, size: u16) -> Self {
        Self {
            size,
            msg,
            version: PROTOCOL_VERSION,
        }
    }
}

impl WireEncode for Header {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.size.to_le_bytes());
        out.push(self.msg as u8);
        out.push(self.version);
    }
}

impl WireDecode for Header {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        let size = get_u16(inp)?;
        let raw_type = get_u8(inp)?;
        let version = get_u8(inp)?;
        let msg = MsgType::from_u8(raw_type).ok_or(WireError::UnknownType(raw_type))?;
        Ok(Self { size, msg, version })
    }
}

/// Splits a received buffer into a validated header and its payload slice.
///
/// Enforces the drop rules: short buffer, version mismatch, and a `size`
/// field larger than what actually arrived all fail the parse.
pub fn parse_message(buf: &[u8]) -> Result<(Header, &[u8]), WireError> {
    let mut cursor = buf;
    let header = Header::decode(&mut cursor)?;
    if header.version != PROTOCOL_VERSION {
        return Err(WireError::BadVersion);
    }
    if cursor.len() < header.size as usize {
        return Err(WireError::BadLength);
    }
    Ok((header, &cursor[..header.size as usize]))
}

/// Frames a payload-free message.
pub fn header_only(msg: MsgType) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    Header::new(msg, 0).encode(&mut out);
    out
}

/// Frames a single typed payload behind a header.
pub fn frame<P: WireEncode>(msg: MsgType, payload: &P) -> Vec<u8> {
    frame_fn(msg, |out| payload.encode(out))
}

/// Frames a hand-built payload; the header size is patched in afterwards.
pub fn frame_fn(msg: MsgType, build: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    Header::new(msg, 0).encode(&mut out);
    build(&mut out);
    let size = (out.len() - HEADER_LEN) as u16;
    out[..2].copy_from_slice(&size.to_le_bytes());
    out
}

/// TCP server → client: datagram port and session token. 6 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloAckPayload {
    pub udp_port: u16,
    pub token: u32,
}

impl WireEncode for HelloAckPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.udp_port.to_le_bytes());
        out.extend_from_slice(&self.token.to_le_bytes());
    }
}

impl WireDecode for HelloAckPayload {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            udp_port: get_u16(inp)?,
            token: get_u32(inp)?,
        })
    }
}

/// First datagram, client → server: echoes the session token. 20 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHelloPayload {
    pub token: u32,
    pub name: String,
}

impl WireEncode for UdpHelloPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.token.to_le_bytes());
        put_name::<NAME_LEN>(out, &self.name);
    }
}

impl WireDecode for UdpHelloPayload {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            token: get_u32(inp)?,
            name: get_name::<NAME_LEN>(inp)?,
        })
    }
}

/// Client → server input sample. 5 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPacket {
    pub sequence: u32,
    pub bits: u8,
}

impl WireEncode for InputPacket {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.push(self.bits);
    }
}

impl WireDecode for InputPacket {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            sequence: get_u32(inp)?,
            bits: get_u8(inp)?,
        })
    }
}

/// Leads a `State` payload; `count` packed entities follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHeader {
    pub count: u16,
}

impl WireEncode for StateHeader {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count.to_le_bytes());
    }
}

impl WireDecode for StateHeader {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            count: get_u16(inp)?,
        })
    }
}

/// One snapshot entity record. 25 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedEntity {
    pub id: u32,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub rgba: u32,
}

impl PackedEntity {
    /// Serialized size of a single record.
    pub const WIRE_LEN: usize = 25;
}

impl WireEncode for PackedEntity {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.push(self.kind as u8);
        out.extend_from_slice(&self.x.to_le_bytes());
        out.extend_from_slice(&self.y.to_le_bytes());
        out.extend_from_slice(&self.vx.to_le_bytes());
        out.extend_from_slice(&self.vy.to_le_bytes());
        out.extend_from_slice(&self.rgba.to_le_bytes());
    }
}

impl WireDecode for PackedEntity {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        let id = get_u32(inp)?;
        let raw_kind = get_u8(inp)?;
        let kind = EntityKind::from_u8(raw_kind).ok_or(WireError::BadDiscriminant(raw_kind))?;
        Ok(Self {
            id,
            kind,
            x: get_f32(inp)?,
            y: get_f32(inp)?,
            vx: get_f32(inp)?,
            vy: get_f32(inp)?,
            rgba: get_u32(inp)?,
        })
    }
}

/// Server → clients: an entity id is gone. 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DespawnPayload {
    pub id: u32,
}

impl WireEncode for DespawnPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
    }
}

impl WireDecode for DespawnPayload {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self { id: get_u32(inp)? })
    }
}

/// Leads a `Roster` payload; `count` entries follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterHeader {
    pub count: u8,
}

impl WireEncode for RosterHeader {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.count);
    }
}

impl WireDecode for RosterHeader {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            count: get_u8(inp)?,
        })
    }
}

/// Fixed-size roster record: id, lives, ship slot, name. 22 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: u32,
    pub lives: u8,
    pub ship_id: u8,
    pub name: String,
}

impl WireEncode for RosterEntry {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.push(self.lives);
        out.push(self.ship_id);
        put_name::<NAME_LEN>(out, &self.name);
    }
}

impl WireDecode for RosterEntry {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            id: get_u32(inp)?,
            lives: get_u8(inp)?,
            ship_id: get_u8(inp)?,
            name: get_name::<NAME_LEN>(inp)?,
        })
    }
}

/// One player's lives changed. 5 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivesUpdatePayload {
    pub id: u32,
    pub lives: u8,
}

impl WireEncode for LivesUpdatePayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.push(self.lives);
    }
}

impl WireDecode for LivesUpdatePayload {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            id: get_u32(inp)?,
            lives: get_u8(inp)?,
        })
    }
}

/// Score broadcast; `id == 0` carries the team total. 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdatePayload {
    pub id: u32,
    pub score: i32,
}

impl WireEncode for ScoreUpdatePayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.score.to_le_bytes());
    }
}

impl WireDecode for ScoreUpdatePayload {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            id: get_u32(inp)?,
            score: get_i32(inp)?,
        })
    }
}

/// Lobby parameters and the started flag. 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyStatusPayload {
    pub host_id: u32,
    pub base_lives: u8,
    pub difficulty: u8,
    pub started: u8,
    pub reserved: u8,
}

impl WireEncode for LobbyStatusPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.host_id.to_le_bytes());
        out.push(self.base_lives);
        out.push(self.difficulty);
        out.push(self.started);
        out.push(self.reserved);
    }
}

impl WireDecode for LobbyStatusPayload {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            host_id: get_u32(inp)?,
            base_lives: get_u8(inp)?,
            difficulty: get_u8(inp)?,
            started: get_u8(inp)?,
            reserved: get_u8(inp)?,
        })
    }
}

/// Host → server: requested lobby configuration. 2 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyConfigPayload {
    pub base_lives: u8,
    pub difficulty: u8,
}

impl WireEncode for LobbyConfigPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.base_lives);
        out.push(self.difficulty);
    }
}

impl WireDecode for LobbyConfigPayload {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            base_lives: get_u8(inp)?,
            difficulty: get_u8(inp)?,
        })
    }
}

/// Match ended. 1 byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOverPayload {
    pub reason: u8,
}

impl WireEncode for GameOverPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.reason);
    }
}

impl WireDecode for GameOverPayload {
    fn decode(inp: &mut &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            reason: get_u8(inp)?,
        })
    }
}
