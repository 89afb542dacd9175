pub mod protocol;
pub mod snapshot;
pub mod wire;

pub use protocol::{
    EntityKind, GameOverPayload, Header, HelloAckPayload, InputPacket, LivesUpdatePayload,
    LobbyConfigPayload, LobbyStatusPayload, MsgType, PackedEntity, RosterEntry, RosterHeader,
    ScoreUpdatePayload, StateHeader, UdpHelloPayload, DEFAULT_UDP_PORT, HEADER_LEN, NAME_LEN,
    PROTOCOL_VERSION,
};
pub use snapshot::{build_state_packets, diff_despawns, MAX_DATAGRAM_BYTES};
pub use wire::{WireDecode, WireEncode, WireError};
