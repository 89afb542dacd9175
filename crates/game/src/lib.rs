pub mod ecs;
pub mod game;
pub mod net;

pub use ecs::{Entity, Registry, System};
pub use net::protocol::{
    EntityKind, Header, MsgType, PackedEntity, WireDecode, WireEncode, WireError,
    DEFAULT_UDP_PORT, PROTOCOL_VERSION,
};
pub use net::snapshot::{build_state_packets, diff_despawns, MAX_DATAGRAM_BYTES};
