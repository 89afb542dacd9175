//! Snapshot slicing and despawn diffing for the state broadcaster.
//!
//! Entities are partitioned by kind and packed into datagrams according to a
//! declarative slice table: each slice lists the kinds it carries, in order,
//! and is truncated at the shared byte budget. The first slice (players and
//! enemies) is presence-authoritative and always sent; later slices are
//! skipped when empty.

use std::collections::HashSet;

use super::protocol::{self, EntityKind, MsgType, PackedEntity, StateHeader, WireEncode, HEADER_LEN};

/// Hard cap on a single state datagram, header included.
pub const MAX_DATAGRAM_BYTES: usize = 1400;

/// Slice table: one datagram per row, kinds packed in listed order.
pub const SNAPSHOT_SLICES: &[&[EntityKind]] = &[
    &[EntityKind::Player, EntityKind::Enemy],
    &[EntityKind::Bullet, EntityKind::Powerup],
];

const STATE_HEADER_LEN: usize = 2;

/// Entity records that fit one datagram after both headers.
pub const fn max_entities_per_packet() -> usize {
    (MAX_DATAGRAM_BYTES - HEADER_LEN - STATE_HEADER_LEN) / PackedEntity::WIRE_LEN
}

/// Builds the framed `State` datagrams for one broadcast.
pub fn build_state_packets(entities: &[PackedEntity]) -> Vec<Vec<u8>> {
    let budget = max_entities_per_packet();
    let mut packets = Vec::with_capacity(SNAPSHOT_SLICES.len());

    for (i, slice) in SNAPSHOT_SLICES.iter().enumerate() {
        let mut batch: Vec<&PackedEntity> = Vec::new();
        for kind in *slice {
            for entity in entities.iter().filter(|e| e.kind == *kind) {
                if batch.len() >= budget {
                    break;
                }
                batch.push(entity);
            }
        }
        if batch.is_empty() && i > 0 {
            continue;
        }
        packets.push(protocol::frame_fn(MsgType::State, |out| {
            StateHeader {
                count: batch.len() as u16,
            }
            .encode(out);
            for entity in &batch {
                entity.encode(out);
            }
        }));
    }

    packets
}

/// Ids present last broadcast, absent now, and not players.
pub fn diff_despawns(
    previous: &HashSet<u32>,
    current: &HashSet<u32>,
    players: &HashSet<u32>,
) -> Vec<u32> {
    previous
        .iter()
        .filter(|id| !current.contains(id) && !players.contains(id))
        .copied()
        .collect()
}
