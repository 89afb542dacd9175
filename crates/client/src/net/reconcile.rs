//! Snapshot reconciliation: fuses lossy, reorder-prone state datagrams
//! into a stable render set.
//!
//! Every tracked id carries its last state, a consecutive-miss counter,
//! and the time it was last seen. An id is dropped only when it has been
//! missing from enough datagrams AND has been unseen longer than its
//! kind's TTL, so a burst of packet loss never makes entities flicker.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::Vec2;

use starlance::net::protocol::{EntityKind, PackedEntity};

/// Consecutive absences before an id becomes a removal candidate.
pub const MISS_THRESHOLD: u32 = 3;

/// Hard cap on tracked ids; fresh ids beyond it are dropped on arrival.
pub const MAX_TRACKED: usize = 256;

const ENEMY_TTL: Duration = Duration::from_secs(2);
const DEFAULT_TTL: Duration = Duration::from_secs(1);

/// Extrapolation window for entities that stopped updating.
const EXTRAPOLATE_MIN: f32 = 0.05;
const EXTRAPOLATE_MAX: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct TrackedEntity {
    pub state: PackedEntity,
    pub missed: u32,
    pub last_seen: Instant,
}

impl TrackedEntity {
    fn ttl(&self) -> Duration {
        match self.state.kind {
            EntityKind::Enemy => ENEMY_TTL,
            _ => DEFAULT_TTL,
        }
    }

    /// Position advanced along the last known velocity while the entity is
    /// stale, so a briefly unseen entity keeps drifting instead of
    /// freezing.
    pub fn position(&self, now: Instant) -> Vec2 {
        let base = Vec2::new(self.state.x, self.state.y);
        let elapsed = now.saturating_duration_since(self.last_seen).as_secs_f32();
        if elapsed > EXTRAPOLATE_MIN && elapsed < EXTRAPOLATE_MAX {
            base + Vec2::new(self.state.vx, self.state.vy) * elapsed
        } else {
            base
        }
    }
}

#[derive(Default)]
pub struct Reconciler {
    entities: HashMap<u32, TrackedEntity>,
    render_order: Vec<u32>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests one `State` datagram: upserts everything it carries, bumps
    /// miss counters for everything it does not, and expires ids that are
    /// both missed out and past their TTL.
    pub fn ingest_state(&mut self, batch: &[PackedEntity], now: Instant) {
        for packed in batch {
            match self.entities.get_mut(&packed.id) {
                Some(tracked) => {
                    tracked.state = *packed;
                    tracked.missed = 0;
                    tracked.last_seen = now;
                }
                None => {
                    if self.entities.len() >= MAX_TRACKED {
                        continue;
                    }
                    self.entities.insert(
                        packed.id,
                        TrackedEntity {
                            state: *packed,
                            missed: 0,
                            last_seen: now,
                        },
                    );
                }
            }
        }

        let seen: std::collections::HashSet<u32> = batch.iter().map(|e| e.id).collect();
        let mut expired = Vec::new();
        for (id, tracked) in &mut self.entities {
            if seen.contains(id) {
                continue;
            }
            tracked.missed += 1;
            let stale = now.saturating_duration_since(tracked.last_seen) >= tracked.ttl();
            if tracked.missed >= MISS_THRESHOLD && stale {
                expired.push(*id);
            }
        }
        for id in expired {
            self.entities.remove(&id);
        }

        self.rebuild_render_order();
    }

    /// The server said this id is gone: drop it immediately.
    pub fn apply_despawn(&mut self, id: u32) {
        self.entities.remove(&id);
        self.rebuild_render_order();
    }

    fn rebuild_render_order(&mut self) {
        self.render_order.clear();
        for kind in [
            EntityKind::Player,
            EntityKind::Bullet,
            EntityKind::Powerup,
            EntityKind::Enemy,
        ] {
            self.render_order.extend(
                self.entities
                    .values()
                    .filter(|t| t.state.kind == kind)
                    .map(|t| t.state.id),
            );
        }
    }

    pub fn get(&self, id: u32) -> Option<&TrackedEntity> {
        self.entities.get(&id)
    }

    /// Tracked entities in render order: players, bullets, power-ups,
    /// enemies.
    pub fn render_entities(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.render_order
            .iter()
            .filter_map(|id| self.entities.get(id))
    }

    pub fn player_count(&self) -> usize {
        self.entities
            .values()
            .filter(|t| t.state.kind == EntityKind::Player)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.render_order.clear();
    }
}
