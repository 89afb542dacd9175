//! Plain-data components attached to registry entities.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::ecs::Entity;
use crate::net::protocol::EntityKind;

/// World position (top-left corner of the entity's AABB).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub pos: Vec2,
}

impl Transform {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
        }
    }
}

/// Per-second motion, integrated by the movement system.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub vel: Vec2,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self {
            vel: Vec2::new(vx, vy),
        }
    }
}

/// AABB extent anchored at the transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Size {
    pub fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }
}

/// Render hint serialized into snapshots, `0xRRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRgba(pub u32);

/// Snapshot classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetType(pub EntityKind);

#[derive(Debug, Clone, Copy, Default)]
pub struct IsPlayer;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnemyTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletFaction {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy)]
pub struct BulletTag {
    pub faction: BulletFaction,
}

/// Bullet provenance for score attribution. A dead owner forfeits the
/// points.
#[derive(Debug, Clone, Copy)]
pub struct BulletOwner {
    pub owner: Entity,
}

/// Marks charge-gun beams: wide bullets that pass through enemies.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeamTag;

/// Input bitmask written from the network, plus movement speed.
#[derive(Debug, Clone, Copy)]
pub struct PlayerInput {
    pub bits: u8,
    pub speed: f32,
}

impl Default for PlayerInput {
    fn default() -> Self {
        Self {
            bits: 0,
            speed: 150.0,
        }
    }
}

/// Player gun state.
#[derive(Debug, Clone, Copy)]
pub struct Shooter {
    pub cooldown: f32,
    pub interval: f32,
    pub bullet_speed: f32,
}

impl Default for Shooter {
    fn default() -> Self {
        Self {
            cooldown: 0.0,
            interval: 0.15,
            bullet_speed: 320.0,
        }
    }
}

/// Beam charge state.
#[derive(Debug, Clone, Copy)]
pub struct ChargeGun {
    pub charge: f32,
    pub max_charge: f32,
    pub firing: bool,
}

impl Default for ChargeGun {
    fn default() -> Self {
        Self {
            charge: 0.0,
            max_charge: 2.0,
            firing: false,
        }
    }
}

/// Aimed enemy fire. Accuracy is clamped into `[0.5, 0.8]` at use.
#[derive(Debug, Clone, Copy)]
pub struct EnemyShooter {
    pub cooldown: f32,
    pub interval: f32,
    pub bullet_speed: f32,
    pub accuracy: f32,
}

impl EnemyShooter {
    pub fn new(interval: f32, bullet_speed: f32, accuracy: f32) -> Self {
        Self {
            cooldown: 0.0,
            interval,
            bullet_speed,
            accuracy,
        }
    }
}

/// Set by the collision system, consumed by tick post-processing.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitFlag {
    pub value: bool,
}

/// Hit immunity, decremented each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invincible {
    pub time_left: f32,
}

/// Overrides the shooter cooldown to zero while active.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfiniteFire {
    pub time_left: f32,
}

/// One-shot extra-life grant, applied post-tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifePickup {
    pub pending: bool,
}

/// Remaining lives, 0..10. Zero means dead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lives {
    pub value: u8,
}

/// Per-player score; the team score is the sum over live players.
#[derive(Debug, Clone, Copy, Default)]
pub struct Score {
    pub value: i32,
}

/// Display name, at most 15 bytes on the wire.
#[derive(Debug, Clone, Default)]
pub struct Name {
    pub value: String,
}

/// Sprite slot 0..4, unique among live players.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShipType {
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormationKind {
    Snake,
    Line,
    GridRect,
    Triangle,
}

/// Wave origin. Followers place themselves relative to this entity.
#[derive(Debug, Clone, Copy)]
pub struct Formation {
    pub kind: FormationKind,
    pub speed_x: f32,
    pub amplitude: f32,
    pub frequency: f32,
    pub spacing: f32,
    pub rows: u32,
    pub cols: u32,
}

/// Offset of one wave member relative to its origin.
#[derive(Debug, Clone, Copy)]
pub struct FormationFollower {
    pub formation: Entity,
    pub index: u16,
    pub local: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerupKind {
    Life,
    Invincibility,
    ClearBoard,
    InfiniteFire,
}

impl PowerupKind {
    pub fn color(self) -> u32 {
        match self {
            PowerupKind::Life => 0x64DC78FF,
            PowerupKind::Invincibility => 0x50AAFFFF,
            PowerupKind::ClearBoard => 0xAA50C8FF,
            PowerupKind::InfiniteFire => 0xF0DC50FF,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PowerupTag {
    pub kind: PowerupKind,
}

/// Boss state: approach from the right, stop, then patrol vertically.
#[derive(Debug, Clone, Copy)]
pub struct BossTag {
    pub hp: i32,
    pub max_hp: i32,
    pub stop_x: f32,
    pub right_margin: f32,
    pub at_stop: bool,
    pub dir_down: bool,
    pub speed_x: f32,
    pub speed_y: f32,
}
