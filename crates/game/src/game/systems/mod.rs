//! Gameplay systems, executed in a fixed order each tick.

mod boss;
mod collision;
mod formation;
mod motion;
mod powerup;
mod shooting;

pub use boss::{BossMotionSystem, BossSpawnSystem};
pub use collision::{CollisionSystem, PowerupCollisionSystem};
pub use formation::{FormationSpawnSystem, FormationSystem};
pub use motion::{
    DespawnOffscreenSystem, DespawnOutOfBoundsSystem, InfiniteFireSystem, InputSystem,
    InvincibilitySystem, MovementSystem,
};
pub use powerup::PowerupSpawnSystem;
pub use shooting::{ChargeShootingSystem, EnemyShootingSystem, ShootingSystem};

use crate::ecs::{Entity, Registry};
use crate::game::components::{Size, Transform};

/// Tunables for a gameplay schedule instance.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleParams {
    /// Base RNG seed; each randomized system derives its own stream.
    pub seed: u64,
    /// Lobby difficulty 0..2, scales enemy fire intervals.
    pub difficulty: u8,
    /// Percent chance each formation follower carries a gun.
    pub shooter_percent: u8,
    /// Scales formation unit counts.
    pub count_multiplier: f32,
    /// Best-player score per boss spawn.
    pub boss_score_threshold: i32,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            seed: 0,
            difficulty: 1,
            shooter_percent: 30,
            count_multiplier: 1.0,
            boss_score_threshold: 15_000,
        }
    }
}

/// Registers the full gameplay schedule in its required order:
/// Input → Shooting → ChargeShooting → Formation → Movement →
/// EnemyShooting → DespawnOffscreen → DespawnOutOfBounds → Collision →
/// Invincibility → PowerupSpawn → PowerupCollision → InfiniteFire →
/// FormationSpawn → BossSpawn → BossMotion.
pub fn install_schedule(registry: &mut Registry, params: ScheduleParams) {
    registry.add_system(Box::new(InputSystem));
    registry.add_system(Box::new(ShootingSystem));
    registry.add_system(Box::new(ChargeShootingSystem));
    registry.add_system(Box::new(FormationSystem::new()));
    registry.add_system(Box::new(MovementSystem));
    registry.add_system(Box::new(EnemyShootingSystem::new(params.seed ^ 0x51)));
    registry.add_system(Box::new(DespawnOffscreenSystem::new(-50.0)));
    registry.add_system(Box::new(DespawnOutOfBoundsSystem::new(
        -50.0, 1000.0, -50.0, 600.0,
    )));
    registry.add_system(Box::new(CollisionSystem));
    registry.add_system(Box::new(InvincibilitySystem));
    registry.add_system(Box::new(PowerupSpawnSystem::new(params.seed ^ 0x9e)));
    registry.add_system(Box::new(PowerupCollisionSystem));
    registry.add_system(Box::new(InfiniteFireSystem));
    registry.add_system(Box::new(FormationSpawnSystem::new(
        params.seed ^ 0xf7,
        params.difficulty,
        params.shooter_percent,
        params.count_multiplier,
    )));
    registry.add_system(Box::new(BossSpawnSystem::new(params.boss_score_threshold)));
    registry.add_system(Box::new(BossMotionSystem));
}

/// AABB overlap test over the entities' Transform + Size. Entities missing
/// either component never collide.
pub(crate) fn aabb_overlaps(registry: &Registry, a: Entity, b: Entity) -> bool {
    let (Some(ta), Some(sa), Some(tb), Some(sb)) = (
        registry.get::<Transform>(a),
        registry.get::<Size>(a),
        registry.get::<Transform>(b),
        registry.get::<Size>(b),
    ) else {
        return false;
    };
    let ax2 = ta.pos.x + sa.w;
    let ay2 = ta.pos.y + sa.h;
    let bx2 = tb.pos.x + sb.w;
    let by2 = tb.pos.y + sb.h;
    !(ax2 < tb.pos.x || bx2 < ta.pos.x || ay2 < tb.pos.y || by2 < ta.pos.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::{
        ColorRgba, IsPlayer, Lives, NetType, PlayerInput, Score, Shooter, Size, Transform, Velocity,
    };
    use crate::net::protocol::{EntityKind, INPUT_RIGHT, INPUT_SHOOT};

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn full_schedule_runs_a_playable_tick() {
        let mut reg = Registry::new();
        install_schedule(&mut reg, ScheduleParams::default());

        let player = reg.create();
        reg.emplace(player, Transform::new(50.0, 300.0));
        reg.emplace(player, Velocity::default());
        reg.emplace(player, NetType(EntityKind::Player));
        reg.emplace(player, IsPlayer);
        reg.emplace(player, ColorRgba(0x55AAFFFF));
        reg.emplace(
            player,
            PlayerInput {
                bits: INPUT_RIGHT | INPUT_SHOOT,
                speed: 150.0,
            },
        );
        reg.emplace(player, Shooter::default());
        reg.emplace(player, Size::new(20.0, 12.0));
        reg.emplace(player, Score::default());
        reg.emplace(player, Lives { value: 4 });

        for _ in 0..10 {
            reg.update(DT);
        }

        // The ship moved right and the held trigger produced bullets.
        let x = reg.get::<Transform>(player).unwrap().pos.x;
        assert!(x > 50.0);
        assert!(reg.count::<crate::game::components::BulletTag>() > 0);
    }

    #[test]
    fn three_seconds_of_play_spawns_a_wave() {
        let mut reg = Registry::new();
        install_schedule(&mut reg, ScheduleParams::default());

        let player = reg.create();
        reg.emplace(player, Transform::new(50.0, 300.0));
        reg.emplace(player, IsPlayer);
        reg.emplace(player, PlayerInput::default());
        reg.emplace(player, Size::new(20.0, 12.0));
        reg.emplace(player, Score::default());

        for _ in 0..200 {
            reg.update(DT);
        }
        assert!(reg.count::<crate::game::components::EnemyTag>() > 0);
    }
}

