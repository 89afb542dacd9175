//! Player guns, the charge beam, and aimed enemy fire.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ecs::{Entity, Registry, System};
use crate::game::components::{
    BeamTag, BulletFaction, BulletOwner, BulletTag, ChargeGun, ColorRgba, EnemyShooter, IsPlayer,
    NetType, PlayerInput, Shooter, Size, Transform, Velocity,
};
use crate::net::protocol::{EntityKind, INPUT_CHARGE, INPUT_SHOOT};

const PLAYER_BULLET_COLOR: u32 = 0xFFFF55FF;
const BEAM_COLOR: u32 = 0x77CCFFFF;
const ENEMY_BULLET_COLOR: u32 = 0xFFAA00FF;

fn spawn_bullet(
    registry: &mut Registry,
    pos: Vec2,
    vel: Vec2,
    size: Size,
    color: u32,
    faction: BulletFaction,
    owner: Option<Entity>,
) -> Entity {
    let bullet = registry.create();
    registry.emplace(bullet, Transform { pos });
    registry.emplace(bullet, Velocity { vel });
    registry.emplace(bullet, NetType(EntityKind::Bullet));
    registry.emplace(bullet, ColorRgba(color));
    registry.emplace(bullet, BulletTag { faction });
    registry.emplace(bullet, size);
    if let Some(owner) = owner {
        registry.emplace(bullet, BulletOwner { owner });
    }
    bullet
}

/// Spawns straight bullets while the shoot bit is held and the cooldown
/// allows. The cooldown is advanced in a loop so a long tick still yields
/// every shot it covers.
pub struct ShootingSystem;

impl System for ShootingSystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        for entity in registry.entities_with::<PlayerInput>() {
            let Some(input) = registry.get::<PlayerInput>(entity).copied() else {
                continue;
            };
            let Some(origin) = registry.get::<Transform>(entity).map(|t| t.pos) else {
                continue;
            };
            let Some(shooter) = registry.get_mut::<Shooter>(entity) else {
                continue;
            };
            shooter.cooldown -= dt;
            let want_shoot = input.bits & INPUT_SHOOT != 0;
            if !want_shoot {
                continue;
            }
            let mut shots = 0u32;
            while registry
                .get::<Shooter>(entity)
                .is_some_and(|s| s.cooldown <= 0.0)
            {
                let speed = {
                    let shooter = registry.get_mut::<Shooter>(entity).unwrap();
                    shooter.cooldown += shooter.interval;
                    shooter.bullet_speed
                };
                spawn_bullet(
                    registry,
                    origin + Vec2::new(20.0, 5.0),
                    Vec2::new(speed, 0.0),
                    Size::new(6.0, 3.0),
                    PLAYER_BULLET_COLOR,
                    BulletFaction::Player,
                    Some(entity),
                );
                shots += 1;
                if shots > 1000 {
                    // A zero interval would never leave the loop.
                    break;
                }
            }
        }
    }
}

/// Accumulates charge while the charge bit is held; on release spawns a
/// wide beam whose thickness scales with the stored charge.
pub struct ChargeShootingSystem;

impl System for ChargeShootingSystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        for entity in registry.entities_with::<PlayerInput>() {
            let Some(input) = registry.get::<PlayerInput>(entity).copied() else {
                continue;
            };
            let Some(origin) = registry.get::<Transform>(entity).map(|t| t.pos) else {
                continue;
            };
            let Some(gun) = registry.get_mut::<ChargeGun>(entity) else {
                continue;
            };
            if input.bits & INPUT_CHARGE != 0 {
                gun.charge = (gun.charge + dt).min(gun.max_charge);
                continue;
            }
            if gun.charge <= 0.05 {
                gun.charge = 0.0;
                continue;
            }
            let thickness = 8.0 + (gun.charge / gun.max_charge) * 44.0;
            gun.charge = 0.0;
            let beam = spawn_bullet(
                registry,
                origin + Vec2::new(10.0, 6.0 - thickness * 0.5),
                Vec2::new(600.0, 0.0),
                Size::new(700.0, thickness),
                BEAM_COLOR,
                BulletFaction::Player,
                Some(entity),
            );
            registry.emplace(beam, BeamTag);
        }
    }
}

/// Enemy guns aim at the nearest live player with an accuracy-scaled
/// angular jitter.
pub struct EnemyShootingSystem {
    rng: ChaCha8Rng,
}

impl EnemyShootingSystem {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl System for EnemyShootingSystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        let players: Vec<(Entity, Vec2)> = registry
            .entities_with::<IsPlayer>()
            .into_iter()
            .filter_map(|e| registry.get::<Transform>(e).map(|t| (e, t.pos)))
            .collect();
        if players.is_empty() {
            return;
        }

        for entity in registry.entities_with::<EnemyShooter>() {
            let Some(shooter) = registry.get_mut::<EnemyShooter>(entity) else {
                continue;
            };
            shooter.cooldown -= dt;
            if shooter.cooldown > 0.0 {
                continue;
            }
            let (interval, bullet_speed, accuracy) =
                (shooter.interval, shooter.bullet_speed, shooter.accuracy);
            let Some(origin) = registry.get::<Transform>(entity).map(|t| t.pos) else {
                continue;
            };

            let nearest = players
                .iter()
                .min_by(|(_, a), (_, b)| {
                    let da = a.distance_squared(origin);
                    let db = b.distance_squared(origin);
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(_, pos)| *pos)
                .unwrap_or(origin);

            let mut dir = nearest - origin;
            if dir.length() < 1e-3 {
                dir = Vec2::X;
            }
            dir = dir.normalize();

            let accuracy = accuracy.clamp(0.5, 0.8);
            let max_angle = (1.0 - accuracy) * 0.5;
            let angle: f32 = self.rng.gen_range(-max_angle..=max_angle);
            let (sin, cos) = angle.sin_cos();
            let aimed = Vec2::new(dir.x * cos - dir.y * sin, dir.x * sin + dir.y * cos);

            spawn_bullet(
                registry,
                origin + Vec2::new(-10.0, 6.0),
                aimed * bullet_speed,
                Size::new(6.0, 3.0),
                ENEMY_BULLET_COLOR,
                BulletFaction::Enemy,
                None,
            );
            if let Some(shooter) = registry.get_mut::<EnemyShooter>(entity) {
                shooter.cooldown += interval;
            }
        }
    }
}
