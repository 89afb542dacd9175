//! Movement, input integration, despawn sweeps, and timer systems.

use glam::Vec2;

use crate::ecs::{Registry, System};
use crate::game::components::{
    BulletTag, InfiniteFire, Invincible, PlayerInput, Shooter, Size, Transform, Velocity,
};
use crate::net::protocol::{INPUT_DOWN, INPUT_LEFT, INPUT_RIGHT, INPUT_UP};

/// Integrates held direction bits directly onto player transforms.
pub struct InputSystem;

impl System for InputSystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        for entity in registry.entities_with::<PlayerInput>() {
            let Some(input) = registry.get::<PlayerInput>(entity).copied() else {
                continue;
            };
            let mut dir = Vec2::ZERO;
            if input.bits & INPUT_LEFT != 0 {
                dir.x -= input.speed;
            }
            if input.bits & INPUT_RIGHT != 0 {
                dir.x += input.speed;
            }
            if input.bits & INPUT_UP != 0 {
                dir.y -= input.speed;
            }
            if input.bits & INPUT_DOWN != 0 {
                dir.y += input.speed;
            }
            if let Some(transform) = registry.get_mut::<Transform>(entity) {
                transform.pos += dir * dt;
            }
        }
    }
}

/// `transform += velocity * dt` for everything that moves.
pub struct MovementSystem;

impl System for MovementSystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        for entity in registry.entities_with::<Velocity>() {
            let Some(velocity) = registry.get::<Velocity>(entity).copied() else {
                continue;
            };
            if let Some(transform) = registry.get_mut::<Transform>(entity) {
                transform.pos += velocity.vel * dt;
            }
        }
    }
}

/// Destroys anything that drifted past the left despawn line.
pub struct DespawnOffscreenSystem {
    min_x: f32,
}

impl DespawnOffscreenSystem {
    pub fn new(min_x: f32) -> Self {
        Self { min_x }
    }
}

impl System for DespawnOffscreenSystem {
    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let doomed: Vec<_> = registry
            .iter::<Transform>()
            .filter(|(_, t)| t.pos.x < self.min_x)
            .map(|(e, _)| e)
            .collect();
        for entity in doomed {
            registry.destroy(entity);
        }
    }
}

/// Destroys bullet-tagged entities fully outside the extended play field.
/// Only bullets: players sit still near edges and enemies despawn on the
/// left line.
pub struct DespawnOutOfBoundsSystem {
    min_x: f32,
    max_x: f32,
    min_y: f32,
    max_y: f32,
}

impl DespawnOutOfBoundsSystem {
    pub fn new(min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }
}

impl System for DespawnOutOfBoundsSystem {
    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let mut doomed = Vec::new();
        for entity in registry.entities_with::<BulletTag>() {
            let Some(transform) = registry.get::<Transform>(entity) else {
                continue;
            };
            let (w, h) = registry
                .get::<Size>(entity)
                .map(|s| (s.w, s.h))
                .unwrap_or((0.0, 0.0));
            let pos = transform.pos;
            if pos.x + w < self.min_x
                || pos.x > self.max_x
                || pos.y + h < self.min_y
                || pos.y > self.max_y
            {
                doomed.push(entity);
            }
        }
        for entity in doomed {
            registry.destroy(entity);
        }
    }
}

/// Counts hit immunity down to zero.
pub struct InvincibilitySystem;

impl System for InvincibilitySystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        for entity in registry.entities_with::<Invincible>() {
            if let Some(inv) = registry.get_mut::<Invincible>(entity) {
                inv.time_left = (inv.time_left - dt).max(0.0);
            }
        }
    }
}

/// Counts the infinite-fire timer down and, while it runs, keeps the
/// owner's gun permanently off cooldown.
pub struct InfiniteFireSystem;

impl System for InfiniteFireSystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        for entity in registry.entities_with::<InfiniteFire>() {
            let Some(fire) = registry.get_mut::<InfiniteFire>(entity) else {
                continue;
            };
            fire.time_left = (fire.time_left - dt).max(0.0);
            let active = fire.time_left > 0.0;
            if active {
                if let Some(shooter) = registry.get_mut::<Shooter>(entity) {
                    shooter.cooldown = 0.0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::BulletFaction;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn input_moves_along_held_directions() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Transform::new(100.0, 100.0));
        reg.emplace(
            e,
            PlayerInput {
                bits: INPUT_RIGHT | INPUT_DOWN,
                speed: 150.0,
            },
        );

        InputSystem.update(&mut reg, DT);

        let t = reg.get::<Transform>(e).unwrap();
        assert!((t.pos.x - (100.0 + 150.0 * DT)).abs() < 1e-4);
        assert!((t.pos.y - (100.0 + 150.0 * DT)).abs() < 1e-4);
    }

    #[test]
    fn opposite_directions_cancel() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Transform::new(100.0, 100.0));
        reg.emplace(
            e,
            PlayerInput {
                bits: INPUT_LEFT | INPUT_RIGHT,
                speed: 150.0,
            },
        );

        InputSystem.update(&mut reg, DT);
        assert_eq!(reg.get::<Transform>(e).unwrap().pos.x, 100.0);
    }

    #[test]
    fn movement_integrates_velocity() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Transform::new(0.0, 0.0));
        reg.emplace(e, Velocity::new(60.0, -30.0));

        MovementSystem.update(&mut reg, 0.5);

        let t = reg.get::<Transform>(e).unwrap();
        assert!((t.pos.x - 30.0).abs() < 1e-4);
        assert!((t.pos.y + 15.0).abs() < 1e-4);
    }

    #[test]
    fn offscreen_sweep_destroys_past_left_line() {
        let mut reg = Registry::new();
        let gone = reg.create();
        reg.emplace(gone, Transform::new(-51.0, 10.0));
        let kept = reg.create();
        reg.emplace(kept, Transform::new(-49.0, 10.0));

        DespawnOffscreenSystem::new(-50.0).update(&mut reg, DT);

        assert!(!reg.is_alive(gone));
        assert!(reg.is_alive(kept));
    }

    #[test]
    fn out_of_bounds_sweep_only_touches_bullets() {
        let mut reg = Registry::new();
        let mut sys = DespawnOutOfBoundsSystem::new(-50.0, 1000.0, -50.0, 600.0);

        let bullet = reg.create();
        reg.emplace(bullet, Transform::new(1001.0, 10.0));
        reg.emplace(bullet, Size::new(6.0, 3.0));
        reg.emplace(
            bullet,
            BulletTag {
                faction: BulletFaction::Player,
            },
        );

        let stray = reg.create();
        reg.emplace(stray, Transform::new(1001.0, 10.0));

        sys.update(&mut reg, DT);

        assert!(!reg.is_alive(bullet));
        assert!(reg.is_alive(stray));
    }

    #[test]
    fn invincibility_counts_down_and_floors_at_zero() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Invincible { time_left: 0.02 });

        InvincibilitySystem.update(&mut reg, DT);
        assert!(reg.get::<Invincible>(e).unwrap().time_left > 0.0);

        InvincibilitySystem.update(&mut reg, DT);
        assert_eq!(reg.get::<Invincible>(e).unwrap().time_left, 0.0);
    }

    #[test]
    fn infinite_fire_pins_cooldown_while_active() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, InfiniteFire { time_left: 1.0 });
        reg.emplace(
            e,
            Shooter {
                cooldown: 0.5,
                ..Default::default()
            },
        );

        InfiniteFireSystem.update(&mut reg, DT);
        assert_eq!(reg.get::<Shooter>(e).unwrap().cooldown, 0.0);

        // Expired timer stops overriding.
        reg.get_mut::<InfiniteFire>(e).unwrap().time_left = 0.0;
        reg.get_mut::<Shooter>(e).unwrap().cooldown = 0.5;
        InfiniteFireSystem.update(&mut reg, DT);
        assert_eq!(reg.get::<Shooter>(e).unwrap().cooldown, 0.5);
    }
}
