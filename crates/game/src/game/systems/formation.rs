//! Wave placement and the formation spawner.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ecs::{Entity, Registry, System};
use crate::game::components::{
    BossTag, ColorRgba, EnemyShooter, EnemyTag, Formation, FormationFollower, FormationKind,
    NetType, Size, Transform, Velocity,
};
use crate::game::{clamp_y, BOTTOM_MARGIN, TOP_MARGIN, WORLD_H};
use crate::net::protocol::EntityKind;

const SPAWN_X: f32 = 980.0;
const ENEMY_W: f32 = 27.0;
const ENEMY_H: f32 = 18.0;
const SPACING: f32 = 36.0;

/// Moves wave origins and re-places every follower relative to its origin.
/// Snake followers ride a sine on top of the origin line.
pub struct FormationSystem {
    time: f32,
}

impl FormationSystem {
    pub fn new() -> Self {
        Self { time: 0.0 }
    }
}

impl Default for FormationSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for FormationSystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        self.time += dt;

        for origin in registry.entities_with::<Formation>() {
            let Some(vel) = registry.get::<Velocity>(origin).copied() else {
                continue;
            };
            if let Some(transform) = registry.get_mut::<Transform>(origin) {
                transform.pos += vel.vel * dt;
            }
        }

        for follower in registry.entities_with::<FormationFollower>() {
            let Some(info) = registry.get::<FormationFollower>(follower).copied() else {
                continue;
            };
            let Some(formation) = registry.get::<Formation>(info.formation).copied() else {
                continue;
            };
            let Some(origin_pos) = registry.get::<Transform>(info.formation).map(|t| t.pos)
            else {
                continue;
            };

            let mut pos = origin_pos + info.local;
            if formation.kind == FormationKind::Snake {
                let phase = self.time * formation.frequency + info.index as f32 * 0.6;
                pos.y += phase.sin() * formation.amplitude;
            }
            let height = registry.get::<Size>(follower).map(|s| s.h);
            pos.y = match height {
                Some(h) => clamp_y(pos.y, h),
                None => pos.y.clamp(TOP_MARGIN, WORLD_H - BOTTOM_MARGIN),
            };

            if let Some(transform) = registry.get_mut::<Transform>(follower) {
                transform.pos = pos;
            }
            // Leftward velocity kept coherent for snapshot consumers.
            if let Some(velocity) = registry.get_mut::<Velocity>(follower) {
                velocity.vel.x = -formation.speed_x.abs();
            }
        }
    }
}

/// Periodically spawns one of five wave shapes, capped at two live
/// formations and suppressed while a boss is on screen.
pub struct FormationSpawnSystem {
    rng: ChaCha8Rng,
    timer: f32,
    base_interval: f32,
    blocked_by_boss: bool,
    difficulty: u8,
    shooter_percent: u8,
    count_multiplier: f32,
}

impl FormationSpawnSystem {
    pub fn new(seed: u64, difficulty: u8, shooter_percent: u8, count_multiplier: f32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            timer: 0.0,
            base_interval: 3.0,
            blocked_by_boss: false,
            difficulty,
            shooter_percent,
            count_multiplier,
        }
    }

    fn scaled(&self, base: u32) -> u32 {
        ((base as f32 * self.count_multiplier).round() as u32).max(1)
    }

    fn small_interval(&self) -> f32 {
        match self.difficulty {
            2 => 0.9,
            1 => 1.2,
            _ => 1.6,
        }
    }

    fn large_interval(&self) -> f32 {
        match self.difficulty {
            2 => 1.0,
            1 => 1.3,
            _ => 1.7,
        }
    }

    fn roll_shooter(&mut self) -> bool {
        self.rng.gen_range(0..100) < self.shooter_percent as u32
    }

    fn spawn_origin(
        &mut self,
        registry: &mut Registry,
        kind: FormationKind,
        y: f32,
        speed_x: f32,
        amplitude: f32,
        frequency: f32,
        spacing: f32,
        rows: u32,
        cols: u32,
    ) -> Entity {
        let origin = registry.create();
        registry.emplace(origin, Transform::new(SPAWN_X, y));
        registry.emplace(origin, Velocity::new(speed_x, 0.0));
        registry.emplace(
            origin,
            Formation {
                kind,
                speed_x,
                amplitude,
                frequency,
                spacing,
                rows,
                cols,
            },
        );
        origin
    }

    fn spawn_follower(
        &mut self,
        registry: &mut Registry,
        origin: Entity,
        index: u16,
        local: Vec2,
        speed_x: f32,
        size: Size,
        color: u32,
    ) -> Entity {
        let e = registry.create();
        let base = registry
            .get::<Transform>(origin)
            .map(|t| t.pos)
            .unwrap_or(Vec2::new(SPAWN_X, 0.0));
        registry.emplace(e, Transform { pos: base + local });
        registry.emplace(e, Velocity::new(speed_x, 0.0));
        registry.emplace(e, NetType(EntityKind::Enemy));
        registry.emplace(e, ColorRgba(color));
        registry.emplace(e, EnemyTag);
        registry.emplace(e, size);
        registry.emplace(
            e,
            FormationFollower {
                formation: origin,
                index,
                local,
            },
        );
        e
    }

    fn spawn_snake(&mut self, registry: &mut Registry, y: f32, count: u32) {
        let origin = self.spawn_origin(
            registry,
            FormationKind::Snake,
            y,
            -60.0,
            70.0,
            2.5,
            SPACING,
            0,
            0,
        );
        for i in 0..count {
            let e = self.spawn_follower(
                registry,
                origin,
                i as u16,
                Vec2::new(i as f32 * SPACING, 0.0),
                -60.0,
                Size::new(ENEMY_W, ENEMY_H),
                0xFF5555FF,
            );
            if self.roll_shooter() {
                let interval = self.small_interval();
                registry.emplace(e, EnemyShooter::new(interval, 240.0, 0.65));
            }
        }
    }

    fn spawn_line(&mut self, registry: &mut Registry, y: f32, count: u32) {
        let origin =
            self.spawn_origin(registry, FormationKind::Line, y, -60.0, 0.0, 0.0, 40.0, 0, 0);
        for i in 0..count {
            let e = self.spawn_follower(
                registry,
                origin,
                i as u16,
                Vec2::new(i as f32 * 40.0, 0.0),
                -60.0,
                Size::new(ENEMY_W, ENEMY_H),
                0xE06666FF,
            );
            if self.roll_shooter() {
                let interval = self.small_interval();
                registry.emplace(e, EnemyShooter::new(interval, 240.0, 0.62));
            }
        }
    }

    fn spawn_grid(&mut self, registry: &mut Registry, y: f32, rows: u32, cols: u32) {
        let origin = self.spawn_origin(
            registry,
            FormationKind::GridRect,
            y,
            -50.0,
            0.0,
            0.0,
            SPACING,
            rows,
            cols,
        );
        for row in 0..rows {
            for col in 0..cols {
                let index = (row * cols + col) as u16;
                let local = Vec2::new(col as f32 * SPACING, row as f32 * SPACING);
                let e = self.spawn_follower(
                    registry,
                    origin,
                    index,
                    local,
                    -50.0,
                    Size::new(ENEMY_W, ENEMY_H),
                    0xCC4444FF,
                );
                if self.roll_shooter() {
                    let interval = self.large_interval();
                    registry.emplace(e, EnemyShooter::new(interval, 220.0, 0.60));
                }
            }
        }
    }

    fn spawn_triangle(&mut self, registry: &mut Registry, y: f32, rows: u32) {
        let origin = self.spawn_origin(
            registry,
            FormationKind::Triangle,
            y,
            -55.0,
            0.0,
            0.0,
            SPACING,
            rows,
            0,
        );
        // Apex on the left, columns widening to the right, each column
        // centered on the origin line.
        let mut index = 0u16;
        for col in 0..rows {
            let members = col + 1;
            let start_y = -0.5 * (members as f32 - 1.0) * SPACING;
            for row in 0..members {
                let local = Vec2::new(col as f32 * SPACING, start_y + row as f32 * SPACING);
                let e = self.spawn_follower(
                    registry,
                    origin,
                    index,
                    local,
                    -55.0,
                    Size::new(ENEMY_W, ENEMY_H),
                    0xDD7777FF,
                );
                index += 1;
                if self.roll_shooter() {
                    let interval = self.large_interval();
                    registry.emplace(e, EnemyShooter::new(interval, 220.0, 0.60));
                }
            }
        }
    }

    fn spawn_big_shooters(&mut self, registry: &mut Registry, y: f32, count: u32) {
        let origin =
            self.spawn_origin(registry, FormationKind::Line, y, -40.0, 0.0, 0.0, 64.0, 0, 0);
        for i in 0..count {
            let e = self.spawn_follower(
                registry,
                origin,
                i as u16,
                Vec2::new(i as f32 * 64.0, 0.0),
                -40.0,
                Size::new(28.0, 20.0),
                0xAA3333FF,
            );
            let accuracy = self.rng.gen_range(0.5..=0.8);
            registry.emplace(e, EnemyShooter::new(1.2, 240.0, accuracy));
        }
    }

    fn sample_y(&mut self, min_y: f32, max_y: f32) -> f32 {
        let (lo, hi) = if min_y <= max_y {
            (min_y, max_y)
        } else {
            (max_y, min_y)
        };
        self.rng.gen_range(lo..=hi)
    }
}

impl System for FormationSpawnSystem {
    fn update(&mut self, registry: &mut Registry, dt: f32) {
        if registry.count::<BossTag>() > 0 {
            self.blocked_by_boss = true;
            return;
        }
        if self.blocked_by_boss {
            // The boss just died: prime the timer so a wave lands this tick.
            self.blocked_by_boss = false;
            self.timer = self.base_interval;
        }

        self.timer += dt;
        if self.timer < self.base_interval {
            return;
        }
        self.timer = 0.0;

        if registry.count::<Formation>() >= 2 {
            return;
        }

        match self.rng.gen_range(0..5) {
            0 => {
                let amplitude = 70.0;
                let min_y = TOP_MARGIN + amplitude;
                let max_y = WORLD_H - BOTTOM_MARGIN - amplitude - ENEMY_H;
                let y = self.sample_y(min_y, max_y);
                let count = self.scaled(6);
                self.spawn_snake(registry, y, count);
                log::debug!("spawn formation: snake y={:.0} count={}", y, count);
            }
            1 => {
                let y = self.sample_y(TOP_MARGIN, WORLD_H - BOTTOM_MARGIN - ENEMY_H);
                let count = self.scaled(8);
                self.spawn_line(registry, y, count);
                log::debug!("spawn formation: line y={:.0} count={}", y, count);
            }
            2 => {
                let rows = self.scaled(3);
                let cols = self.scaled(5);
                let extent = (rows as f32 - 1.0) * SPACING + ENEMY_H;
                let y = self.sample_y(TOP_MARGIN, WORLD_H - BOTTOM_MARGIN - extent);
                self.spawn_grid(registry, y, rows, cols);
                log::debug!("spawn formation: grid y={:.0} {}x{}", y, rows, cols);
            }
            3 => {
                let rows = self.scaled(5);
                let half = 0.5 * (rows as f32 - 1.0) * SPACING;
                let min_y = TOP_MARGIN + half;
                let max_y = WORLD_H - BOTTOM_MARGIN - half - ENEMY_H;
                let y = self.sample_y(min_y, max_y);
                self.spawn_triangle(registry, y, rows);
                log::debug!("spawn formation: triangle y={:.0} rows={}", y, rows);
            }
            _ => {
                let y = self.sample_y(TOP_MARGIN, WORLD_H - BOTTOM_MARGIN - 20.0);
                let count = self.scaled(3);
                self.spawn_big_shooters(registry, y, count);
                log::debug!("spawn formation: big shooters y={:.0} count={}", y, count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::clamp_y;

    const DT: f32 = 1.0 / 60.0;

    fn force_spawn(sys: &mut FormationSpawnSystem, reg: &mut Registry) {
        sys.timer = sys.base_interval;
        sys.update(reg, DT);
    }

    #[test]
    fn followers_track_origin_offset() {
        let mut reg = Registry::new();
        let origin = reg.create();
        reg.emplace(origin, Transform::new(500.0, 300.0));
        reg.emplace(origin, Velocity::new(-60.0, 0.0));
        reg.emplace(
            origin,
            Formation {
                kind: FormationKind::Line,
                speed_x: -60.0,
                amplitude: 0.0,
                frequency: 0.0,
                spacing: 40.0,
                rows: 0,
                cols: 0,
            },
        );
        let follower = reg.create();
        reg.emplace(follower, Transform::new(0.0, 0.0));
        reg.emplace(follower, Velocity::new(0.0, 0.0));
        reg.emplace(follower, Size::new(ENEMY_W, ENEMY_H));
        reg.emplace(
            follower,
            FormationFollower {
                formation: origin,
                index: 2,
                local: Vec2::new(80.0, 0.0),
            },
        );

        FormationSystem::new().update(&mut reg, DT);

        let origin_x = reg.get::<Transform>(origin).unwrap().pos.x;
        let t = reg.get::<Transform>(follower).unwrap();
        assert!((t.pos.x - (origin_x + 80.0)).abs() < 1e-3);
        assert_eq!(t.pos.y, 300.0);
        // Leftward velocity for snapshot coherence.
        assert_eq!(reg.get::<Velocity>(follower).unwrap().vel.x, -60.0);
    }

    #[test]
    fn snake_offset_follows_sine() {
        let mut reg = Registry::new();
        let origin = reg.create();
        reg.emplace(origin, Transform::new(500.0, 300.0));
        reg.emplace(origin, Velocity::new(0.0, 0.0));
        reg.emplace(
            origin,
            Formation {
                kind: FormationKind::Snake,
                speed_x: -60.0,
                amplitude: 70.0,
                frequency: 2.5,
                spacing: SPACING,
                rows: 0,
                cols: 0,
            },
        );
        let follower = reg.create();
        reg.emplace(follower, Transform::new(0.0, 0.0));
        reg.emplace(follower, Size::new(ENEMY_W, ENEMY_H));
        reg.emplace(
            follower,
            FormationFollower {
                formation: origin,
                index: 3,
                local: Vec2::ZERO,
            },
        );

        let mut sys = FormationSystem::new();
        sys.update(&mut reg, DT);

        let expected = clamp_y(300.0 + (DT * 2.5 + 3.0 * 0.6).sin() * 70.0, ENEMY_H);
        let y = reg.get::<Transform>(follower).unwrap().pos.y;
        assert!((y - expected).abs() < 1e-3);
    }

    #[test]
    fn followers_stay_clamped_inside_playable_band() {
        let mut reg = Registry::new();
        let origin = reg.create();
        // Origin parked near the bottom so the sine would dip below.
        reg.emplace(origin, Transform::new(500.0, WORLD_H));
        reg.emplace(origin, Velocity::new(0.0, 0.0));
        reg.emplace(
            origin,
            Formation {
                kind: FormationKind::Snake,
                speed_x: -60.0,
                amplitude: 70.0,
                frequency: 2.5,
                spacing: SPACING,
                rows: 0,
                cols: 0,
            },
        );
        let follower = reg.create();
        reg.emplace(follower, Transform::new(0.0, 0.0));
        reg.emplace(follower, Size::new(ENEMY_W, ENEMY_H));
        reg.emplace(
            follower,
            FormationFollower {
                formation: origin,
                index: 0,
                local: Vec2::ZERO,
            },
        );

        let mut sys = FormationSystem::new();
        for _ in 0..240 {
            sys.update(&mut reg, DT);
            let y = reg.get::<Transform>(follower).unwrap().pos.y;
            assert!(y >= TOP_MARGIN);
            assert!(y <= WORLD_H - BOTTOM_MARGIN - ENEMY_H);
        }
    }

    #[test]
    fn spawner_fires_on_interval_and_caps_at_two() {
        let mut reg = Registry::new();
        let mut sys = FormationSpawnSystem::new(42, 1, 30, 1.0);

        sys.update(&mut reg, DT);
        assert_eq!(reg.count::<Formation>(), 0);

        force_spawn(&mut sys, &mut reg);
        assert_eq!(reg.count::<Formation>(), 1);
        assert!(reg.count::<EnemyTag>() > 0);

        force_spawn(&mut sys, &mut reg);
        assert_eq!(reg.count::<Formation>(), 2);

        // Third attempt is capped.
        force_spawn(&mut sys, &mut reg);
        assert_eq!(reg.count::<Formation>(), 2);
    }

    #[test]
    fn boss_suppresses_waves_then_forces_one() {
        let mut reg = Registry::new();
        let mut sys = FormationSpawnSystem::new(42, 1, 30, 1.0);

        let boss = reg.create();
        reg.emplace(
            boss,
            BossTag {
                hp: 50,
                max_hp: 50,
                stop_x: 780.0,
                right_margin: 20.0,
                at_stop: false,
                dir_down: true,
                speed_x: -60.0,
                speed_y: 100.0,
            },
        );

        // A long stretch with the boss alive spawns nothing.
        for _ in 0..400 {
            sys.update(&mut reg, DT);
        }
        assert_eq!(reg.count::<Formation>(), 0);

        // Boss dies: the next tick must spawn a wave immediately.
        reg.destroy(boss);
        sys.update(&mut reg, DT);
        assert_eq!(reg.count::<Formation>(), 1);
    }

    #[test]
    fn spawned_followers_sit_inside_vertical_bounds() {
        for seed in 0..20 {
            let mut reg = Registry::new();
            let mut sys = FormationSpawnSystem::new(seed, 1, 30, 1.0);
            force_spawn(&mut sys, &mut reg);

            let mut formation_sys = FormationSystem::new();
            formation_sys.update(&mut reg, DT);
            for e in reg.entities_with::<FormationFollower>() {
                let y = reg.get::<Transform>(e).unwrap().pos.y;
                assert!(y >= TOP_MARGIN - 1e-3);
                assert!(y <= WORLD_H - BOTTOM_MARGIN - ENEMY_H + 2.01);
            }
        }
    }

    #[test]
    fn count_multiplier_scales_units() {
        let mut reg = Registry::new();
        let mut sys = FormationSpawnSystem::new(1, 1, 0, 2.0);
        // Seed 1, first roll decides the shape; whatever it is, doubling the
        // multiplier must at least double the minimum wave size.
        force_spawn(&mut sys, &mut reg);
        assert!(reg.count::<EnemyTag>() >= 6);
    }
}
