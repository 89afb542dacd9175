//! Boss spawning and movement.

use crate::ecs::{Registry, System};
use crate::game::components::{
    BossTag, ColorRgba, EnemyTag, NetType, Score, Size, Transform, Velocity,
};
use crate::game::{BOTTOM_MARGIN, TOP_MARGIN, WORLD_H, WORLD_W};
use crate::net::protocol::EntityKind;

const BOSS_W: f32 = 160.0;
const BOSS_H: f32 = 120.0;
const BOSS_HP: i32 = 50;
const BOSS_COLOR: u32 = 0x9646B4FF;
const BOSS_RIGHT_MARGIN: f32 = 20.0;
const BOSS_SPEED_X: f32 = -60.0;
const BOSS_SPEED_Y: f32 = 100.0;
const BOSS_SPAWN_X: f32 = 1040.0;

/// Spawns a boss each time the best player score crosses another multiple
/// of the threshold. At most one boss lives at a time.
pub struct BossSpawnSystem {
    threshold: i32,
    spawned: i32,
}

impl BossSpawnSystem {
    pub fn new(threshold: i32) -> Self {
        Self {
            threshold,
            spawned: 0,
        }
    }
}

impl System for BossSpawnSystem {
    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        if registry.count::<BossTag>() > 0 {
            return;
        }
        if self.threshold <= 0 {
            return;
        }

        let best_score = registry
            .iter::<Score>()
            .map(|(_, s)| s.value)
            .max()
            .unwrap_or(0);
        if best_score / self.threshold <= self.spawned {
            return;
        }

        let y_min = TOP_MARGIN;
        let y_max = (WORLD_H - BOTTOM_MARGIN - BOSS_H).max(y_min);
        let y = 0.5 * (y_min + y_max);

        let boss = registry.create();
        registry.emplace(boss, Transform::new(BOSS_SPAWN_X, y));
        registry.emplace(boss, Velocity::new(BOSS_SPEED_X, 0.0));
        registry.emplace(boss, Size::new(BOSS_W, BOSS_H));
        registry.emplace(boss, ColorRgba(BOSS_COLOR));
        registry.emplace(boss, NetType(EntityKind::Enemy));
        registry.emplace(boss, EnemyTag);
        registry.emplace(
            boss,
            BossTag {
                hp: BOSS_HP,
                max_hp: BOSS_HP,
                stop_x: WORLD_W - BOSS_RIGHT_MARGIN - BOSS_W,
                right_margin: BOSS_RIGHT_MARGIN,
                at_stop: false,
                dir_down: true,
                speed_x: BOSS_SPEED_X,
                speed_y: BOSS_SPEED_Y,
            },
        );

        self.spawned += 1;
        log::info!("boss spawned (#{}) at score {}", self.spawned, best_score);
    }
}

/// Drives the boss toward its stop column, then bounces it vertically
/// inside the playable band.
pub struct BossMotionSystem;

impl System for BossMotionSystem {
    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        for entity in registry.entities_with::<BossTag>() {
            let Some(boss) = registry.get::<BossTag>(entity).copied() else {
                continue;
            };
            let Some(height) = registry.get::<Size>(entity).map(|s| s.h) else {
                continue;
            };
            let Some(pos) = registry.get::<Transform>(entity).map(|t| t.pos) else {
                continue;
            };
            if registry.get::<Velocity>(entity).is_none() {
                registry.emplace(entity, Velocity::default());
            }

            let min_y = TOP_MARGIN;
            let max_y = WORLD_H - BOTTOM_MARGIN - height;
            let mut new_boss = boss;
            let mut new_pos = pos;
            let mut new_vel = registry.get::<Velocity>(entity).copied().unwrap_or_default();

            if !boss.at_stop {
                if pos.x > boss.stop_x {
                    new_vel.vel.x = boss.speed_x;
                } else {
                    new_pos.x = boss.stop_x;
                    new_vel.vel.x = 0.0;
                    new_boss.at_stop = true;
                }
                new_vel.vel.y = 0.0;
            } else {
                new_vel.vel.x = 0.0;
                if new_boss.dir_down {
                    new_vel.vel.y = boss.speed_y.abs();
                    if pos.y >= max_y {
                        new_boss.dir_down = false;
                    }
                } else {
                    new_vel.vel.y = -boss.speed_y.abs();
                    if pos.y <= min_y {
                        new_boss.dir_down = true;
                    }
                }
            }
            new_pos.y = new_pos.y.clamp(min_y, max_y);

            if let Some(transform) = registry.get_mut::<Transform>(entity) {
                transform.pos = new_pos;
            }
            if let Some(velocity) = registry.get_mut::<Velocity>(entity) {
                *velocity = new_vel;
            }
            if let Some(tag) = registry.get_mut::<BossTag>(entity) {
                *tag = new_boss;
            }
        }
    }
}
