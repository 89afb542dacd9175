//! Score-threshold power-up spawner.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ecs::{Registry, System};
use crate::game::components::{
    ColorRgba, IsPlayer, NetType, PowerupKind, PowerupTag, Score, Size, Transform, Velocity,
};
use crate::game::{BOTTOM_MARGIN, TOP_MARGIN, WORLD_H};
use crate::net::protocol::EntityKind;

const SPAWN_X: f32 = 1020.0;
const POWERUP_SIZE: f32 = 18.0;
const POWERUP_SPEED: f32 = 90.0;
const THRESHOLD_MIN: i32 = 1500;
const THRESHOLD_MAX: i32 = 2000;

/// Spawns one power-up per crossed score threshold, drifting in from the
/// right edge. The next threshold re-rolls after every spawn.
pub struct PowerupSpawnSystem {
    rng: ChaCha8Rng,
    next_score: i32,
}

impl PowerupSpawnSystem {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let next_score = rng.gen_range(THRESHOLD_MIN..=THRESHOLD_MAX);
        Self { rng, next_score }
    }

    /// Pins the next threshold; test hook for crafted scenarios.
    pub fn with_threshold(seed: u64, threshold: i32) -> Self {
        let mut system = Self::new(seed);
        system.next_score = threshold;
        system
    }

    fn roll_kind(&mut self) -> PowerupKind {
        match self.rng.gen_range(0..4) {
            0 => PowerupKind::Life,
            1 => PowerupKind::Invincibility,
            2 => PowerupKind::ClearBoard,
            _ => PowerupKind::InfiniteFire,
        }
    }
}

impl System for PowerupSpawnSystem {
    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let team_score: i32 = registry
            .entities_with::<IsPlayer>()
            .into_iter()
            .filter_map(|e| registry.get::<Score>(e).map(|s| s.value))
            .sum();

        while team_score >= self.next_score {
            let min_y = TOP_MARGIN + 16.0;
            let max_y = WORLD_H - BOTTOM_MARGIN - 16.0;
            let y = self.rng.gen_range(min_y..=max_y);
            let kind = self.roll_kind();

            let powerup = registry.create();
            registry.emplace(powerup, Transform::new(SPAWN_X, y));
            registry.emplace(powerup, Velocity::new(-POWERUP_SPEED, 0.0));
            registry.emplace(powerup, PowerupTag { kind });
            registry.emplace(powerup, NetType(EntityKind::Powerup));
            registry.emplace(powerup, Size::new(POWERUP_SIZE, POWERUP_SIZE));
            registry.emplace(powerup, ColorRgba(kind.color()));

            self.next_score += self.rng.gen_range(THRESHOLD_MIN..=THRESHOLD_MAX);
            log::debug!(
                "powerup spawned: {:?} at y={:.0}, next threshold {}",
                kind,
                y,
                self.next_score
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn scoring_player(reg: &mut Registry, score: i32) {
        let e = reg.create();
        reg.emplace(e, IsPlayer);
        reg.emplace(e, Score { value: score });
    }

    #[test]
    fn initial_threshold_lands_in_seeded_band() {
        for seed in 0..16 {
            let system = PowerupSpawnSystem::new(seed);
            assert!(system.next_score >= THRESHOLD_MIN);
            assert!(system.next_score <= THRESHOLD_MAX);
        }
    }

    #[test]
    fn no_spawn_below_threshold() {
        let mut reg = Registry::new();
        scoring_player(&mut reg, 150);
        let mut system = PowerupSpawnSystem::with_threshold(1, 1500);

        system.update(&mut reg, DT);
        assert_eq!(reg.count::<PowerupTag>(), 0);
    }

    #[test]
    fn crafted_threshold_spawns_right_edge_drifter() {
        let mut reg = Registry::new();
        scoring_player(&mut reg, 150);
        let mut system = PowerupSpawnSystem::with_threshold(1, 100);

        system.update(&mut reg, DT);

        let powerups = reg.entities_with::<PowerupTag>();
        assert_eq!(powerups.len(), 1);
        let pu = powerups[0];
        let t = reg.get::<Transform>(pu).unwrap();
        assert_eq!(t.pos.x, SPAWN_X);
        assert!(t.pos.y >= TOP_MARGIN + 16.0);
        assert!(t.pos.y <= WORLD_H - BOTTOM_MARGIN - 16.0);
        assert_eq!(
            reg.get::<Velocity>(pu).unwrap().vel.x,
            -POWERUP_SPEED
        );
        // The threshold advanced into the next band.
        assert!(system.next_score >= 100 + THRESHOLD_MIN);
    }

    #[test]
    fn one_spawn_per_threshold_crossed() {
        let mut reg = Registry::new();
        scoring_player(&mut reg, 3600);
        let mut system = PowerupSpawnSystem::with_threshold(2, 1500);

        system.update(&mut reg, DT);

        // 3600 crosses 1500 and at least one follow-up threshold
        // (1500 + [1500, 2000]), never more than two.
        let count = reg.count::<PowerupTag>();
        assert!((1..=2).contains(&count));
        assert!(system.next_score > 3600);
    }

    #[test]
    fn color_matches_kind() {
        let mut reg = Registry::new();
        scoring_player(&mut reg, 5000);
        let mut system = PowerupSpawnSystem::with_threshold(3, 100);

        system.update(&mut reg, DT);
        for e in reg.entities_with::<PowerupTag>() {
            let kind = reg.get::<PowerupTag>(e).unwrap().kind;
            assert_eq!(reg.get::<ColorRgba>(e).unwrap().0, kind.color());
        }
    }
}
