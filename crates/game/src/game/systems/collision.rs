//! Bullet, ship, and power-up collision resolution.

use crate::ecs::{Entity, Registry, System};
use crate::game::components::{
    BeamTag, BossTag, BulletFaction, BulletOwner, BulletTag, EnemyTag, HitFlag, InfiniteFire,
    Invincible, IsPlayer, LifePickup, PlayerInput, PowerupKind, PowerupTag, Score,
};
use crate::game::systems::aabb_overlaps;

const KILL_SCORE: i32 = 50;
const BOSS_KILL_SCORE: i32 = 1000;

fn award(registry: &mut Registry, bullet: Entity, points: i32) {
    // A dead or missing owner forfeits the points.
    let Some(owner) = registry.get::<BulletOwner>(bullet).map(|o| o.owner) else {
        return;
    };
    if let Some(score) = registry.get_mut::<Score>(owner) {
        score.value += points;
    }
}

fn mark_hit(registry: &mut Registry, player: Entity) {
    match registry.get_mut::<HitFlag>(player) {
        Some(flag) => flag.value = true,
        None => registry.emplace(player, HitFlag { value: true }),
    }
    match registry.get_mut::<Invincible>(player) {
        Some(inv) => inv.time_left = inv.time_left.max(1.0),
        None => registry.emplace(player, Invincible { time_left: 1.0 }),
    }
}

fn is_invincible(registry: &Registry, player: Entity) -> bool {
    registry
        .get::<Invincible>(player)
        .is_some_and(|inv| inv.time_left > 0.0)
}

/// AABB overlap resolution: player bullets against enemies and the boss,
/// enemy bullets against players, and direct ship-to-enemy contact.
pub struct CollisionSystem;

impl System for CollisionSystem {
    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let mut doomed: Vec<Entity> = Vec::new();

        for bullet in registry.entities_with::<BulletTag>() {
            let Some(tag) = registry.get::<BulletTag>(bullet).copied() else {
                continue;
            };
            let is_beam = registry.get::<BeamTag>(bullet).is_some();

            match tag.faction {
                BulletFaction::Player => {
                    for enemy in registry.entities_with::<EnemyTag>() {
                        if doomed.contains(&enemy) {
                            continue;
                        }
                        if !aabb_overlaps(registry, bullet, enemy) {
                            continue;
                        }
                        if registry.get::<BossTag>(enemy).is_some() {
                            let hp = {
                                let boss = registry.get_mut::<BossTag>(enemy).unwrap();
                                if boss.hp > 0 {
                                    boss.hp -= 1;
                                }
                                boss.hp
                            };
                            if !is_beam {
                                doomed.push(bullet);
                            }
                            if hp <= 0 {
                                award(registry, bullet, BOSS_KILL_SCORE);
                                doomed.push(enemy);
                            }
                            if !is_beam {
                                break;
                            }
                            continue;
                        }
                        award(registry, bullet, KILL_SCORE);
                        doomed.push(enemy);
                        if !is_beam {
                            doomed.push(bullet);
                            break;
                        }
                    }
                }
                BulletFaction::Enemy => {
                    for player in registry.entities_with::<IsPlayer>() {
                        if !aabb_overlaps(registry, bullet, player) {
                            continue;
                        }
                        if is_invincible(registry, player) {
                            doomed.push(bullet);
                            break;
                        }
                        mark_hit(registry, player);
                        doomed.push(bullet);
                        break;
                    }
                }
            }
        }

        // Ship-to-enemy contact: one collision per player per tick, the
        // enemy dies with it.
        for player in registry.entities_with::<IsPlayer>() {
            if is_invincible(registry, player) {
                continue;
            }
            for enemy in registry.entities_with::<EnemyTag>() {
                if doomed.contains(&enemy) {
                    continue;
                }
                if aabb_overlaps(registry, player, enemy) {
                    mark_hit(registry, player);
                    doomed.push(enemy);
                    break;
                }
            }
        }

        for entity in doomed {
            registry.destroy(entity);
        }
    }
}

/// Applies power-up effects on player contact and consumes the pickup.
pub struct PowerupCollisionSystem;

impl System for PowerupCollisionSystem {
    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let mut doomed: Vec<Entity> = Vec::new();

        for powerup in registry.entities_with::<PowerupTag>() {
            let Some(kind) = registry.get::<PowerupTag>(powerup).map(|p| p.kind) else {
                continue;
            };
            for player in registry.entities_with::<PlayerInput>() {
                if !aabb_overlaps(registry, powerup, player) {
                    continue;
                }
                match kind {
                    PowerupKind::Life => match registry.get_mut::<LifePickup>(player) {
                        Some(pickup) => pickup.pending = true,
                        None => registry.emplace(player, LifePickup { pending: true }),
                    },
                    PowerupKind::Invincibility => match registry.get_mut::<Invincible>(player) {
                        Some(inv) => inv.time_left = inv.time_left.max(10.0),
                        None => registry.emplace(player, Invincible { time_left: 10.0 }),
                    },
                    PowerupKind::ClearBoard => {
                        let enemies = registry.entities_with::<EnemyTag>();
                        let cleared = enemies.len() as i32;
                        doomed.extend(enemies);
                        if let Some(score) = registry.get_mut::<Score>(player) {
                            score.value += KILL_SCORE * cleared;
                        }
                    }
                    PowerupKind::InfiniteFire => match registry.get_mut::<InfiniteFire>(player) {
                        Some(fire) => fire.time_left = fire.time_left.max(10.0),
                        None => registry.emplace(player, InfiniteFire { time_left: 10.0 }),
                    },
                }
                doomed.push(powerup);
                break;
            }
        }

        for entity in doomed {
            registry.destroy(entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::{ColorRgba, NetType, Size, Transform, Velocity};
    use crate::net::protocol::EntityKind;

    const DT: f32 = 1.0 / 60.0;

    fn player_at(reg: &mut Registry, x: f32, y: f32) -> Entity {
        let e = reg.create();
        reg.emplace(e, Transform::new(x, y));
        reg.emplace(e, Size::new(20.0, 12.0));
        reg.emplace(e, IsPlayer);
        reg.emplace(e, PlayerInput::default());
        reg.emplace(e, Score::default());
        e
    }

    fn enemy_at(reg: &mut Registry, x: f32, y: f32) -> Entity {
        let e = reg.create();
        reg.emplace(e, Transform::new(x, y));
        reg.emplace(e, Size::new(27.0, 18.0));
        reg.emplace(e, EnemyTag);
        e
    }

    fn bullet_at(
        reg: &mut Registry,
        x: f32,
        y: f32,
        faction: BulletFaction,
        owner: Option<Entity>,
    ) -> Entity {
        let e = reg.create();
        reg.emplace(e, Transform::new(x, y));
        reg.emplace(e, Size::new(6.0, 3.0));
        reg.emplace(e, BulletTag { faction });
        if let Some(owner) = owner {
            reg.emplace(e, BulletOwner { owner });
        }
        e
    }

    #[test]
    fn bullet_kills_enemy_and_awards_owner() {
        let mut reg = Registry::new();
        let shooter = player_at(&mut reg, 0.0, 0.0);
        let enemy = enemy_at(&mut reg, 102.0, 101.0);
        let bullet = bullet_at(&mut reg, 100.0, 100.0, BulletFaction::Player, Some(shooter));

        CollisionSystem.update(&mut reg, DT);

        assert!(!reg.is_alive(enemy));
        assert!(!reg.is_alive(bullet));
        assert_eq!(reg.get::<Score>(shooter).unwrap().value, 50);
    }

    #[test]
    fn beam_passes_through_multiple_enemies() {
        let mut reg = Registry::new();
        let shooter = player_at(&mut reg, 0.0, 300.0);
        let enemies: Vec<Entity> = (0..3)
            .map(|i| enemy_at(&mut reg, 200.0 + i as f32 * 100.0, 100.0))
            .collect();

        let beam = reg.create();
        reg.emplace(beam, Transform::new(60.0, 95.0));
        reg.emplace(beam, Size::new(700.0, 30.0));
        reg.emplace(
            beam,
            BulletTag {
                faction: BulletFaction::Player,
            },
        );
        reg.emplace(beam, BulletOwner { owner: shooter });
        reg.emplace(beam, BeamTag);

        CollisionSystem.update(&mut reg, DT);

        for enemy in enemies {
            assert!(!reg.is_alive(enemy));
        }
        assert!(reg.is_alive(beam));
        assert_eq!(reg.get::<Score>(shooter).unwrap().value, 150);
    }

    #[test]
    fn non_beam_bullet_consumes_on_single_target() {
        let mut reg = Registry::new();
        let shooter = player_at(&mut reg, 0.0, 300.0);
        enemy_at(&mut reg, 100.0, 100.0);
        enemy_at(&mut reg, 100.0, 100.0);
        let bullet = bullet_at(&mut reg, 101.0, 101.0, BulletFaction::Player, Some(shooter));

        CollisionSystem.update(&mut reg, DT);

        assert!(!reg.is_alive(bullet));
        // Exactly one target died.
        assert_eq!(reg.count::<EnemyTag>(), 1);
        assert_eq!(reg.get::<Score>(shooter).unwrap().value, 50);
    }

    #[test]
    fn enemy_bullet_marks_player_and_grants_immunity() {
        let mut reg = Registry::new();
        let player = player_at(&mut reg, 100.0, 100.0);
        let bullet = bullet_at(&mut reg, 105.0, 105.0, BulletFaction::Enemy, None);

        CollisionSystem.update(&mut reg, DT);

        assert!(!reg.is_alive(bullet));
        assert!(reg.get::<HitFlag>(player).unwrap().value);
        assert!(reg.get::<Invincible>(player).unwrap().time_left >= 1.0);
    }

    #[test]
    fn invincible_player_only_eats_the_bullet() {
        let mut reg = Registry::new();
        let player = player_at(&mut reg, 100.0, 100.0);
        reg.emplace(player, Invincible { time_left: 5.0 });
        let bullet = bullet_at(&mut reg, 105.0, 105.0, BulletFaction::Enemy, None);

        CollisionSystem.update(&mut reg, DT);

        assert!(!reg.is_alive(bullet));
        assert!(reg.get::<HitFlag>(player).is_none());
        assert_eq!(reg.get::<Invincible>(player).unwrap().time_left, 5.0);
    }

    #[test]
    fn ramming_an_enemy_hurts_both() {
        let mut reg = Registry::new();
        let player = player_at(&mut reg, 100.0, 100.0);
        let enemy = enemy_at(&mut reg, 110.0, 105.0);

        CollisionSystem.update(&mut reg, DT);

        assert!(!reg.is_alive(enemy));
        assert!(reg.get::<HitFlag>(player).unwrap().value);
        assert!(reg.get::<Invincible>(player).unwrap().time_left >= 1.0);
    }

    #[test]
    fn boss_absorbs_hits_then_dies_for_big_score() {
        let mut reg = Registry::new();
        let shooter = player_at(&mut reg, 0.0, 300.0);
        reg.emplace(shooter, Invincible { time_left: 60.0 });

        let boss = reg.create();
        reg.emplace(boss, Transform::new(100.0, 100.0));
        reg.emplace(boss, Size::new(160.0, 120.0));
        reg.emplace(boss, EnemyTag);
        reg.emplace(
            boss,
            BossTag {
                hp: 2,
                max_hp: 50,
                stop_x: 780.0,
                right_margin: 20.0,
                at_stop: true,
                dir_down: true,
                speed_x: -60.0,
                speed_y: 100.0,
            },
        );

        let first = bullet_at(&mut reg, 110.0, 110.0, BulletFaction::Player, Some(shooter));
        CollisionSystem.update(&mut reg, DT);
        assert!(!reg.is_alive(first));
        assert!(reg.is_alive(boss));
        assert_eq!(reg.get::<BossTag>(boss).unwrap().hp, 1);
        assert_eq!(reg.get::<Score>(shooter).unwrap().value, 0);

        bullet_at(&mut reg, 110.0, 110.0, BulletFaction::Player, Some(shooter));
        CollisionSystem.update(&mut reg, DT);
        assert!(!reg.is_alive(boss));
        assert_eq!(reg.get::<Score>(shooter).unwrap().value, 1000);
    }

    fn powerup_at(reg: &mut Registry, x: f32, y: f32, kind: PowerupKind) -> Entity {
        let e = reg.create();
        reg.emplace(e, Transform::new(x, y));
        reg.emplace(e, Size::new(18.0, 18.0));
        reg.emplace(e, PowerupTag { kind });
        reg.emplace(e, Velocity::new(-90.0, 0.0));
        reg.emplace(e, NetType(EntityKind::Powerup));
        reg.emplace(e, ColorRgba(kind.color()));
        e
    }

    #[test]
    fn life_pickup_sets_pending_flag() {
        let mut reg = Registry::new();
        let player = player_at(&mut reg, 100.0, 100.0);
        let pu = powerup_at(&mut reg, 105.0, 105.0, PowerupKind::Life);

        PowerupCollisionSystem.update(&mut reg, DT);

        assert!(!reg.is_alive(pu));
        assert!(reg.get::<LifePickup>(player).unwrap().pending);
    }

    #[test]
    fn life_pickup_rearms_a_consumed_flag() {
        let mut reg = Registry::new();
        let player = player_at(&mut reg, 100.0, 100.0);
        reg.emplace(player, LifePickup { pending: false });
        powerup_at(&mut reg, 105.0, 105.0, PowerupKind::Life);

        PowerupCollisionSystem.update(&mut reg, DT);
        assert!(reg.get::<LifePickup>(player).unwrap().pending);
    }

    #[test]
    fn invincibility_pickup_extends_not_shrinks() {
        let mut reg = Registry::new();
        let player = player_at(&mut reg, 100.0, 100.0);
        reg.emplace(player, Invincible { time_left: 15.0 });
        powerup_at(&mut reg, 105.0, 105.0, PowerupKind::Invincibility);

        PowerupCollisionSystem.update(&mut reg, DT);
        assert_eq!(reg.get::<Invincible>(player).unwrap().time_left, 15.0);
    }

    #[test]
    fn clear_board_destroys_enemies_and_pays_per_kill() {
        let mut reg = Registry::new();
        let player = player_at(&mut reg, 100.0, 100.0);
        enemy_at(&mut reg, 500.0, 100.0);
        enemy_at(&mut reg, 600.0, 200.0);
        enemy_at(&mut reg, 700.0, 300.0);
        powerup_at(&mut reg, 105.0, 105.0, PowerupKind::ClearBoard);

        PowerupCollisionSystem.update(&mut reg, DT);

        assert_eq!(reg.count::<EnemyTag>(), 0);
        assert_eq!(reg.get::<Score>(player).unwrap().value, 150);
    }

    #[test]
    fn infinite_fire_pickup_arms_timer() {
        let mut reg = Registry::new();
        let player = player_at(&mut reg, 100.0, 100.0);
        powerup_at(&mut reg, 105.0, 105.0, PowerupKind::InfiniteFire);

        PowerupCollisionSystem.update(&mut reg, DT);
        assert_eq!(reg.get::<InfiniteFire>(player).unwrap().time_left, 10.0);
    }

    #[test]
    fn missed_powerup_survives() {
        let mut reg = Registry::new();
        player_at(&mut reg, 100.0, 100.0);
        let pu = powerup_at(&mut reg, 500.0, 500.0, PowerupKind::Life);

        PowerupCollisionSystem.update(&mut reg, DT);
        assert!(reg.is_alive(pu));
    }
}
