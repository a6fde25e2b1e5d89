//! Combat resolution - damage, lethality and respawn

use std::sync::Arc;

use super::error::ActionError;
use super::location::Location;
use super::map::{Grid, ViewCell};
use super::observers::{LocatedGroup, NotifyGroup};
use super::player::{PlayerStats, PlayerView};
use super::UserId;

/// Health below this value kills
pub const ALIVE_THRESHOLD: i32 = 1;

/// One step of an attack, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum AttackOutcome {
    /// Raw damage landed. `health` is the victim's value after the hit,
    /// clamped to zero.
    Hit {
        target: UserId,
        render_id: String,
        health: i32,
        observers: NotifyGroup,
    },
    /// Victim dropped below the alive threshold
    Death {
        target: UserId,
        render_id: String,
        observers: NotifyGroup,
    },
    /// Victim was placed on a fresh cell. Each observer's `relative` is the
    /// new location as seen from that observer.
    Respawn {
        target: UserId,
        view: PlayerView,
        viewport: Vec<Vec<ViewCell>>,
        observers: LocatedGroup,
    },
}

/// Everything an attack produced
#[derive(Debug, Clone, PartialEq)]
pub struct AttackReport {
    /// Victim health after the hit, never negative
    pub health: i32,
    /// Attacker's render box, positioned relative to the attacker
    pub observers: LocatedGroup,
    pub outcomes: Vec<AttackOutcome>,
    /// Updated scoreboard lines of attacker and victim after a kill
    pub stats_changed: Option<Vec<PlayerStats>>,
}

impl AttackReport {
    pub fn is_lethal(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, AttackOutcome::Death { .. }))
    }
}

/// Resolve an attack by `attacker` on the cell it faces. The caller holds
/// the map lock; the victim's health lock is taken inside it and released
/// before any health read of the respawn views.
pub fn resolve_attack(grid: &mut Grid, attacker: UserId) -> Result<AttackReport, ActionError> {
    let slot = grid
        .slot(attacker)
        .ok_or(ActionError::UnknownPlayer(attacker))?;
    let damage = slot.player.character().damage_points();
    let origin = slot.state.location;
    let target_loc = origin.step(slot.state.facing);

    if !grid.contains(target_loc) {
        return Err(ActionError::OutOfMap);
    }
    let target_id = grid.occupant(target_loc).ok_or(ActionError::NoTarget)?;
    let target_slot = grid
        .slot(target_id)
        .ok_or(ActionError::UnknownPlayer(target_id))?;
    let target = Arc::clone(&target_slot.player);
    let defending = target_slot.state.is_defending;

    let mut health = target.health().lock();
    let lethal = health.after_damage(damage, defending) < ALIVE_THRESHOLD;

    // Pick the respawn cell up front so a full map refuses the whole attack.
    let respawn_at = if lethal {
        Some(
            grid.find_spawn_location(Some(target_loc))
                .ok_or(ActionError::NoSpawnLocation)?,
        )
    } else {
        None
    };

    health.take_damage(damage, defending);
    let reported = health.value().max(0);

    let victim_box = grid.players_in_render_box(target_loc).user_ids();
    let mut outcomes = vec![AttackOutcome::Hit {
        target: target_id,
        render_id: target.render_id().to_string(),
        health: reported,
        observers: victim_box.clone(),
    }];

    let mut stats_changed = None;
    if let Some(spawn) = respawn_at {
        if let Some(state) = grid.state_mut(attacker) {
            state.kills += 1;
        }
        if let Some(state) = grid.state_mut(target_id) {
            state.deaths += 1;
        }
        outcomes.push(AttackOutcome::Death {
            target: target_id,
            render_id: target.render_id().to_string(),
            observers: victim_box,
        });

        grid.leave(target_loc);
        grid.join(target_id, spawn)?;
        if let Some(state) = grid.state_mut(target_id) {
            state.respawn_at(spawn);
        }
        health.reset();
        drop(health);

        let view = grid
            .player_view(target_id, Location::default())
            .ok_or(ActionError::UnknownPlayer(target_id))?;
        outcomes.push(AttackOutcome::Respawn {
            target: target_id,
            view,
            viewport: grid.viewport(spawn),
            observers: grid.players_in_render_box(spawn),
        });

        stats_changed = Some(
            [attacker, target_id]
                .iter()
                .filter_map(|id| grid.slot(*id))
                .map(|slot| PlayerStats {
                    grid: slot.player.render_id().to_string(),
                    kills: slot.state.kills,
                    deaths: slot.state.deaths,
                })
                .collect(),
        );
    } else {
        drop(health);
    }

    Ok(AttackReport {
        health: reported,
        observers: grid.players_in_render_box(origin),
        outcomes,
        stats_changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::location::Direction;
    use crate::game::map::{GameMap, Terrain};
    use crate::game::player::{CharacterKind, Player, MAX_HEALTH};

    const DEATH_EDGE: i32 = 10;

    fn duel(map: &GameMap) {
        let mut grid = map.lock();
        grid.place(Arc::new(Player::new(1, CharacterKind::Thug)), Location::new(5, 5))
            .unwrap();
        grid.place(Arc::new(Player::new(2, CharacterKind::Knight)), Location::new(5, 4))
            .unwrap();
    }

    #[test]
    fn hit_reports_target_health() {
        let map = GameMap::new(11, 11, 42);
        duel(&map);
        let mut grid = map.lock();

        let report = resolve_attack(&mut grid, 1).unwrap();
        assert_eq!(report.health, 90);
        assert!(!report.is_lethal());
        assert!(report.stats_changed.is_none());
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.observers.user_ids().contains(2));
    }

    #[test]
    fn defending_target_takes_half() {
        let map = GameMap::new(11, 11, 42);
        duel(&map);
        let mut grid = map.lock();
        grid.state_mut(2).unwrap().is_defending = true;

        assert_eq!(resolve_attack(&mut grid, 1).unwrap().health, 95);
    }

    #[test]
    fn empty_and_outside_cells_are_refused() {
        let map = GameMap::new(11, 11, 42);
        duel(&map);
        let mut grid = map.lock();

        grid.state_mut(1).unwrap().facing = Direction::East;
        assert_eq!(resolve_attack(&mut grid, 1), Err(ActionError::NoTarget));

        grid.state_mut(2).unwrap().facing = Direction::North;
        grid.leave(Location::new(5, 4));
        grid.join(2, Location::new(5, 0)).unwrap();
        assert_eq!(resolve_attack(&mut grid, 2), Err(ActionError::OutOfMap));
    }

    #[test]
    fn lethal_hit_respawns_elsewhere() {
        let map = GameMap::new(11, 11, 42);
        duel(&map);
        let mut grid = map.lock();
        let victim = Arc::clone(&grid.slot(2).unwrap().player);
        victim.health().lock().take_damage(MAX_HEALTH - DEATH_EDGE, false);

        let report = resolve_attack(&mut grid, 1).unwrap();
        assert_eq!(report.health, 0);
        assert!(report.is_lethal());

        let spawn = grid.state(2).unwrap().location;
        assert_ne!(spawn, Location::new(5, 4));
        assert_eq!(victim.health().snapshot(), MAX_HEALTH);
        assert_eq!(grid.state(1).unwrap().kills, 1);
        assert_eq!(grid.state(2).unwrap().deaths, 1);
        assert!(grid.is_consistent());

        match &report.outcomes[..] {
            [AttackOutcome::Hit { .. }, AttackOutcome::Death { .. }, AttackOutcome::Respawn { observers, .. }] => {
                assert_eq!(observers.get(2).unwrap().relative.location(), Location::new(0, 0));
            }
            other => panic!("unexpected outcomes {:?}", other),
        }

        let stats = report.stats_changed.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].kills, 1);
        assert_eq!(stats[1].deaths, 1);
    }

    #[test]
    fn full_map_refuses_lethal_hit_untouched() {
        let rows = vec![vec![Terrain::Water, Terrain::Grass, Terrain::Grass]];
        let map = GameMap::from_terrain(rows, 9).unwrap();
        let mut grid = map.lock();
        grid.place(Arc::new(Player::new(1, CharacterKind::Thug)), Location::new(1, 0))
            .unwrap();
        grid.place(Arc::new(Player::new(2, CharacterKind::Thug)), Location::new(2, 0))
            .unwrap();
        grid.state_mut(1).unwrap().facing = Direction::East;
        let victim = Arc::clone(&grid.slot(2).unwrap().player);
        victim.health().lock().take_damage(MAX_HEALTH - DEATH_EDGE, false);

        assert_eq!(
            resolve_attack(&mut grid, 1),
            Err(ActionError::NoSpawnLocation)
        );
        assert_eq!(victim.health().snapshot(), DEATH_EDGE);
        assert_eq!(grid.state(1).unwrap().kills, 0);
        assert_eq!(grid.state(2).unwrap().location, Location::new(2, 0));
    }
}
