//! The battle: map, roster and action resolution

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::util::rate_limit::{OpKind, OpLimits};

use super::actions::{Action, ActionOutcome};
use super::combat::{self, AttackReport};
use super::error::ActionError;
use super::location::{Angle, Direction, Location};
use super::map::{
    GameMap, Grid, ViewCell, MAX_SCOUT_DISTANCE, RADAR_RADIUS, RENDER_HEIGHT, RENDER_WIDTH,
};
use super::player::{CharacterKind, Player, PlayerState, PlayerStats, MAX_HEALTH};
use super::UserId;

/// First message a watcher receives about the battle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialState {
    #[serde(rename = "totalmapsize")]
    pub total_map_size: Location,
    #[serde(rename = "viewablemapsize")]
    pub viewable_map_size: Location,
    #[serde(rename = "maxhealth")]
    pub max_health: i32,
    #[serde(rename = "playermapentity")]
    pub viewport: Vec<Vec<ViewCell>>,
    #[serde(rename = "startplayer")]
    pub start_player: String,
}

/// Authoritative game state of one round
pub struct Battle {
    map: GameMap,
    players: DashMap<UserId, Arc<Player>>,
}

impl Battle {
    pub fn new(map: GameMap) -> Self {
        Self {
            map,
            players: DashMap::new(),
        }
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn player(&self, user_id: UserId) -> Option<Arc<Player>> {
        self.players.get(&user_id).map(|p| p.value().clone())
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Create a player and put it on a random free cell. Called once per
    /// roster entry at round setup.
    pub fn spawn_player(
        &self,
        user_id: UserId,
        character: CharacterKind,
    ) -> Result<Arc<Player>, ActionError> {
        if let Some(existing) = self.player(user_id) {
            warn!(user_id, "Player already spawned");
            return Ok(existing);
        }

        let player = Arc::new(Player::new(user_id, character));
        let location = self.map.lock().spawn(Arc::clone(&player))?;
        self.players.insert(user_id, Arc::clone(&player));

        info!(user_id, %location, "Player spawned");
        Ok(player)
    }

    /// Place a player on a chosen cell instead of a random one. Refused for
    /// a user already on the map.
    pub fn spawn_player_at(
        &self,
        user_id: UserId,
        character: CharacterKind,
        location: Location,
    ) -> Result<Arc<Player>, ActionError> {
        let player = Arc::new(Player::new(user_id, character));
        self.map.lock().place(Arc::clone(&player), location)?;
        self.players.insert(user_id, Arc::clone(&player));
        Ok(player)
    }

    /// Resolve `action`, charging the player's own operation budget
    pub fn resolve(&self, player: &Player, action: Action) -> Result<ActionOutcome, ActionError> {
        self.resolve_with_limits(player, action, player.limits())
    }

    /// Resolve `action` against an explicit operation budget, e.g. one per
    /// connection
    pub fn resolve_with_limits(
        &self,
        player: &Player,
        action: Action,
        limits: &Mutex<OpLimits>,
    ) -> Result<ActionOutcome, ActionError> {
        if let Action::Scout { distance } = action {
            validate_scout_distance(distance)?;
        }
        charge(limits, action.op_kind())?;

        let outcome = match action {
            Action::Rotate(angle) => self.rotate(player, angle),
            Action::Move(dir) => self.move_to(player, dir),
            Action::Radar => self.radar(player),
            Action::Scout { distance } => self.scout(player, distance),
            Action::Environment => self.environment(player),
            Action::Watch => self.watch(player),
            Action::Attack => self.attack(player).map(ActionOutcome::Attack),
            Action::Defend => self.defend(player),
            Action::Undefend => self.undefend(player),
            Action::Health => self.health(player),
        };

        if let Err(e) = &outcome {
            debug!(user_id = player.id(), verb = action.verb(), error = e.code(), "Action refused");
        }
        outcome
    }

    pub fn rotate(&self, player: &Player, angle: Angle) -> Result<ActionOutcome, ActionError> {
        let mut grid = self.map.lock();
        let state = state_mut(&mut grid, player)?;
        state.facing = state.facing.rotate(angle);
        let (facing, location) = (state.facing, state.location);

        Ok(ActionOutcome::Rotated {
            angle,
            facing,
            observers: grid.players_in_render_box(location),
        })
    }

    pub fn move_to(&self, player: &Player, dir: Direction) -> Result<ActionOutcome, ActionError> {
        let mut grid = self.map.lock();
        let state = state_of(&grid, player)?;
        if state.is_defending {
            return Err(ActionError::MovingWhileDefending);
        }

        let old = state.location;
        let new = old.step(dir);
        if !grid.contains(new) {
            return Err(ActionError::MoveOutOfMap);
        }
        if !grid.terrain_at(new).is_accessible() {
            return Err(ActionError::Inaccessible);
        }
        if grid.occupied(new) {
            return Err(ActionError::AlreadyOccupied);
        }

        grid.leave(old);
        grid.join(player.id(), new)?;

        let view = grid
            .player_view(player.id(), Location::default())
            .ok_or(ActionError::UnknownPlayer(player.id()))?;
        Ok(ActionOutcome::Moved {
            direction: dir,
            view,
            new_line: grid.new_line(new, dir),
            observers: grid.players_in_union_box(old, new),
        })
    }

    pub fn radar(&self, player: &Player) -> Result<ActionOutcome, ActionError> {
        let grid = self.map.lock();
        let location = state_of(&grid, player)?.location;

        Ok(ActionOutcome::Radar {
            count: grid.radar_count(location, RADAR_RADIUS),
            observers: grid.players_in_render_box(location).user_ids(),
        })
    }

    /// Count occupants in line along the facing. Distances beyond the
    /// maximum are capped.
    pub fn scout(&self, player: &Player, distance: i32) -> Result<ActionOutcome, ActionError> {
        validate_scout_distance(distance)?;
        let distance = distance.min(MAX_SCOUT_DISTANCE);

        let grid = self.map.lock();
        let state = state_of(&grid, player)?;

        Ok(ActionOutcome::Scout {
            count: grid.line_of_sight(state.location, state.facing, distance),
            distance,
            observers: grid.players_in_render_box(state.location).user_ids(),
        })
    }

    pub fn environment(&self, player: &Player) -> Result<ActionOutcome, ActionError> {
        let grid = self.map.lock();
        let location = state_of(&grid, player)?.location;

        Ok(ActionOutcome::Environment {
            terrain: grid.environment(location),
            observers: grid.players_in_render_box(location).user_ids(),
        })
    }

    pub fn watch(&self, player: &Player) -> Result<ActionOutcome, ActionError> {
        let grid = self.map.lock();
        let state = state_of(&grid, player)?;

        Ok(ActionOutcome::Watch {
            health: grid.health_ahead(state.location, state.facing),
            observers: grid.players_in_render_box(state.location).user_ids(),
        })
    }

    pub fn attack(&self, player: &Player) -> Result<AttackReport, ActionError> {
        let mut grid = self.map.lock();
        let report = combat::resolve_attack(&mut grid, player.id())?;
        if report.is_lethal() {
            info!(user_id = player.id(), "Player scored a kill");
        }
        Ok(report)
    }

    pub fn defend(&self, player: &Player) -> Result<ActionOutcome, ActionError> {
        let mut grid = self.map.lock();
        let state = state_mut(&mut grid, player)?;
        if state.is_defending {
            return Err(ActionError::AlreadyDefending);
        }
        state.is_defending = true;
        let location = state.location;

        Ok(ActionOutcome::Defended {
            observers: grid.players_in_render_box(location).user_ids(),
        })
    }

    pub fn undefend(&self, player: &Player) -> Result<ActionOutcome, ActionError> {
        let mut grid = self.map.lock();
        let state = state_mut(&mut grid, player)?;
        if !state.is_defending {
            return Err(ActionError::AlreadyUndefending);
        }
        state.is_defending = false;
        let location = state.location;

        Ok(ActionOutcome::Undefended {
            observers: grid.players_in_render_box(location).user_ids(),
        })
    }

    pub fn health(&self, player: &Player) -> Result<ActionOutcome, ActionError> {
        let grid = self.map.lock();
        let location = state_of(&grid, player)?.location;

        Ok(ActionOutcome::Health {
            value: player.health().snapshot().max(0),
            observers: grid.players_in_render_box(location).user_ids(),
        })
    }

    /// Scoreboard of every player
    pub fn stats(&self) -> Vec<PlayerStats> {
        self.map.lock().stats()
    }

    /// Battle overview centered on `user_id`
    pub fn initial_state(&self, user_id: UserId) -> Option<InitialState> {
        let player = self.player(user_id)?;
        let grid = self.map.lock();
        let location = grid.state(user_id)?.location;

        Some(InitialState {
            total_map_size: Location::new(grid.width(), grid.height()),
            viewable_map_size: Location::new(RENDER_WIDTH, RENDER_HEIGHT),
            max_health: MAX_HEALTH,
            viewport: grid.viewport(location),
            start_player: player.render_id().to_string(),
        })
    }

    /// Whether occupancy and player locations agree
    pub fn is_consistent(&self) -> bool {
        self.map.lock().is_consistent()
    }
}

fn validate_scout_distance(distance: i32) -> Result<(), ActionError> {
    if distance < 1 {
        return Err(ActionError::Validation(format!(
            "'{}' is not a valid value for '.obj.distance'",
            distance
        )));
    }
    Ok(())
}

fn charge(limits: &Mutex<OpLimits>, op: OpKind) -> Result<(), ActionError> {
    if limits.lock().check(op) {
        Ok(())
    } else {
        Err(ActionError::RateLimited(op))
    }
}

fn state_of<'a>(
    grid: &'a Grid,
    player: &Player,
) -> Result<&'a PlayerState, ActionError> {
    grid.state(player.id())
        .ok_or(ActionError::UnknownPlayer(player.id()))
}

fn state_mut<'a>(
    grid: &'a mut Grid,
    player: &Player,
) -> Result<&'a mut PlayerState, ActionError> {
    grid.state_mut(player.id())
        .ok_or(ActionError::UnknownPlayer(player.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::location::Direction;
    use crate::game::map::Terrain;

    fn battle_with(players: &[(UserId, Location)]) -> Battle {
        let battle = Battle::new(GameMap::new(11, 11, 5));
        for &(id, loc) in players {
            battle
                .spawn_player_at(id, CharacterKind::Thug, loc)
                .unwrap();
        }
        battle
    }

    #[test]
    fn rotate_turns_and_reports_render_box() {
        let battle = battle_with(&[(1, Location::new(5, 5)), (2, Location::new(7, 5))]);
        let me = battle.player(1).unwrap();

        let ActionOutcome::Rotated { facing, observers, .. } =
            battle.rotate(&me, Angle::Right).unwrap()
        else {
            panic!("expected rotation");
        };
        assert_eq!(facing, Direction::East);
        assert_eq!(
            observers.get(2).unwrap().relative.location(),
            Location::new(-2, 0)
        );
    }

    #[test]
    fn move_into_occupied_cell_changes_nothing() {
        let battle = battle_with(&[(1, Location::new(5, 5)), (2, Location::new(5, 4))]);
        let me = battle.player(1).unwrap();

        assert_eq!(
            battle.move_to(&me, Direction::North),
            Err(ActionError::AlreadyOccupied)
        );
        assert_eq!(
            battle.map().lock().state(1).unwrap().location,
            Location::new(5, 5)
        );
        assert!(battle.is_consistent());
    }

    #[test]
    fn move_checks_edges_terrain_and_defence() {
        let mut rows = vec![vec![Terrain::Grass; 3]; 3];
        rows[1][2] = Terrain::Water;
        let battle = Battle::new(GameMap::from_terrain(rows, 1).unwrap());
        let me = battle
            .spawn_player_at(1, CharacterKind::Ninja, Location::new(1, 0))
            .unwrap();

        assert_eq!(
            battle.move_to(&me, Direction::North),
            Err(ActionError::MoveOutOfMap)
        );
        battle.move_to(&me, Direction::South).unwrap();
        assert_eq!(
            battle.move_to(&me, Direction::East),
            Err(ActionError::Inaccessible)
        );

        battle.defend(&me).unwrap();
        assert_eq!(
            battle.move_to(&me, Direction::West),
            Err(ActionError::MovingWhileDefending)
        );
    }

    #[test]
    fn double_defend_is_refused() {
        let battle = battle_with(&[(1, Location::new(5, 5))]);
        let me = battle.player(1).unwrap();

        battle.defend(&me).unwrap();
        assert_eq!(battle.defend(&me), Err(ActionError::AlreadyDefending));
        assert!(battle.map().lock().state(1).unwrap().is_defending);

        battle.undefend(&me).unwrap();
        assert_eq!(battle.undefend(&me), Err(ActionError::AlreadyUndefending));
    }

    #[test]
    fn scout_rejects_zero_and_caps_distance() {
        let battle = battle_with(&[(1, Location::new(0, 5))]);
        let me = battle.player(1).unwrap();

        assert!(matches!(
            battle.scout(&me, 0),
            Err(ActionError::Validation(_))
        ));
        let ActionOutcome::Scout { distance, .. } = battle.scout(&me, 40).unwrap() else {
            panic!("expected scout");
        };
        assert_eq!(distance, MAX_SCOUT_DISTANCE);
    }

    #[test]
    fn resolve_charges_the_bucket_first() {
        let battle = battle_with(&[(1, Location::new(5, 5))]);
        let me = battle.player(1).unwrap();

        battle.resolve(&me, Action::Move(Direction::East)).unwrap();
        assert_eq!(
            battle.resolve(&me, Action::Move(Direction::East)),
            Err(ActionError::RateLimited(OpKind::Move))
        );
        assert_eq!(
            battle.map().lock().state(1).unwrap().location,
            Location::new(6, 5)
        );
    }

    #[test]
    fn connection_budget_is_separate_from_the_player_budget() {
        let battle = battle_with(&[(1, Location::new(5, 5))]);
        let me = battle.player(1).unwrap();
        let connection = Mutex::new(OpLimits::new());

        battle.resolve(&me, Action::Radar).unwrap();
        battle
            .resolve_with_limits(&me, Action::Radar, &connection)
            .unwrap();
        assert!(battle
            .resolve_with_limits(&me, Action::Radar, &connection)
            .is_err());
    }

    #[test]
    fn initial_state_is_centered_on_the_player() {
        let battle = battle_with(&[(4, Location::new(2, 3))]);
        let init = battle.initial_state(4).unwrap();

        assert_eq!(init.total_map_size, Location::new(11, 11));
        assert_eq!(init.start_player, "4");
        assert_eq!(
            init.viewport[5][5].player.as_ref().unwrap().location,
            Location::new(0, 0)
        );
        assert!(battle.initial_state(99).is_none());
    }

    #[test]
    fn spawning_twice_returns_the_same_player() {
        let battle = Battle::new(GameMap::new(11, 11, 5));
        let first = battle.spawn_player(1, CharacterKind::Thug).unwrap();
        let second = battle.spawn_player(1, CharacterKind::Ninja).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(battle.player_count(), 1);
        assert!(battle.is_consistent());
    }
}
