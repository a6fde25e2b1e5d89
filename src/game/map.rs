//! Spatial map: the grid of cells, its occupants and the single lock that
//! serializes every spatial read and mutation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::ActionError;
use super::location::{Direction, Location};
use super::observers::{LocatedGroup, Observer};
use super::player::{Player, PlayerState, PlayerStats, PlayerView};
use super::UserId;

/// Visible area around a player in x-direction
pub const RENDER_WIDTH: i32 = 11;
/// Visible area around a player in y-direction
pub const RENDER_HEIGHT: i32 = 11;
/// Render width minus the center cell, halved
pub const RENDER_HALF_WIDTH: i32 = (RENDER_WIDTH - 1) / 2;
/// Render height minus the center cell, halved
pub const RENDER_HALF_HEIGHT: i32 = (RENDER_HEIGHT - 1) / 2;

/// Radius of the radar count
pub const RADAR_RADIUS: i32 = 10;

/// Farthest a scout may look
pub const MAX_SCOUT_DISTANCE: i32 = 15;

/// Random placement attempts before a spawn gives up
pub const SPAWN_ATTEMPTS: usize = 100;

/// Block type of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    #[serde(rename = "swamp")]
    Swamp,
    #[serde(rename = "stonetile")]
    Stonetile,
    #[serde(rename = "dirt")]
    Dirt,
    #[default]
    #[serde(rename = "dirt_light")]
    LightDirt,
    #[serde(rename = "grass")]
    Grass,
    #[serde(rename = "lava")]
    Lava,
    #[serde(rename = "lavarock")]
    Lavarock,
    #[serde(rename = "water")]
    Water,
    #[serde(rename = "endofmap")]
    EndOfMap,
    #[serde(rename = "fog")]
    Fog,
}

impl Terrain {
    /// Whether a character may stand on this block
    pub fn is_accessible(self) -> bool {
        !matches!(self, Terrain::Water | Terrain::EndOfMap)
    }
}

/// One grid slot
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub occupant: Option<UserId>,
    pub terrain: Terrain,
}

/// One cell of a viewport as sent to watchers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCell {
    #[serde(rename = "bt")]
    pub terrain: Terrain,
    #[serde(rename = "p")]
    pub player: Option<PlayerView>,
}

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Map must have at least one row and one column")]
    Empty,

    #[error("Map row {row} has {found} columns, expected {expected}")]
    Ragged {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// A roster entry: the shared handle plus its map-locked state
#[derive(Debug)]
pub struct Slot {
    pub player: Arc<Player>,
    pub state: PlayerState,
}

/// The map. Dimensions never change after construction.
pub struct GameMap {
    width: i32,
    height: i32,
    grid: Mutex<Grid>,
}

impl GameMap {
    /// Uniform map of light dirt
    pub fn new(width: i32, height: i32, seed: u64) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let terrain = vec![vec![Terrain::default(); width as usize]; height as usize];
        Self::build(width, height, terrain, seed)
    }

    /// Map from a row-major terrain matrix
    pub fn from_terrain(rows: Vec<Vec<Terrain>>, seed: u64) -> Result<Self, MapError> {
        let expected = rows.first().map(Vec::len).unwrap_or(0);
        if expected == 0 {
            return Err(MapError::Empty);
        }
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
            return Err(MapError::Ragged {
                row,
                found: r.len(),
                expected,
            });
        }

        let height = rows.len() as i32;
        Ok(Self::build(expected as i32, height, rows, seed))
    }

    fn build(width: i32, height: i32, terrain: Vec<Vec<Terrain>>, seed: u64) -> Self {
        let cells = terrain
            .into_iter()
            .flatten()
            .map(|terrain| Cell {
                occupant: None,
                terrain,
            })
            .collect();

        Self {
            width,
            height,
            grid: Mutex::new(Grid {
                width,
                height,
                cells,
                slots: HashMap::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
            }),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, loc: Location) -> bool {
        loc.x >= 0 && loc.x < self.width && loc.y >= 0 && loc.y < self.height
    }

    /// Acquire the map lock. Never held across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock()
    }
}

/// Map contents reachable only through [`GameMap::lock`]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    slots: HashMap<UserId, Slot>,
    rng: ChaCha8Rng,
}

impl Grid {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, loc: Location) -> bool {
        loc.x >= 0 && loc.x < self.width && loc.y >= 0 && loc.y < self.height
    }

    fn index(&self, loc: Location) -> Option<usize> {
        self.contains(loc)
            .then(|| (loc.y * self.width + loc.x) as usize)
    }

    pub fn cell(&self, loc: Location) -> Option<&Cell> {
        self.index(loc).map(|i| &self.cells[i])
    }

    pub fn occupant(&self, loc: Location) -> Option<UserId> {
        self.cell(loc).and_then(|c| c.occupant)
    }

    pub fn occupied(&self, loc: Location) -> bool {
        self.occupant(loc).is_some()
    }

    /// Terrain at `loc`, `EndOfMap` beyond the edges
    pub fn terrain_at(&self, loc: Location) -> Terrain {
        self.cell(loc).map(|c| c.terrain).unwrap_or(Terrain::EndOfMap)
    }

    pub fn slot(&self, user_id: UserId) -> Option<&Slot> {
        self.slots.get(&user_id)
    }

    pub fn state(&self, user_id: UserId) -> Option<&PlayerState> {
        self.slots.get(&user_id).map(|s| &s.state)
    }

    pub fn state_mut(&mut self, user_id: UserId) -> Option<&mut PlayerState> {
        self.slots.get_mut(&user_id).map(|s| &mut s.state)
    }

    pub fn players(&self) -> impl Iterator<Item = &Arc<Player>> {
        self.slots.values().map(|s| &s.player)
    }

    pub fn player_count(&self) -> usize {
        self.slots.len()
    }

    /// Place a registered player on `loc` and point its location there
    pub fn join(&mut self, user_id: UserId, loc: Location) -> Result<(), ActionError> {
        let idx = self.index(loc).ok_or(ActionError::OutOfMap)?;
        if self.cells[idx].occupant.is_some() {
            return Err(ActionError::AlreadyOccupied);
        }
        let slot = self
            .slots
            .get_mut(&user_id)
            .ok_or(ActionError::UnknownPlayer(user_id))?;

        slot.state.location = loc;
        self.cells[idx].occupant = Some(user_id);
        Ok(())
    }

    /// Clear the occupant of `loc`, whoever it is
    pub fn leave(&mut self, loc: Location) -> Option<UserId> {
        let idx = self.index(loc)?;
        self.cells[idx].occupant.take()
    }

    /// Register a new player and place it on a random free cell
    pub fn spawn(&mut self, player: Arc<Player>) -> Result<Location, ActionError> {
        let loc = self
            .find_spawn_location(None)
            .ok_or(ActionError::NoSpawnLocation)?;
        self.place(player, loc)?;
        Ok(loc)
    }

    /// Register a new player on a chosen cell. A user already on the map
    /// is refused.
    pub fn place(&mut self, player: Arc<Player>, loc: Location) -> Result<(), ActionError> {
        let user_id = player.id();
        if self.slots.contains_key(&user_id) || self.occupied(loc) {
            return Err(ActionError::AlreadyOccupied);
        }
        if !self.contains(loc) {
            return Err(ActionError::OutOfMap);
        }
        self.slots.insert(
            user_id,
            Slot {
                player,
                state: PlayerState::spawned_at(loc),
            },
        );
        self.join(user_id, loc)
    }

    /// Random free, accessible cell other than `exclude`, or `None` once the
    /// attempt budget is spent
    pub fn find_spawn_location(&mut self, exclude: Option<Location>) -> Option<Location> {
        for _ in 0..SPAWN_ATTEMPTS {
            let loc = Location::new(
                self.rng.gen_range(0..self.width),
                self.rng.gen_range(0..self.height),
            );
            if Some(loc) == exclude {
                continue;
            }
            let Some(cell) = self.cell(loc) else { continue };
            if cell.occupant.is_none() && cell.terrain.is_accessible() {
                return Some(loc);
            }
        }
        None
    }

    /// Every occupant of the inclusive rectangle, with `center` expressed in
    /// each occupant's frame
    fn players_in_area(
        &self,
        (start_x, end_x): (i32, i32),
        (start_y, end_y): (i32, i32),
        center: Location,
    ) -> LocatedGroup {
        let mut observers = Vec::new();
        for y in start_y..=end_y {
            for x in start_x..=end_x {
                let loc = Location::new(x, y);
                if let Some(user_id) = self.occupant(loc) {
                    observers.push(Observer {
                        user_id,
                        relative: center.relative_from(loc).to_relative(),
                    });
                }
            }
        }
        LocatedGroup(observers)
    }

    fn clamp_x(&self, x: i32) -> i32 {
        x.clamp(0, self.width - 1)
    }

    fn clamp_y(&self, y: i32) -> i32 {
        y.clamp(0, self.height - 1)
    }

    /// Occupants of the render box around `center`
    pub fn players_in_render_box(&self, center: Location) -> LocatedGroup {
        let xs = (
            self.clamp_x(center.x - RENDER_HALF_WIDTH),
            self.clamp_x(center.x + RENDER_HALF_WIDTH),
        );
        let ys = (
            self.clamp_y(center.y - RENDER_HALF_HEIGHT),
            self.clamp_y(center.y + RENDER_HALF_HEIGHT),
        );
        self.players_in_area(xs, ys, center)
    }

    /// Occupants of the smallest rectangle covering both render boxes,
    /// positioned relative to `new`
    pub fn players_in_union_box(&self, old: Location, new: Location) -> LocatedGroup {
        let xs = (
            self.clamp_x(old.x.min(new.x) - RENDER_HALF_WIDTH),
            self.clamp_x(old.x.max(new.x) + RENDER_HALF_WIDTH),
        );
        let ys = (
            self.clamp_y(old.y.min(new.y) - RENDER_HALF_HEIGHT),
            self.clamp_y(old.y.max(new.y) + RENDER_HALF_HEIGHT),
        );
        self.players_in_area(xs, ys, new)
    }

    /// Occupied cells along `dir`, up to `max_distance` steps or the map edge
    pub fn line_of_sight(&self, center: Location, dir: Direction, max_distance: i32) -> usize {
        let mut count = 0;
        for i in 1..=max_distance {
            let loc = center.offset(dir, i);
            if !self.contains(loc) {
                break;
            }
            if self.occupied(loc) {
                count += 1;
            }
        }
        count
    }

    /// Occupants in the clamped square of `radius` around `center`, the
    /// center included
    pub fn radar_count(&self, center: Location, radius: i32) -> usize {
        let mut count = 0;
        for y in self.clamp_y(center.y - radius)..=self.clamp_y(center.y + radius) {
            for x in self.clamp_x(center.x - radius)..=self.clamp_x(center.x + radius) {
                if self.occupied(Location::new(x, y)) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Terrain of the render box, row-major, `EndOfMap` past the edges
    pub fn environment(&self, center: Location) -> Vec<Vec<Terrain>> {
        (0..RENDER_HEIGHT)
            .map(|row| {
                (0..RENDER_WIDTH)
                    .map(|col| {
                        self.terrain_at(Location::new(
                            center.x - RENDER_HALF_WIDTH + col,
                            center.y - RENDER_HALF_HEIGHT + row,
                        ))
                    })
                    .collect()
            })
            .collect()
    }

    /// Health of the occupants in the half of the render box in front of
    /// `facing`: `-1` off the map, `0` for an empty cell. Reads each
    /// occupant's health under its own lock.
    pub fn health_ahead(&self, center: Location, facing: Direction) -> Vec<Vec<i32>> {
        let (origin, rows, cols) = match facing {
            Direction::North => (
                Location::new(center.x - RENDER_HALF_WIDTH, center.y - RENDER_HALF_HEIGHT),
                RENDER_HALF_HEIGHT,
                RENDER_WIDTH,
            ),
            Direction::South => (
                Location::new(center.x - RENDER_HALF_WIDTH, center.y + 1),
                RENDER_HALF_HEIGHT,
                RENDER_WIDTH,
            ),
            Direction::East => (
                Location::new(center.x + 1, center.y - RENDER_HALF_HEIGHT),
                RENDER_HEIGHT,
                RENDER_HALF_WIDTH,
            ),
            Direction::West => (
                Location::new(center.x - RENDER_HALF_WIDTH, center.y - RENDER_HALF_HEIGHT),
                RENDER_HEIGHT,
                RENDER_HALF_WIDTH,
            ),
        };

        (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| {
                        let loc = Location::new(origin.x + col, origin.y + row);
                        if !self.contains(loc) {
                            return -1;
                        }
                        self.occupant(loc)
                            .and_then(|id| self.slots.get(&id))
                            .map(|slot| slot.player.health().snapshot())
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .collect()
    }

    /// How `user_id` looks to someone whose frame is centered on `viewer`
    pub fn player_view(&self, user_id: UserId, viewer: Location) -> Option<PlayerView> {
        let slot = self.slots.get(&user_id)?;
        Some(PlayerView {
            grid: slot.player.render_id().to_string(),
            health: slot.player.health().snapshot(),
            character: slot.player.character(),
            facing: slot.state.facing,
            location: slot.state.location.relative_from(viewer),
        })
    }

    /// Full render box with terrain and player views relative to `center`
    pub fn viewport(&self, center: Location) -> Vec<Vec<ViewCell>> {
        (0..RENDER_HEIGHT)
            .map(|row| {
                (0..RENDER_WIDTH)
                    .map(|col| {
                        let loc = Location::new(
                            center.x - RENDER_HALF_WIDTH + col,
                            center.y - RENDER_HALF_HEIGHT + row,
                        );
                        ViewCell {
                            terrain: self.terrain_at(loc),
                            player: self
                                .occupant(loc)
                                .and_then(|id| self.player_view(id, center)),
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Edge row or column of the render box that came into view after a step
    /// towards `dir`, ordered left to right or top to bottom
    pub fn new_line(&self, center: Location, dir: Direction) -> Vec<ViewCell> {
        let edge = Location::new(
            center.x + dir.delta().0 * RENDER_HALF_WIDTH,
            center.y + dir.delta().1 * RENDER_HALF_HEIGHT,
        );
        let cells: Vec<Location> = if dir.is_vertical() {
            (-RENDER_HALF_WIDTH..=RENDER_HALF_WIDTH)
                .map(|dx| Location::new(edge.x + dx, edge.y))
                .collect()
        } else {
            (-RENDER_HALF_HEIGHT..=RENDER_HALF_HEIGHT)
                .map(|dy| Location::new(edge.x, edge.y + dy))
                .collect()
        };

        cells
            .into_iter()
            .map(|loc| ViewCell {
                terrain: self.terrain_at(loc),
                player: self
                    .occupant(loc)
                    .and_then(|id| self.player_view(id, center)),
            })
            .collect()
    }

    /// Scoreboard ordered by user id
    pub fn stats(&self) -> Vec<PlayerStats> {
        let mut ids: Vec<&UserId> = self.slots.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| self.slots.get(id))
            .map(|slot| PlayerStats {
                grid: slot.player.render_id().to_string(),
                kills: slot.state.kills,
                deaths: slot.state.deaths,
            })
            .collect()
    }

    /// Every player sits on exactly the cell that names it, and no cell names
    /// anybody else
    pub fn is_consistent(&self) -> bool {
        let occupied = self.cells.iter().filter(|c| c.occupant.is_some()).count();
        occupied == self.slots.len()
            && self
                .slots
                .iter()
                .all(|(id, slot)| self.occupant(slot.state.location) == Some(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::CharacterKind;

    fn map_with(players: &[(UserId, Location)]) -> GameMap {
        let map = GameMap::new(11, 11, 7);
        {
            let mut grid = map.lock();
            for &(id, loc) in players {
                grid.place(Arc::new(Player::new(id, CharacterKind::Thug)), loc)
                    .unwrap();
            }
        }
        map
    }

    #[test]
    fn placing_a_placed_user_again_is_refused() {
        let map = map_with(&[(1, Location::new(2, 2))]);
        let mut grid = map.lock();

        assert_eq!(
            grid.place(Arc::new(Player::new(1, CharacterKind::Ninja)), Location::new(6, 6)),
            Err(ActionError::AlreadyOccupied)
        );
        assert_eq!(grid.state(1).unwrap().location, Location::new(2, 2));
        assert_eq!(grid.occupant(Location::new(6, 6)), None);
        assert!(grid.is_consistent());
    }

    #[test]
    fn join_refuses_occupied_cells() {
        let map = map_with(&[(1, Location::new(2, 2)), (2, Location::new(3, 3))]);
        let mut grid = map.lock();

        assert_eq!(
            grid.join(2, Location::new(2, 2)),
            Err(ActionError::AlreadyOccupied)
        );
        assert_eq!(grid.state(2).unwrap().location, Location::new(3, 3));
        assert!(grid.is_consistent());
    }

    #[test]
    fn leave_then_join_moves_occupancy() {
        let map = map_with(&[(1, Location::new(2, 2))]);
        let mut grid = map.lock();

        assert_eq!(grid.leave(Location::new(2, 2)), Some(1));
        grid.join(1, Location::new(2, 3)).unwrap();

        assert!(!grid.occupied(Location::new(2, 2)));
        assert_eq!(grid.occupant(Location::new(2, 3)), Some(1));
        assert!(grid.is_consistent());
    }

    #[test]
    fn render_box_is_clamped_at_edges() {
        let map = map_with(&[
            (1, Location::new(0, 0)),
            (2, Location::new(5, 5)),
            (3, Location::new(6, 0)),
        ]);
        let grid = map.lock();

        let group = grid.players_in_render_box(Location::new(0, 0));
        let ids = group.user_ids();
        assert!(ids.contains(1));
        assert!(ids.contains(2));
        assert!(!ids.contains(3));
    }

    #[test]
    fn union_box_covers_both_neighbourhoods() {
        let map = GameMap::new(30, 30, 1);
        {
            let mut grid = map.lock();
            grid.place(Arc::new(Player::new(1, CharacterKind::Thug)), Location::new(10, 10))
                .unwrap();
            grid.place(Arc::new(Player::new(2, CharacterKind::Thug)), Location::new(4, 10))
                .unwrap();
            grid.place(Arc::new(Player::new(3, CharacterKind::Thug)), Location::new(17, 10))
                .unwrap();
        }
        let grid = map.lock();

        let group = grid.players_in_union_box(Location::new(9, 10), Location::new(11, 10));
        let ids = group.user_ids();
        assert!(ids.contains(2));
        assert!(!ids.contains(3));
        assert_eq!(
            group.get(2).unwrap().relative.location(),
            Location::new(7, 0)
        );
    }

    #[test]
    fn observer_coordinates_are_negations() {
        let a = Location::new(3, 4);
        let b = Location::new(6, 2);
        let map = map_with(&[(1, a), (2, b)]);
        let grid = map.lock();

        let seen_by_a = grid.players_in_render_box(b).get(1).unwrap().relative;
        let seen_by_b = grid.players_in_render_box(a).get(2).unwrap().relative;
        assert_eq!(seen_by_a.x, -seen_by_b.x);
        assert_eq!(seen_by_a.y, -seen_by_b.y);
        assert!(!seen_by_a.is_absolute);
    }

    #[test]
    fn line_of_sight_stops_at_distance_and_edge() {
        let map = map_with(&[
            (1, Location::new(2, 5)),
            (2, Location::new(3, 5)),
            (3, Location::new(7, 5)),
        ]);
        let grid = map.lock();

        assert_eq!(grid.line_of_sight(Location::new(2, 5), Direction::East, 3), 1);
        assert_eq!(grid.line_of_sight(Location::new(2, 5), Direction::East, 15), 2);
        assert_eq!(grid.line_of_sight(Location::new(2, 5), Direction::West, 15), 0);
    }

    #[test]
    fn radar_counts_the_center() {
        let map = map_with(&[(1, Location::new(0, 0)), (2, Location::new(10, 10))]);
        let grid = map.lock();
        assert_eq!(grid.radar_count(Location::new(0, 0), 1), 1);
        assert_eq!(grid.radar_count(Location::new(0, 0), RADAR_RADIUS), 2);
    }

    #[test]
    fn environment_marks_the_outside() {
        let map = map_with(&[]);
        let grid = map.lock();
        let env = grid.environment(Location::new(0, 0));

        assert_eq!(env.len(), RENDER_HEIGHT as usize);
        assert_eq!(env[0][0], Terrain::EndOfMap);
        assert_eq!(env[5][5], Terrain::LightDirt);
        assert_eq!(env[10][10], Terrain::LightDirt);
    }

    #[test]
    fn health_ahead_covers_the_facing_half() {
        let map = map_with(&[(1, Location::new(5, 5)), (2, Location::new(5, 4))]);
        let grid = map.lock();

        let north = grid.health_ahead(Location::new(5, 5), Direction::North);
        assert_eq!(north.len(), RENDER_HALF_HEIGHT as usize);
        assert_eq!(north[0].len(), RENDER_WIDTH as usize);
        assert_eq!(north[4][5], 100);
        assert_eq!(north[0][0], 0);

        let east = grid.health_ahead(Location::new(8, 5), Direction::East);
        assert_eq!(east[0].len(), RENDER_HALF_WIDTH as usize);
        assert_eq!(east[5][4], -1);
    }

    #[test]
    fn spawn_avoids_water_and_occupants() {
        let mut rows = vec![vec![Terrain::Water; 3]; 3];
        rows[1][1] = Terrain::Grass;
        rows[2][2] = Terrain::Grass;
        let map = GameMap::from_terrain(rows, 3).unwrap();
        let mut grid = map.lock();

        grid.place(Arc::new(Player::new(1, CharacterKind::Thug)), Location::new(1, 1))
            .unwrap();
        let loc = grid.spawn(Arc::new(Player::new(2, CharacterKind::Thug))).unwrap();
        assert_eq!(loc, Location::new(2, 2));

        assert_eq!(
            grid.spawn(Arc::new(Player::new(3, CharacterKind::Thug))),
            Err(ActionError::NoSpawnLocation)
        );
        assert!(grid.is_consistent());
    }

    #[test]
    fn ragged_terrain_is_rejected() {
        let rows = vec![vec![Terrain::Grass; 3], vec![Terrain::Grass; 2]];
        assert!(matches!(
            GameMap::from_terrain(rows, 0),
            Err(MapError::Ragged { row: 1, .. })
        ));
        assert!(matches!(GameMap::from_terrain(vec![], 0), Err(MapError::Empty)));
    }

    #[test]
    fn new_line_is_the_far_edge() {
        let map = map_with(&[(1, Location::new(5, 5)), (2, Location::new(10, 7))]);
        let grid = map.lock();

        let east = grid.new_line(Location::new(5, 5), Direction::East);
        assert_eq!(east.len(), RENDER_HEIGHT as usize);
        assert_eq!(east[7].player.as_ref().unwrap().location, Location::new(5, 2));

        let north = grid.new_line(Location::new(5, 2), Direction::North);
        assert!(north.iter().all(|c| c.terrain == Terrain::EndOfMap));
    }

    #[test]
    fn viewport_shows_neighbours_relative_to_center() {
        let map = map_with(&[(1, Location::new(5, 5)), (2, Location::new(7, 4))]);
        let grid = map.lock();
        let view = grid.viewport(Location::new(5, 5));

        let me = view[5][5].player.as_ref().unwrap();
        assert_eq!(me.location, Location::new(0, 0));
        let other = view[4][7].player.as_ref().unwrap();
        assert_eq!(other.grid, "2");
        assert_eq!(other.location, Location::new(2, -1));
    }
}
