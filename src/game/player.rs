//! Player entities, health and per-player stats

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::util::rate_limit::OpLimits;

use super::location::{Direction, Location};
use super::UserId;

/// Health points of a fresh character
pub const MAX_HEALTH: i32 = 100;

/// Damage dealt per successful attack
pub const DEFAULT_DAMAGE: i32 = 10;

/// Character skins. All share the same combat stats for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CharacterKind {
    #[default]
    #[serde(rename = "male_thug")]
    Thug,
    #[serde(rename = "male_armored_archer")]
    ArmoredArcher,
    #[serde(rename = "male_night")]
    Knight,
    #[serde(rename = "male_ninja")]
    Ninja,
}

impl CharacterKind {
    pub fn damage_points(self) -> i32 {
        DEFAULT_DAMAGE
    }
}

/// Damage after the defend bonus has been applied
pub fn effective_damage(amount: i32, defending: bool) -> i32 {
    if defending {
        amount / 2
    } else {
        amount
    }
}

/// Health with its own lock, so damage resolution for one victim never
/// serializes unrelated health reads.
#[derive(Debug)]
pub struct Health {
    value: Mutex<i32>,
}

impl Health {
    pub fn new(value: i32) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    pub fn full() -> Self {
        Self::new(MAX_HEALTH)
    }

    /// Locked read of the current value
    pub fn snapshot(&self) -> i32 {
        *self.value.lock()
    }

    /// Hold the health lock across a read-modify-read sequence
    pub fn lock(&self) -> HealthGuard<'_> {
        HealthGuard(self.value.lock())
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::full()
    }
}

pub struct HealthGuard<'a>(MutexGuard<'a, i32>);

impl HealthGuard<'_> {
    pub fn value(&self) -> i32 {
        *self.0
    }

    /// Subtract `amount`, halved when the victim defends. No clamping here,
    /// callers decide how to report values below zero.
    pub fn take_damage(&mut self, amount: i32, defending: bool) {
        *self.0 -= effective_damage(amount, defending);
    }

    /// Value the next hit would leave behind
    pub fn after_damage(&self, amount: i32, defending: bool) -> i32 {
        *self.0 - effective_damage(amount, defending)
    }

    pub fn reset(&mut self) {
        *self.0 = MAX_HEALTH;
    }
}

/// Shared handle of a participant. Spatial state lives in the map's grid and
/// is only reachable while the map lock is held.
#[derive(Debug)]
pub struct Player {
    id: UserId,
    render_id: String,
    character: CharacterKind,
    health: Health,
    limits: Mutex<OpLimits>,
}

impl Player {
    pub fn new(id: UserId, character: CharacterKind) -> Self {
        Self {
            id,
            render_id: id.to_string(),
            character,
            health: Health::full(),
            limits: Mutex::new(OpLimits::new()),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    /// Identifier clients use to key sprites
    pub fn render_id(&self) -> &str {
        &self.render_id
    }

    pub fn character(&self) -> CharacterKind {
        self.character
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    /// Per-user operation budget
    pub fn limits(&self) -> &Mutex<OpLimits> {
        &self.limits
    }
}

/// Mutable per-player state guarded by the map lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    pub location: Location,
    pub facing: Direction,
    pub is_defending: bool,
    pub kills: u32,
    pub deaths: u32,
}

impl PlayerState {
    pub fn spawned_at(location: Location) -> Self {
        Self {
            location,
            facing: Direction::North,
            is_defending: false,
            kills: 0,
            deaths: 0,
        }
    }

    /// Reset everything a death takes away; kills and deaths survive
    pub fn respawn_at(&mut self, location: Location) {
        self.location = location;
        self.facing = Direction::North;
        self.is_defending = false;
    }
}

/// Kill/death line of the scoreboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub grid: String,
    pub kills: u32,
    pub deaths: u32,
}

/// How a player is shown to an observer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub grid: String,
    pub health: i32,
    #[serde(rename = "ct")]
    pub character: CharacterKind,
    #[serde(rename = "watchdir")]
    pub facing: Direction,
    pub location: Location,
}
