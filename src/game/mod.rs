//! Spatial game engine

pub mod actions;
pub mod battle;
pub mod combat;
pub mod error;
pub mod location;
pub mod map;
pub mod observers;
pub mod player;

pub use actions::{Action, ActionOutcome};
pub use battle::{Battle, InitialState};
pub use combat::{AttackOutcome, AttackReport};
pub use error::ActionError;
pub use location::{Angle, Direction, Location, RelativeLocation};
pub use map::{GameMap, MapError, Terrain, ViewCell};
pub use observers::{LocatedGroup, NotifyGroup, Observer};
pub use player::{CharacterKind, Player, PlayerStats, PlayerView};

/// Numeric account id of a participant
pub type UserId = u32;
