//! Action resolution errors

use crate::util::rate_limit::OpKind;

use super::UserId;

/// Every way an action can be refused. A refused action leaves the game
/// state exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid packet. {0}")]
    Validation(String),

    #[error("Rate limit exceeded for '{0}'")]
    RateLimited(OpKind),

    #[error("Position is out of Map")]
    OutOfMap,

    #[error("Cannot move outside the map")]
    MoveOutOfMap,

    #[error("Block already has a resident")]
    AlreadyOccupied,

    #[error("Location is not accessable due to the block type")]
    Inaccessible,

    #[error("No Enemy")]
    NoTarget,

    #[error("Player is already defending")]
    AlreadyDefending,

    #[error("Player is already undefending")]
    AlreadyUndefending,

    #[error("Player is not able to move, because of defending")]
    MovingWhileDefending,

    #[error("Unable to find a suitable location to place the player during spawn")]
    NoSpawnLocation,

    #[error("Unknown player {0}")]
    UnknownPlayer(UserId),
}

impl ActionError {
    /// Short machine-readable code for logs
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::Validation(_) => "validation",
            ActionError::RateLimited(_) => "rate_limited",
            ActionError::OutOfMap => "out_of_map",
            ActionError::MoveOutOfMap => "move_out_of_map",
            ActionError::AlreadyOccupied => "already_occupied",
            ActionError::Inaccessible => "inaccessible",
            ActionError::NoTarget => "no_target",
            ActionError::AlreadyDefending => "already_defending",
            ActionError::AlreadyUndefending => "already_undefending",
            ActionError::MovingWhileDefending => "moving_while_defending",
            ActionError::NoSpawnLocation => "no_spawn_location",
            ActionError::UnknownPlayer(_) => "unknown_player",
        }
    }
}
