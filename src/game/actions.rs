//! Player actions and their resolved outcomes

use crate::util::rate_limit::OpKind;

use super::combat::AttackReport;
use super::location::{Angle, Direction};
use super::map::{Terrain, ViewCell};
use super::observers::{LocatedGroup, NotifyGroup};
use super::player::PlayerView;

/// A single request of a player against the battle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Rotate(Angle),
    Move(Direction),
    Radar,
    Scout { distance: i32 },
    Environment,
    Watch,
    Attack,
    Defend,
    Undefend,
    Health,
}

impl Action {
    /// Token bucket charged for this action. Defend and undefend share one.
    pub fn op_kind(&self) -> OpKind {
        match self {
            Action::Rotate(_) => OpKind::Rotate,
            Action::Move(_) => OpKind::Move,
            Action::Radar => OpKind::Radar,
            Action::Scout { .. } => OpKind::Scout,
            Action::Environment => OpKind::Environment,
            Action::Watch => OpKind::Watch,
            Action::Attack => OpKind::Attack,
            Action::Defend | Action::Undefend => OpKind::Defend,
            Action::Health => OpKind::Health,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Action::Rotate(_) => "rotate",
            Action::Move(_) => "move",
            Action::Radar => "radar",
            Action::Scout { .. } => "scout",
            Action::Environment => "environment",
            Action::Watch => "watch",
            Action::Attack => "attack",
            Action::Defend => "defend",
            Action::Undefend => "undefend",
            Action::Health => "health",
        }
    }
}

/// Result of a successfully resolved action together with who must hear
/// about it
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Observers see the actor's location in their own frame
    Rotated {
        angle: Angle,
        facing: Direction,
        observers: LocatedGroup,
    },
    /// `view.location` is absolute; observers carry the new location in
    /// their own frame. `new_line` is the edge that came into the mover's
    /// sight.
    Moved {
        direction: Direction,
        view: PlayerView,
        new_line: Vec<ViewCell>,
        observers: LocatedGroup,
    },
    Radar {
        count: usize,
        observers: NotifyGroup,
    },
    Scout {
        count: usize,
        distance: i32,
        observers: NotifyGroup,
    },
    Environment {
        terrain: Vec<Vec<Terrain>>,
        observers: NotifyGroup,
    },
    Watch {
        health: Vec<Vec<i32>>,
        observers: NotifyGroup,
    },
    Attack(AttackReport),
    Defended {
        observers: NotifyGroup,
    },
    Undefended {
        observers: NotifyGroup,
    },
    Health {
        value: i32,
        observers: NotifyGroup,
    },
}
