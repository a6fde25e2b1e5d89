//! Grid coordinates and direction arithmetic

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Zero-based grid coordinate. (0, 0) is the upper left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// One step into `dir`. The result is not bounds checked.
    pub fn step(self, dir: Direction) -> Self {
        self.offset(dir, 1)
    }

    pub fn offset(self, dir: Direction, distance: i32) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx * distance,
            y: self.y + dy * distance,
        }
    }

    /// Position of `self` as seen from `viewer`
    pub fn relative_from(self, viewer: Location) -> Location {
        Location {
            x: self.x - viewer.x,
            y: self.y - viewer.y,
        }
    }

    pub fn to_relative(self) -> RelativeLocation {
        RelativeLocation {
            x: self.x,
            y: self.y,
            is_absolute: false,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A coordinate tagged with the frame it is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeLocation {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "isabs")]
    pub is_absolute: bool,
}

impl RelativeLocation {
    pub fn location(self) -> Location {
        Location::new(self.x, self.y)
    }
}

/// Cardinal facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit step `(dx, dy)`; north decreases `y`
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn rotate(self, angle: Angle) -> Self {
        match (angle, self) {
            (Angle::Right, Direction::North) => Direction::East,
            (Angle::Right, Direction::East) => Direction::South,
            (Angle::Right, Direction::South) => Direction::West,
            (Angle::Right, Direction::West) => Direction::North,
            (Angle::Left, Direction::North) => Direction::West,
            (Angle::Left, Direction::West) => Direction::South,
            (Angle::Left, Direction::South) => Direction::East,
            (Angle::Left, Direction::East) => Direction::North,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "north" => Ok(Direction::North),
            "east" => Ok(Direction::East),
            "south" => Ok(Direction::South),
            "west" => Ok(Direction::West),
            other => Err(format!("'{}' is not a valid direction", other)),
        }
    }
}

/// Quarter turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Angle {
    Left,
    Right,
}

impl Angle {
    pub fn as_str(self) -> &'static str {
        match self {
            Angle::Left => "left",
            Angle::Right => "right",
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Angle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Angle::Left),
            "right" => Ok(Angle::Right),
            other => Err(format!("'{}' is not a valid angle", other)),
        }
    }
}
