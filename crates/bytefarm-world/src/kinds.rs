//! Enumerations shared by the world, the runtime, and user programs.
//!
//! Every kind has a stable lowercase name (`"east"`, `"sandyland"`,
//! `"tree"`, ...) used when scripts pass strings across the host boundary,
//! and a small integer code used by the WASM import surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::WorldError;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// A cardinal direction for `move`. North increases `y`, east increases `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    East,
    West,
    North,
    South,
}

impl Direction {
    /// All directions in code order.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::West,
        Direction::North,
        Direction::South,
    ];

    /// Unit offset `(dx, dy)` for one step in this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::North => (0, 1),
            Direction::South => (0, -1),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::East => "east",
            Direction::West => "west",
            Direction::North => "north",
            Direction::South => "south",
        }
    }

    /// Decode the integer code used by the WASM surface (`0..=3`).
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

// ---------------------------------------------------------------------------
// Ground
// ---------------------------------------------------------------------------

/// Ground type of a tile. `till` toggles between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ground {
    #[default]
    Grassland,
    Sandyland,
}

impl Ground {
    pub const ALL: [Ground; 2] = [Ground::Grassland, Ground::Sandyland];

    /// The ground a tile becomes after tilling.
    pub fn tilled(self) -> Self {
        match self {
            Ground::Grassland => Ground::Sandyland,
            Ground::Sandyland => Ground::Grassland,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Ground::Grassland => "grassland",
            Ground::Sandyland => "sandyland",
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Ground::Grassland => 0,
            Ground::Sandyland => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// Something that can be planted on a tile and harvested once mature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Grass,
    Stone,
    Bush,
    Tree,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Grass,
        EntityKind::Stone,
        EntityKind::Bush,
        EntityKind::Tree,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Grass => "grass",
            EntityKind::Stone => "stone",
            EntityKind::Bush => "bush",
            EntityKind::Tree => "tree",
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Whether this entity may be planted on `ground`.
    pub fn grows_on(self, ground: Ground) -> bool {
        match self {
            EntityKind::Grass | EntityKind::Bush => ground == Ground::Grassland,
            EntityKind::Stone => ground == Ground::Sandyland,
            EntityKind::Tree => true,
        }
    }

    /// Resource yielded by one `collect` of a mature entity.
    pub fn harvest(self) -> Resource {
        match self {
            EntityKind::Grass => Resource::Grass,
            EntityKind::Stone => Resource::Stone,
            EntityKind::Bush | EntityKind::Tree => Resource::Wood,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// Inventory resource. Upgrade costs are paid in these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Grass,
    Stone,
    Wood,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Grass, Resource::Stone, Resource::Wood];

    pub fn name(self) -> &'static str {
        match self {
            Resource::Grass => "grass",
            Resource::Stone => "stone",
            Resource::Wood => "wood",
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing and display
// ---------------------------------------------------------------------------

macro_rules! named_kind {
    ($ty:ident, $what:literal) => {
        impl FromStr for $ty {
            type Err = WorldError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| WorldError::UnknownName {
                        kind: $what,
                        name: s.to_owned(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_kind!(Direction, "direction");
named_kind!(Ground, "ground");
named_kind!(EntityKind, "entity");

named_kind!(Resource, "resource");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_names_round_trip_case_insensitively() {
        assert_eq!("East".parse::<Direction>().unwrap(), Direction::East);
        assert_eq!(" north ".parse::<Direction>().unwrap(), Direction::North);
        assert!("up".parse::<Direction>().is_err());
    }

    #[test]
    fn direction_codes_match_order() {
        assert_eq!(Direction::from_code(0), Some(Direction::East));
        assert_eq!(Direction::from_code(3), Some(Direction::South));
        assert_eq!(Direction::from_code(4), None);
        assert_eq!(Direction::from_code(-1), None);
    }

    #[test]
    fn placement_rules() {
        assert!(EntityKind::Grass.grows_on(Ground::Grassland));
        assert!(!EntityKind::Grass.grows_on(Ground::Sandyland));
        assert!(EntityKind::Stone.grows_on(Ground::Sandyland));
        assert!(!EntityKind::Stone.grows_on(Ground::Grassland));
        assert!(!EntityKind::Bush.grows_on(Ground::Sandyland));
        assert!(EntityKind::Tree.grows_on(Ground::Grassland));
        assert!(EntityKind::Tree.grows_on(Ground::Sandyland));
    }

    #[test]
    fn bush_and_tree_yield_wood() {
        assert_eq!(EntityKind::Bush.harvest(), Resource::Wood);
        assert_eq!(EntityKind::Tree.harvest(), Resource::Wood);
        assert_eq!(EntityKind::Stone.harvest(), Resource::Stone);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Ground::Sandyland).unwrap();
        assert_eq!(json, "\"sandyland\"");
    }
}
