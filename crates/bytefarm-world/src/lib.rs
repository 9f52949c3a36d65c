//! ByteFarm world -- the farm map, the avatar, and the upgrade tree.
//!
//! This crate is pure data plus mutators. It knows nothing about user
//! programs or simulated time beyond the tick value callers pass in; the
//! engine crate owns the clock and decides when an effect is applied.
//!
//! # Quick Start
//!
//! ```
//! use bytefarm_world::prelude::*;
//!
//! let mut farm = FarmState::new(INITIAL_MAP_SIZE);
//! assert_eq!(farm.avatar.position(), (2, 2));
//!
//! farm.map.start_plant(2, 2, EntityKind::Grass, 1).unwrap();
//! assert_eq!(farm.measure(500), 0);
//! assert_eq!(farm.measure(1001), 10);
//! ```

#![deny(unsafe_code)]

pub mod avatar;
pub mod kinds;
pub mod map;
pub mod state;
pub mod upgrade;

use kinds::{EntityKind, Ground};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world mutations and name lookups.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A coordinate outside the map was targeted.
    #[error("tile ({x}, {y}) is outside the {width}x{height} map")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    /// A plant target already holds an entity.
    #[error("tile ({x}, {y}) is already occupied by {entity}")]
    TileOccupied {
        x: i32,
        y: i32,
        entity: EntityKind,
    },

    /// The tile's ground does not accept the entity.
    #[error("{entity} cannot grow on {ground}")]
    WrongGround {
        entity: EntityKind,
        ground: Ground,
    },

    /// A direction, ground, entity, or resource name did not parse.
    #[error("unknown {kind} '{name}'")]
    UnknownName {
        kind: &'static str,
        name: String,
    },

    /// An upgrade id that is not part of the tree.
    #[error("unknown upgrade '{id}'")]
    UnknownUpgrade {
        id: String,
    },

    /// The upgrade exists but is owned, locked, or unaffordable.
    #[error("upgrade '{id}' is not purchasable")]
    NotPurchasable {
        id: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::avatar::{Avatar, Inventory, STARTING_GRASS, STARTING_STONE};
    pub use crate::kinds::{Direction, EntityKind, Ground, Resource};
    pub use crate::map::{
        FarmMap, NearbyTile, Planted, Tile, INITIAL_MAP_SIZE, MAX_MAP_SIZE, PLANTED_AMOUNT,
    };
    pub use crate::state::{FarmState, NEARBY_RADIUS};
    pub use crate::upgrade::{Effect as UpgradeEffect, UpgradeNode, UpgradeTree};
    pub use crate::WorldError;
}
