//! The square farm map: tiles, planted entities, growth, and harvesting.
//!
//! Coordinates put the origin in the bottom-left corner: `x` grows east and
//! `y` grows north. Tiles are stored row-major starting at `y = 0`, so
//! expanding the map never moves an existing tile to a different coordinate.

use serde::{Deserialize, Serialize};

use crate::kinds::{EntityKind, Ground, Resource};
use crate::WorldError;

/// Side length of a freshly generated map.
pub const INITIAL_MAP_SIZE: u32 = 5;

/// Largest side length reachable through map upgrades.
pub const MAX_MAP_SIZE: u32 = 20;

/// Units harvestable from a freshly planted entity.
pub const PLANTED_AMOUNT: u32 = 10;

/// Ticks an entity needs from planting until it can be collected.
pub const ENTITY_MATURE_TICKS: u64 = 1000;

/// Trees grow slower on sandyland.
pub const TREE_SANDYLAND_MATURE_TICKS: u64 = 2000;

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// An entity growing (or grown) on a tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planted {
    pub kind: EntityKind,
    /// Tick at which the entity was planted. `0` counts as mature from the
    /// start, which covers pre-placed entities and a plant on the first frame.
    pub planted_at: u64,
    /// Units left to collect.
    pub amount: u32,
}

/// One map cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub ground: Ground,
    #[serde(default)]
    pub entity: Option<Planted>,
}

impl Tile {
    /// Ticks the entity on this tile needs to mature, given the ground it
    /// grows on.
    fn mature_ticks(&self, kind: EntityKind) -> u64 {
        if kind == EntityKind::Tree && self.ground == Ground::Sandyland {
            TREE_SANDYLAND_MATURE_TICKS
        } else {
            ENTITY_MATURE_TICKS
        }
    }

    /// Whether the tile holds an entity that can be collected at `tick`.
    pub fn is_mature(&self, tick: u64) -> bool {
        match &self.entity {
            None => false,
            Some(p) if p.planted_at == 0 => true,
            Some(p) => tick.saturating_sub(p.planted_at) >= self.mature_ticks(p.kind),
        }
    }

    /// Growth progress in `[0, 1]`; `0` when the tile is empty.
    pub fn growth_progress(&self, tick: u64) -> f64 {
        match &self.entity {
            None => 0.0,
            Some(p) if p.planted_at == 0 => 1.0,
            Some(p) => {
                let elapsed = tick.saturating_sub(p.planted_at) as f64;
                (elapsed / self.mature_ticks(p.kind) as f64).min(1.0)
            }
        }
    }

    /// Units collectible right now: the remaining amount if mature, else 0.
    pub fn collectible(&self, tick: u64) -> u32 {
        if !self.is_mature(tick) {
            return 0;
        }
        self.entity.as_ref().map_or(0, |p| p.amount)
    }
}

// ---------------------------------------------------------------------------
// FarmMap
// ---------------------------------------------------------------------------

/// A collectible tile reported to user programs by `get_nearby()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyTile {
    pub x: i32,
    pub y: i32,
    pub amount: u32,
}

/// The farm map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmMap {
    width: u32,
    height: u32,
    /// Row-major, `y = 0` first.
    tiles: Vec<Tile>,
}

impl FarmMap {
    /// Create a square grassland map. The side is clamped to
    /// `[INITIAL_MAP_SIZE, MAX_MAP_SIZE]`.
    pub fn new(size: u32) -> Self {
        let side = size.clamp(INITIAL_MAP_SIZE, MAX_MAP_SIZE);
        Self {
            width: side,
            height: side,
            tiles: vec![Tile::default(); (side * side) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` as reported to user programs.
    pub fn size(&self) -> (i32, i32) {
        (self.width as i32, self.height as i32)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (ux, uy) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        (ux < self.width && uy < self.height).then(|| (uy * self.width + ux) as usize)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.index(x, y).map(move |i| &mut self.tiles[i])
    }

    fn tile_checked(&mut self, x: i32, y: i32) -> Result<&mut Tile, WorldError> {
        let (width, height) = (self.width, self.height);
        self.tile_mut(x, y).ok_or(WorldError::OutOfBounds {
            x,
            y,
            width,
            height,
        })
    }

    /// Grow the map to `target` per side (clamped to [`MAX_MAP_SIZE`]).
    ///
    /// New columns appear on the east edge and new rows on the north edge.
    /// Shrinking is never performed.
    pub fn expand_to(&mut self, target: u32) {
        let target = target.min(MAX_MAP_SIZE).max(self.width).max(self.height);
        if target == self.width && target == self.height {
            return;
        }
        let mut tiles = Vec::with_capacity((target * target) as usize);
        for y in 0..target {
            for x in 0..target {
                let existing = (x < self.width && y < self.height)
                    .then(|| self.tiles[(y * self.width + x) as usize].clone());
                tiles.push(existing.unwrap_or_default());
            }
        }
        tracing::debug!(from = self.width, to = target, "map expanded");
        self.width = target;
        self.height = target;
        self.tiles = tiles;
    }

    /// Start growing `kind` at `(x, y)`.
    ///
    /// Fails without mutating anything if the tile is out of bounds, already
    /// occupied, or its ground does not accept the entity.
    pub fn start_plant(
        &mut self,
        x: i32,
        y: i32,
        kind: EntityKind,
        tick: u64,
    ) -> Result<(), WorldError> {
        let tile = self.tile_checked(x, y)?;
        if let Some(existing) = &tile.entity {
            return Err(WorldError::TileOccupied {
                x,
                y,
                entity: existing.kind,
            });
        }
        if !kind.grows_on(tile.ground) {
            return Err(WorldError::WrongGround {
                entity: kind,
                ground: tile.ground,
            });
        }
        tile.entity = Some(Planted {
            kind,
            planted_at: tick,
            amount: PLANTED_AMOUNT,
        });
        Ok(())
    }

    /// Harvest one unit from a mature entity at `(x, y)`.
    ///
    /// Returns `None` when there is nothing collectible. The entity is
    /// removed once its last unit is taken.
    pub fn collect(&mut self, x: i32, y: i32, tick: u64) -> Option<Resource> {
        let tile = self.tile_mut(x, y)?;
        if tile.collectible(tick) == 0 {
            return None;
        }
        let planted = tile.entity.as_mut()?;
        planted.amount -= 1;
        let resource = planted.kind.harvest();
        if planted.amount == 0 {
            tile.entity = None;
        }
        Some(resource)
    }

    /// Toggle the ground at `(x, y)`, clearing any entity on it.
    pub fn till(&mut self, x: i32, y: i32) -> Result<Ground, WorldError> {
        let tile = self.tile_checked(x, y)?;
        tile.entity = None;
        tile.ground = tile.ground.tilled();
        Ok(tile.ground)
    }

    /// Collectible units at `(x, y)`; 0 for empty, immature, or missing tiles.
    pub fn collectible_at(&self, x: i32, y: i32, tick: u64) -> u32 {
        self.tile(x, y).map_or(0, |t| t.collectible(tick))
    }

    /// Tiles within Chebyshev `radius` of `(cx, cy)` that have something
    /// collectible, scanning south to north, west to east.
    pub fn nearby_collectible(&self, cx: i32, cy: i32, radius: i32, tick: u64) -> Vec<NearbyTile> {
        let mut found = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (x, y) = (cx + dx, cy + dy);
                let amount = self.collectible_at(x, y, tick);
                if amount > 0 {
                    found.push(NearbyTile { x, y, amount });
                }
            }
        }
        found
    }

    /// Iterate all tiles with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32, &Tile)> + '_ {
        let width = self.width;
        self.tiles.iter().enumerate().map(move |(i, t)| {
            let i = i as u32;
            ((i % width) as i32, (i / width) as i32, t)
        })
    }
}

impl Default for FarmMap {
    fn default() -> Self {
        Self::new(INITIAL_MAP_SIZE)
    }
}
