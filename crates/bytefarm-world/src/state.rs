//! `FarmState` bundles the map and the avatar and answers the queries user
//! programs make between actions.

use serde::{Deserialize, Serialize};

use crate::avatar::Avatar;
use crate::kinds::Ground;
use crate::map::{FarmMap, NearbyTile};
use crate::WorldError;

/// Chebyshev radius scanned by `nearby`.
pub const NEARBY_RADIUS: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmState {
    pub map: FarmMap,
    pub avatar: Avatar,
}

impl FarmState {
    /// A fresh farm of side `size` with the avatar at its centre.
    pub fn new(size: u32) -> Self {
        let map = FarmMap::new(size);
        let avatar = Avatar::new((map.width() / 2) as i32, (map.height() / 2) as i32);
        Self { map, avatar }
    }

    /// Collectible units under the avatar.
    pub fn measure(&self, tick: u64) -> u32 {
        self.map
            .collectible_at(self.avatar.x, self.avatar.y, tick)
    }

    /// Ground under the avatar; grassland if the avatar is somehow off-map.
    pub fn ground(&self) -> Ground {
        self.map
            .tile(self.avatar.x, self.avatar.y)
            .map(|t| t.ground)
            .unwrap_or_default()
    }

    pub fn nearby(&self, radius: i32, tick: u64) -> Vec<NearbyTile> {
        self.map
            .nearby_collectible(self.avatar.x, self.avatar.y, radius, tick)
    }

    pub fn purchasable(&self) -> Vec<String> {
        self.avatar.upgrades.purchasable(&self.avatar.inventory)
    }

    /// Buy an upgrade. Map nodes grow the map immediately.
    pub fn purchase_upgrade(&mut self, id: &str) -> Result<(), WorldError> {
        let avatar = &mut self.avatar;
        avatar.upgrades.purchase(id, &mut avatar.inventory)?;
        let side = avatar.upgrades.map_size();
        if side > self.map.width() {
            self.map.expand_to(side);
        }
        Ok(())
    }
}

impl Default for FarmState {
    fn default() -> Self {
        Self::new(crate::map::INITIAL_MAP_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{EntityKind, Resource};

    #[test]
    fn avatar_starts_at_centre() {
        assert_eq!(FarmState::new(5).avatar.position(), (2, 2));
        assert_eq!(FarmState::new(8).avatar.position(), (4, 4));
    }

    #[test]
    fn measure_reads_avatar_tile() {
        let mut farm = FarmState::default();
        farm.map.start_plant(2, 2, EntityKind::Bush, 10).unwrap();
        assert_eq!(farm.measure(900), 0);
        assert_eq!(farm.measure(1010), 10);
        farm.avatar.x = 0;
        assert_eq!(farm.measure(1010), 0);
    }

    #[test]
    fn map_purchase_expands_map() {
        let mut farm = FarmState::default();
        farm.purchase_upgrade("map_1").unwrap();
        assert_eq!(farm.map.size(), (6, 6));
        assert_eq!(farm.avatar.inventory.get(Resource::Grass), 8);
    }

    #[test]
    fn failed_purchase_leaves_state_untouched() {
        let mut farm = FarmState::default();
        let before = farm.clone();
        assert!(farm.purchase_upgrade("move_5").is_err());
        assert_eq!(farm, before);
    }

    #[test]
    fn ground_reports_tilled_tile() {
        let mut farm = FarmState::default();
        farm.map.till(2, 2).unwrap();
        assert_eq!(farm.ground(), Ground::Sandyland);
    }
}
