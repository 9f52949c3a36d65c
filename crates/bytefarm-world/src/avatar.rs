//! The avatar: position, inventory, and owned upgrades.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kinds::{Direction, Resource};
use crate::upgrade::UpgradeTree;

pub const STARTING_GRASS: u32 = 10;
pub const STARTING_STONE: u32 = 10;

/// Resource counts. Missing entries read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory(BTreeMap<Resource, u32>);

impl Inventory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The inventory a new avatar starts with.
    pub fn starting() -> Self {
        let mut inv = Self::empty();
        inv.add(Resource::Grass, STARTING_GRASS);
        inv.add(Resource::Stone, STARTING_STONE);
        inv
    }

    pub fn get(&self, resource: Resource) -> u32 {
        self.0.get(&resource).copied().unwrap_or(0)
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        *self.0.entry(resource).or_insert(0) += amount;
    }

    /// Remove up to `amount`, saturating at zero.
    pub fn take(&mut self, resource: Resource, amount: u32) {
        let slot = self.0.entry(resource).or_insert(0);
        *slot = slot.saturating_sub(amount);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        self.0.iter().map(|(&r, &n)| (r, n))
    }
}

/// The program-controlled unit on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub x: i32,
    pub y: i32,
    pub inventory: Inventory,
    pub upgrades: UpgradeTree,
}

impl Avatar {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            inventory: Inventory::starting(),
            upgrades: UpgradeTree::new(),
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// The tile one step away in `direction`.
    pub fn target(&self, direction: Direction) -> (i32, i32) {
        let (dx, dy) = direction.offset();
        (self.x + dx, self.y + dy)
    }

    /// `1.0` plus every owned move-speed effect.
    pub fn move_speed(&self) -> f64 {
        1.0 + self.upgrades.move_bonus()
    }

    /// `1.0` plus every owned collect-speed effect.
    pub fn collect_speed(&self) -> f64 {
        1.0 + self.upgrades.collect_bonus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_avatar_has_starting_inventory_and_base_speed() {
        let avatar = Avatar::new(2, 2);
        assert_eq!(avatar.inventory.get(Resource::Grass), 10);
        assert_eq!(avatar.inventory.get(Resource::Stone), 10);
        assert_eq!(avatar.inventory.get(Resource::Wood), 0);
        assert_eq!(avatar.move_speed(), 1.0);
        assert_eq!(avatar.collect_speed(), 1.0);
    }

    #[test]
    fn speeds_follow_purchases() {
        let mut avatar = Avatar::new(0, 0);
        avatar.upgrades.purchase("collect_1", &mut avatar.inventory).unwrap();
        avatar.upgrades.purchase("move_1", &mut avatar.inventory).unwrap();
        assert_eq!(avatar.collect_speed(), 2.0);
        assert_eq!(avatar.move_speed(), 2.0);
    }

    #[test]
    fn take_saturates() {
        let mut inv = Inventory::starting();
        inv.take(Resource::Grass, 50);
        assert_eq!(inv.get(Resource::Grass), 0);
    }

    #[test]
    fn target_uses_direction_offset() {
        let avatar = Avatar::new(3, 3);
        assert_eq!(avatar.target(Direction::North), (3, 4));
        assert_eq!(avatar.target(Direction::West), (2, 3));
    }
}
