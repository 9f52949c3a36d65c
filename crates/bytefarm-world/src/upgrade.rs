//! The upgrade tree: purchasable nodes arranged as three chains under `base`.
//!
//! Each chain (`collect_N`, `move_N`, `map_N`) requires its predecessor. A
//! node's effect is folded into the avatar's stats on demand, so nothing here
//! caches a derived speed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::avatar::Inventory;
use crate::kinds::Resource;
use crate::map::{INITIAL_MAP_SIZE, MAX_MAP_SIZE};
use crate::WorldError;

/// Id of the free root node every tree starts with.
pub const BASE: &str = "base";

const COLLECT_COSTS: [(u32, u32); 9] = [
    (3, 2),
    (5, 4),
    (8, 6),
    (12, 9),
    (18, 14),
    (25, 20),
    (35, 28),
    (48, 38),
    (65, 50),
];

const MOVE_COSTS: [(u32, u32); 9] = [
    (2, 3),
    (4, 5),
    (7, 8),
    (11, 12),
    (17, 18),
    (24, 25),
    (33, 35),
    (45, 48),
    (60, 65),
];

const MAP_NODES: u32 = 15;

/// What owning a node contributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Effect {
    None,
    CollectSpeed(f64),
    MoveSpeed(f64),
    MapSize(u32),
}

/// A node definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradeNode {
    pub id: String,
    pub cost: Vec<(Resource, u32)>,
    pub effect: Effect,
    pub prerequisites: Vec<String>,
}

impl UpgradeNode {
    fn chained(prefix: &str, level: usize, grass: u32, stone: u32, effect: Effect) -> Self {
        let prerequisite = if level == 1 {
            BASE.to_owned()
        } else {
            format!("{prefix}_{}", level - 1)
        };
        Self {
            id: format!("{prefix}_{level}"),
            cost: vec![(Resource::Grass, grass), (Resource::Stone, stone)],
            effect,
            prerequisites: vec![prerequisite],
        }
    }
}

/// Build the node list in definition order: base, collect, move, map.
fn definitions() -> Vec<UpgradeNode> {
    let mut nodes = vec![UpgradeNode {
        id: BASE.to_owned(),
        cost: Vec::new(),
        effect: Effect::None,
        prerequisites: Vec::new(),
    }];
    for (i, &(grass, stone)) in COLLECT_COSTS.iter().enumerate() {
        nodes.push(UpgradeNode::chained(
            "collect",
            i + 1,
            grass,
            stone,
            Effect::CollectSpeed(1.0),
        ));
    }
    for (i, &(grass, stone)) in MOVE_COSTS.iter().enumerate() {
        nodes.push(UpgradeNode::chained(
            "move",
            i + 1,
            grass,
            stone,
            Effect::MoveSpeed(1.0),
        ));
    }
    for level in 1..=MAP_NODES {
        nodes.push(UpgradeNode::chained(
            "map",
            level as usize,
            level + 1,
            level + 1,
            Effect::MapSize(1),
        ));
    }
    nodes
}

// ---------------------------------------------------------------------------
// UpgradeTree
// ---------------------------------------------------------------------------

/// Node definitions plus the set of purchased ids.
///
/// Only the purchased set is serialized; definitions are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PurchasedSet", into = "PurchasedSet")]
pub struct UpgradeTree {
    nodes: Vec<UpgradeNode>,
    purchased: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct PurchasedSet {
    purchased: BTreeSet<String>,
}

impl From<PurchasedSet> for UpgradeTree {
    fn from(set: PurchasedSet) -> Self {
        let mut tree = UpgradeTree::new();
        tree.purchased.extend(set.purchased);
        tree
    }
}

impl From<UpgradeTree> for PurchasedSet {
    fn from(tree: UpgradeTree) -> Self {
        PurchasedSet {
            purchased: tree.purchased,
        }
    }
}

impl PartialEq for UpgradeTree {
    fn eq(&self, other: &Self) -> bool {
        self.purchased == other.purchased
    }
}

impl Eq for UpgradeTree {}

impl UpgradeTree {
    pub fn new() -> Self {
        Self {
            nodes: definitions(),
            purchased: BTreeSet::from([BASE.to_owned()]),
        }
    }

    pub fn node(&self, id: &str) -> Option<&UpgradeNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// All node definitions in tree order.
    pub fn nodes(&self) -> &[UpgradeNode] {
        &self.nodes
    }

    pub fn is_purchased(&self, id: &str) -> bool {
        self.purchased.contains(id)
    }

    /// Purchased node ids, sorted.
    pub fn purchased(&self) -> impl Iterator<Item = &str> {
        self.purchased.iter().map(String::as_str)
    }

    /// Whether `id` is unowned, unlocked, and affordable with `inventory`.
    pub fn can_purchase(&self, id: &str, inventory: &Inventory) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        !self.is_purchased(id)
            && node.prerequisites.iter().all(|p| self.is_purchased(p))
            && node
                .cost
                .iter()
                .all(|&(res, amount)| inventory.get(res) >= amount)
    }

    /// Buy `id`, deducting its cost from `inventory`.
    pub fn purchase(&mut self, id: &str, inventory: &mut Inventory) -> Result<(), WorldError> {
        if self.node(id).is_none() {
            return Err(WorldError::UnknownUpgrade { id: id.to_owned() });
        }
        if !self.can_purchase(id, inventory) {
            return Err(WorldError::NotPurchasable { id: id.to_owned() });
        }
        if let Some(node) = self.node(id) {
            for &(res, amount) in &node.cost {
                inventory.take(res, amount);
            }
        }
        self.purchased.insert(id.to_owned());
        tracing::debug!(upgrade = id, "upgrade purchased");
        Ok(())
    }

    /// Purchasable node ids in definition order, never including `base`.
    pub fn purchasable(&self, inventory: &Inventory) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.id != BASE && self.can_purchase(&n.id, inventory))
            .map(|n| n.id.clone())
            .collect()
    }

    fn owned_effects(&self) -> impl Iterator<Item = Effect> + '_ {
        self.nodes
            .iter()
            .filter(|n| self.purchased.contains(&n.id))
            .map(|n| n.effect)
    }

    /// Sum of owned move-speed effects.
    pub fn move_bonus(&self) -> f64 {
        self.owned_effects()
            .map(|e| match e {
                Effect::MoveSpeed(v) => v,
                _ => 0.0,
            })
            .sum()
    }

    /// Sum of owned collect-speed effects.
    pub fn collect_bonus(&self) -> f64 {
        self.owned_effects()
            .map(|e| match e {
                Effect::CollectSpeed(v) => v,
                _ => 0.0,
            })
            .sum()
    }

    /// Map side implied by owned map nodes.
    pub fn map_size(&self) -> u32 {
        let extra: u32 = self
            .owned_effects()
            .map(|e| match e {
                Effect::MapSize(v) => v,
                _ => 0,
            })
            .sum();
        (INITIAL_MAP_SIZE + extra).min(MAX_MAP_SIZE)
    }
}

impl Default for UpgradeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rich() -> Inventory {
        let mut inv = Inventory::empty();
        inv.add(Resource::Grass, 1000);
        inv.add(Resource::Stone, 1000);
        inv
    }

    #[test]
    fn tree_has_all_chains() {
        let tree = UpgradeTree::new();
        assert_eq!(tree.nodes().len(), 1 + 9 + 9 + 15);
        assert!(tree.is_purchased(BASE));
        assert_eq!(tree.node("map_4").unwrap().cost, vec![(Resource::Grass, 5), (Resource::Stone, 5)]);
        assert_eq!(tree.node("move_3").unwrap().prerequisites, vec!["move_2".to_owned()]);
    }

    #[test]
    fn purchasable_lists_chain_heads_in_order() {
        let tree = UpgradeTree::new();
        let inv = Inventory::starting();
        assert_eq!(tree.purchasable(&inv), vec!["collect_1", "move_1", "map_1"]);
    }

    #[test]
    fn purchase_deducts_cost_and_unlocks_next() {
        let mut tree = UpgradeTree::new();
        let mut inv = Inventory::starting();
        tree.purchase("move_1", &mut inv).unwrap();
        assert_eq!(inv.get(Resource::Grass), 8);
        assert_eq!(inv.get(Resource::Stone), 7);
        assert!(tree.can_purchase("move_2", &inv));
        assert!((tree.move_bonus() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn locked_owned_and_unknown_nodes_are_rejected() {
        let mut tree = UpgradeTree::new();
        let mut inv = rich();
        assert!(matches!(
            tree.purchase("collect_2", &mut inv),
            Err(WorldError::NotPurchasable { .. })
        ));
        tree.purchase("collect_1", &mut inv).unwrap();
        assert!(matches!(
            tree.purchase("collect_1", &mut inv),
            Err(WorldError::NotPurchasable { .. })
        ));
        assert!(matches!(
            tree.purchase("teleport", &mut inv),
            Err(WorldError::UnknownUpgrade { .. })
        ));
        assert!(tree.purchase(BASE, &mut inv).is_err());
    }

    #[test]
    fn map_size_caps_at_max() {
        let mut tree = UpgradeTree::new();
        let mut inv = rich();
        for level in 1..=15 {
            tree.purchase(&format!("map_{level}"), &mut inv).unwrap();
        }
        assert_eq!(tree.map_size(), MAX_MAP_SIZE);
    }

    #[test]
    fn serializes_only_purchased_ids() {
        let mut tree = UpgradeTree::new();
        tree.purchase("map_1", &mut rich()).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json, serde_json::json!({ "purchased": ["base", "map_1"] }));
        let back: UpgradeTree = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.map_size(), 6);
    }
}
