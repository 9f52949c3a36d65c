//! World mutations for each operation.
//!
//! Two entry points, matching the two moments an operation touches the
//! world: [`commit_at_issue`] runs when the scheduler dequeues it and
//! [`apply`] runs once its duration has elapsed. Invalid targets and
//! malformed payloads mutate nothing; they are reported as an [`Effect`]
//! and never as an error.

use bytefarm_runtime::Operation;
use bytefarm_world::kinds::{EntityKind, Ground, Resource};
use bytefarm_world::state::FarmState;
use serde::{Deserialize, Serialize};

/// What applying an operation did to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// The avatar stepped onto `(x, y)`.
    Moved { x: i32, y: i32 },
    /// The target `(x, y)` is off the map; the avatar stayed put.
    Blocked { x: i32, y: i32 },
    Collected(Resource),
    NothingToCollect,
    /// The tile under the avatar now has this ground.
    Tilled(Ground),
    Planted(EntityKind),
    /// Occupied tile, wrong ground, or off-map.
    PlantRejected,
    /// Malformed payload, or nothing to do.
    Ignored,
}

/// One applied operation, as returned from a frame step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation: Operation,
    /// Tick at which the operation was dequeued.
    pub issued_at: u64,
    /// Tick at which it was applied and signaled.
    pub applied_at: u64,
    pub duration: u64,
    pub effect: Effect,
}

/// Effects that start the moment an operation is dequeued.
///
/// Only `plant` has one: the tile is reserved and maturation starts at
/// `tick`. Returns `None` for operations whose effect waits for [`apply`].
pub fn commit_at_issue(state: &mut FarmState, operation: &Operation, tick: u64) -> Option<Effect> {
    let Operation::Plant { entity } = operation else {
        return None;
    };
    let (x, y) = state.avatar.position();
    match state.map.start_plant(x, y, *entity, tick) {
        Ok(()) => {
            tracing::trace!(x, y, entity = %entity, tick, "planted");
            Some(Effect::Planted(*entity))
        }
        Err(e) => {
            tracing::warn!(error = %e, "plant rejected");
            Some(Effect::PlantRejected)
        }
    }
}

/// Apply `operation` at completion time.
pub fn apply(state: &mut FarmState, operation: &Operation, tick: u64) -> Effect {
    let (x, y) = state.avatar.position();
    match operation {
        Operation::Move { direction } => {
            let (tx, ty) = state.avatar.target(*direction);
            if state.map.contains(tx, ty) {
                state.avatar.x = tx;
                state.avatar.y = ty;
                Effect::Moved { x: tx, y: ty }
            } else {
                tracing::trace!(x = tx, y = ty, "move blocked by map edge");
                Effect::Blocked { x: tx, y: ty }
            }
        }
        Operation::Collect => match state.map.collect(x, y, tick) {
            Some(resource) => {
                state.avatar.inventory.add(resource, 1);
                Effect::Collected(resource)
            }
            None => Effect::NothingToCollect,
        },
        Operation::Till => match state.map.till(x, y) {
            Ok(ground) => Effect::Tilled(ground),
            Err(e) => {
                tracing::warn!(error = %e, "till failed");
                Effect::Ignored
            }
        },
        // The plant itself happened at issue time.
        Operation::Plant { .. } => Effect::Ignored,
        Operation::Malformed { action, argument } => {
            tracing::warn!(action = %action, argument = %argument, "malformed operation absorbed");
            Effect::Ignored
        }
        Operation::Stop => Effect::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytefarm_world::kinds::Direction;

    fn farm() -> FarmState {
        FarmState::new(5)
    }

    #[test]
    fn move_stays_on_map() {
        let mut state = farm();
        state.avatar.x = 4;
        let east = Operation::Move {
            direction: Direction::East,
        };
        assert_eq!(apply(&mut state, &east, 0), Effect::Blocked { x: 5, y: 2 });
        assert_eq!(state.avatar.position(), (4, 2));

        let north = Operation::Move {
            direction: Direction::North,
        };
        assert_eq!(apply(&mut state, &north, 0), Effect::Moved { x: 4, y: 3 });
        assert_eq!(state.avatar.position(), (4, 3));
    }

    #[test]
    fn plant_commits_at_issue_and_apply_is_a_no_op() {
        let mut state = farm();
        let plant = Operation::Plant {
            entity: EntityKind::Grass,
        };
        assert_eq!(
            commit_at_issue(&mut state, &plant, 40),
            Some(Effect::Planted(EntityKind::Grass))
        );
        let planted = state.map.tile(2, 2).unwrap().entity.clone().unwrap();
        assert_eq!(planted.planted_at, 40);

        let before = state.clone();
        assert_eq!(apply(&mut state, &plant, 140), Effect::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn rejected_plant_leaves_world_untouched() {
        let mut state = farm();
        let stone = Operation::Plant {
            entity: EntityKind::Stone,
        };
        let before = state.clone();
        // Stone needs sandyland.
        assert_eq!(
            commit_at_issue(&mut state, &stone, 0),
            Some(Effect::PlantRejected)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn collect_moves_one_unit_into_inventory() {
        let mut state = farm();
        state
            .map
            .start_plant(2, 2, EntityKind::Tree, 1)
            .unwrap();
        assert_eq!(apply(&mut state, &Operation::Collect, 500), Effect::NothingToCollect);

        let wood = state.avatar.inventory.get(Resource::Wood);
        assert_eq!(
            apply(&mut state, &Operation::Collect, 1001),
            Effect::Collected(Resource::Wood)
        );
        assert_eq!(state.avatar.inventory.get(Resource::Wood), wood + 1);
        assert_eq!(state.measure(1001), 9);
    }

    #[test]
    fn till_toggles_ground_and_clears_entity() {
        let mut state = farm();
        state.map.start_plant(2, 2, EntityKind::Bush, 1).unwrap();
        assert_eq!(
            apply(&mut state, &Operation::Till, 10),
            Effect::Tilled(Ground::Sandyland)
        );
        assert!(state.map.tile(2, 2).unwrap().entity.is_none());
    }

    #[test]
    fn malformed_and_stop_change_nothing() {
        let mut state = farm();
        let before = state.clone();
        assert_eq!(
            apply(&mut state, &Operation::parse_move("up"), 0),
            Effect::Ignored
        );
        assert_eq!(
            commit_at_issue(&mut state, &Operation::parse_plant("corn"), 0),
            None
        );
        assert_eq!(apply(&mut state, &Operation::Stop, 0), Effect::Ignored);
        assert_eq!(state, before);
    }
}
