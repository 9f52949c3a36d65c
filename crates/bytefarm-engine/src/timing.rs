//! Duration rule.
//!
//! `move` and `collect` scale inversely with the avatar's matching speed;
//! `till` and `plant` are fixed. Speeds are read when an operation is
//! dequeued, so a purchase only affects operations issued after it.

use bytefarm_runtime::{ActionKind, Operation};
use bytefarm_world::avatar::Avatar;

use crate::config::ActionDurations;

/// `max(1, floor(base / speed))`.
pub fn scaled_duration(base: u64, speed: f64) -> u64 {
    if !(speed.is_finite() && speed > 0.0) {
        return base.max(1);
    }
    ((base as f64 / speed).floor() as u64).max(1)
}

/// Ticks `operation` takes for `avatar` right now. `Stop` takes none.
///
/// Malformed operations cost what their action would.
pub fn duration_for(operation: &Operation, avatar: &Avatar, durations: &ActionDurations) -> u64 {
    let Some(action) = operation.action() else {
        return 0;
    };
    let base = durations.base(action);
    match action {
        ActionKind::Move => scaled_duration(base, avatar.move_speed()),
        ActionKind::Collect => scaled_duration(base, avatar.collect_speed()),
        ActionKind::Till | ActionKind::Plant => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytefarm_world::kinds::{Direction, EntityKind};

    #[test]
    fn floor_and_minimum() {
        assert_eq!(scaled_duration(500, 1.0), 500);
        assert_eq!(scaled_duration(500, 3.0), 166);
        assert_eq!(scaled_duration(1, 4.0), 1);
        assert_eq!(scaled_duration(0, 1.0), 1);
        assert_eq!(scaled_duration(500, 0.0), 500);
    }

    #[test]
    fn fixed_actions_ignore_speed() {
        let mut avatar = Avatar::new(2, 2);
        avatar
            .upgrades
            .purchase("collect_1", &mut avatar.inventory)
            .unwrap();
        let durations = ActionDurations::default();
        assert_eq!(duration_for(&Operation::Collect, &avatar, &durations), 250);
        assert_eq!(duration_for(&Operation::Till, &avatar, &durations), 200);
        let plant = Operation::Plant {
            entity: EntityKind::Bush,
        };
        assert_eq!(duration_for(&plant, &avatar, &durations), 100);
        let walk = Operation::Move {
            direction: Direction::West,
        };
        assert_eq!(duration_for(&walk, &avatar, &durations), 500);
    }

    #[test]
    fn malformed_costs_its_action() {
        let avatar = Avatar::new(0, 0);
        let durations = ActionDurations::default();
        assert_eq!(
            duration_for(&Operation::parse_plant("corn"), &avatar, &durations),
            100
        );
        assert_eq!(
            duration_for(&Operation::parse_move("up"), &avatar, &durations),
            500
        );
        assert_eq!(duration_for(&Operation::Stop, &avatar, &durations), 0);
    }
}
