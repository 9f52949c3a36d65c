//! The operation model: what a blocking action call turns into.

use std::fmt;

use bytefarm_world::kinds::{Direction, EntityKind};
use serde::{Deserialize, Serialize};

/// The four timed action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Move,
    Collect,
    Till,
    Plant,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Collect => "collect",
            ActionKind::Till => "till",
            ActionKind::Plant => "plant",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One queued action.
///
/// Created on the program thread by a blocking call and consumed by the
/// scheduler once its duration has elapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Operation {
    Move { direction: Direction },
    Collect,
    Till,
    Plant { entity: EntityKind },
    /// A call whose argument did not name a valid direction or entity.
    /// Costs the action's duration and changes nothing.
    Malformed { action: ActionKind, argument: String },
    /// Shutdown sentinel. Never applied, never signaled.
    Stop,
}

impl Operation {
    /// A `move` request from an untyped argument.
    pub fn parse_move(argument: &str) -> Self {
        match argument.parse::<Direction>() {
            Ok(direction) => Operation::Move { direction },
            Err(_) => Operation::Malformed {
                action: ActionKind::Move,
                argument: argument.to_owned(),
            },
        }
    }

    /// A `plant` request from an untyped argument.
    pub fn parse_plant(argument: &str) -> Self {
        match argument.parse::<EntityKind>() {
            Ok(entity) => Operation::Plant { entity },
            Err(_) => Operation::Malformed {
                action: ActionKind::Plant,
                argument: argument.to_owned(),
            },
        }
    }

    /// The timed action this operation costs, or `None` for `Stop`.
    pub fn action(&self) -> Option<ActionKind> {
        match self {
            Operation::Move { .. } => Some(ActionKind::Move),
            Operation::Collect => Some(ActionKind::Collect),
            Operation::Till => Some(ActionKind::Till),
            Operation::Plant { .. } => Some(ActionKind::Plant),
            Operation::Malformed { action, .. } => Some(*action),
            Operation::Stop => None,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Operation::Stop)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Move { direction } => write!(f, "move({direction})"),
            Operation::Collect => f.write_str("collect()"),
            Operation::Till => f.write_str("till()"),
            Operation::Plant { entity } => write!(f, "plant({entity})"),
            Operation::Malformed { action, argument } => write!(f, "{action}({argument:?})"),
            Operation::Stop => f.write_str("stop"),
        }
    }
}
