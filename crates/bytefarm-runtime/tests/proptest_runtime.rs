//! Property tests for argument parsing and the output buffer.

use bytefarm_runtime::{ActionKind, Operation, OutputBuffer};
use bytefarm_world::kinds::{Direction, EntityKind};
use proptest::prelude::*;

fn scramble_case(name: &str, mask: u64) -> String {
    name.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask >> (i % 64) & 1 == 1 {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn direction_names_parse_in_any_case(i in 0..4usize, mask in any::<u64>()) {
        let direction = Direction::ALL[i];
        let argument = format!(" {} ", scramble_case(direction.name(), mask));
        prop_assert_eq!(Operation::parse_move(&argument), Operation::Move { direction });
    }

    #[test]
    fn unknown_arguments_become_malformed(argument in "[0-9_]{0,8}") {
        prop_assert_eq!(
            Operation::parse_plant(&argument),
            Operation::Malformed { action: ActionKind::Plant, argument: argument.clone() }
        );
        let op = Operation::parse_move(&argument);
        prop_assert_eq!(op.action(), Some(ActionKind::Move));
        prop_assert!(!op.is_stop());
    }

    #[test]
    fn entity_names_parse(i in 0..4usize) {
        let entity = EntityKind::ALL[i];
        prop_assert_eq!(Operation::parse_plant(entity.name()), Operation::Plant { entity });
    }

    #[test]
    fn output_keeps_newest_lines_within_capacity(
        chunks in prop::collection::vec("[a-c\n]{0,12}", 0..60),
        capacity in 1usize..20,
    ) {
        let buffer = OutputBuffer::with_capacity(capacity);
        for chunk in &chunks {
            buffer.write(chunk);
        }

        let text: String = chunks.concat();
        let mut all: Vec<&str> = text.split('\n').collect();
        let partial = all.pop().unwrap_or_default();
        let keep = all.len().min(capacity);
        let expected: Vec<String> = all[all.len() - keep..].iter().map(|s| s.to_string()).collect();

        prop_assert!(buffer.len() <= capacity);
        prop_assert_eq!(buffer.lines(), expected);
        prop_assert_eq!(buffer.partial(), partial);
    }
}
