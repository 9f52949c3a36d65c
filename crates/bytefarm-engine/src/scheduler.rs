//! The tick scheduler: at most one operation in flight.
//!
//! Called once per frame with the current tick. Each step does exactly one
//! of the following:
//!
//! 1. nothing, when the program is not running;
//! 2. with an operation pending: apply it once `tick - started_at >=
//!    duration`, clear the slot, and signal completion;
//! 3. with the slot empty: try to dequeue. `Stop` is dropped without a
//!    signal; anything else gets its duration computed from the avatar's
//!    current speeds, runs its commit-at-issue effect, and becomes pending.
//!
//! An operation applied in a frame is never followed by a dequeue in the
//! same frame.

use bytefarm_runtime::{Operation, ProgramRuntime};
use bytefarm_world::state::FarmState;
use serde::{Deserialize, Serialize};

use crate::config::ActionDurations;
use crate::mutators::{self, Effect, OperationRecord};
use crate::timing;

/// Where the scheduler takes operations from and signals completion to.
pub trait OperationSource {
    fn is_running(&self) -> bool;

    /// Non-blocking dequeue.
    fn poll_op(&self) -> Option<Operation>;

    /// The dequeued operation has been applied.
    fn op_done(&self);
}

impl OperationSource for ProgramRuntime {
    fn is_running(&self) -> bool {
        ProgramRuntime::is_running(self)
    }

    fn poll_op(&self) -> Option<Operation> {
        ProgramRuntime::poll_op(self)
    }

    fn op_done(&self) {
        ProgramRuntime::op_done(self)
    }
}

/// The in-flight operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub operation: Operation,
    pub started_at: u64,
    /// Fixed when dequeued; later speed changes do not touch it.
    pub duration: u64,
    /// Result of the commit-at-issue effect, if the operation has one.
    pub issued_effect: Option<Effect>,
}

impl PendingOperation {
    /// Whether the duration has elapsed at `tick`.
    pub fn is_due(&self, tick: u64) -> bool {
        tick.saturating_sub(self.started_at) >= self.duration
    }

    /// Fraction of the duration elapsed at `tick`, in `[0, 1]`.
    pub fn progress(&self, tick: u64) -> f64 {
        let elapsed = tick.saturating_sub(self.started_at) as f64;
        (elapsed / self.duration.max(1) as f64).min(1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    durations: ActionDurations,
    pending: Option<PendingOperation>,
}

impl TickScheduler {
    pub fn new(durations: ActionDurations) -> Self {
        Self {
            durations,
            pending: None,
        }
    }

    pub fn durations(&self) -> &ActionDurations {
        &self.durations
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    /// Drop the in-flight operation without applying or signaling it.
    pub fn clear(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(op = %pending.operation, "pending operation discarded");
        }
    }

    /// One frame of scheduling. Returns the record of an operation applied
    /// in this step, if any.
    pub fn step(
        &mut self,
        source: &impl OperationSource,
        state: &mut FarmState,
        tick: u64,
    ) -> Option<OperationRecord> {
        if !source.is_running() {
            return None;
        }

        if let Some(pending) = &self.pending {
            if !pending.is_due(tick) {
                return None;
            }
            let pending = self.pending.take()?;
            let effect = match pending.issued_effect {
                Some(effect) => effect,
                None => mutators::apply(state, &pending.operation, tick),
            };
            source.op_done();
            tracing::trace!(
                op = %pending.operation,
                tick,
                duration = pending.duration,
                effect = ?effect,
                "operation applied"
            );
            return Some(OperationRecord {
                operation: pending.operation,
                issued_at: pending.started_at,
                applied_at: tick,
                duration: pending.duration,
                effect,
            });
        }

        let operation = source.poll_op()?;
        if operation.is_stop() {
            tracing::trace!(tick, "stop sentinel dequeued");
            return None;
        }
        let duration = timing::duration_for(&operation, &state.avatar, &self.durations);
        let issued_effect = mutators::commit_at_issue(state, &operation, tick);
        tracing::trace!(op = %operation, tick, duration, "operation pending");
        self.pending = Some(PendingOperation {
            operation,
            started_at: tick,
            duration,
            issued_effect,
        });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytefarm_world::kinds::{Direction, EntityKind};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// A scripted operation queue.
    pub(crate) struct Queue {
        ops: RefCell<VecDeque<Operation>>,
        running: Cell<bool>,
        done: Cell<usize>,
    }

    impl Queue {
        pub(crate) fn new(ops: impl IntoIterator<Item = Operation>) -> Self {
            Self {
                ops: RefCell::new(ops.into_iter().collect()),
                running: Cell::new(true),
                done: Cell::new(0),
            }
        }
    }

    impl OperationSource for Queue {
        fn is_running(&self) -> bool {
            self.running.get()
        }

        fn poll_op(&self) -> Option<Operation> {
            self.ops.borrow_mut().pop_front()
        }

        fn op_done(&self) {
            self.done.set(self.done.get() + 1);
        }
    }

    #[test]
    fn operation_is_pending_for_its_full_duration() {
        let queue = Queue::new([Operation::Move {
            direction: Direction::East,
        }]);
        let mut state = FarmState::new(5);
        let mut scheduler = TickScheduler::default();

        assert!(scheduler.step(&queue, &mut state, 100).is_none());
        let pending = scheduler.pending().unwrap();
        assert_eq!((pending.started_at, pending.duration), (100, 500));

        assert!(scheduler.step(&queue, &mut state, 599).is_none());
        assert_eq!(queue.done.get(), 0);
        assert_eq!(state.avatar.position(), (2, 2));

        let record = scheduler.step(&queue, &mut state, 600).unwrap();
        assert_eq!(record.effect, Effect::Moved { x: 3, y: 2 });
        assert_eq!((record.issued_at, record.applied_at), (100, 600));
        assert_eq!(queue.done.get(), 1);
        assert!(scheduler.pending().is_none());
    }

    #[test]
    fn stop_sentinel_is_never_signaled() {
        let queue = Queue::new([Operation::Stop, Operation::Till]);
        let mut state = FarmState::new(5);
        let mut scheduler = TickScheduler::default();

        assert!(scheduler.step(&queue, &mut state, 0).is_none());
        assert!(scheduler.pending().is_none());
        assert_eq!(queue.done.get(), 0);

        scheduler.step(&queue, &mut state, 0);
        assert_eq!(scheduler.pending().unwrap().operation, Operation::Till);
    }

    #[test]
    fn not_running_does_nothing() {
        let queue = Queue::new([Operation::Collect]);
        queue.running.set(false);
        let mut state = FarmState::new(5);
        let mut scheduler = TickScheduler::default();
        assert!(scheduler.step(&queue, &mut state, 1_000).is_none());
        assert!(scheduler.pending().is_none());
        assert_eq!(queue.ops.borrow().len(), 1);
    }

    #[test]
    fn apply_and_dequeue_never_share_a_frame() {
        let queue = Queue::new([Operation::Till, Operation::Till]);
        let mut state = FarmState::new(5);
        let mut scheduler = TickScheduler::default();

        scheduler.step(&queue, &mut state, 0);
        assert!(scheduler.step(&queue, &mut state, 200).is_some());
        assert!(scheduler.pending().is_none());
        scheduler.step(&queue, &mut state, 200);
        assert_eq!(scheduler.pending().unwrap().started_at, 200);
    }

    #[test]
    fn plant_effect_is_decided_at_issue() {
        let queue = Queue::new([Operation::Plant {
            entity: EntityKind::Grass,
        }]);
        let mut state = FarmState::new(5);
        let mut scheduler = TickScheduler::default();

        scheduler.step(&queue, &mut state, 7);
        // Visible before the duration elapses.
        let tile = state.map.tile(2, 2).unwrap();
        assert_eq!(tile.entity.as_ref().unwrap().planted_at, 7);

        let record = scheduler.step(&queue, &mut state, 107).unwrap();
        assert_eq!(record.effect, Effect::Planted(EntityKind::Grass));
    }

    #[test]
    fn clear_discards_without_signal() {
        let queue = Queue::new([Operation::Collect]);
        let mut state = FarmState::new(5);
        let mut scheduler = TickScheduler::default();
        scheduler.step(&queue, &mut state, 0);
        scheduler.clear();
        assert!(scheduler.step(&queue, &mut state, 10_000).is_none());
        assert_eq!(queue.done.get(), 0);
    }

    #[test]
    fn progress_is_clamped() {
        let pending = PendingOperation {
            operation: Operation::Till,
            started_at: 100,
            duration: 200,
            issued_effect: None,
        };
        assert_eq!(pending.progress(50), 0.0);
        assert_eq!(pending.progress(200), 0.5);
        assert_eq!(pending.progress(1_000), 1.0);
        assert!(!pending.is_due(299));
        assert!(pending.is_due(300));
    }
}
