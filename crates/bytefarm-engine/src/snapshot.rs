//! Engine snapshot and restore with BLAKE3 hashing.
//!
//! [`EngineSnapshot`] captures the farm (map, avatar, inventory, purchased
//! upgrades) and the tick counter, plus a BLAKE3 digest of both. Restoring
//! verifies the digest first and leaves the engine untouched on mismatch.
//!
//! ```
//! use bytefarm_engine::prelude::*;
//!
//! let mut engine = FarmEngine::new(EngineConfig::default());
//! engine.run_for(1_000, 16);
//! let snapshot = engine.capture_snapshot().unwrap();
//! assert_eq!(snapshot.tick_counter, 1_000);
//! assert_eq!(snapshot.hash.len(), 64);
//!
//! engine.run_for(500, 16);
//! engine.restore_snapshot(&snapshot).unwrap();
//! assert_eq!(engine.tick_count(), 1_000);
//! ```
//!
//! # What Is NOT Serialized
//!
//! - **The running program.** Restore stops it; start it again afterwards.
//! - **The pending operation.** Discarded along with the program.
//! - **The output buffer.** Presentation state, left as is.
//!
//! Reading and writing snapshot files is up to the caller.

use bytefarm_world::state::FarmState;
use serde::{Deserialize, Serialize};

use crate::farm::FarmEngine;
use crate::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub state: FarmState,
    pub tick_counter: u64,
    /// BLAKE3 hex digest (64 lowercase hex chars) of `state` and
    /// `tick_counter`.
    pub hash: String,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn compute_hash(state: &FarmState, tick_counter: u64) -> Result<String, EngineError> {
    #[derive(Serialize)]
    struct HashableState<'a> {
        state: &'a FarmState,
        tick_counter: u64,
    }

    let json_bytes = serde_json::to_vec(&HashableState {
        state,
        tick_counter,
    })?;
    Ok(blake3::hash(&json_bytes).to_hex().to_string())
}

impl FarmEngine {
    pub fn capture_snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        let state = self.state().clone();
        let tick_counter = self.tick_count();
        let hash = compute_hash(&state, tick_counter)?;
        Ok(EngineSnapshot {
            state,
            tick_counter,
            hash,
        })
    }

    /// Digest of the current farm and tick.
    pub fn state_hash(&self) -> Result<String, EngineError> {
        compute_hash(&self.state(), self.tick_count())
    }

    /// Restore a snapshot after verifying its hash.
    ///
    /// Stops any running program and clears the pending slot. This is the
    /// only way the tick counter moves other than by frame deltas.
    pub fn restore_snapshot(&mut self, snapshot: &EngineSnapshot) -> Result<(), EngineError> {
        let computed = compute_hash(&snapshot.state, snapshot.tick_counter)?;
        if computed != snapshot.hash {
            return Err(EngineError::SnapshotHashMismatch {
                recorded: snapshot.hash.clone(),
                computed,
            });
        }
        self.reset_to(snapshot.state.clone(), snapshot.tick_counter);
        tracing::debug!(tick = snapshot.tick_counter, "snapshot restored");
        Ok(())
    }
}
