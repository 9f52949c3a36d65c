//! A [`FarmApi`] double for backend tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytefarm_world::kinds::Ground;
use bytefarm_world::map::NearbyTile;

use crate::namespace::FarmApi;
use crate::operation::Operation;
use crate::ActionError;

/// Records operations instead of waiting on a scheduler.
#[derive(Default)]
pub(crate) struct Recorder {
    ops: Mutex<Vec<Operation>>,
    printed: Mutex<Vec<String>>,
    stopped: AtomicBool,
}

impl Recorder {
    pub(crate) fn ops(&self) -> Vec<Operation> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn printed(&self) -> Vec<String> {
        self.printed.lock().unwrap().clone()
    }

    /// Make every further blocking call fail as if the runtime stopped.
    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl FarmApi for Recorder {
    fn submit(&self, operation: Operation) -> Result<(), ActionError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ActionError::Stopped);
        }
        self.ops.lock().unwrap().push(operation);
        Ok(())
    }

    fn measure(&self) -> i64 {
        3
    }

    fn get_position(&self) -> (i32, i32) {
        (1, 2)
    }

    fn get_nearby(&self) -> Vec<NearbyTile> {
        vec![NearbyTile { x: 0, y: 1, amount: 4 }]
    }

    fn get_map_size(&self) -> (i32, i32) {
        (6, 6)
    }

    fn get_ground(&self) -> Ground {
        Ground::Sandyland
    }

    fn get_purchasable(&self) -> Vec<String> {
        vec!["move_1".to_owned()]
    }

    fn upgrade(&self, node_id: &str) -> bool {
        node_id == "move_1"
    }

    fn print(&self, text: &str) {
        self.printed.lock().unwrap().push(text.to_owned());
    }
}
