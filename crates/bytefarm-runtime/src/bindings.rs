//! Host callbacks the runtime reads from.
//!
//! The host binds these before starting a program. Every callback is
//! optional; the namespace substitutes a neutral value when one is missing
//! so the call surface is always complete.

use std::fmt;
use std::sync::Arc;

use bytefarm_world::kinds::Ground;
use bytefarm_world::map::NearbyTile;

use crate::output::OutputBuffer;

/// A shared zero-argument query.
pub type Query<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A shared upgrade mutator taking a node id.
pub type UpgradeFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Map side reported when no map-size query is bound.
pub const DEFAULT_MAP_SIZE: (i32, i32) = (5, 5);

#[derive(Clone, Default)]
pub struct HostBindings {
    pub measure: Option<Query<i64>>,
    pub upgrade: Option<UpgradeFn>,
    pub purchasable: Option<Query<Vec<String>>>,
    pub position: Option<Query<(i32, i32)>>,
    pub nearby: Option<Query<Vec<NearbyTile>>>,
    pub map_size: Option<Query<(i32, i32)>>,
    pub ground: Option<Query<Ground>>,
    pub output: Option<Arc<OutputBuffer>>,
}

impl HostBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_measure_fn(&mut self, f: impl Fn() -> i64 + Send + Sync + 'static) -> &mut Self {
        self.measure = Some(Arc::new(f));
        self
    }

    pub fn set_upgrade_fn(
        &mut self,
        f: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.upgrade = Some(Arc::new(f));
        self
    }

    pub fn set_purchasable_fn(
        &mut self,
        f: impl Fn() -> Vec<String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.purchasable = Some(Arc::new(f));
        self
    }

    pub fn set_position_fn(
        &mut self,
        f: impl Fn() -> (i32, i32) + Send + Sync + 'static,
    ) -> &mut Self {
        self.position = Some(Arc::new(f));
        self
    }

    pub fn set_nearby_fn(
        &mut self,
        f: impl Fn() -> Vec<NearbyTile> + Send + Sync + 'static,
    ) -> &mut Self {
        self.nearby = Some(Arc::new(f));
        self
    }

    pub fn set_map_size_fn(
        &mut self,
        f: impl Fn() -> (i32, i32) + Send + Sync + 'static,
    ) -> &mut Self {
        self.map_size = Some(Arc::new(f));
        self
    }

    pub fn set_ground_fn(&mut self, f: impl Fn() -> Ground + Send + Sync + 'static) -> &mut Self {
        self.ground = Some(Arc::new(f));
        self
    }

    pub fn set_output_buffer(&mut self, buffer: Arc<OutputBuffer>) -> &mut Self {
        self.output = Some(buffer);
        self
    }
}

impl fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBindings")
            .field("measure", &self.measure.is_some())
            .field("upgrade", &self.upgrade.is_some())
            .field("purchasable", &self.purchasable.is_some())
            .field("position", &self.position.is_some())
            .field("nearby", &self.nearby.is_some())
            .field("map_size", &self.map_size.is_some())
            .field("ground", &self.ground.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}
