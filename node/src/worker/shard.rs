// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use knnmesh_kernel::{DataPoint, PointId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Points held by one worker.
///
/// Points are stored whole behind `Arc`, so a scan works on a snapshot of
/// finished points while inserts keep landing in the map.
#[derive(Debug, Default)]
pub struct Shard {
    points: RwLock<FxHashMap<PointId, Arc<DataPoint>>>,
}

impl Shard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins. Returns `true` if the id was already present.
    pub fn insert(&self, point: DataPoint) -> bool {
        self.points
            .write()
            .insert(point.id(), Arc::new(point))
            .is_some()
    }

    pub fn remove(&self, id: PointId) -> bool {
        self.points.write().remove(&id).is_some()
    }

    pub fn get(&self, id: PointId) -> Option<Arc<DataPoint>> {
        self.points.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }

    /// Consistent view for one scan.
    pub fn snapshot(&self) -> Vec<Arc<DataPoint>> {
        self.points.read().values().cloned().collect()
    }
}
