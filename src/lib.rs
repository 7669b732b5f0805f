// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! knnmesh-kernel: points, distance metrics and bounded top-K selection for
//! the knnmesh distributed nearest-neighbor engine.
//!
//! Everything in this crate is pure and synchronous. Networking, sharding
//! and the master/worker runtimes live in `knnmesh-node`.

pub mod error;
pub mod types;
pub mod math;
pub mod dist;
pub mod index;
pub mod query;

pub use dist::DistanceMetric;
pub use error::{KernelError, Result};
pub use index::result_set::ResultSet;
pub use index::Neighbor;
pub use query::{PointFilter, Query};
pub use types::id::{PointId, QueryId, WorkerId};
pub use types::point::DataPoint;

#[cfg(test)]
pub mod tests;
