//! Mesh topology: cell arena handles, the level-structured [`forest::Forest`]
//! store, and cache invalidation plumbing.

pub mod cache;
pub mod cell;
pub mod forest;

pub use cache::InvalidateCache;
pub use cell::{BoundaryId, CellId, MaterialId, RefineFlag, SubdomainId};
pub use forest::{Forest, NeighborLink};
