//! Spatial indexing.
//!
//! A region quadtree keyed by entity id, owned by the world.

mod quadtree;

pub use quadtree::{Bounds, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITEMS, QuadTree};
