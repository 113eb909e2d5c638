//! Tiled road network graph
//!
//! The graph is partitioned into tiles, each holding contiguous arrays of
//! nodes, directed edges and inter-level transitions. A `GraphId` addresses
//! a node or an edge by (level, tile, index); which one it names depends on
//! context. Tiles are immutable once built and are served by a `GraphReader`
//! that caches them in memory and can round-trip them through bincode files.

pub mod builder;
pub mod id;
pub mod reader;
pub mod tile;

pub use builder::{BuiltGraph, GraphBuilder, WayAttrs};
pub use id::GraphId;
pub use reader::GraphReader;
pub use tile::{access, class_bits, DirectedEdge, GraphTile, NodeInfo, NodeTransition};
pub use tile::INVALID_LOCAL_IDX;
