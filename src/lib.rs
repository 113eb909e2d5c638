//! Tilematrix: many-to-many time/distance matrices over a tiled road graph
//!
//! Pipeline:
//! - Graph: tiled, directed road network (`graph`) with bincode tile persistence
//! - Costing: per-mode traversal costs and access rules (`costing`)
//! - Correlation: snap input coordinates onto directed edges (`snap`)
//! - Matrix: label-setting one-to-many searches aggregated into a dense
//!   many-to-many table (`matrix`)
//!
//! The matrix core runs a series of one-to-many Dijkstra expansions over a
//! double bucket queue. The cheaper search direction is chosen from the
//! source/target counts; in reverse mode each one-to-many result is written
//! as a matrix column instead of a row. A bike-share variant carries two
//! costings at once and switches mode at station nodes.
//!
//! Key principle: all search state lives in one engine instance and is
//! recycled between runs. Tiles are read-only and shared; the engine never
//! retains tile references across queries.

pub mod costing;
pub mod geo;
pub mod graph;
pub mod location;
pub mod matrix;
pub mod snap;

pub use costing::{Cost, Costing, Mode, ModeCosting};
pub use graph::{DirectedEdge, GraphBuilder, GraphId, GraphReader, GraphTile, NodeInfo};
pub use location::{Location, PathEdge, TimeDistance};
pub use matrix::{
    source_to_target_parallel, MatrixStats, TimeDistanceBssMatrix, TimeDistanceMatrix,
    ALL_LOCATIONS,
};
