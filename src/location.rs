//! Query inputs and outputs.

use serde::{Deserialize, Serialize};

use crate::graph::GraphId;

/// One candidate correlation of an input location onto a directed edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEdge {
    pub edge_id: GraphId,
    /// Position of the snap along the edge, 0 = begin node, 1 = end node.
    pub percent_along: f32,
    /// Snap is exactly at the edge's begin node.
    pub begin_node: bool,
    /// Snap is exactly at the edge's end node.
    pub end_node: bool,
    /// Meters between the input point and the snapped point, charged as a
    /// worst-case 1 m/s penalty.
    pub distance: f32,
}

impl PathEdge {
    pub fn new(edge_id: GraphId, percent_along: f32, distance: f32) -> Self {
        Self {
            edge_id,
            percent_along,
            begin_node: percent_along <= 0.0,
            end_node: percent_along >= 1.0,
            distance,
        }
    }
}

/// An input location correlated onto the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    /// Original (lat, lon), if known.
    pub ll: Option<(f64, f64)>,
    /// Candidate edges; empty means the location could not be correlated.
    pub edges: Vec<PathEdge>,
}

impl Location {
    pub fn from_edges(edges: Vec<PathEdge>) -> Self {
        Self { ll: None, edges }
    }
}

/// One matrix cell: least travel time and the length of that path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDistance {
    pub secs: u32,
    pub meters: u32,
}

impl TimeDistance {
    pub fn new(secs: u32, meters: u32) -> Self {
        Self { secs, meters }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_edge_node_flags() {
        let id = GraphId::new(0, 0, 0);
        assert!(PathEdge::new(id, 0.0, 0.0).begin_node);
        assert!(PathEdge::new(id, 1.0, 0.0).end_node);
        let mid = PathEdge::new(id, 0.5, 3.0);
        assert!(!mid.begin_node && !mid.end_node);
    }
}
