//! Tile payload: nodes, directed edges and inter-level transitions.

use serde::{Deserialize, Serialize};

use super::id::GraphId;

/// Local edge index sentinel for edges with no opposing edge (oneways).
pub const INVALID_LOCAL_IDX: u8 = u8::MAX;

/// Mode access bits, shared by node and edge access masks.
pub mod access {
    pub const CAR: u8 = 1 << 0;
    pub const BIKE: u8 = 1 << 1;
    pub const FOOT: u8 = 1 << 2;
    pub const ALL: u8 = CAR | BIKE | FOOT;
}

/// Feature bit positions for `DirectedEdge::class_bits`.
pub mod class_bits {
    pub const TOLL: u32 = 0;
    pub const FERRY: u32 = 1;
    pub const TUNNEL: u32 = 2;
    pub const BRIDGE: u32 = 3;
    pub const LINK: u32 = 4;
    pub const RESIDENTIAL: u32 = 5;
    pub const TRACK: u32 = 6;
    pub const CYCLEWAY: u32 = 7;
    pub const FOOTWAY: u32 = 8;
    pub const LIVING_STREET: u32 = 9;
    pub const SERVICE: u32 = 10;
}

/// A directed edge stored in its start node's tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectedEdge {
    /// Node the edge leads to. May live in another tile.
    pub endnode: GraphId,
    /// Length in meters.
    pub length: f32,
    /// Posted/estimated speed in km/h.
    pub speed: u8,
    /// Flow (measured) speed in km/h; 0 when none was recorded.
    pub flow_speed: u8,
    /// Modes allowed to traverse the edge in its stored direction.
    pub forward_access: u8,
    /// Heading in degrees when leaving the start node.
    pub begin_heading: u16,
    /// Index of this edge among its start node's edges.
    pub localedgeidx: u8,
    /// Local index of the opposing edge at the end node, or
    /// `INVALID_LOCAL_IDX` when the edge has no opposing edge.
    pub opp_local_idx: u8,
    /// Bitmask over the end node's local edge indices: a set bit bans the
    /// turn from the opposing edge with that local index onto this edge.
    pub restriction_mask: u8,
    /// Feature flags, see `class_bits`.
    pub class_bits: u32,
    pub shortcut: bool,
    /// End node lives in a different tile.
    pub leaves_tile: bool,
    /// Edge inside an internal intersection.
    pub internal: bool,
    /// Closed to traffic (incident, construction).
    pub closed: bool,
    /// Access restricted to local destinations.
    pub dest_only: bool,
}

impl DirectedEdge {
    #[inline(always)]
    pub fn has_flow_speed(&self) -> bool {
        self.flow_speed > 0
    }
}

/// A node plus the extents of its edge and transition ranges in the tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// (lat, lon)
    pub ll: (f64, f64),
    /// First outgoing edge in the tile's edge array.
    pub edge_index: u32,
    pub edge_count: u32,
    /// First transition in the tile's transition array.
    pub transition_index: u32,
    pub transition_count: u32,
    /// Modes allowed through the node.
    pub access: u8,
    pub traffic_signal: bool,
    /// Bike-share station; lets the BSS search switch travel mode here.
    pub bike_share: bool,
}

/// Zero-length connector to the same place on another hierarchy level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTransition {
    pub endnode: GraphId,
    pub up: bool,
}

/// One tile of the graph. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphTile {
    /// Tile base id (level + tile, index 0).
    pub id: GraphId,
    pub nodes: Vec<NodeInfo>,
    pub directededges: Vec<DirectedEdge>,
    pub transitions: Vec<NodeTransition>,
}

impl GraphTile {
    /// Node resolution; `None` when the id is outside this tile.
    pub fn node(&self, id: GraphId) -> Option<&NodeInfo> {
        if id.tile_base() != self.id {
            return None;
        }
        self.nodes.get(id.index() as usize)
    }

    /// Directed edge resolution; `None` when the id is outside this tile.
    pub fn directededge(&self, id: GraphId) -> Option<&DirectedEdge> {
        if id.tile_base() != self.id {
            return None;
        }
        self.directededges.get(id.index() as usize)
    }

    pub fn transition(&self, index: u32) -> Option<&NodeTransition> {
        self.transitions.get(index as usize)
    }

    /// Id of the opposing edge of `edge`, resolvable only when the edge's
    /// end node lives in this tile.
    pub fn opposing_edge_id(&self, edge: &DirectedEdge) -> GraphId {
        if edge.opp_local_idx == INVALID_LOCAL_IDX {
            return GraphId::INVALID;
        }
        match self.node(edge.endnode) {
            Some(node) => self
                .id
                .with_index(node.edge_index + edge.opp_local_idx as u32),
            None => GraphId::INVALID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(endnode: GraphId, opp_local_idx: u8) -> DirectedEdge {
        DirectedEdge {
            endnode,
            length: 10.0,
            speed: 50,
            flow_speed: 0,
            forward_access: access::ALL,
            begin_heading: 0,
            localedgeidx: 0,
            opp_local_idx,
            restriction_mask: 0,
            class_bits: 0,
            shortcut: false,
            leaves_tile: false,
            internal: false,
            closed: false,
            dest_only: false,
        }
    }

    #[test]
    fn test_resolution_rejects_foreign_ids() {
        let tile = GraphTile {
            id: GraphId::new(0, 5, 0),
            nodes: vec![],
            directededges: vec![],
            transitions: vec![],
        };
        assert!(tile.node(GraphId::new(0, 6, 0)).is_none());
        assert!(tile.directededge(GraphId::new(1, 5, 0)).is_none());
    }

    #[test]
    fn test_opposing_edge_id() {
        let base = GraphId::new(0, 5, 0);
        let tile = GraphTile {
            id: base,
            nodes: vec![NodeInfo {
                ll: (0.0, 0.0),
                edge_index: 3,
                edge_count: 2,
                transition_index: 0,
                transition_count: 0,
                access: access::ALL,
                traffic_signal: false,
                bike_share: false,
            }],
            directededges: vec![],
            transitions: vec![],
        };
        let e = edge(base.with_index(0), 1);
        assert_eq!(tile.opposing_edge_id(&e), base.with_index(4));

        let oneway = edge(base.with_index(0), INVALID_LOCAL_IDX);
        assert_eq!(tile.opposing_edge_id(&oneway), GraphId::INVALID);
    }
}
