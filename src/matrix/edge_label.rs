//! Search labels.
//!
//! Labels live in an append-only vector and are addressed by index
//! everywhere - the vector reallocates as it grows, so references must
//! never cross a push.

use crate::costing::{Cost, InternalTurn, Mode};
use crate::graph::{DirectedEdge, GraphId};

/// Label index sentinel; also marks "no predecessor" on origin labels.
pub const INVALID_LABEL: u32 = u32::MAX;

/// Restriction index sentinel.
pub const INVALID_RESTRICTION: u8 = u8::MAX;

/// State of one relaxed directed edge on the search frontier.
#[derive(Debug, Clone, Copy)]
pub struct EdgeLabel {
    /// Index of the predecessor label, or `INVALID_LABEL` for origin seeds.
    pub predecessor: u32,
    pub edgeid: GraphId,
    pub endnode: GraphId,
    /// Accumulated cost to the end of the edge.
    pub cost: Cost,
    /// Queue sort key. Equal to `cost.cost`; the matrix searches carry no
    /// heuristic.
    pub sortcost: f32,
    /// Accumulated path length in meters.
    pub path_distance: f32,
    /// Cost of the transition onto this edge.
    pub transition_cost: Cost,
    pub mode: Mode,
    pub restriction_idx: u8,
    /// Local index at `endnode` of this edge's opposing edge.
    pub opp_local_idx: u8,
    /// Label was seeded at the origin; never marked permanent so paths may
    /// loop back over the origin edge.
    pub origin: bool,
    /// Sticky once true: some edge on the path was open.
    pub closure_pruning: bool,
    /// Edge cost came from a recorded flow speed.
    pub flow_sourced: bool,
    pub internal_turn: InternalTurn,
}

impl EdgeLabel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        predecessor: u32,
        edgeid: GraphId,
        edge: &DirectedEdge,
        cost: Cost,
        sortcost: f32,
        mode: Mode,
        path_distance: f32,
        transition_cost: Cost,
        restriction_idx: u8,
        closure_pruning: bool,
        flow_sourced: bool,
        internal_turn: InternalTurn,
    ) -> Self {
        Self {
            predecessor,
            edgeid,
            endnode: edge.endnode,
            cost,
            sortcost,
            path_distance,
            transition_cost,
            mode,
            restriction_idx,
            opp_local_idx: edge.opp_local_idx,
            origin: false,
            closure_pruning,
            flow_sourced,
            internal_turn,
        }
    }

    /// Overwrite the path through this label with a cheaper one. The sole
    /// mutation entry point; `cost` must not increase.
    pub fn update(
        &mut self,
        predecessor: u32,
        cost: Cost,
        sortcost: f32,
        path_distance: f32,
        transition_cost: Cost,
        restriction_idx: u8,
    ) {
        debug_assert!(cost.cost <= self.cost.cost);
        self.predecessor = predecessor;
        self.cost = cost;
        self.sortcost = sortcost;
        self.path_distance = path_distance;
        self.transition_cost = transition_cost;
        self.restriction_idx = restriction_idx;
    }

    pub fn set_origin(&mut self) {
        self.origin = true;
    }

    #[cfg(test)]
    pub fn test_label() -> Self {
        Self {
            predecessor: INVALID_LABEL,
            edgeid: GraphId::INVALID,
            endnode: GraphId::INVALID,
            cost: Cost::default(),
            sortcost: 0.0,
            path_distance: 0.0,
            transition_cost: Cost::default(),
            mode: Mode::Car,
            restriction_idx: INVALID_RESTRICTION,
            opp_local_idx: 0,
            origin: false,
            closure_pruning: true,
            flow_sourced: false,
            internal_turn: InternalTurn::NoTurn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_overwrites_path_fields() {
        let mut label = EdgeLabel::test_label();
        label.cost = Cost::new(100.0, 100.0);
        label.sortcost = 100.0;
        label.path_distance = 500.0;

        label.update(
            7,
            Cost::new(80.0, 80.0),
            80.0,
            400.0,
            Cost::new(1.0, 1.0),
            INVALID_RESTRICTION,
        );
        assert_eq!(label.predecessor, 7);
        assert_eq!(label.cost, Cost::new(80.0, 80.0));
        assert_eq!(label.sortcost, 80.0);
        assert_eq!(label.path_distance, 400.0);
    }
}
