//! Foot costing - fixed walking speed, u-turns allowed.

use crate::graph::{class_bits, DirectedEdge, GraphId, GraphTile, NodeInfo};
use crate::matrix::edge_label::EdgeLabel;

use super::{
    base_allowed, base_allowed_reverse, Cost, Costing, CostingOptions, InternalTurn, Mode,
};

const WALKING_SPEED_KPH: f32 = 5.1;
const SIGNAL_COST: f32 = 10.0;
const FOOTWAY_FACTOR: f32 = 0.9;
const TRACK_FACTOR: f32 = 1.1;

#[derive(Default)]
pub struct FootCosting {
    options: CostingOptions,
}

impl FootCosting {
    pub fn new(options: CostingOptions) -> Self {
        Self { options }
    }
}

impl Costing for FootCosting {
    fn mode(&self) -> Mode {
        Mode::Foot
    }

    fn options(&self) -> &CostingOptions {
        &self.options
    }

    fn allowed(
        &self,
        edge: &DirectedEdge,
        is_dest: bool,
        pred: &EdgeLabel,
        _tile: &GraphTile,
        _edgeid: GraphId,
        restriction_idx: &mut u8,
    ) -> bool {
        base_allowed(self, edge, is_dest, pred, true, restriction_idx)
    }

    fn allowed_reverse(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        opp_edge: &DirectedEdge,
        _opp_tile: &GraphTile,
        _opp_edgeid: GraphId,
        restriction_idx: &mut u8,
    ) -> bool {
        base_allowed_reverse(self, edge, pred, opp_edge, true, restriction_idx)
    }

    fn edge_cost(&self, edge: &DirectedEdge, _tile: &GraphTile) -> Cost {
        let secs = edge.length / (WALKING_SPEED_KPH / 3.6);
        let mut factor = 1.0;
        if edge.class_bits & (1 << class_bits::FOOTWAY) != 0 {
            factor = FOOTWAY_FACTOR;
        } else if edge.class_bits & (1 << class_bits::TRACK) != 0 {
            factor = TRACK_FACTOR;
        }
        Cost::new(secs, secs * factor)
    }

    fn transition_cost(&self, _edge: &DirectedEdge, node: &NodeInfo, _pred: &EdgeLabel) -> Cost {
        if node.traffic_signal {
            Cost::new(SIGNAL_COST, SIGNAL_COST)
        } else {
            Cost::default()
        }
    }

    fn transition_cost_reverse(
        &self,
        _local_idx: u32,
        node: &NodeInfo,
        _opp_edge: &DirectedEdge,
        _opp_pred_edge: &DirectedEdge,
        _has_flow_speed: bool,
        _internal_turn: InternalTurn,
    ) -> Cost {
        if node.traffic_signal {
            Cost::new(SIGNAL_COST, SIGNAL_COST)
        } else {
            Cost::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::access;

    #[test]
    fn test_walking_speed_ignores_edge_speed() {
        let c = FootCosting::default();
        let e = DirectedEdge {
            endnode: GraphId::INVALID,
            length: 141.7, // ~100 s at 5.1 km/h
            speed: 100,
            flow_speed: 0,
            forward_access: access::ALL,
            begin_heading: 0,
            localedgeidx: 0,
            opp_local_idx: 1,
            restriction_mask: 0,
            class_bits: 0,
            shortcut: false,
            leaves_tile: false,
            internal: false,
            closed: false,
            dest_only: false,
        };
        let tile = GraphTile {
            id: GraphId::new(0, 0, 0),
            nodes: vec![],
            directededges: vec![],
            transitions: vec![],
        };
        let cost = c.edge_cost(&e, &tile);
        assert!((cost.secs - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_uturn_allowed() {
        let c = FootCosting::default();
        let mut e = DirectedEdge {
            endnode: GraphId::INVALID,
            length: 10.0,
            speed: 5,
            flow_speed: 0,
            forward_access: access::ALL,
            begin_heading: 0,
            localedgeidx: 2,
            opp_local_idx: 0,
            restriction_mask: 0,
            class_bits: 0,
            shortcut: false,
            leaves_tile: false,
            internal: false,
            closed: false,
            dest_only: false,
        };
        let tile = GraphTile {
            id: GraphId::new(0, 0, 0),
            nodes: vec![],
            directededges: vec![],
            transitions: vec![],
        };
        let mut pred = EdgeLabel::test_label();
        pred.opp_local_idx = 2;
        e.localedgeidx = 2;
        let mut r = 0;
        assert!(c.allowed(&e, false, &pred, &tile, GraphId::INVALID, &mut r));
    }
}
