//! Car costing - speeds from the edge, penalties for tolls and
//! destination-only access.

use crate::graph::{class_bits, DirectedEdge, GraphId, GraphTile, NodeInfo};
use crate::matrix::edge_label::EdgeLabel;

use super::{
    base_allowed, base_allowed_reverse, edge_speed_mps, Cost, Costing, CostingOptions,
    InternalTurn, Mode,
};

const TOLL_PENALTY: f32 = 15.0;
const DEST_ONLY_PENALTY: f32 = 120.0;
const SIGNAL_COST: f32 = 6.0;
const LEFT_TURN_PENALTY: f32 = 5.0;
const FERRY_FACTOR: f32 = 1.5;

#[derive(Default)]
pub struct CarCosting {
    options: CostingOptions,
}

impl CarCosting {
    pub fn new(options: CostingOptions) -> Self {
        Self { options }
    }
}

impl Costing for CarCosting {
    fn mode(&self) -> Mode {
        Mode::Car
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
        base_allowed(self, edge, is_dest, pred, false, restriction_idx)
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
        base_allowed_reverse(self, edge, pred, opp_edge, false, restriction_idx)
    }

    fn edge_cost(&self, edge: &DirectedEdge, _tile: &GraphTile) -> Cost {
        let secs = edge.length / edge_speed_mps(edge);
        let mut cost = secs;
        if edge.class_bits & (1 << class_bits::FERRY) != 0 {
            cost *= FERRY_FACTOR;
        }
        if edge.class_bits & (1 << class_bits::TOLL) != 0 {
            cost += TOLL_PENALTY;
        }
        if edge.dest_only {
            cost += DEST_ONLY_PENALTY;
        }
        Cost::new(secs, cost)
    }

    fn transition_cost(&self, _edge: &DirectedEdge, node: &NodeInfo, pred: &EdgeLabel) -> Cost {
        let mut c = Cost::default();
        if node.traffic_signal {
            c += Cost::new(SIGNAL_COST, SIGNAL_COST);
        }
        if pred.internal_turn == InternalTurn::Left {
            c.cost += LEFT_TURN_PENALTY;
        }
        c
    }

    fn transition_cost_reverse(
        &self,
        _local_idx: u32,
        node: &NodeInfo,
        _opp_edge: &DirectedEdge,
        _opp_pred_edge: &DirectedEdge,
        _has_flow_speed: bool,
        internal_turn: InternalTurn,
    ) -> Cost {
        let mut c = Cost::default();
        if node.traffic_signal {
            c += Cost::new(SIGNAL_COST, SIGNAL_COST);
        }
        if internal_turn == InternalTurn::Left {
            c.cost += LEFT_TURN_PENALTY;
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::access;

    fn edge(length: f32, speed: u8) -> DirectedEdge {
        DirectedEdge {
            endnode: GraphId::INVALID,
            length,
            speed,
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
        }
    }

    fn tile() -> GraphTile {
        GraphTile {
            id: GraphId::new(0, 0, 0),
            nodes: vec![],
            directededges: vec![],
            transitions: vec![],
        }
    }

    #[test]
    fn test_edge_cost_uses_speed() {
        let c = CarCosting::default();
        // 100 m at 36 km/h = 10 m/s -> 10 s
        let cost = c.edge_cost(&edge(100.0, 36), &tile());
        assert!((cost.secs - 10.0).abs() < 1e-5);
        assert!((cost.cost - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_flow_speed_preferred() {
        let c = CarCosting::default();
        let mut e = edge(100.0, 36);
        e.flow_speed = 18; // 5 m/s
        let cost = c.edge_cost(&e, &tile());
        assert!((cost.secs - 20.0).abs() < 1e-5);
    }

    #[test]
    fn test_toll_penalty_shapes_cost_only() {
        let c = CarCosting::default();
        let mut e = edge(100.0, 36);
        e.class_bits = 1 << class_bits::TOLL;
        let cost = c.edge_cost(&e, &tile());
        assert!((cost.secs - 10.0).abs() < 1e-5);
        assert!((cost.cost - 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_uturn_refused() {
        let c = CarCosting::default();
        let e = edge(100.0, 36);
        let mut pred = EdgeLabel::test_label();
        pred.opp_local_idx = e.localedgeidx;
        let mut r = 0;
        assert!(!c.allowed(&e, false, &pred, &tile(), GraphId::INVALID, &mut r));
        pred.opp_local_idx = 3;
        assert!(c.allowed(&e, false, &pred, &tile(), GraphId::INVALID, &mut r));
    }

    #[test]
    fn test_restriction_mask_refused() {
        let c = CarCosting::default();
        let mut e = edge(100.0, 36);
        e.restriction_mask = 1 << 3;
        let mut pred = EdgeLabel::test_label();
        pred.opp_local_idx = 3;
        let mut r = 0;
        assert!(!c.allowed(&e, false, &pred, &tile(), GraphId::INVALID, &mut r));
    }
}
