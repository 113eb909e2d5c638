//! Bike costing - capped riding speed with preference shaping by road
//! class.

use crate::graph::{class_bits, DirectedEdge, GraphId, GraphTile, NodeInfo};
use crate::matrix::edge_label::EdgeLabel;

use super::{
    base_allowed, base_allowed_reverse, Cost, Costing, CostingOptions, InternalTurn, Mode,
};

const RIDING_SPEED_KPH: f32 = 16.0;
const CYCLEWAY_SPEED_KPH: f32 = 18.0;
const DEST_ONLY_PENALTY: f32 = 60.0;
const SIGNAL_COST: f32 = 6.0;
const TRACK_FACTOR: f32 = 1.2;
const CYCLEWAY_FACTOR: f32 = 0.7;
const RESIDENTIAL_FACTOR: f32 = 0.9;

#[derive(Default)]
pub struct BikeCosting {
    options: CostingOptions,
}

impl BikeCosting {
    pub fn new(options: CostingOptions) -> Self {
        Self { options }
    }
}

impl Costing for BikeCosting {
    fn mode(&self) -> Mode {
        Mode::Bike
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
        let cycleway = edge.class_bits & (1 << class_bits::CYCLEWAY) != 0;
        let speed_kph = if cycleway {
            CYCLEWAY_SPEED_KPH
        } else {
            RIDING_SPEED_KPH.min(edge.speed as f32)
        };
        let secs = edge.length / (speed_kph / 3.6);

        let mut factor = 1.0;
        if cycleway {
            factor = CYCLEWAY_FACTOR;
        } else if edge.class_bits
            & ((1 << class_bits::RESIDENTIAL) | (1 << class_bits::LIVING_STREET)) != 0
        {
            factor = RESIDENTIAL_FACTOR;
        } else if edge.class_bits & (1 << class_bits::TRACK) != 0 {
            factor = TRACK_FACTOR;
        }

        let mut cost = secs * factor;
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
            c.cost += 2.0;
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
            c.cost += 2.0;
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::access;

    fn edge(length: f32, speed: u8, bits: u32) -> DirectedEdge {
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
            class_bits: bits,
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
    fn test_speed_capped_at_riding_speed() {
        let c = BikeCosting::default();
        // 80 km/h road, still ridden at 16 km/h
        let cost = c.edge_cost(&edge(160.0, 80, 0), &tile());
        assert!((cost.secs - 36.0).abs() < 0.1);
    }

    #[test]
    fn test_cycleway_preferred() {
        let c = BikeCosting::default();
        let road = c.edge_cost(&edge(100.0, 50, 0), &tile());
        let cycleway = c.edge_cost(&edge(100.0, 50, 1 << class_bits::CYCLEWAY), &tile());
        assert!(cycleway.cost < road.cost);
    }
}
