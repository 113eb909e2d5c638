//! Travel-mode costing
//!
//! A `Costing` prices edge traversals and node transitions and gates access
//! for one travel mode. The search engines only talk to the trait; the
//! per-mode implementations (`car`, `bike`, `foot`) hold the speed and
//! penalty tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Add, AddAssign, Mul, Sub};

use crate::graph::{access, DirectedEdge, GraphId, GraphTile, NodeInfo};
use crate::matrix::edge_label::{EdgeLabel, INVALID_RESTRICTION};

pub mod bike;
pub mod car;
pub mod foot;

pub use bike::BikeCosting;
pub use car::CarCosting;
pub use foot::FootCosting;

/// Accumulated path cost: real elapsed seconds plus a shaped cost that
/// includes penalties. The searches sort on `cost`; `secs` is what gets
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cost {
    pub secs: f32,
    pub cost: f32,
}

impl Cost {
    pub const MAX: Cost = Cost {
        secs: f32::INFINITY,
        cost: f32::INFINITY,
    };

    pub fn new(secs: f32, cost: f32) -> Self {
        Self { secs, cost }
    }

    #[inline(always)]
    pub fn is_finite(self) -> bool {
        self.cost.is_finite()
    }
}

impl Add for Cost {
    type Output = Cost;
    fn add(self, rhs: Cost) -> Cost {
        Cost::new(self.secs + rhs.secs, self.cost + rhs.cost)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        self.secs += rhs.secs;
        self.cost += rhs.cost;
    }
}

impl Sub for Cost {
    type Output = Cost;
    fn sub(self, rhs: Cost) -> Cost {
        Cost::new(self.secs - rhs.secs, self.cost - rhs.cost)
    }
}

impl Mul<f32> for Cost {
    type Output = Cost;
    fn mul(self, rhs: f32) -> Cost {
        Cost::new(self.secs * rhs, self.cost * rhs)
    }
}

/// Travel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Car,
    Bike,
    Foot,
}

impl Mode {
    pub fn all() -> &'static [Mode] {
        &[Mode::Car, Mode::Bike, Mode::Foot]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Car => "car",
            Mode::Bike => "bike",
            Mode::Foot => "foot",
        }
    }

    pub fn from_name(name: &str) -> Option<Mode> {
        match name {
            "car" => Some(Mode::Car),
            "bike" => Some(Mode::Bike),
            "foot" => Some(Mode::Foot),
            _ => None,
        }
    }

    pub fn access_mask(&self) -> u8 {
        match self {
            Mode::Car => access::CAR,
            Mode::Bike => access::BIKE,
            Mode::Foot => access::FOOT,
        }
    }
}

/// Turn classification inside internal intersections, carried on labels so
/// transition costing can penalize the second half of a compound turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalTurn {
    NoTurn,
    Straight,
    Left,
    Right,
}

/// Options shared by all costings.
#[derive(Debug, Clone, Default)]
pub struct CostingOptions {
    /// User-avoided edges, keyed by edge id with the avoid position along
    /// the edge.
    pub avoid_edges: HashMap<GraphId, f32>,
    /// Refuse destination-only edges outright instead of pricing them.
    pub exclude_dest_only: bool,
    /// Refuse closed edges instead of leaving them to closure pruning.
    pub exclude_closures: bool,
}

const KPH_TO_MPS: f32 = 1.0 / 3.6;

/// Meters-per-second from km/h, preferring a recorded flow speed.
pub(crate) fn edge_speed_mps(edge: &DirectedEdge) -> f32 {
    let kph = if edge.has_flow_speed() {
        edge.flow_speed
    } else {
        edge.speed
    };
    (kph.max(1)) as f32 * KPH_TO_MPS
}

fn classify_turn(from_heading: u16, to_heading: u16) -> InternalTurn {
    let diff = (360 + to_heading as i32 - from_heading as i32) % 360;
    match diff {
        0..=44 | 316..=359 => InternalTurn::Straight,
        45..=180 => InternalTurn::Right,
        _ => InternalTurn::Left,
    }
}

/// Edge pricing, access gating and turn costing for one travel mode.
///
/// All methods are pure functions of their arguments and the costing's own
/// immutable options.
pub trait Costing: Send + Sync {
    fn mode(&self) -> Mode;

    fn options(&self) -> &CostingOptions;

    /// Cost granularity: the bucket width of the search queue.
    fn unit_size(&self) -> f32 {
        1.0
    }

    /// May the node be passed through at all.
    fn allowed_node(&self, node: &NodeInfo) -> bool {
        node.access & self.mode().access_mask() != 0
    }

    /// May `edge` extend the path ending in `pred` (forward search).
    /// `restriction_idx` arrives as `INVALID_RESTRICTION`; a costing with
    /// complex-restriction data may overwrite it.
    fn allowed(
        &self,
        edge: &DirectedEdge,
        is_dest: bool,
        pred: &EdgeLabel,
        tile: &GraphTile,
        edgeid: GraphId,
        restriction_idx: &mut u8,
    ) -> bool;

    /// May `edge` extend the path in the reverse search, where real travel
    /// runs along `opp_edge`.
    fn allowed_reverse(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        opp_edge: &DirectedEdge,
        opp_tile: &GraphTile,
        opp_edgeid: GraphId,
        restriction_idx: &mut u8,
    ) -> bool;

    /// Complex (multi-edge) restriction check. No such data is carried in
    /// the current tile format.
    fn restricted(
        &self,
        _edge: &DirectedEdge,
        _pred: &EdgeLabel,
        _labels: &[EdgeLabel],
        _tile: &GraphTile,
        _edgeid: GraphId,
        _forward: bool,
    ) -> bool {
        false
    }

    /// Cost to traverse the full edge.
    fn edge_cost(&self, edge: &DirectedEdge, tile: &GraphTile) -> Cost;

    /// Cost of the transition from `pred` onto `edge` at `node`.
    fn transition_cost(&self, edge: &DirectedEdge, node: &NodeInfo, pred: &EdgeLabel) -> Cost;

    /// Reverse-search twin of `transition_cost`, costing the real-travel
    /// turn from the opposing candidate edge onto the opposing predecessor.
    fn transition_cost_reverse(
        &self,
        local_idx: u32,
        node: &NodeInfo,
        opp_edge: &DirectedEdge,
        opp_pred_edge: &DirectedEdge,
        has_flow_speed: bool,
        internal_turn: InternalTurn,
    ) -> Cost;

    fn is_closed(&self, edge: &DirectedEdge, _tile: &GraphTile) -> bool {
        edge.closed
    }

    /// Turn classification for a new forward label.
    fn turn_type(
        &self,
        pred_opp_local_idx: u32,
        node: &NodeInfo,
        tile: &GraphTile,
        edge: &DirectedEdge,
    ) -> InternalTurn {
        if !edge.internal {
            return InternalTurn::NoTurn;
        }
        let back_id = tile.id.with_index(node.edge_index + pred_opp_local_idx);
        match tile.directededge(back_id) {
            Some(back) => {
                let approach = (back.begin_heading + 180) % 360;
                classify_turn(approach, edge.begin_heading)
            }
            None => InternalTurn::NoTurn,
        }
    }

    /// Turn classification for a new reverse label.
    fn turn_type_reverse(
        &self,
        _local_idx: u32,
        _node: &NodeInfo,
        _tile: &GraphTile,
        opp_edge: &DirectedEdge,
        opp_pred_edge: &DirectedEdge,
    ) -> InternalTurn {
        if !opp_pred_edge.internal {
            return InternalTurn::NoTurn;
        }
        classify_turn(opp_edge.begin_heading, opp_pred_edge.begin_heading)
    }

    /// Refuse an edge as a forward origin (user avoid ahead of the snap).
    fn avoid_as_origin_edge(&self, edgeid: GraphId, percent_along: f32) -> bool {
        self.options()
            .avoid_edges
            .get(&edgeid)
            .map(|&avoid_pct| avoid_pct >= percent_along)
            .unwrap_or(false)
    }

    /// Refuse an edge as a reverse origin / destination (user avoid behind
    /// the snap).
    fn avoid_as_destination_edge(&self, edgeid: GraphId, percent_along: f32) -> bool {
        self.options()
            .avoid_edges
            .get(&edgeid)
            .map(|&avoid_pct| avoid_pct <= percent_along)
            .unwrap_or(false)
    }
}

/// Shared access gate used by the concrete costings' `allowed`.
pub(crate) fn base_allowed(
    costing: &dyn Costing,
    edge: &DirectedEdge,
    is_dest: bool,
    pred: &EdgeLabel,
    allow_uturn: bool,
    restriction_idx: &mut u8,
) -> bool {
    *restriction_idx = INVALID_RESTRICTION;
    if edge.forward_access & costing.mode().access_mask() == 0 {
        return false;
    }
    if !allow_uturn && edge.localedgeidx == pred.opp_local_idx {
        return false;
    }
    if pred.opp_local_idx < 8 && edge.restriction_mask & (1 << pred.opp_local_idx) != 0 {
        return false;
    }
    if edge.dest_only && !is_dest && costing.options().exclude_dest_only {
        return false;
    }
    if edge.closed && costing.options().exclude_closures {
        return false;
    }
    true
}

/// Shared access gate for the reverse direction.
pub(crate) fn base_allowed_reverse(
    costing: &dyn Costing,
    edge: &DirectedEdge,
    pred: &EdgeLabel,
    opp_edge: &DirectedEdge,
    allow_uturn: bool,
    restriction_idx: &mut u8,
) -> bool {
    *restriction_idx = INVALID_RESTRICTION;
    if opp_edge.forward_access & costing.mode().access_mask() == 0 {
        return false;
    }
    if !allow_uturn && edge.localedgeidx == pred.opp_local_idx {
        return false;
    }
    if pred.opp_local_idx < 8 && opp_edge.restriction_mask & (1 << pred.opp_local_idx) != 0 {
        return false;
    }
    if opp_edge.dest_only && costing.options().exclude_dest_only {
        return false;
    }
    if opp_edge.closed && costing.options().exclude_closures {
        return false;
    }
    true
}

/// The costing family a matrix query selects from.
pub struct ModeCosting {
    car: Box<dyn Costing>,
    bike: Box<dyn Costing>,
    foot: Box<dyn Costing>,
}

impl ModeCosting {
    pub fn new(car: Box<dyn Costing>, bike: Box<dyn Costing>, foot: Box<dyn Costing>) -> Self {
        Self { car, bike, foot }
    }

    pub fn get(&self, mode: Mode) -> &dyn Costing {
        match mode {
            Mode::Car => self.car.as_ref(),
            Mode::Bike => self.bike.as_ref(),
            Mode::Foot => self.foot.as_ref(),
        }
    }
}

impl Default for ModeCosting {
    fn default() -> Self {
        Self::new(
            Box::new(CarCosting::default()),
            Box::new(BikeCosting::default()),
            Box::new(FootCosting::default()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_arithmetic() {
        let a = Cost::new(10.0, 12.0);
        let b = Cost::new(5.0, 6.0);
        assert_eq!(a + b, Cost::new(15.0, 18.0));
        assert_eq!(a - b, Cost::new(5.0, 6.0));
        assert_eq!(a * 0.5, Cost::new(5.0, 6.0));
        assert!(a.is_finite());
        assert!(!Cost::MAX.is_finite());
    }

    #[test]
    fn test_mode_names() {
        for &m in Mode::all() {
            assert_eq!(Mode::from_name(m.name()), Some(m));
        }
        assert_eq!(Mode::from_name("horse"), None);
    }

    #[test]
    fn test_classify_turn() {
        assert_eq!(classify_turn(0, 10), InternalTurn::Straight);
        assert_eq!(classify_turn(350, 5), InternalTurn::Straight);
        assert_eq!(classify_turn(0, 90), InternalTurn::Right);
        assert_eq!(classify_turn(0, 270), InternalTurn::Left);
    }

    #[test]
    fn test_avoided_edges_gate_seeding() {
        let edgeid = GraphId::new(0, 0, 3);
        let mut options = CostingOptions::default();
        options.avoid_edges.insert(edgeid, 0.5);
        let costing = CarCosting::new(options);

        // Avoid point at 0.5: ahead of an origin snapped before it,
        // behind a destination snapped after it.
        assert!(costing.avoid_as_origin_edge(edgeid, 0.2));
        assert!(!costing.avoid_as_origin_edge(edgeid, 0.8));
        assert!(costing.avoid_as_destination_edge(edgeid, 0.8));
        assert!(!costing.avoid_as_destination_edge(edgeid, 0.2));
        assert!(!costing.avoid_as_origin_edge(GraphId::new(0, 0, 4), 0.2));
    }
}
