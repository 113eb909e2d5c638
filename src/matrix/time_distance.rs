//! Single-mode time/distance matrix engine.
//!
//! Each one-to-many run seeds partial-edge labels at the origin, registers
//! every candidate destination edge, and expands in cost order until all
//! destinations settle, the caller's location cap is met, or the frontier
//! passes the cost threshold. Destinations are settled on the fly as their
//! candidate edges pop; once every destination has some path, the
//! threshold tightens to the worst settled bound so the search stops
//! chasing unreachable remainders.

use log::{debug, error};
use std::collections::HashMap;

use crate::costing::{Cost, Costing, InternalTurn, Mode, ModeCosting};
use crate::graph::{DirectedEdge, GraphId, GraphReader, GraphTile};
use crate::location::{Location, TimeDistance};

use super::bucket_queue::BucketQueue;
use super::edge_label::{EdgeLabel, INVALID_LABEL, INVALID_RESTRICTION};
use super::edge_status::{EdgeSet, EdgeStatus};

/// Default `matrix_locations`: every destination must settle.
pub const ALL_LOCATIONS: u32 = u32::MAX;

/// Label store capacity reserved up front.
pub(crate) const INITIAL_EDGE_LABEL_COUNT: usize = 500_000;

const MPH_TO_MPS: f32 = 0.44704;

/// Cost threshold in seconds for a maximum matrix distance, from a
/// conservative average speed per mode.
pub(crate) fn cost_threshold(mode: Mode, max_matrix_distance: f32) -> f32 {
    let average_speed_mph = match mode {
        Mode::Car => 35.0,
        Mode::Bike => 10.0,
        Mode::Foot => 2.0,
    };
    max_matrix_distance / (average_speed_mph * MPH_TO_MPS)
}

/// The same edge correlates both locations with the origin snapped at or
/// before the destination - the path never leaves the edge.
pub(crate) fn is_trivial(edgeid: GraphId, origin: &Location, destination: &Location) -> bool {
    for dest_edge in &destination.edges {
        if dest_edge.edge_id == edgeid {
            for origin_edge in &origin.edges {
                if origin_edge.edge_id == edgeid
                    && origin_edge.percent_along <= dest_edge.percent_along
                {
                    return true;
                }
            }
        }
    }
    false
}

/// Per-destination search bookkeeping.
#[derive(Debug)]
pub(crate) struct Destination {
    /// Candidate edge -> fraction of the edge the path will not traverse.
    pub dest_edges: HashMap<GraphId, f32>,
    pub best_cost: Cost,
    pub distance: f32,
    /// Worst-case full traversal cost over the candidate edges, including
    /// the snap penalty. Bounds how much an unsettled candidate could
    /// still improve the result.
    pub threshold: f32,
    pub settled: bool,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            dest_edges: HashMap::new(),
            best_cost: Cost::MAX,
            distance: 0.0,
            threshold: 0.0,
            settled: false,
        }
    }
}

/// Diagnostics from the most recent one-to-many run.
#[derive(Debug, Default, Clone)]
pub struct MatrixStats {
    pub labels: usize,
    pub popped: usize,
    pub settled: u32,
    pub final_threshold: f32,
}

/// Single-mode many-to-many matrix engine.
///
/// Owns all search state; `clear` between one-to-many runs retains the
/// backing allocations. Not safe for concurrent use - run one engine per
/// thread instead.
pub struct TimeDistanceMatrix {
    mode: Mode,
    settled_count: u32,
    current_cost_threshold: f32,
    edgelabels: Vec<EdgeLabel>,
    adjacencylist: BucketQueue,
    edgestatus: EdgeStatus,
    destinations: Vec<Destination>,
    dest_edges: HashMap<GraphId, Vec<u32>>,
    stats: MatrixStats,
}

impl Default for TimeDistanceMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeDistanceMatrix {
    pub fn new() -> Self {
        Self {
            mode: Mode::Car,
            settled_count: 0,
            current_cost_threshold: 0.0,
            edgelabels: Vec::new(),
            adjacencylist: BucketQueue::new(),
            edgestatus: EdgeStatus::new(),
            destinations: Vec::new(),
            dest_edges: HashMap::new(),
            stats: MatrixStats::default(),
        }
    }

    /// Time/distance from every source to every target, row-major with
    /// source as the outer dimension. Expands from whichever list is
    /// smaller; `matrix_locations` allows partial results (closest k).
    #[allow(clippy::too_many_arguments)]
    pub fn source_to_target(
        &mut self,
        sources: &[Location],
        targets: &[Location],
        reader: &GraphReader,
        mode_costing: &ModeCosting,
        mode: Mode,
        max_matrix_distance: f32,
        matrix_locations: u32,
    ) -> Vec<TimeDistance> {
        self.mode = mode;
        self.edgelabels.reserve(INITIAL_EDGE_LABEL_COUNT);
        let costing = mode_costing.get(mode);
        if sources.len() <= targets.len() {
            self.compute_matrix::<true>(
                costing,
                sources,
                targets,
                reader,
                max_matrix_distance,
                matrix_locations,
            )
        } else {
            self.compute_matrix::<false>(
                costing,
                sources,
                targets,
                reader,
                max_matrix_distance,
                matrix_locations,
            )
        }
    }

    /// Drop all search state from the previous run, keeping capacity.
    pub fn clear(&mut self) {
        self.edgelabels.clear();
        self.destinations.clear();
        self.dest_edges.clear();
        self.adjacencylist.clear();
        self.edgestatus.clear();
        self.settled_count = 0;
    }

    /// Labels of the most recent one-to-many run.
    pub fn labels(&self) -> &[EdgeLabel] {
        &self.edgelabels
    }

    pub fn stats(&self) -> &MatrixStats {
        &self.stats
    }

    fn compute_matrix<const FORWARD: bool>(
        &mut self,
        costing: &dyn Costing,
        sources: &[Location],
        targets: &[Location],
        reader: &GraphReader,
        max_matrix_distance: f32,
        matrix_locations: u32,
    ) -> Vec<TimeDistance> {
        let (origins, destinations) = if FORWARD {
            (sources, targets)
        } else {
            (targets, sources)
        };
        let bucketsize = costing.unit_size();
        let mut many_to_many = vec![TimeDistance::default(); sources.len() * targets.len()];

        for (origin_index, origin) in origins.iter().enumerate() {
            self.clear();
            self.stats = MatrixStats::default();
            self.current_cost_threshold = cost_threshold(self.mode, max_matrix_distance);
            self.adjacencylist
                .reuse(0.0, self.current_cost_threshold, bucketsize);

            self.set_origin::<FORWARD>(costing, reader, origin);
            self.set_destinations::<FORWARD>(costing, reader, destinations);

            loop {
                let labels = &self.edgelabels;
                let predindex = self.adjacencylist.pop(|i| labels[i as usize].sortcost);
                if predindex == INVALID_LABEL {
                    break;
                }
                self.stats.popped += 1;

                // Copy the label; expansion pushes into the store.
                let pred = self.edgelabels[predindex as usize];

                // Settle, except for origin seeds so loops back over the
                // origin edge stay expandable.
                if !pred.origin {
                    self.edgestatus.update(pred.edgeid, EdgeSet::Permanent);
                }

                if self.dest_edges.contains_key(&pred.edgeid) {
                    let resolved = reader
                        .get_graph_tile(pred.edgeid)
                        .and_then(|tile| tile.directededge(pred.edgeid).map(|e| (tile, e)));
                    if let Some((tile, edge)) = resolved {
                        if self.update_destinations(
                            costing,
                            origin,
                            destinations,
                            edge,
                            tile,
                            &pred,
                            matrix_locations,
                        ) {
                            break;
                        }
                    }
                }

                if pred.cost.cost > self.current_cost_threshold {
                    break;
                }

                self.expand::<FORWARD>(costing, reader, pred.endnode, &pred, predindex, false);
            }

            self.stats.labels = self.edgelabels.len();
            self.stats.settled = self.settled_count;
            self.stats.final_threshold = self.current_cost_threshold;
            debug!(
                "one-to-many done: origin {} labels {} popped {} settled {}/{}",
                origin_index,
                self.stats.labels,
                self.stats.popped,
                self.settled_count,
                destinations.len()
            );

            let one_to_many = self.form_time_distance_matrix();
            if FORWARD {
                let row = origin_index * destinations.len();
                many_to_many[row..row + destinations.len()].copy_from_slice(&one_to_many);
            } else {
                // One reverse run fills a column.
                for (source_index, td) in one_to_many.iter().enumerate() {
                    many_to_many[source_index * origins.len() + origin_index] = *td;
                }
            }
        }

        many_to_many
    }

    /// Seed partial-edge labels for each usable origin candidate. Origin
    /// labels get no edge status on purpose.
    fn set_origin<const FORWARD: bool>(
        &mut self,
        costing: &dyn Costing,
        reader: &GraphReader,
        origin: &Location,
    ) {
        // Only skip inbound candidates when another candidate exists.
        let has_other_edges = origin
            .edges
            .iter()
            .any(|e| if FORWARD { !e.end_node } else { !e.begin_node });

        for edge in &origin.edges {
            // A node snap on the inbound side contributes no traversal.
            let at_node = if FORWARD { edge.end_node } else { edge.begin_node };
            if at_node && has_other_edges {
                continue;
            }

            let avoided = if FORWARD {
                costing.avoid_as_origin_edge(edge.edge_id, edge.percent_along)
            } else {
                costing.avoid_as_destination_edge(edge.edge_id, edge.percent_along)
            };
            if avoided {
                continue;
            }

            let Some(tile) = reader.get_graph_tile(edge.edge_id) else {
                continue;
            };
            let Some(directededge) = tile.directededge(edge.edge_id) else {
                continue;
            };
            // Without the end tile this edge cannot be expanded from.
            let Some(endtile) = reader.get_graph_tile(directededge.endnode) else {
                continue;
            };

            let label = if FORWARD {
                let percent_remaining = 1.0 - edge.percent_along;
                let mut cost = costing.edge_cost(directededge, tile) * percent_remaining;
                let dist = directededge.length * percent_remaining;
                // Snap imprecision, charged as if covered at 1 m/s.
                cost.cost += edge.distance;
                EdgeLabel::new(
                    INVALID_LABEL,
                    edge.edge_id,
                    directededge,
                    cost,
                    cost.cost,
                    costing.mode(),
                    dist,
                    Cost::default(),
                    INVALID_RESTRICTION,
                    !costing.is_closed(directededge, tile),
                    directededge.has_flow_speed(),
                    InternalTurn::NoTurn,
                )
            } else {
                let Some((_, opp_edge_id, opp_dir_edge)) = reader.get_opposing_edge(edge.edge_id)
                else {
                    continue;
                };
                let mut cost = costing.edge_cost(opp_dir_edge, endtile) * edge.percent_along;
                let dist = directededge.length * edge.percent_along;
                cost.cost += edge.distance;
                EdgeLabel::new(
                    INVALID_LABEL,
                    opp_edge_id,
                    opp_dir_edge,
                    cost,
                    cost.cost,
                    costing.mode(),
                    dist,
                    Cost::default(),
                    INVALID_RESTRICTION,
                    !costing.is_closed(directededge, tile),
                    opp_dir_edge.has_flow_speed(),
                    InternalTurn::NoTurn,
                )
            };

            let idx = self.edgelabels.len() as u32;
            self.edgelabels.push(label);
            self.edgelabels[idx as usize].set_origin();
            self.adjacencylist.add(idx, label.sortcost);
        }
    }

    /// Register every target's candidate edges and per-destination
    /// thresholds. One `Destination` per target, usable edges or not, so
    /// the result keeps its shape.
    fn set_destinations<const FORWARD: bool>(
        &mut self,
        costing: &dyn Costing,
        reader: &GraphReader,
        locations: &[Location],
    ) {
        for (idx, loc) in locations.iter().enumerate() {
            self.destinations.push(Destination::default());

            // Only skip outbound candidates when another candidate exists.
            let has_other_edges = loc
                .edges
                .iter()
                .any(|e| if FORWARD { !e.begin_node } else { !e.end_node });

            for edge in &loc.edges {
                let at_node = if FORWARD { edge.begin_node } else { edge.end_node };
                if at_node && has_other_edges {
                    continue;
                }

                let avoided = if FORWARD {
                    costing.avoid_as_origin_edge(edge.edge_id, edge.percent_along)
                } else {
                    costing.avoid_as_destination_edge(edge.edge_id, edge.percent_along)
                };
                if avoided {
                    continue;
                }

                let Some(tile) = reader.get_graph_tile(edge.edge_id) else {
                    continue;
                };
                let Some(directededge) = tile.directededge(edge.edge_id) else {
                    continue;
                };

                // The search keys the reverse direction by opposing ids.
                let key = if FORWARD {
                    edge.edge_id
                } else {
                    reader.get_opposing_edge_id(edge.edge_id)
                };
                if !key.is_valid() {
                    continue;
                }
                let remainder = if FORWARD {
                    1.0 - edge.percent_along
                } else {
                    edge.percent_along
                };

                // Full-edge traversal cost plus the snap penalty bounds
                // how much this candidate can still improve the result.
                let c = costing.edge_cost(directededge, tile).cost + edge.distance;
                let dest = &mut self.destinations[idx];
                if c > dest.threshold {
                    dest.threshold = c;
                }
                dest.dest_edges.insert(key, remainder);
                self.dest_edges.entry(key).or_default().push(idx as u32);
            }
        }
    }

    /// Relax the edges leaving `node`, then chase level transitions once.
    fn expand<const FORWARD: bool>(
        &mut self,
        costing: &dyn Costing,
        reader: &GraphReader,
        node: GraphId,
        pred: &EdgeLabel,
        pred_idx: u32,
        from_transition: bool,
    ) {
        let Some(tile) = reader.get_graph_tile(node) else {
            return;
        };
        let Some(nodeinfo) = tile.node(node) else {
            return;
        };
        if !costing.allowed_node(nodeinfo) {
            return;
        }

        // Reverse transition costing needs the edge opposing the
        // predecessor, found among this node's edges by local index.
        let opp_pred_edge = if FORWARD {
            None
        } else {
            let start = nodeinfo.edge_index as usize;
            tile.directededges
                .get(start..start + nodeinfo.edge_count as usize)
                .and_then(|edges| {
                    edges.iter().find(|e| e.localedgeidx == pred.opp_local_idx)
                })
        };

        for i in 0..nodeinfo.edge_count {
            let edgeid = tile.id.with_index(nodeinfo.edge_index + i);
            let Some(directededge) = tile.directededges.get((nodeinfo.edge_index + i) as usize)
            else {
                continue;
            };

            if directededge.shortcut {
                continue;
            }
            let es = self.edgestatus.get(edgeid);
            if es.set == EdgeSet::Permanent {
                continue;
            }

            let mut restriction_idx = INVALID_RESTRICTION;
            let is_dest = self.dest_edges.contains_key(&edgeid);

            let (edge_cost, transition_cost, flow_sourced, turn_type) = if FORWARD {
                if !costing.allowed(
                    directededge,
                    is_dest,
                    pred,
                    tile,
                    edgeid,
                    &mut restriction_idx,
                ) || costing.restricted(directededge, pred, &self.edgelabels, tile, edgeid, true)
                {
                    continue;
                }
                (
                    costing.edge_cost(directededge, tile),
                    costing.transition_cost(directededge, nodeinfo, pred),
                    directededge.has_flow_speed(),
                    costing.turn_type(pred.opp_local_idx as u32, nodeinfo, tile, directededge),
                )
            } else {
                let opp_tile = if directededge.leaves_tile {
                    match reader.get_graph_tile(directededge.endnode) {
                        Some(t) => t,
                        None => continue,
                    }
                } else {
                    tile
                };
                let opp_edge_id = opp_tile.opposing_edge_id(directededge);
                let Some(opp_edge) = opp_tile.directededge(opp_edge_id) else {
                    continue;
                };
                let Some(opp_pred_edge) = opp_pred_edge else {
                    continue;
                };
                if !costing.allowed_reverse(
                    directededge,
                    pred,
                    opp_edge,
                    opp_tile,
                    opp_edge_id,
                    &mut restriction_idx,
                ) || costing.restricted(directededge, pred, &self.edgelabels, tile, edgeid, false)
                {
                    continue;
                }
                let flow_sourced = opp_edge.has_flow_speed();
                (
                    costing.edge_cost(opp_edge, opp_tile),
                    costing.transition_cost_reverse(
                        directededge.localedgeidx as u32,
                        nodeinfo,
                        opp_edge,
                        opp_pred_edge,
                        flow_sourced,
                        pred.internal_turn,
                    ),
                    flow_sourced,
                    costing.turn_type_reverse(
                        directededge.localedgeidx as u32,
                        nodeinfo,
                        tile,
                        opp_edge,
                        opp_pred_edge,
                    ),
                )
            };

            let newcost = pred.cost + edge_cost + transition_cost;
            let distance = pred.path_distance + directededge.length;

            // Cheaper path to a queued edge: update in place and drop the
            // sort key by the exact cost delta (no heuristic to preserve).
            if es.set == EdgeSet::Temporary {
                let lab = self.edgelabels[es.index as usize];
                if newcost.cost < lab.cost.cost {
                    let newsortcost = lab.sortcost - (lab.cost.cost - newcost.cost);
                    self.adjacencylist.decrease(es.index, newsortcost, lab.sortcost);
                    self.edgelabels[es.index as usize].update(
                        pred_idx,
                        newcost,
                        newsortcost,
                        distance,
                        transition_cost,
                        restriction_idx,
                    );
                }
                continue;
            }

            let idx = self.edgelabels.len() as u32;
            self.edgelabels.push(EdgeLabel::new(
                pred_idx,
                edgeid,
                directededge,
                newcost,
                newcost.cost,
                costing.mode(),
                distance,
                transition_cost,
                restriction_idx,
                pred.closure_pruning || !costing.is_closed(directededge, tile),
                flow_sourced,
                turn_type,
            ));
            self.edgestatus.set_temporary(edgeid, idx);
            self.adjacencylist.add(idx, newcost.cost);
        }

        // Transitions connect the node to its twin on other levels; they
        // are traversed here, never materialized as labels.
        if !from_transition && nodeinfo.transition_count > 0 {
            for t in 0..nodeinfo.transition_count {
                if let Some(trans) = tile.transition(nodeinfo.transition_index + t) {
                    self.expand::<FORWARD>(costing, reader, trans.endnode, pred, pred_idx, true);
                }
            }
        }
    }

    /// Settle destinations lying on the popped edge and sweep for
    /// threshold-based settlement. True once every destination settled or
    /// the location cap is met.
    #[allow(clippy::too_many_arguments)]
    fn update_destinations(
        &mut self,
        costing: &dyn Costing,
        origin: &Location,
        locations: &[Location],
        edge: &DirectedEdge,
        tile: &GraphTile,
        pred: &EdgeLabel,
        matrix_locations: u32,
    ) -> bool {
        let Some(dest_indices) = self.dest_edges.get(&pred.edgeid).cloned() else {
            return false;
        };

        for dest_idx in dest_indices {
            let dest = &mut self.destinations[dest_idx as usize];

            // Settled destinations keep stale entries in the reverse
            // index; nothing to do for them.
            if dest.settled {
                continue;
            }

            let Some(&remainder) = dest.dest_edges.get(&pred.edgeid) else {
                // Already consumed for this destination. Legitimate only
                // for the same-edge origin/destination case.
                if !is_trivial(pred.edgeid, origin, &locations[dest_idx as usize]) {
                    error!("Could not find the destination edge");
                }
                continue;
            };

            // An origin seed can only answer for a destination on its own
            // edge; a shared endpoint is not enough.
            if pred.predecessor == INVALID_LABEL
                && !is_trivial(pred.edgeid, origin, &locations[dest_idx as usize])
            {
                continue;
            }

            // Predecessor cost runs to the end of the edge; back out the
            // untraversed part.
            let newcost = pred.cost - costing.edge_cost(edge, tile) * remainder;
            if newcost.cost < dest.best_cost.cost {
                dest.best_cost = newcost;
                dest.distance = pred.path_distance - edge.length * remainder;
            }

            dest.dest_edges.remove(&pred.edgeid);
            if dest.dest_edges.is_empty() {
                dest.settled = true;
                self.settled_count += 1;
            }
        }

        // Settle destinations whose remaining candidates cannot beat the
        // frontier, and tighten the global threshold once every
        // destination has some path.
        let mut allfound = true;
        let mut maxcost = 0.0f32;
        for dest in &mut self.destinations {
            if dest.settled {
                continue;
            }
            if !dest.best_cost.is_finite() {
                allfound = false;
            } else {
                if dest.best_cost.cost + dest.threshold < pred.cost.cost {
                    dest.settled = true;
                    self.settled_count += 1;
                }
                maxcost = maxcost.max(dest.best_cost.cost + dest.threshold);
            }
        }
        if allfound {
            self.current_cost_threshold = maxcost;
        }

        self.settled_count as usize == self.destinations.len()
            || self.settled_count >= matrix_locations
    }

    /// Results in destination order; never-reached destinations report the
    /// zero sentinel.
    fn form_time_distance_matrix(&self) -> Vec<TimeDistance> {
        self.destinations
            .iter()
            .map(|dest| {
                if dest.best_cost.is_finite() {
                    TimeDistance::new(
                        dest.best_cost.secs.round().max(0.0) as u32,
                        dest.distance.round().max(0.0) as u32,
                    )
                } else {
                    TimeDistance::default()
                }
            })
            .collect()
    }
}
