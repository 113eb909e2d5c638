//! Bike-share time/distance matrix engine.
//!
//! Same skeleton as the single-mode engine, run with the foot and bike
//! costings at once. Every label carries its travel mode; at a node
//! flagged as a bike-share station the expansion emits both a same-mode
//! continuation and a mode-switched one priced with the station service
//! time. Each mode gets its own edge status space so a settled walk over
//! an edge never blocks a ride over it, and vice versa. Trips start and
//! end on foot.

use log::{debug, error};
use std::collections::HashMap;

use crate::costing::{Cost, Costing, InternalTurn, Mode, ModeCosting};
use crate::graph::{DirectedEdge, GraphId, GraphReader, GraphTile};
use crate::location::{Location, TimeDistance};

use super::bucket_queue::BucketQueue;
use super::edge_label::{EdgeLabel, INVALID_LABEL, INVALID_RESTRICTION};
use super::edge_status::{EdgeSet, EdgeStatus};
use super::time_distance::{
    cost_threshold, is_trivial, Destination, MatrixStats, INITIAL_EDGE_LABEL_COUNT,
};

/// Station service time for picking up or returning a bike.
const BSS_SWITCH_COST: Cost = Cost {
    secs: 60.0,
    cost: 60.0,
};

struct BssCostings<'a> {
    foot: &'a dyn Costing,
    bike: &'a dyn Costing,
}

impl BssCostings<'_> {
    fn get(&self, mode: Mode) -> &dyn Costing {
        match mode {
            Mode::Bike => self.bike,
            _ => self.foot,
        }
    }
}

/// Foot+bike many-to-many matrix engine with mode switches at bike-share
/// stations.
pub struct TimeDistanceBssMatrix {
    settled_count: u32,
    current_cost_threshold: f32,
    edgelabels: Vec<EdgeLabel>,
    adjacencylist: BucketQueue,
    foot_edgestatus: EdgeStatus,
    bike_edgestatus: EdgeStatus,
    destinations: Vec<Destination>,
    dest_edges: HashMap<GraphId, Vec<u32>>,
    stats: MatrixStats,
}

impl Default for TimeDistanceBssMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeDistanceBssMatrix {
    pub fn new() -> Self {
        Self {
            settled_count: 0,
            current_cost_threshold: 0.0,
            edgelabels: Vec::new(),
            adjacencylist: BucketQueue::new(),
            foot_edgestatus: EdgeStatus::new(),
            bike_edgestatus: EdgeStatus::new(),
            destinations: Vec::new(),
            dest_edges: HashMap::new(),
            stats: MatrixStats::default(),
        }
    }

    /// Time/distance from every source to every target, row-major with
    /// source as the outer dimension. The travel modes are fixed: foot at
    /// both trip ends, bike between stations.
    pub fn source_to_target(
        &mut self,
        sources: &[Location],
        targets: &[Location],
        reader: &GraphReader,
        mode_costing: &ModeCosting,
        max_matrix_distance: f32,
        matrix_locations: u32,
    ) -> Vec<TimeDistance> {
        self.edgelabels.reserve(INITIAL_EDGE_LABEL_COUNT);
        let costings = BssCostings {
            foot: mode_costing.get(Mode::Foot),
            bike: mode_costing.get(Mode::Bike),
        };
        if sources.len() <= targets.len() {
            self.compute_matrix::<true>(
                &costings,
                sources,
                targets,
                reader,
                max_matrix_distance,
                matrix_locations,
            )
        } else {
            self.compute_matrix::<false>(
                &costings,
                sources,
                targets,
                reader,
                max_matrix_distance,
                matrix_locations,
            )
        }
    }

    pub fn clear(&mut self) {
        self.edgelabels.clear();
        self.destinations.clear();
        self.dest_edges.clear();
        self.adjacencylist.clear();
        self.foot_edgestatus.clear();
        self.bike_edgestatus.clear();
        self.settled_count = 0;
    }

    pub fn labels(&self) -> &[EdgeLabel] {
        &self.edgelabels
    }

    pub fn stats(&self) -> &MatrixStats {
        &self.stats
    }

    fn edgestatus(&mut self, mode: Mode) -> &mut EdgeStatus {
        match mode {
            Mode::Bike => &mut self.bike_edgestatus,
            _ => &mut self.foot_edgestatus,
        }
    }

    fn compute_matrix<const FORWARD: bool>(
        &mut self,
        costings: &BssCostings,
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
        // Trips start on foot, so the threshold and bucket width follow
        // the foot costing.
        let bucketsize = costings.foot.unit_size();
        let mut many_to_many = vec![TimeDistance::default(); sources.len() * targets.len()];

        for (origin_index, origin) in origins.iter().enumerate() {
            self.clear();
            self.stats = MatrixStats::default();
            self.current_cost_threshold = cost_threshold(Mode::Foot, max_matrix_distance);
            self.adjacencylist
                .reuse(0.0, self.current_cost_threshold, bucketsize);

            self.set_origin::<FORWARD>(costings.foot, reader, origin);
            self.set_destinations::<FORWARD>(costings.foot, reader, destinations);

            loop {
                let labels = &self.edgelabels;
                let predindex = self.adjacencylist.pop(|i| labels[i as usize].sortcost);
                if predindex == INVALID_LABEL {
                    break;
                }
                self.stats.popped += 1;

                let pred = self.edgelabels[predindex as usize];
                if !pred.origin {
                    self.edgestatus(pred.mode)
                        .update(pred.edgeid, EdgeSet::Permanent);
                }

                if self.dest_edges.contains_key(&pred.edgeid) {
                    let resolved = reader
                        .get_graph_tile(pred.edgeid)
                        .and_then(|tile| tile.directededge(pred.edgeid).map(|e| (tile, e)));
                    if let Some((tile, edge)) = resolved {
                        if self.update_destinations(
                            costings,
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

                self.expand::<FORWARD>(
                    costings,
                    reader,
                    pred.endnode,
                    &pred,
                    predindex,
                    false,
                    false,
                    pred.mode,
                );
            }

            self.stats.labels = self.edgelabels.len();
            self.stats.settled = self.settled_count;
            self.stats.final_threshold = self.current_cost_threshold;
            debug!(
                "bss one-to-many done: origin {} labels {} popped {} settled {}/{}",
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
                for (source_index, td) in one_to_many.iter().enumerate() {
                    many_to_many[source_index * origins.len() + origin_index] = *td;
                }
            }
        }

        many_to_many
    }

    /// Seed foot labels at the origin; no edge status, as in the
    /// single-mode engine.
    fn set_origin<const FORWARD: bool>(
        &mut self,
        costing: &dyn Costing,
        reader: &GraphReader,
        origin: &Location,
    ) {
        let has_other_edges = origin
            .edges
            .iter()
            .any(|e| if FORWARD { !e.end_node } else { !e.begin_node });

        for edge in &origin.edges {
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
            let Some(endtile) = reader.get_graph_tile(directededge.endnode) else {
                continue;
            };

            let label = if FORWARD {
                let percent_remaining = 1.0 - edge.percent_along;
                let mut cost = costing.edge_cost(directededge, tile) * percent_remaining;
                let dist = directededge.length * percent_remaining;
                cost.cost += edge.distance;
                EdgeLabel::new(
                    INVALID_LABEL,
                    edge.edge_id,
                    directededge,
                    cost,
                    cost.cost,
                    Mode::Foot,
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
                    Mode::Foot,
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

    /// Register target candidates, priced for the foot approach.
    fn set_destinations<const FORWARD: bool>(
        &mut self,
        costing: &dyn Costing,
        reader: &GraphReader,
        locations: &[Location],
    ) {
        for (idx, loc) in locations.iter().enumerate() {
            self.destinations.push(Destination::default());

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

    /// Relax the edges leaving `node` in `mode`. After the regular edges
    /// and transitions, a bike-share station re-expands the node in the
    /// other mode; `from_bss` marks that pass, prices the station service
    /// time and stops the switch from bouncing straight back.
    #[allow(clippy::too_many_arguments)]
    fn expand<const FORWARD: bool>(
        &mut self,
        costings: &BssCostings,
        reader: &GraphReader,
        node: GraphId,
        pred: &EdgeLabel,
        pred_idx: u32,
        from_transition: bool,
        from_bss: bool,
        mode: Mode,
    ) {
        let costing = costings.get(mode);
        let Some(tile) = reader.get_graph_tile(node) else {
            return;
        };
        let Some(nodeinfo) = tile.node(node) else {
            return;
        };
        if !costing.allowed_node(nodeinfo) {
            return;
        }

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
            let es = self.edgestatus(mode).get(edgeid);
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

            let mut newcost = pred.cost + edge_cost + transition_cost;
            if from_bss {
                newcost += BSS_SWITCH_COST;
            }
            let distance = pred.path_distance + directededge.length;

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
                mode,
                distance,
                transition_cost,
                restriction_idx,
                pred.closure_pruning || !costing.is_closed(directededge, tile),
                flow_sourced,
                turn_type,
            ));
            self.edgestatus(mode).set_temporary(edgeid, idx);
            self.adjacencylist.add(idx, newcost.cost);
        }

        if !from_transition && nodeinfo.transition_count > 0 {
            for t in 0..nodeinfo.transition_count {
                if let Some(trans) = tile.transition(nodeinfo.transition_index + t) {
                    self.expand::<FORWARD>(
                        costings,
                        reader,
                        trans.endnode,
                        pred,
                        pred_idx,
                        true,
                        from_bss,
                        mode,
                    );
                }
            }
        }

        // Swap bike for foot (or back) at a station.
        if nodeinfo.bike_share && !from_bss {
            let switched = match mode {
                Mode::Bike => Mode::Foot,
                _ => Mode::Bike,
            };
            self.expand::<FORWARD>(
                costings,
                reader,
                node,
                pred,
                pred_idx,
                from_transition,
                true,
                switched,
            );
        }
    }

    /// Identical protocol to the single-mode engine. Destinations are
    /// priced and settled on foot - a rented bike has to be docked at a
    /// station before arrival - so bike labels only drive the sweep below.
    #[allow(clippy::too_many_arguments)]
    fn update_destinations(
        &mut self,
        costings: &BssCostings,
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

        if pred.mode == Mode::Foot {
            for dest_idx in dest_indices {
                let dest = &mut self.destinations[dest_idx as usize];
                if dest.settled {
                    continue;
                }

                let Some(&remainder) = dest.dest_edges.get(&pred.edgeid) else {
                    if !is_trivial(pred.edgeid, origin, &locations[dest_idx as usize]) {
                        error!("Could not find the destination edge");
                    }
                    continue;
                };

                if pred.predecessor == INVALID_LABEL
                    && !is_trivial(pred.edgeid, origin, &locations[dest_idx as usize])
                {
                    continue;
                }

                let newcost = pred.cost - costings.foot.edge_cost(edge, tile) * remainder;
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
        }

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
