//! Programmatic tile construction.
//!
//! Two-pass build: collect nodes and ways, then lay out per-tile arrays and
//! wire opposing-edge local indices. Used by the demo CLI and the test
//! suite; real deployments would ingest tiles from an external pipeline.

use std::collections::{BTreeMap, HashMap};

use crate::geo::{bearing, haversine_distance};

use super::id::GraphId;
use super::reader::GraphReader;
use super::tile::{
    access, DirectedEdge, GraphTile, NodeInfo, NodeTransition, INVALID_LOCAL_IDX,
};

/// Per-way attributes applied to both directed edges of the way.
#[derive(Debug, Clone)]
pub struct WayAttrs {
    /// Speed in km/h.
    pub speed: u8,
    /// Flow speed in km/h, 0 for none.
    pub flow_speed: u8,
    /// Mode access mask, see `graph::access`.
    pub access: u8,
    pub oneway: bool,
    /// Length in meters; derived from the node coordinates when `None`.
    pub length: Option<f32>,
    pub class_bits: u32,
    pub closed: bool,
    pub dest_only: bool,
    pub internal: bool,
}

impl Default for WayAttrs {
    fn default() -> Self {
        Self {
            speed: 50,
            flow_speed: 0,
            access: access::ALL,
            oneway: false,
            length: None,
            class_bits: 0,
            closed: false,
            dest_only: false,
            internal: false,
        }
    }
}

struct BuilderNode {
    tile: u32,
    ll: (f64, f64),
    access: u8,
    traffic_signal: bool,
    bike_share: bool,
    out: Vec<usize>,
    transitions: Vec<(usize, bool)>,
}

struct BuilderEdge {
    from: usize,
    to: usize,
    twin: Option<usize>,
    attrs: WayAttrs,
    restriction_mask: u8,
}

/// Finished graph plus the id maps tests and tools need.
pub struct BuiltGraph {
    pub reader: GraphReader,
    /// GraphId per builder node index.
    pub node_ids: Vec<GraphId>,
    /// (forward, backward) edge ids per way; backward is `GraphId::INVALID`
    /// for oneways.
    pub way_edges: Vec<(GraphId, GraphId)>,
    edges_by_nodes: HashMap<(usize, usize), GraphId>,
}

impl BuiltGraph {
    /// Directed edge id from builder node `a` to builder node `b`.
    pub fn edge(&self, a: usize, b: usize) -> GraphId {
        self.edges_by_nodes
            .get(&(a, b))
            .copied()
            .unwrap_or(GraphId::INVALID)
    }
}

/// Staged construction of a tiled graph on one hierarchy level.
pub struct GraphBuilder {
    level: u8,
    nodes: Vec<BuilderNode>,
    edges: Vec<BuilderEdge>,
    ways: Vec<(usize, Option<usize>)>,
    bans: Vec<((usize, usize), (usize, usize))>,
}

impl GraphBuilder {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            nodes: Vec::new(),
            edges: Vec::new(),
            ways: Vec::new(),
            bans: Vec::new(),
        }
    }

    pub fn add_node(&mut self, tile: u32, ll: (f64, f64)) -> usize {
        self.nodes.push(BuilderNode {
            tile,
            ll,
            access: access::ALL,
            traffic_signal: false,
            bike_share: false,
            out: Vec::new(),
            transitions: Vec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn set_node_access(&mut self, node: usize, mask: u8) {
        self.nodes[node].access = mask;
    }

    pub fn set_traffic_signal(&mut self, node: usize) {
        self.nodes[node].traffic_signal = true;
    }

    pub fn set_bike_share(&mut self, node: usize) {
        self.nodes[node].bike_share = true;
    }

    /// Connect two nodes; returns the way handle for `BuiltGraph::way_edges`.
    pub fn add_way(&mut self, a: usize, b: usize, attrs: WayAttrs) -> usize {
        let fwd = self.edges.len();
        self.edges.push(BuilderEdge {
            from: a,
            to: b,
            twin: None,
            attrs: attrs.clone(),
            restriction_mask: 0,
        });
        self.nodes[a].out.push(fwd);

        let rev = if attrs.oneway {
            None
        } else {
            let rev = self.edges.len();
            self.edges.push(BuilderEdge {
                from: b,
                to: a,
                twin: Some(fwd),
                attrs,
                restriction_mask: 0,
            });
            self.edges[fwd].twin = Some(rev);
            self.nodes[b].out.push(rev);
            Some(rev)
        };

        self.ways.push((fwd, rev));
        self.ways.len() - 1
    }

    /// Connect a node to its twin on another level.
    pub fn add_transition(&mut self, from: usize, to: usize, up: bool) {
        self.nodes[from].transitions.push((to, up));
    }

    /// Ban the turn arriving via `from.0 → from.1` onto `to.0 → to.1`.
    pub fn ban_turn(&mut self, from: (usize, usize), to: (usize, usize)) {
        assert_eq!(from.1, to.0, "turn edges must share a node");
        self.bans.push((from, to));
    }

    pub fn build(self) -> BuiltGraph {
        let GraphBuilder {
            level,
            nodes,
            mut edges,
            ways,
            bans,
        } = self;

        // Group nodes by tile; BTreeMap keeps the layout deterministic.
        let mut tiles: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, n) in nodes.iter().enumerate() {
            tiles.entry(n.tile).or_default().push(i);
        }

        let mut node_ids = vec![GraphId::INVALID; nodes.len()];
        for (tile, members) in &tiles {
            for (pos, &n) in members.iter().enumerate() {
                node_ids[n] = GraphId::new(level, *tile, pos as u32);
            }
        }

        // Edge ids: per tile, each node's outgoing edges are contiguous.
        let mut edge_ids = vec![GraphId::INVALID; edges.len()];
        for (tile, members) in &tiles {
            let mut next = 0u32;
            for &n in members {
                debug_assert!(nodes[n].out.len() < INVALID_LOCAL_IDX as usize);
                for &e in &nodes[n].out {
                    edge_ids[e] = GraphId::new(level, *tile, next);
                    next += 1;
                }
            }
        }

        // Simple turn restrictions: ban (a→n, n→c) by setting the bit of
        // n→a's local index in n→c's mask.
        for ((a, n), (_, c)) in bans {
            let back = nodes[n]
                .out
                .iter()
                .position(|&e| edges[e].to == a)
                .expect("banned turn needs an opposing edge back to its origin");
            let onto = nodes[n]
                .out
                .iter()
                .copied()
                .find(|&e| edges[e].to == c)
                .expect("banned turn target edge not found");
            edges[onto].restriction_mask |= 1u8 << back;
        }

        let mut reader = GraphReader::new();
        for (tile_id, members) in &tiles {
            let base = GraphId::new(level, *tile_id, 0);
            let mut tile = GraphTile {
                id: base,
                nodes: Vec::with_capacity(members.len()),
                directededges: Vec::new(),
                transitions: Vec::new(),
            };

            for &n in members {
                let node = &nodes[n];
                let edge_index = tile.directededges.len() as u32;
                let transition_index = tile.transitions.len() as u32;

                for (local, &e) in node.out.iter().enumerate() {
                    let be = &edges[e];
                    let to = &nodes[be.to];
                    let length = be.attrs.length.unwrap_or_else(|| {
                        haversine_distance(node.ll.0, node.ll.1, to.ll.0, to.ll.1) as f32
                    });
                    let opp_local_idx = match be.twin {
                        Some(t) => nodes[edges[t].from]
                            .out
                            .iter()
                            .position(|&x| x == t)
                            .map(|p| p as u8)
                            .unwrap_or(INVALID_LOCAL_IDX),
                        None => INVALID_LOCAL_IDX,
                    };
                    tile.directededges.push(DirectedEdge {
                        endnode: node_ids[be.to],
                        length,
                        speed: be.attrs.speed,
                        flow_speed: be.attrs.flow_speed,
                        forward_access: be.attrs.access,
                        begin_heading: bearing(node.ll.0, node.ll.1, to.ll.0, to.ll.1)
                            .round() as u16
                            % 360,
                        localedgeidx: local as u8,
                        opp_local_idx,
                        restriction_mask: be.restriction_mask,
                        class_bits: be.attrs.class_bits,
                        shortcut: false,
                        leaves_tile: to.tile != node.tile,
                        internal: be.attrs.internal,
                        closed: be.attrs.closed,
                        dest_only: be.attrs.dest_only,
                    });
                }

                for &(to, up) in &node.transitions {
                    tile.transitions.push(NodeTransition {
                        endnode: node_ids[to],
                        up,
                    });
                }

                tile.nodes.push(NodeInfo {
                    ll: node.ll,
                    edge_index,
                    edge_count: node.out.len() as u32,
                    transition_index,
                    transition_count: node.transitions.len() as u32,
                    access: node.access,
                    traffic_signal: node.traffic_signal,
                    bike_share: node.bike_share,
                });
            }

            reader.add_tile(tile);
        }

        let way_edges = ways
            .iter()
            .map(|&(f, r)| {
                (
                    edge_ids[f],
                    r.map(|r| edge_ids[r]).unwrap_or(GraphId::INVALID),
                )
            })
            .collect();
        let edges_by_nodes = edges
            .iter()
            .enumerate()
            .map(|(i, e)| ((e.from, e.to), edge_ids[i]))
            .collect();

        BuiltGraph {
            reader,
            node_ids,
            way_edges,
            edges_by_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposing_wiring() {
        let mut b = GraphBuilder::new(0);
        let a = b.add_node(0, (43.0, 7.0));
        let c = b.add_node(0, (43.0, 7.001));
        let d = b.add_node(0, (43.001, 7.001));
        b.add_way(a, c, WayAttrs::default());
        b.add_way(c, d, WayAttrs::default());
        let g = b.build();

        let ac = g.edge(a, c);
        let ca = g.edge(c, a);
        assert!(ac.is_valid() && ca.is_valid());
        assert_eq!(g.reader.get_opposing_edge_id(ac), ca);
        assert_eq!(g.reader.get_opposing_edge_id(ca), ac);

        let tile = g.reader.get_graph_tile(ac).unwrap();
        let edge = tile.directededge(ac).unwrap();
        assert!(!edge.leaves_tile);
        assert_eq!(edge.endnode, g.node_ids[c]);
        assert!(edge.length > 70.0 && edge.length < 90.0);
    }

    #[test]
    fn test_oneway_has_no_opposing() {
        let mut b = GraphBuilder::new(0);
        let a = b.add_node(0, (43.0, 7.0));
        let c = b.add_node(0, (43.0, 7.001));
        b.add_way(
            a,
            c,
            WayAttrs {
                oneway: true,
                ..Default::default()
            },
        );
        let g = b.build();
        assert!(!g.edge(c, a).is_valid());
        assert!(!g.reader.get_opposing_edge_id(g.edge(a, c)).is_valid());
    }

    #[test]
    fn test_ban_turn_sets_mask() {
        let mut b = GraphBuilder::new(0);
        let a = b.add_node(0, (43.0, 7.0));
        let n = b.add_node(0, (43.0, 7.001));
        let c = b.add_node(0, (43.001, 7.001));
        b.add_way(a, n, WayAttrs::default());
        b.add_way(n, c, WayAttrs::default());
        b.ban_turn((a, n), (n, c));
        let g = b.build();

        let na = g.edge(n, a);
        let nc = g.edge(n, c);
        let tile = g.reader.get_graph_tile(nc).unwrap();
        let onto = tile.directededge(nc).unwrap();
        let back = tile.directededge(na).unwrap();
        assert_ne!(onto.restriction_mask & (1u8 << back.localedgeidx), 0);
    }

    #[test]
    fn test_transitions_recorded() {
        let mut b = GraphBuilder::new(0);
        let a = b.add_node(0, (43.0, 7.0));
        let twin = b.add_node(1, (43.0, 7.0));
        b.add_transition(a, twin, true);
        let g = b.build();

        let node_id = g.node_ids[a];
        let tile = g.reader.get_graph_tile(node_id).unwrap();
        let node = tile.node(node_id).unwrap();
        assert_eq!(node.transition_count, 1);
        let t = tile.transition(node.transition_index).unwrap();
        assert_eq!(t.endnode, g.node_ids[twin]);
        assert!(t.up);
    }
}
