//! Correlate input coordinates onto directed edges.
//!
//! Builds an R-tree over edge segments (straight lines between the
//! endpoint nodes) and turns a lat/lon into a `Location` with candidate
//! `PathEdge`s: the nearest ways, each contributing its directed edge and
//! the opposing one with mirrored positions.

use rstar::primitives::{GeomWithData, Line};
use rstar::RTree;

use crate::geo::{haversine_distance, project_onto_segment};
use crate::graph::{GraphId, GraphReader};
use crate::location::{Location, PathEdge};

type EdgeSegment = GeomWithData<Line<[f64; 2]>, GraphId>;

/// Spatial index over the graph's directed edges.
///
/// Only one direction per way is indexed; `correlate` re-adds the
/// opposing edge with the mirrored `percent_along`.
pub struct EdgeIndex {
    tree: RTree<EdgeSegment>,
}

impl EdgeIndex {
    pub fn new(reader: &GraphReader) -> Self {
        let mut segments = Vec::new();
        for tile in reader.tiles() {
            for node in &tile.nodes {
                for i in 0..node.edge_count {
                    let idx = (node.edge_index + i) as usize;
                    let Some(edge) = tile.directededges.get(idx) else {
                        continue;
                    };
                    if edge.shortcut {
                        continue;
                    }
                    let edgeid = tile.id.with_index(node.edge_index + i);
                    // Index each way once; the opposing direction is
                    // reconstructed at query time.
                    let opp = reader.get_opposing_edge_id(edgeid);
                    if opp.is_valid() && opp < edgeid {
                        continue;
                    }
                    let Some(end_tile) = reader.get_graph_tile(edge.endnode) else {
                        continue;
                    };
                    let Some(end_node) = end_tile.node(edge.endnode) else {
                        continue;
                    };
                    segments.push(GeomWithData::new(
                        Line::new(
                            [node.ll.1, node.ll.0],
                            [end_node.ll.1, end_node.ll.0],
                        ),
                        edgeid,
                    ));
                }
            }
        }
        Self {
            tree: RTree::bulk_load(segments),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Snap `(lat, lon)` onto the `max_ways` nearest ways.
    pub fn correlate(
        &self,
        reader: &GraphReader,
        ll: (f64, f64),
        max_ways: usize,
    ) -> Location {
        let mut edges = Vec::new();
        for segment in self
            .tree
            .nearest_neighbor_iter(&[ll.1, ll.0])
            .take(max_ways)
        {
            let a = (segment.geom().from[1], segment.geom().from[0]);
            let b = (segment.geom().to[1], segment.geom().to[0]);
            let (t, on) = project_onto_segment(ll, a, b);
            let distance = haversine_distance(ll.0, ll.1, on.0, on.1) as f32;

            edges.push(PathEdge::new(segment.data, t as f32, distance));
            let opp = reader.get_opposing_edge_id(segment.data);
            if opp.is_valid() {
                edges.push(PathEdge::new(opp, 1.0 - t as f32, distance));
            }
        }
        Location {
            ll: Some(ll),
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, WayAttrs};

    #[test]
    fn test_correlate_midpoint() {
        let mut b = GraphBuilder::new(0);
        let a = b.add_node(0, (43.0, 7.0));
        let c = b.add_node(0, (43.0, 7.01));
        b.add_way(a, c, WayAttrs::default());
        let g = b.build();

        let index = EdgeIndex::new(&g.reader);
        assert_eq!(index.len(), 1);

        let loc = index.correlate(&g.reader, (43.0001, 7.005), 1);
        assert_eq!(loc.edges.len(), 2);
        let fwd = &loc.edges[0];
        let rev = &loc.edges[1];
        assert!((fwd.percent_along - 0.5).abs() < 0.01);
        assert!((rev.percent_along - 0.5).abs() < 0.01);
        assert!((fwd.percent_along + rev.percent_along - 1.0).abs() < 1e-6);
        // ~11 m off the segment
        assert!(fwd.distance > 5.0 && fwd.distance < 20.0);
    }

    #[test]
    fn test_correlate_oneway_single_candidate() {
        let mut b = GraphBuilder::new(0);
        let a = b.add_node(0, (43.0, 7.0));
        let c = b.add_node(0, (43.0, 7.01));
        b.add_way(
            a,
            c,
            WayAttrs {
                oneway: true,
                ..Default::default()
            },
        );
        let g = b.build();

        let index = EdgeIndex::new(&g.reader);
        let loc = index.correlate(&g.reader, (43.0, 7.002), 1);
        assert_eq!(loc.edges.len(), 1);
        assert!((loc.edges[0].percent_along - 0.2).abs() < 0.01);
    }
}
