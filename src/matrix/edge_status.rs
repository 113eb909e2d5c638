//! Per-edge search state.

use std::collections::HashMap;

use crate::graph::GraphId;

use super::edge_label::INVALID_LABEL;

/// Where an edge stands in the current search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSet {
    /// Not encountered yet; never stored explicitly.
    Unseen,
    /// In the queue, label still improvable.
    Temporary,
    /// Settled; the label holds the final cost.
    Permanent,
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeStatusInfo {
    pub set: EdgeSet,
    pub index: u32,
}

impl EdgeStatusInfo {
    const UNSEEN: EdgeStatusInfo = EdgeStatusInfo {
        set: EdgeSet::Unseen,
        index: INVALID_LABEL,
    };
}

/// Sparse edge -> status map. Edges never touched by the search cost
/// nothing; lookups for them report `Unseen`.
#[derive(Debug, Default)]
pub struct EdgeStatus {
    map: HashMap<GraphId, EdgeStatusInfo>,
}

impl EdgeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn get(&self, edgeid: GraphId) -> EdgeStatusInfo {
        self.map
            .get(&edgeid)
            .copied()
            .unwrap_or(EdgeStatusInfo::UNSEEN)
    }

    /// Record a freshly enqueued edge.
    pub fn set_temporary(&mut self, edgeid: GraphId, index: u32) {
        self.map.insert(
            edgeid,
            EdgeStatusInfo {
                set: EdgeSet::Temporary,
                index,
            },
        );
    }

    /// Change an edge's state, keeping its label index.
    pub fn update(&mut self, edgeid: GraphId, set: EdgeSet) {
        if let Some(info) = self.map.get_mut(&edgeid) {
            info.set = set;
        }
    }

    /// Drop all entries, retaining capacity for the next run.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}
