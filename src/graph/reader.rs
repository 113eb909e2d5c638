//! Tile access with an in-memory cache and bincode persistence.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::id::GraphId;
use super::tile::{DirectedEdge, GraphTile};

/// Serves graph tiles to the search algorithms.
///
/// All tiles are held in memory; `from_dir`/`save_dir` round-trip them
/// through one bincode file per tile. A missing tile is not an error —
/// regional extracts legitimately lack coverage — so lookups return
/// `Option` and the searches skip what they cannot resolve.
#[derive(Debug, Default)]
pub struct GraphReader {
    tiles: HashMap<GraphId, GraphTile>,
}

impl GraphReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tile(&mut self, tile: GraphTile) {
        self.tiles.insert(tile.id, tile);
    }

    /// Load every `*.gph` tile file from a directory.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut reader = Self::new();
        let entries =
            fs::read_dir(dir).with_context(|| format!("Failed to read tile dir {:?}", dir))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().map(|e| e != "gph").unwrap_or(true) {
                continue;
            }
            let file =
                File::open(&path).with_context(|| format!("Failed to open tile {:?}", path))?;
            let tile: GraphTile = bincode::deserialize_from(BufReader::new(file))
                .with_context(|| format!("Failed to deserialize tile {:?}", path))?;
            reader.add_tile(tile);
        }
        Ok(reader)
    }

    /// Write one `<level>_<tile>.gph` bincode file per tile.
    pub fn save_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        for tile in self.tiles.values() {
            let path = dir.join(format!("{}_{}.gph", tile.id.level(), tile.id.tile()));
            let file =
                File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
            bincode::serialize_into(BufWriter::new(file), tile)
                .with_context(|| format!("Failed to serialize tile {:?}", path))?;
        }
        Ok(())
    }

    /// Tile containing `id`, or `None` when not loaded.
    #[inline(always)]
    pub fn get_graph_tile(&self, id: GraphId) -> Option<&GraphTile> {
        if !id.is_valid() {
            return None;
        }
        self.tiles.get(&id.tile_base())
    }

    /// Id of the edge opposing `edgeid`, or `GraphId::INVALID` when the
    /// edge, its end tile or its opposing edge cannot be resolved.
    pub fn get_opposing_edge_id(&self, edgeid: GraphId) -> GraphId {
        let Some(tile) = self.get_graph_tile(edgeid) else {
            return GraphId::INVALID;
        };
        let Some(edge) = tile.directededge(edgeid) else {
            return GraphId::INVALID;
        };
        let end_tile = if edge.leaves_tile {
            match self.get_graph_tile(edge.endnode) {
                Some(t) => t,
                None => return GraphId::INVALID,
            }
        } else {
            tile
        };
        end_tile.opposing_edge_id(edge)
    }

    /// Opposing edge of `edgeid` with its tile and id.
    pub fn get_opposing_edge(
        &self,
        edgeid: GraphId,
    ) -> Option<(&GraphTile, GraphId, &DirectedEdge)> {
        let opp_id = self.get_opposing_edge_id(edgeid);
        if !opp_id.is_valid() {
            return None;
        }
        let tile = self.get_graph_tile(opp_id)?;
        let edge = tile.directededge(opp_id)?;
        Some((tile, opp_id, edge))
    }

    pub fn tiles(&self) -> impl Iterator<Item = &GraphTile> {
        self.tiles.values()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::{GraphBuilder, WayAttrs};

    #[test]
    fn test_save_load_roundtrip() {
        let mut b = GraphBuilder::new(0);
        let a = b.add_node(1, (43.70, 7.26));
        let c = b.add_node(2, (43.70, 7.27));
        b.add_way(a, c, WayAttrs::default());
        let built = b.build();

        let dir = tempfile::tempdir().unwrap();
        built.reader.save_dir(dir.path()).unwrap();
        let loaded = GraphReader::from_dir(dir.path()).unwrap();

        assert_eq!(loaded.tile_count(), 2);
        let edgeid = built.way_edges[0].0;
        let tile = loaded.get_graph_tile(edgeid).unwrap();
        let edge = tile.directededge(edgeid).unwrap();
        assert!(edge.leaves_tile);
        assert_eq!(
            loaded.get_opposing_edge_id(edgeid),
            built.way_edges[0].1
        );
    }

    #[test]
    fn test_missing_tile_is_none() {
        let reader = GraphReader::new();
        assert!(reader.get_graph_tile(GraphId::new(0, 1, 0)).is_none());
        assert!(!reader.get_opposing_edge_id(GraphId::new(0, 1, 0)).is_valid());
        assert!(reader.get_graph_tile(GraphId::INVALID).is_none());
    }
}
