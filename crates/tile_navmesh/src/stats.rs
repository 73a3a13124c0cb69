//! Grid counters and memory accounting.

use web_time::Duration;

use crate::tile::Tile;

/// Running totals over all resident tiles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshStats {
  pub tile_count: usize,
  pub vertex_count: usize,
  pub triangle_count: usize,
  pub bv_node_count: usize,
  pub link_count: usize,

  /// Bytes held by resident tiles' arrays.
  pub tile_memory: usize,
  /// Bytes held by the coordinate map and container array.
  pub grid_memory: usize,

  /// Time spent building adjacency since creation.
  pub network_construction: Duration,
  /// Adjacency builds since creation.
  pub network_builds: u64,
}

impl MeshStats {
  pub(crate) fn add_tile(&mut self, tile: &Tile) {
    self.vertex_count += tile.vertices.len();
    self.triangle_count += tile.triangles.len();
    self.bv_node_count += tile.nodes.len();
    self.link_count += tile.links.len();
    self.tile_memory += tile.memory_bytes();
  }

  pub(crate) fn remove_tile(&mut self, tile: &Tile) {
    self.vertex_count = self.vertex_count.saturating_sub(tile.vertices.len());
    self.triangle_count = self.triangle_count.saturating_sub(tile.triangles.len());
    self.bv_node_count = self.bv_node_count.saturating_sub(tile.nodes.len());
    self.link_count = self.link_count.saturating_sub(tile.links.len());
    self.tile_memory = self.tile_memory.saturating_sub(tile.memory_bytes());
  }

  /// Total bytes accounted for.
  pub fn total_memory(&self) -> usize {
    self.tile_memory + self.grid_memory
  }
}
