//! TileGrid - sparse 3D grid of navmesh tiles.
//!
//! ```text
//!   tile_map: coord ──► TileId ──► containers[id - 1] { coord, tile }
//!                                      ▲
//!   free: [index, ...] ────────────────┘  (recycled, never removed)
//! ```
//!
//! Tiles are installed with [`TileGrid::set_tile`] and stitched to their
//! neighbours with [`TileGrid::connect_to_network`]. All mutation and
//! queries run on one thread.
//!
//! # Module Structure
//!
//! - `adjacency` - internal/boundary link construction and incremental
//!   patching of neighbours
//! - `query` - triangle lookup by box or position, mid-edge, string pulling
//! - `islands` - connected components and their areas

mod adjacency;
mod islands;
mod query;

pub use islands::{Islands, MinIslandArea};
pub use query::ClosestTriangle;

use std::collections::HashMap;

use glam::{UVec3, Vec3};

use crate::connectivity::{neighbour_coord, opposite_side, SIDE_COUNT};
use crate::error::{NavMeshError, Result};
use crate::filter::AreaAnnotation;
use crate::ids::{TileId, TriangleId};
use crate::params::NavMeshParams;
use crate::stats::MeshStats;
use crate::tile::{Link, Tile, Triangle};

/// Slot of the container array.
#[derive(Clone, Debug, Default)]
pub(crate) struct TileContainer {
  pub(crate) coord: UVec3,
  pub(crate) tile: Tile,
  pub(crate) in_use: bool,
}

/// Sparse grid of tiles with cross-tile adjacency.
#[derive(Debug)]
pub struct TileGrid {
  params: NavMeshParams,
  containers: Vec<TileContainer>,
  free: Vec<u32>,
  tile_map: HashMap<UVec3, TileId>,
  stats: MeshStats,
  islands: Islands,
}

impl TileGrid {
  pub fn new(params: NavMeshParams) -> Result<Self> {
    params.validate()?;
    let capacity = params.tile_capacity;
    let mut grid = Self {
      params,
      containers: Vec::with_capacity(capacity),
      free: Vec::new(),
      tile_map: HashMap::with_capacity(capacity),
      stats: MeshStats::default(),
      islands: Islands::default(),
    };
    grid.update_grid_memory();
    Ok(grid)
  }

  #[inline]
  pub fn params(&self) -> &NavMeshParams {
    &self.params
  }

  #[inline]
  pub fn stats(&self) -> &MeshStats {
    &self.stats
  }

  #[inline]
  pub fn islands(&self) -> &Islands {
    &self.islands
  }

  /// Triangles over all resident tiles.
  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.stats.triangle_count
  }

  /// Resident tiles.
  #[inline]
  pub fn tile_count(&self) -> usize {
    self.tile_map.len()
  }

  /// Containers ever allocated, free ones included.
  #[inline]
  pub fn container_count(&self) -> usize {
    self.containers.len()
  }

  // ===========================================================================
  // Tile lifecycle
  // ===========================================================================

  /// Install `tile` at `coord`.
  ///
  /// An existing tile at `coord` is released first and its id reused;
  /// otherwise a container is taken from the free-list or appended.
  /// Degenerate triangles are dropped and a missing BV tree is built.
  /// Adjacency is not computed; call [`Self::connect_to_network`]
  /// afterwards.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "navmesh::set_tile"))]
  pub fn set_tile(&mut self, coord: UVec3, mut tile: Tile) -> Result<TileId> {
    if coord.cmpgt(self.params.max_tile_coord).any() {
      return Err(NavMeshError::precondition(format!(
        "tile coordinate {coord} outside grid (max {})",
        self.params.max_tile_coord
      )));
    }

    tile.validate_triangles();
    if tile.nodes.is_empty() {
      tile.build_bv_tree();
    }

    let index = match self.tile_map.get(&coord).copied() {
      Some(id) => {
        let index = self.container_index(id)?;
        let old = std::mem::take(&mut self.containers[index].tile);
        self.stats.remove_tile(&old);
        index
      }
      None => {
        let index = self.allocate_container();
        self.tile_map.insert(coord, TileId::from_index(index));
        self.stats.tile_count += 1;
        index
      }
    };
    let id = TileId::from_index(index);

    self.stats.add_tile(&tile);
    let container = &mut self.containers[index];
    container.coord = coord;
    container.tile = tile;
    container.in_use = true;

    self.update_grid_memory();
    log::debug!(
      "navmesh tile {coord} -> {id:?}, {} triangles",
      self.containers[index].tile.triangle_count()
    );
    Ok(id)
  }

  /// Release tile `id`. With `clear_network` its neighbours drop every link
  /// that pointed into it.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "navmesh::clear_tile"))]
  pub fn clear_tile(&mut self, id: TileId, clear_network: bool) -> Result<()> {
    let index = self.container_index(id)?;

    let container = &mut self.containers[index];
    let coord = container.coord;
    let old = std::mem::take(&mut container.tile);
    container.in_use = false;

    self.stats.remove_tile(&old);
    self.stats.tile_count = self.stats.tile_count.saturating_sub(1);
    self.tile_map.remove(&coord);
    self.free.push(index as u32);

    if clear_network {
      for side in 0..SIDE_COUNT {
        if let Some(neighbour) = self.neighbour_tile_id_at(coord, side) {
          self.recompute_adjacency(neighbour, opposite_side(side), None)?;
        }
      }
    }

    self.update_grid_memory();
    log::debug!("navmesh tile {coord} ({id:?}) cleared");
    Ok(())
  }

  fn allocate_container(&mut self) -> usize {
    match self.free.pop() {
      Some(index) => index as usize,
      None => {
        self.containers.push(TileContainer::default());
        self.containers.len() - 1
      }
    }
  }

  fn update_grid_memory(&mut self) {
    self.stats.grid_memory = self.tile_map.capacity() * std::mem::size_of::<(UVec3, TileId)>()
      + self.containers.capacity() * std::mem::size_of::<TileContainer>()
      + self.free.capacity() * std::mem::size_of::<u32>();
  }

  /// Container index of a resident tile.
  pub(crate) fn container_index(&self, id: TileId) -> Result<usize> {
    match id.index() {
      Some(index) if self.containers.get(index).is_some_and(|c| c.in_use) => Ok(index),
      _ => Err(NavMeshError::precondition(format!("{id:?} is not a resident tile"))),
    }
  }

  #[inline]
  pub(crate) fn container(&self, id: TileId) -> Option<&TileContainer> {
    let index = id.index()?;
    self.containers.get(index).filter(|c| c.in_use)
  }

  // ===========================================================================
  // Lookup
  // ===========================================================================

  /// Tile installed at `coord`.
  #[inline]
  pub fn tile_id(&self, coord: UVec3) -> Option<TileId> {
    self.tile_map.get(&coord).copied()
  }

  pub fn tile(&self, id: TileId) -> Option<&Tile> {
    self.container(id).map(|c| &c.tile)
  }

  pub fn tile_coord(&self, id: TileId) -> Option<UVec3> {
    self.container(id).map(|c| c.coord)
  }

  /// Resident tiles as `(id, coord, tile)`.
  pub fn tiles(&self) -> impl Iterator<Item = (TileId, UVec3, &Tile)> {
    self
      .containers
      .iter()
      .enumerate()
      .filter(|(_, c)| c.in_use)
      .map(|(i, c)| (TileId::from_index(i), c.coord, &c.tile))
  }

  /// Mesh-local corner of tile `coord`.
  #[inline]
  pub fn tile_origin(&self, coord: UVec3) -> Vec3 {
    self.params.tile_origin(coord)
  }

  /// Neighbour of tile `id` across `side`.
  pub fn neighbour_tile_id(&self, id: TileId, side: usize) -> Option<TileId> {
    let coord = self.tile_coord(id)?;
    self.neighbour_tile_id_at(coord, side)
  }

  #[inline]
  pub(crate) fn neighbour_tile_id_at(&self, coord: UVec3, side: usize) -> Option<TileId> {
    if side >= SIDE_COUNT {
      return None;
    }
    neighbour_coord(coord, side).and_then(|n| self.tile_id(n))
  }

  pub fn triangle(&self, id: TriangleId) -> Option<&Triangle> {
    self.container(id.tile())?.tile.triangles.get(id.local_index() as usize)
  }

  /// Mesh-local corners of triangle `id`.
  pub fn vertices(&self, id: TriangleId) -> Option<[Vec3; 3]> {
    let container = self.container(id.tile())?;
    let origin = self.params.tile_origin(container.coord);
    let local = container.tile.triangle_vertices(id.local_index() as usize)?;
    Some(local.map(|v| v + origin))
  }

  /// Links of triangle `id`.
  pub fn links(&self, id: TriangleId) -> &[Link] {
    match self.container(id.tile()) {
      Some(c) => c.tile.triangle_links(id.local_index() as usize),
      None => &[],
    }
  }

  /// Bitmask of the triangle's edges that carry a link.
  pub fn linked_edges(&self, id: TriangleId) -> Option<u8> {
    self.container(id.tile())?;
    Some(
      self
        .links(id)
        .iter()
        .filter(|l| !l.is_off_mesh())
        .fold(0u8, |mask, l| mask | (1 << l.edge)),
    )
  }

  /// Triangle a non-off-mesh link of `from` leads to.
  ///
  /// A boundary link into a tile that is no longer resident is malformed.
  pub(crate) fn link_target(&self, from: TriangleId, link: &Link) -> Result<TriangleId> {
    let tile_id = from.tile();
    if link.is_internal() {
      return Ok(TriangleId::new(tile_id, link.triangle));
    }
    if link.is_off_mesh() {
      return Err(NavMeshError::precondition("off-mesh links have no geometric target"));
    }

    let coord = self
      .tile_coord(tile_id)
      .ok_or_else(|| NavMeshError::malformed(format!("{from:?} lives in a missing tile")))?;
    let neighbour = self.neighbour_tile_id_at(coord, link.side as usize).ok_or_else(|| {
      NavMeshError::malformed(format!(
        "{from:?} links across side {} to a missing tile",
        link.side
      ))
    })?;
    let target = TriangleId::new(neighbour, link.triangle);
    if self.triangle(target).is_none() {
      return Err(NavMeshError::malformed(format!(
        "{from:?} links to missing triangle {}",
        link.triangle
      )));
    }
    Ok(target)
  }

  // ===========================================================================
  // Annotations and off-mesh links
  // ===========================================================================

  /// Paint `annotation` onto triangles. Returns the tiles that changed.
  pub fn set_triangles_annotation(&mut self, triangles: &[TriangleId], annotation: AreaAnnotation) -> Vec<TileId> {
    let mut affected = Vec::new();
    for &id in triangles {
      let Ok(index) = self.container_index(id.tile()) else {
        continue;
      };
      let Some(triangle) = self.containers[index].tile.triangles.get_mut(id.local_index() as usize) else {
        continue;
      };
      if triangle.annotation == annotation {
        continue;
      }
      triangle.annotation = annotation;
      if !affected.contains(&id.tile()) {
        affected.push(id.tile());
      }
    }
    affected
  }

  /// Attach off-mesh link `off_mesh_index` to triangle `id`.
  pub fn add_off_mesh_link(&mut self, id: TriangleId, off_mesh_index: u16) -> Result<()> {
    self.edit_tile_links(id, |tile, local| tile.add_off_mesh_link(local, off_mesh_index))
  }

  pub fn update_off_mesh_link(&mut self, id: TriangleId, off_mesh_index: u16) -> Result<()> {
    self.edit_tile_links(id, |tile, local| tile.update_off_mesh_link(local, off_mesh_index))
  }

  pub fn remove_off_mesh_link(&mut self, id: TriangleId) -> Result<()> {
    self.edit_tile_links(id, |tile, local| tile.remove_off_mesh_link(local))
  }

  fn edit_tile_links(&mut self, id: TriangleId, edit: impl FnOnce(&mut Tile, u16) -> Result<()>) -> Result<()> {
    let index = self.container_index(id.tile())?;
    let tile = &mut self.containers[index].tile;
    let before = tile.links.len();
    let before_bytes = tile.memory_bytes();
    edit(tile, id.local_index())?;

    let (after, after_bytes) = (tile.links.len(), tile.memory_bytes());
    self.stats.link_count = (self.stats.link_count + after).saturating_sub(before);
    self.stats.tile_memory = (self.stats.tile_memory + after_bytes).saturating_sub(before_bytes);
    Ok(())
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
