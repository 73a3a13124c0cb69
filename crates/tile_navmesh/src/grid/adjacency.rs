//! Link construction: full per-tile builds and one-side neighbour patches.

use glam::Vec3;
use smallvec::SmallVec;
use web_time::Instant;

use super::TileGrid;
use crate::connectivity::{edge_overlap, neighbour_offset, opposite_side, TileConnectivity, SIDE_COUNT};
use crate::error::{NavMeshError, Result};
use crate::geometry::next_mod3;
use crate::ids::{TileId, TriangleId};
use crate::params::ADJACENCY_TOLERANCE_SQ;
use crate::tile::{Link, Tile};

type TriangleLinks = SmallVec<[Link; 6]>;

/// A neighbour tile seen from the tile being linked.
#[derive(Clone, Copy)]
struct SideTile<'a> {
  tile: &'a Tile,
  offset: Vec3,
}

/// Append a boundary link for every neighbour triangle with an edge on
/// the same seam as `a0a1`.
fn link_edge_with_neighbours(
  sides: &[Option<SideTile<'_>>; SIDE_COUNT],
  a0: Vec3,
  a1: Vec3,
  edge: u8,
  tolerance_sq: f32,
  out: &mut TriangleLinks,
) {
  for (side, entry) in sides.iter().enumerate() {
    let Some(side_tile) = entry else {
      continue;
    };
    link_edge_with_tile(side, side_tile, a0, a1, edge, tolerance_sq, out);
  }
}

fn link_edge_with_tile(
  side: usize,
  neighbour: &SideTile<'_>,
  a0: Vec3,
  a1: Vec3,
  edge: u8,
  tolerance_sq: f32,
  out: &mut TriangleLinks,
) {
  let vertices = &neighbour.tile.vertices;
  for (k, triangle) in neighbour.tile.triangles.iter().enumerate() {
    for ne in 0..3 {
      let b0 = neighbour.offset + vertices[triangle.vertex[ne] as usize];
      let b1 = neighbour.offset + vertices[triangle.vertex[next_mod3(ne)] as usize];
      if edge_overlap(side, tolerance_sq, a0, a1, b0, b1) {
        out.push(Link::boundary(side as u8, edge, k as u16));
        break;
      }
    }
  }
}

impl TileGrid {
  /// Neighbour tiles of `coord` with their vertex offsets.
  fn side_tiles(&self, coord: glam::UVec3) -> [Option<SideTile<'_>>; SIDE_COUNT] {
    let mut sides = [None; SIDE_COUNT];
    for (side, slot) in sides.iter_mut().enumerate() {
      if let Some(c) = self.neighbour_tile_id_at(coord, side).and_then(|id| self.container(id)) {
        *slot = Some(SideTile {
          tile: &c.tile,
          offset: neighbour_offset(side, self.params.tile_size),
        });
      }
    }
    sides
  }

  /// Rebuild all links of tile `id`.
  ///
  /// Internal links come from `precomputed` when given, otherwise from a
  /// fresh edge hash. Triangles with fewer than three internal links have
  /// their boundary edges matched against every resident neighbour.
  /// Off-mesh links survive the rebuild.
  pub(crate) fn compute_adjacency(
    &mut self,
    id: TileId,
    tolerance_sq: f32,
    precomputed: Option<&TileConnectivity>,
  ) -> Result<()> {
    let index = self.container_index(id)?;
    if self.containers[index].tile.triangles.is_empty() {
      return Ok(());
    }
    let start = Instant::now();

    let links = {
      let container = &self.containers[index];
      let tile = &container.tile;
      let triangle_count = tile.triangles.len();

      let owned;
      let connectivity = match precomputed {
        Some(c) => c,
        None => {
          owned = TileConnectivity::compute(&tile.triangles);
          &owned
        }
      };
      if connectivity.adjacency.len() != triangle_count * 3 {
        return Err(NavMeshError::malformed(format!(
          "connectivity covers {} edges, tile {id:?} has {}",
          connectivity.adjacency.len(),
          triangle_count * 3
        )));
      }

      let sides = self.side_tiles(container.coord);
      let mut links: Vec<TriangleLinks> = Vec::with_capacity(triangle_count);

      for t in 0..triangle_count {
        let t16 = t as u16;
        let mut tri_links = TriangleLinks::new();

        for e in 0..3 {
          let edge = connectivity.edge(t, e);
          if edge.is_internal_of(t16) {
            tri_links.push(Link::internal(e as u8, edge.other(t16)));
          }
        }

        if tri_links.len() < 3 {
          for e in 0..3 {
            let edge = connectivity.edge(t, e);
            if edge.is_boundary_of(t16) {
              let a0 = tile.vertices[edge.vertex[0] as usize];
              let a1 = tile.vertices[edge.vertex[1] as usize];
              link_edge_with_neighbours(&sides, a0, a1, e as u8, tolerance_sq, &mut tri_links);
            }
          }
        }

        tri_links.extend(tile.triangle_links(t).iter().copied().filter(Link::is_off_mesh));
        links.push(tri_links);
      }
      links
    };

    self.replace_links(index, links);
    self.stats.network_construction += start.elapsed();
    self.stats.network_builds += 1;
    Ok(())
  }

  /// Patch the links of tile `id` that point across `side`.
  ///
  /// Links across `side` are dropped and, when `target` is resident,
  /// rebuilt against it. Everything else is kept. A tile without any links
  /// gets a full build instead.
  pub(crate) fn recompute_adjacency(&mut self, id: TileId, side: usize, target: Option<TileId>) -> Result<()> {
    let index = self.container_index(id)?;
    if self.containers[index].tile.triangles.is_empty() {
      return Ok(());
    }
    if self.containers[index].tile.links.is_empty() {
      return self.compute_adjacency(id, ADJACENCY_TOLERANCE_SQ, None);
    }
    let start = Instant::now();

    let links = {
      let tile = &self.containers[index].tile;
      let neighbour = target.and_then(|t| self.container(t)).map(|c| SideTile {
        tile: &c.tile,
        offset: neighbour_offset(side, self.params.tile_size),
      });

      let mut links: Vec<TriangleLinks> = Vec::with_capacity(tile.triangles.len());
      for (t, triangle) in tile.triangles.iter().enumerate() {
        let mut tri_links = TriangleLinks::new();
        let mut internal = 0;
        for link in tile.triangle_links(t) {
          if link.is_internal() || link.side as usize != side {
            tri_links.push(*link);
            internal += link.is_internal() as usize;
          }
        }

        if internal < 3 {
          if let Some(neighbour) = &neighbour {
            for e in 0..3 {
              let a0 = tile.vertices[triangle.vertex[e] as usize];
              let a1 = tile.vertices[triangle.vertex[next_mod3(e)] as usize];
              link_edge_with_tile(side, neighbour, a0, a1, e as u8, ADJACENCY_TOLERANCE_SQ, &mut tri_links);
            }
          }
        }
        links.push(tri_links);
      }
      links
    };

    self.replace_links(index, links);
    self.stats.network_construction += start.elapsed();
    self.stats.network_builds += 1;
    Ok(())
  }

  fn replace_links(&mut self, index: usize, links: Vec<TriangleLinks>) {
    let tile = &mut self.containers[index].tile;
    self.stats.remove_tile(tile);
    tile.set_links(links);
    self.stats.add_tile(tile);
  }

  /// Link tile `id` internally and with its resident neighbours, then patch
  /// each neighbour's side facing it.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "navmesh::connect_to_network"))]
  pub fn connect_to_network(&mut self, id: TileId, precomputed: Option<&TileConnectivity>) -> Result<()> {
    self.compute_adjacency(id, ADJACENCY_TOLERANCE_SQ, precomputed)?;

    let coord = self.containers[self.container_index(id)?].coord;
    for side in 0..SIDE_COUNT {
      if let Some(neighbour) = self.neighbour_tile_id_at(coord, side) {
        self.recompute_adjacency(neighbour, opposite_side(side), Some(id))?;
      }
    }
    Ok(())
  }

  /// Rebuild links of every resident tile using the voxel-size seam
  /// tolerance.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "navmesh::create_network"))]
  pub fn create_network(&mut self) -> Result<()> {
    let tolerance_sq = self.params.network_tolerance_sq();
    let ids: Vec<TileId> = self.tile_map.values().copied().collect();
    for id in ids {
      self.compute_adjacency(id, tolerance_sq, None)?;
    }
    log::debug!(
      "navmesh network built: {} tiles, {} links",
      self.tile_count(),
      self.stats.link_count
    );
    Ok(())
  }

  /// Check that every internal and boundary link has a reciprocal.
  ///
  /// Returns the first broken link found.
  pub fn verify_adjacency(&self) -> Result<()> {
    for (tile_id, _, tile) in self.tiles() {
      for t in 0..tile.triangles.len() {
        let from = TriangleId::new(tile_id, t as u16);
        for link in tile.triangle_links(t) {
          if link.is_off_mesh() {
            continue;
          }
          let target = self.link_target(from, link)?;
          let back_side = if link.is_internal() {
            Link::INTERNAL
          } else {
            opposite_side(link.side as usize) as u8
          };
          let reciprocal = self
            .links(target)
            .iter()
            .any(|l| l.side == back_side && l.triangle == t as u16);
          if !reciprocal {
            return Err(NavMeshError::malformed(format!(
              "{from:?} links to {target:?} across side {} without a reciprocal",
              link.side
            )));
          }
        }
      }
    }
    Ok(())
  }
}
