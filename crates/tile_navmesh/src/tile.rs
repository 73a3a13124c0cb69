//! Tile - one grid cell's triangle soup, links and BV tree.
//!
//! Vertices are tile-local. Every triangle owns a contiguous run of
//! `links` (`first_link .. first_link + link_count`), so rewriting links
//! always rebuilds the whole array.

use glam::Vec3;
use smallvec::SmallVec;

use crate::error::{NavMeshError, Result};
use crate::filter::AreaAnnotation;
use crate::geometry::{cross2, triangle_area, MIN_TRIANGLE_AREA};
use crate::ids::{IslandId, TILE_TRIANGLES_MAX};

/// Edge-to-neighbour record of a triangle.
///
/// `side` is a neighbour direction `0..14`, [`Link::INTERNAL`] for a
/// triangle of the same tile or [`Link::OFF_MESH`]. For off-mesh links
/// `triangle` is the index handed to the off-mesh provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Link {
  pub side: u8,
  pub edge: u8,
  pub triangle: u16,
}

impl Link {
  pub const OFF_MESH: u8 = 14;
  pub const INTERNAL: u8 = 15;

  #[inline]
  pub fn internal(edge: u8, triangle: u16) -> Self {
    Self {
      side: Self::INTERNAL,
      edge,
      triangle,
    }
  }

  #[inline]
  pub fn boundary(side: u8, edge: u8, triangle: u16) -> Self {
    debug_assert!(side < Self::OFF_MESH);
    Self { side, edge, triangle }
  }

  #[inline]
  pub fn off_mesh(index: u16) -> Self {
    Self {
      side: Self::OFF_MESH,
      edge: 0,
      triangle: index,
    }
  }

  #[inline]
  pub fn is_internal(&self) -> bool {
    self.side == Self::INTERNAL
  }

  #[inline]
  pub fn is_off_mesh(&self) -> bool {
    self.side == Self::OFF_MESH
  }

  #[inline]
  pub fn is_boundary(&self) -> bool {
    self.side < Self::OFF_MESH
  }
}

/// Triangle of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Triangle {
  pub vertex: [u16; 3],
  pub first_link: u16,
  pub link_count: u8,
  pub island: IslandId,
  pub annotation: AreaAnnotation,
}

impl Triangle {
  pub fn new(vertex: [u16; 3]) -> Self {
    Self {
      vertex,
      ..Self::default()
    }
  }

  pub fn with_annotation(mut self, annotation: AreaAnnotation) -> Self {
    self.annotation = annotation;
    self
  }
}

/// Flattened BV tree node.
///
/// Nodes are in pre-order. A leaf's `offset` is its triangle index; an
/// inner node's `offset` is the size of its subtree, so a query that
/// misses the node skips straight past it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BvNode {
  pub min: Vec3,
  pub max: Vec3,
  pub leaf: bool,
  pub offset: u16,
}

impl BvNode {
  #[inline]
  pub fn overlaps(&self, min: Vec3, max: Vec3) -> bool {
    self.min.cmple(max).all() && self.max.cmpge(min).all()
  }
}

/// Triangle soup of one grid cell.
#[derive(Clone, Debug, Default)]
pub struct Tile {
  pub(crate) vertices: Vec<Vec3>,
  pub(crate) triangles: Vec<Triangle>,
  pub(crate) links: Vec<Link>,
  pub(crate) nodes: Vec<BvNode>,
}

impl Tile {
  /// Build a tile from tile-local vertices and triangles.
  ///
  /// Triangles referencing missing vertices are skipped with a warning.
  /// Clockwise triangles (seen from above) are rewound counter-clockwise.
  /// More than [`TILE_TRIANGLES_MAX`] triangles is a precondition error.
  pub fn new(vertices: Vec<Vec3>, triangles: Vec<Triangle>) -> Result<Self> {
    if triangles.len() > TILE_TRIANGLES_MAX {
      return Err(NavMeshError::precondition(format!(
        "tile has {} triangles, at most {TILE_TRIANGLES_MAX} allowed",
        triangles.len()
      )));
    }
    if vertices.len() > u16::MAX as usize {
      return Err(NavMeshError::precondition(format!(
        "tile has {} vertices, at most {} allowed",
        vertices.len(),
        u16::MAX
      )));
    }

    let vertex_count = vertices.len();
    let triangles = triangles
      .into_iter()
      .enumerate()
      .filter_map(|(i, mut t)| {
        if t.vertex.iter().any(|&v| v as usize >= vertex_count) {
          log::warn!("tile triangle {i} references a missing vertex {:?}, skipped", t.vertex);
          return None;
        }
        let [a, b, c] = t.vertex.map(|v| vertices[v as usize].truncate());
        if cross2(b - a, c - a) < 0.0 {
          t.vertex.swap(1, 2);
        }
        t.first_link = 0;
        t.link_count = 0;
        t.island = IslandId::NONE;
        Some(t)
      })
      .collect();

    Ok(Self {
      vertices,
      triangles,
      links: Vec::new(),
      nodes: Vec::new(),
    })
  }

  /// Convenience constructor from index triples.
  pub fn from_indices(vertices: Vec<Vec3>, indices: &[[u16; 3]]) -> Result<Self> {
    Self::new(vertices, indices.iter().map(|&v| Triangle::new(v)).collect())
  }

  #[inline]
  pub fn vertices(&self) -> &[Vec3] {
    &self.vertices
  }

  #[inline]
  pub fn triangles(&self) -> &[Triangle] {
    &self.triangles
  }

  #[inline]
  pub fn links(&self) -> &[Link] {
    &self.links
  }

  #[inline]
  pub fn nodes(&self) -> &[BvNode] {
    &self.nodes
  }

  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.triangles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.triangles.is_empty()
  }

  /// Links of triangle `index`.
  pub fn triangle_links(&self, index: usize) -> &[Link] {
    match self.triangles.get(index) {
      Some(t) => {
        let first = t.first_link as usize;
        let end = (first + t.link_count as usize).min(self.links.len());
        &self.links[first.min(end)..end]
      }
      None => &[],
    }
  }

  /// Tile-local corners of triangle `index`.
  pub fn triangle_vertices(&self, index: usize) -> Option<[Vec3; 3]> {
    let t = self.triangles.get(index)?;
    Some([
      *self.vertices.get(t.vertex[0] as usize)?,
      *self.vertices.get(t.vertex[1] as usize)?,
      *self.vertices.get(t.vertex[2] as usize)?,
    ])
  }

  /// Drop degenerate triangles. Returns how many were removed.
  ///
  /// Links and the BV tree are invalidated; call before adjacency.
  pub fn validate_triangles(&mut self) -> usize {
    let before = self.triangles.len();
    let vertices = &self.vertices;
    self.triangles.retain(|t| {
      let [a, b, c] = t.vertex.map(|v| vertices[v as usize]);
      let ok = t.vertex[0] != t.vertex[1]
        && t.vertex[1] != t.vertex[2]
        && t.vertex[0] != t.vertex[2]
        && triangle_area(a, b, c) > MIN_TRIANGLE_AREA;
      if !ok {
        log::warn!("degenerate navmesh triangle {:?} skipped", t.vertex);
      }
      ok
    });

    let removed = before - self.triangles.len();
    if removed > 0 {
      self.links.clear();
      self.nodes.clear();
      for t in &mut self.triangles {
        t.first_link = 0;
        t.link_count = 0;
      }
    }
    removed
  }

  /// Replace all links. `per_triangle[i]` becomes triangle `i`'s run.
  pub(crate) fn set_links(&mut self, per_triangle: Vec<SmallVec<[Link; 6]>>) {
    debug_assert_eq!(per_triangle.len(), self.triangles.len());
    self.links.clear();
    for (triangle, links) in self.triangles.iter_mut().zip(per_triangle) {
      triangle.first_link = self.links.len() as u16;
      triangle.link_count = links.len() as u8;
      self.links.extend(links);
    }
  }

  /// Current links grouped per triangle.
  pub(crate) fn links_per_triangle(&self) -> Vec<SmallVec<[Link; 6]>> {
    (0..self.triangles.len())
      .map(|i| self.triangle_links(i).iter().copied().collect())
      .collect()
  }

  /// Append an off-mesh link to triangle `index`.
  pub fn add_off_mesh_link(&mut self, index: u16, off_mesh_index: u16) -> Result<()> {
    self.check_triangle(index)?;
    let mut links = self.links_per_triangle();
    links[index as usize].push(Link::off_mesh(off_mesh_index));
    self.set_links(links);
    Ok(())
  }

  /// Point triangle `index`'s off-mesh link at a new provider index.
  pub fn update_off_mesh_link(&mut self, index: u16, off_mesh_index: u16) -> Result<()> {
    self.check_triangle(index)?;
    let t = self.triangles[index as usize];
    let first = t.first_link as usize;
    for link in &mut self.links[first..first + t.link_count as usize] {
      if link.is_off_mesh() {
        link.triangle = off_mesh_index;
      }
    }
    Ok(())
  }

  /// Remove every off-mesh link of triangle `index`.
  pub fn remove_off_mesh_link(&mut self, index: u16) -> Result<()> {
    self.check_triangle(index)?;
    let mut links = self.links_per_triangle();
    links[index as usize].retain(|l| !l.is_off_mesh());
    self.set_links(links);
    Ok(())
  }

  fn check_triangle(&self, index: u16) -> Result<()> {
    if (index as usize) < self.triangles.len() {
      Ok(())
    } else {
      Err(NavMeshError::precondition(format!(
        "triangle {index} out of range ({} triangles)",
        self.triangles.len()
      )))
    }
  }

  // =========================================================================
  // BV tree
  // =========================================================================

  /// Build the flattened BV tree over the triangles.
  pub fn build_bv_tree(&mut self) {
    let mut items: Vec<(Vec3, Vec3, u16)> = (0..self.triangles.len())
      .filter_map(|i| {
        let [a, b, c] = self.triangle_vertices(i)?;
        Some((a.min(b).min(c), a.max(b).max(c), i as u16))
      })
      .collect();

    self.nodes.clear();
    self.nodes.reserve(items.len() * 2);
    if !items.is_empty() {
      let len = items.len();
      subdivide(&mut items, 0, len, &mut self.nodes);
    }
  }

  /// Local triangle indices whose bounds overlap `[min, max]` (tile-local).
  pub(crate) fn query_local(&self, min: Vec3, max: Vec3, out: &mut Vec<u16>) {
    if self.nodes.is_empty() {
      for i in 0..self.triangles.len() {
        if let Some([a, b, c]) = self.triangle_vertices(i) {
          let (tmin, tmax) = (a.min(b).min(c), a.max(b).max(c));
          if tmin.cmple(max).all() && tmax.cmpge(min).all() {
            out.push(i as u16);
          }
        }
      }
      return;
    }

    let mut i = 0;
    while i < self.nodes.len() {
      let node = &self.nodes[i];
      if node.overlaps(min, max) {
        if node.leaf {
          out.push(node.offset);
        }
        i += 1;
      } else {
        i += if node.leaf { 1 } else { node.offset.max(1) as usize };
      }
    }
  }

  /// Approximate heap bytes held by the tile's arrays.
  pub fn memory_bytes(&self) -> usize {
    self.vertices.len() * std::mem::size_of::<Vec3>()
      + self.triangles.len() * std::mem::size_of::<Triangle>()
      + self.links.len() * std::mem::size_of::<Link>()
      + self.nodes.len() * std::mem::size_of::<BvNode>()
  }
}

fn subdivide(items: &mut [(Vec3, Vec3, u16)], start: usize, end: usize, nodes: &mut Vec<BvNode>) {
  let index = nodes.len();
  let slice = &mut items[start..end];

  let (min, max) = slice
    .iter()
    .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), (a, b, _)| {
      (lo.min(*a), hi.max(*b))
    });

  if slice.len() == 1 {
    nodes.push(BvNode {
      min,
      max,
      leaf: true,
      offset: slice[0].2,
    });
    return;
  }

  nodes.push(BvNode {
    min,
    max,
    leaf: false,
    offset: 0,
  });

  let extent = max - min;
  let axis = if extent.x >= extent.y && extent.x >= extent.z {
    0
  } else if extent.y >= extent.z {
    1
  } else {
    2
  };
  slice.sort_by(|l, r| {
    let lc = (l.0[axis] + l.1[axis]) * 0.5;
    let rc = (r.0[axis] + r.1[axis]) * 0.5;
    lc.total_cmp(&rc)
  });

  let split = start + (end - start) / 2;
  subdivide(items, start, split, nodes);
  subdivide(items, split, end, nodes);

  nodes[index].offset = (nodes.len() - index) as u16;
}

#[cfg(test)]
#[path = "tile_test.rs"]
mod tile_test;
