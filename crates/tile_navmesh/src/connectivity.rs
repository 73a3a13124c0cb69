//! ConnectivityBuilder - triangle edge adjacency inside and across tiles.
//!
//! Internal edges come from an edge hash keyed by the sorted vertex-index
//! pair. Boundary edges are matched against the triangles of up to 14
//! neighbour tiles:
//!
//! ```text
//!   side  offset        side  offset
//!    0   (+1, 0, 0)      7   (-1, 0, 0)
//!    1   (+1, 0,+1)      8   (-1, 0,-1)
//!    2   (+1, 0,-1)      9   (-1, 0,+1)
//!    3   ( 0,+1, 0)     10   ( 0,-1, 0)
//!    4   ( 0,+1,+1)     11   ( 0,-1,-1)
//!    5   ( 0,+1,-1)     12   ( 0,-1,+1)
//!    6   ( 0, 0,+1)     13   ( 0, 0,-1)
//! ```
//!
//! Side `s` and side `(s + 7) % 14` are opposite. The Z-diagonal sides let
//! a ramp crossing a tile's horizontal face connect to the tile above or
//! below its X/Y neighbour.

use std::collections::HashMap;

use glam::{IVec3, UVec3, Vec2, Vec3};

use crate::geometry::{next_mod3, same_coord};
use crate::params::EDGE_OVERLAP_DX;
use crate::tile::Triangle;

/// Number of neighbour directions.
pub const SIDE_COUNT: usize = 14;

/// Grid offset of every neighbour direction.
pub const NEIGHBOUR_OFFSETS: [IVec3; SIDE_COUNT] = [
  IVec3::new(1, 0, 0),
  IVec3::new(1, 0, 1),
  IVec3::new(1, 0, -1),
  IVec3::new(0, 1, 0),
  IVec3::new(0, 1, 1),
  IVec3::new(0, 1, -1),
  IVec3::new(0, 0, 1),
  IVec3::new(-1, 0, 0),
  IVec3::new(-1, 0, -1),
  IVec3::new(-1, 0, 1),
  IVec3::new(0, -1, 0),
  IVec3::new(0, -1, -1),
  IVec3::new(0, -1, 1),
  IVec3::new(0, 0, -1),
];

#[inline]
pub fn opposite_side(side: usize) -> usize {
  (side + 7) % SIDE_COUNT
}

/// Coordinate of the neighbour across `side`, `None` below zero.
#[inline]
pub fn neighbour_coord(coord: UVec3, side: usize) -> Option<UVec3> {
  let n = coord.as_ivec3() + NEIGHBOUR_OFFSETS[side];
  if n.cmplt(IVec3::ZERO).any() {
    None
  } else {
    Some(n.as_uvec3())
  }
}

/// Offset of the neighbour tile's vertices relative to this tile.
#[inline]
pub fn neighbour_offset(side: usize, tile_size: Vec3) -> Vec3 {
  NEIGHBOUR_OFFSETS[side].as_vec3() * tile_size
}

// =============================================================================
// Edge overlap tests
// =============================================================================

/// Whether intervals `[a0, a1]` and `[b0, b1]` share more than `2 * dx`.
pub fn edge_overlap_1d(a0: f32, a1: f32, b0: f32, b1: f32, dx: f32) -> bool {
  if same_coord(a0, b0) && same_coord(a1, b1) {
    return true;
  }

  let (amin, amax) = (a0.min(a1), a0.max(a1));
  let (bmin, bmax) = (b0.min(b1), b0.max(b1));

  let omin = amin.max(bmin) + dx;
  let omax = amax.min(bmax) - dx;
  omin <= omax
}

/// Whether 2D segments `a` and `b` overlap along X and stay within
/// `tolerance_sq` of each other in Y over the overlap.
pub fn edge_overlap_2d(tolerance_sq: f32, a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2, dx: f32) -> bool {
  if same_coord(a0.x, b0.x) && same_coord(a1.x, b1.x) && same_coord(a0.x, a1.x) {
    return edge_overlap_1d(a0.y, a1.y, b0.y, b1.y, dx);
  }

  let (amin, amax) = if a0.x < a1.x { (a0, a1) } else { (a1, a0) };
  let (bmin, bmax) = if b0.x < b1.x { (b0, b1) } else { (b1, b0) };

  let ominx = amin.x.max(bmin.x) + dx;
  let omaxx = amax.x.min(bmax.x) - dx;
  if ominx >= omaxx {
    return false;
  }

  let slope = |lo: Vec2, hi: Vec2| {
    let run = hi.x - lo.x;
    if run != 0.0 {
      (hi.y - lo.y) / run
    } else {
      0.0
    }
  };
  let aslope = slope(amin, amax);
  let bslope = slope(bmin, bmax);
  let ac = amin.y - aslope * amin.x;
  let bc = bmin.y - bslope * bmin.x;

  let dminy = (bc + bslope * ominx) - (ac + aslope * ominx);
  let dmaxy = (bc + bslope * omaxx) - (ac + aslope * omaxx);

  dminy * dminy <= tolerance_sq && dmaxy * dmaxy <= tolerance_sq
}

/// Whether boundary edge `a` of one tile and edge `b` of the neighbour
/// across `side` (already offset into the same frame) are the same seam.
///
/// X/Y sides require both edges to lie on the shared vertical plane and
/// compare them in (other horizontal axis, Z). The pure Z sides require a
/// shared horizontal plane and compare them in XY.
pub fn edge_overlap(side: usize, tolerance_sq: f32, a0: Vec3, a1: Vec3, b0: Vec3, b1: Vec3) -> bool {
  let offset = NEIGHBOUR_OFFSETS[side];
  let dx = EDGE_OVERLAP_DX;

  if offset.x != 0 || offset.y != 0 {
    let dim = if offset.x != 0 { 0 } else { 1 };
    let odim = dim ^ 1;

    if !same_coord(a1[dim], a0[dim]) || !same_coord(b1[dim], b0[dim]) || !same_coord(a0[dim], b0[dim]) {
      return false;
    }

    edge_overlap_2d(
      tolerance_sq,
      Vec2::new(a0[odim], a0.z),
      Vec2::new(a1[odim], a1.z),
      Vec2::new(b0[odim], b0.z),
      Vec2::new(b1[odim], b1.z),
      dx,
    )
  } else {
    if !same_coord(a1.z, a0.z) || !same_coord(b1.z, b0.z) || !same_coord(a0.z, b0.z) {
      return false;
    }

    edge_overlap_2d(tolerance_sq, a0.truncate(), a1.truncate(), b0.truncate(), b1.truncate(), dx)
  }
}

// =============================================================================
// Internal adjacency
// =============================================================================

/// One undirected edge of a tile.
///
/// Boundary edges have `triangle[0] == triangle[1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
  pub vertex: [u16; 2],
  pub triangle: [u16; 2],
  /// Edge slot (0..3) inside each triangle.
  pub slot: [u8; 2],
}

impl Edge {
  #[inline]
  pub fn is_internal_of(&self, triangle: u16) -> bool {
    self.triangle[0] != self.triangle[1] && (self.triangle[0] == triangle || self.triangle[1] == triangle)
  }

  #[inline]
  pub fn is_boundary_of(&self, triangle: u16) -> bool {
    self.triangle[0] == triangle && self.triangle[1] == triangle
  }

  /// Triangle on the other side of an internal edge.
  #[inline]
  pub fn other(&self, triangle: u16) -> u16 {
    if self.triangle[0] == triangle {
      self.triangle[1]
    } else {
      self.triangle[0]
    }
  }
}

/// Precomputed edge table of one tile.
///
/// `adjacency[3 * t + e]` is the index into `edges` of edge `e` of
/// triangle `t`.
#[derive(Clone, Debug, Default)]
pub struct TileConnectivity {
  pub edges: Vec<Edge>,
  pub adjacency: Vec<u32>,
}

impl TileConnectivity {
  /// Build the edge table through an edge hash.
  ///
  /// An edge claimed by a third triangle is not manifold; that triangle
  /// keeps it as a boundary edge and a warning is logged.
  pub fn compute(triangles: &[Triangle]) -> Self {
    let mut edges: Vec<Edge> = Vec::with_capacity(triangles.len() * 2);
    let mut adjacency = vec![0u32; triangles.len() * 3];
    let mut hash: HashMap<(u16, u16), u32> = HashMap::with_capacity(triangles.len() * 2);

    for (t, triangle) in triangles.iter().enumerate() {
      let t16 = t as u16;
      for e in 0..3 {
        let v0 = triangle.vertex[e];
        let v1 = triangle.vertex[next_mod3(e)];
        let key = (v0.min(v1), v0.max(v1));

        let slot = match hash.get(&key).copied() {
          Some(i) if edges[i as usize].triangle[0] == edges[i as usize].triangle[1] => {
            let edge = &mut edges[i as usize];
            edge.triangle[1] = t16;
            edge.slot[1] = e as u8;
            i
          }
          existing => {
            if existing.is_some() {
              log::warn!("non-manifold navmesh edge {key:?} on triangle {t}, kept as boundary");
            }
            let i = edges.len() as u32;
            edges.push(Edge {
              vertex: [v0, v1],
              triangle: [t16, t16],
              slot: [e as u8, e as u8],
            });
            if existing.is_none() {
              hash.insert(key, i);
            }
            i
          }
        };
        adjacency[t * 3 + e] = slot;
      }
    }

    Self { edges, adjacency }
  }

  #[inline]
  pub fn edge(&self, triangle: usize, slot: usize) -> &Edge {
    &self.edges[self.adjacency[triangle * 3 + slot] as usize]
  }
}

#[cfg(test)]
#[path = "connectivity_test.rs"]
mod connectivity_test;
