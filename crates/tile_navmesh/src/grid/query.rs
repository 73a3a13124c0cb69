//! Spatial queries over resident tiles.

use glam::{UVec3, Vec3};

use super::TileGrid;
use crate::filter::QueryFilter;
use crate::geometry::{
  closest_point_on_triangle, intersect_segment_segment_2d, next_mod3, point_in_triangle_2d,
};
use crate::ids::TriangleId;
use crate::params::{MAX_PULLING_THRESHOLD, MIN_PULLING_THRESHOLD};

/// Nearest triangle to a query position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosestTriangle {
  pub id: TriangleId,
  /// Closest point on the triangle, mesh-local.
  pub position: Vec3,
  pub distance: f32,
}

impl TileGrid {
  /// Whether `position` lies over triangle `id` in the XY plane.
  pub fn is_location_in_triangle(&self, position: Vec3, id: TriangleId) -> bool {
    match self.vertices(id) {
      Some([a, b, c]) => point_in_triangle_2d(position.truncate(), a.truncate(), b.truncate(), c.truncate()),
      None => false,
    }
  }

  /// Triangles whose bounds overlap the mesh-local box `[min, max]` and pass
  /// `filter`, at most `max_count`.
  pub fn query_triangles<F: QueryFilter>(&self, min: Vec3, max: Vec3, filter: &F, max_count: usize) -> Vec<TriangleId> {
    let mut out = Vec::new();
    if max_count == 0 {
      return out;
    }

    let tile_size = self.params.tile_size;
    let lo = (min.max(Vec3::ZERO) / tile_size).as_uvec3();
    let hi = (max.max(Vec3::ZERO) / tile_size).as_uvec3().min(self.params.max_tile_coord);

    let mut local = Vec::new();
    for y in lo.y..=hi.y {
      for x in lo.x..=hi.x {
        for z in lo.z..=hi.z {
          let coord = UVec3::new(x, y, z);
          let Some(id) = self.tile_id(coord) else {
            continue;
          };
          let Some(tile) = self.tile(id) else {
            continue;
          };
          let origin = self.params.tile_origin(coord);

          local.clear();
          tile.query_local(min - origin, max - origin, &mut local);
          for &t in &local {
            if filter.pass_filter(&tile.triangles[t as usize]) {
              out.push(TriangleId::new(id, t));
              if out.len() == max_count {
                return out;
              }
            }
          }
        }
      }
    }
    out
  }

  /// Triangle directly under (or over) `position` within the vertical range.
  ///
  /// Among triangles containing `position` in XY, the one whose plane is
  /// vertically closest wins.
  pub fn triangle_at<F: QueryFilter>(&self, position: Vec3, down: f32, up: f32, filter: &F) -> Option<TriangleId> {
    let min = position - Vec3::Z * down;
    let max = position + Vec3::Z * up;

    let mut best: Option<(TriangleId, f32)> = None;
    for id in self.query_triangles(min, max, filter, usize::MAX) {
      let Some([a, b, c]) = self.vertices(id) else {
        continue;
      };
      let p = position.truncate();
      if !point_in_triangle_2d(p, a.truncate(), b.truncate(), c.truncate()) {
        continue;
      }
      let height = (plane_height(position, a, b, c) - position.z).abs();
      if best.map_or(true, |(_, h)| height < h) {
        best = Some((id, height));
      }
    }
    best.map(|(id, _)| id)
  }

  /// Nearest passable triangle within `hrange` horizontally and `vrange`
  /// vertically.
  pub fn closest_triangle<F: QueryFilter>(
    &self,
    position: Vec3,
    vrange: f32,
    hrange: f32,
    filter: &F,
  ) -> Option<ClosestTriangle> {
    let extent = Vec3::new(hrange, hrange, vrange);
    let candidates = self.query_triangles(position - extent, position + extent, filter, usize::MAX);
    self.find_closest_triangle(position, &candidates)
  }

  /// Nearest of `candidates` to `position`.
  pub fn find_closest_triangle(&self, position: Vec3, candidates: &[TriangleId]) -> Option<ClosestTriangle> {
    let mut best: Option<ClosestTriangle> = None;
    for &id in candidates {
      let Some([a, b, c]) = self.vertices(id) else {
        continue;
      };
      let closest = closest_point_on_triangle(position, a, b, c);
      let distance = closest.distance(position);
      if best.map_or(true, |current| distance < current.distance) {
        best = Some(ClosestTriangle {
          id,
          position: closest,
          distance,
        });
      }
    }
    best
  }

  /// Edge slot of `from` that links to `to`.
  pub(crate) fn shared_edge(&self, from: TriangleId, to: TriangleId) -> Option<u8> {
    self
      .links(from)
      .iter()
      .filter(|l| !l.is_off_mesh())
      .find(|l| self.link_target(from, l).is_ok_and(|target| target == to))
      .map(|l| l.edge)
  }

  /// Mid point of the edge shared by two linked triangles.
  pub fn calculate_mid_edge(&self, t1: TriangleId, t2: TriangleId) -> Option<Vec3> {
    if t1 == t2 {
      return None;
    }
    let edge = self.shared_edge(t1, t2)? as usize;
    let verts = self.vertices(t1)?;
    Some((verts[edge] + verts[next_mod3(edge)]) * 0.5)
  }

  /// Crossing point on the edge between `from_tri` and `to_tri` for the
  /// straight move `from -> to`.
  ///
  /// The crossing is kept away from the edge ends; a move that misses the
  /// edge crosses near its first vertex.
  pub fn pull_string(&self, from: Vec3, from_tri: TriangleId, to: Vec3, to_tri: TriangleId) -> Option<Vec3> {
    let edge = self.shared_edge(from_tri, to_tri)? as usize;
    let verts = self.vertices(from_tri)?;
    let (v0, v1) = (verts[edge], verts[next_mod3(edge)]);

    let s = intersect_segment_segment_2d(v0.truncate(), v1.truncate(), from.truncate(), to.truncate())
      .map_or(0.0, |(s, _)| s)
      .clamp(MIN_PULLING_THRESHOLD, MAX_PULLING_THRESHOLD);
    Some(v0.lerp(v1, s))
  }
}

/// Height of the plane through `abc` at `p.xy`, `p.z` for vertical
/// triangles.
fn plane_height(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> f32 {
  let n = (b - a).cross(c - a);
  if n.z.abs() <= f32::EPSILON {
    return p.z;
  }
  a.z - (n.x * (p.x - a.x) + n.y * (p.y - a.y)) / n.z
}
