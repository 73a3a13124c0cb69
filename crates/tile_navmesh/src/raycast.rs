//! Raycaster - straight-line walk across triangles.
//!
//! ```text
//!   start tri ──find_exit_edge──► edge e ──link on e──► neighbour tri ──► ...
//!       │                            │
//!       └─ ray ends inside: NoHit    └─ no passable neighbour: Hit(e)
//! ```
//!
//! The ray is tested in the XY plane. Every crossed triangle is recorded
//! with the triangle it was entered from; entering one twice stops the walk
//! as a hit.

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::connectivity::opposite_side;
use crate::filter::QueryFilter;
use crate::geometry::{find_exit_edge, intersect_segment_segment_2d, next_mod3};
use crate::grid::TileGrid;
use crate::ids::TriangleId;

/// Outcome of a raycast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaycastStatus {
  /// The ray stayed on the mesh up to its end.
  NoHit,
  /// The ray left the mesh; see [`RaycastResult::hit`].
  Hit,
  /// The start position is not inside the start triangle.
  InvalidStart,
  /// More triangles were crossed than the caller allowed.
  RayTooLong,
  /// Start and end triangles lie on different islands.
  Disconnected,
}

/// Last edge crossed (or blocked) by the ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
  pub triangle: TriangleId,
  /// Edge of `triangle` the ray left through, `None` when it ended inside.
  pub edge: Option<u8>,
  /// Ray parameter in `[0, 1]` of the furthest crossing.
  pub distance: f32,
}

impl Default for RayHit {
  fn default() -> Self {
    Self {
      triangle: TriangleId::INVALID,
      edge: None,
      distance: 0.0,
    }
  }
}

/// Result of [`TileGrid::ray_cast`].
#[derive(Clone, Debug, PartialEq)]
pub struct RaycastResult {
  pub status: RaycastStatus,
  pub hit: RayHit,
  /// Triangles crossed, in walk order from start to end. On
  /// [`RaycastStatus::RayTooLong`] only the last `max_way` are kept.
  pub way: Vec<TriangleId>,
}

impl RaycastResult {
  fn status_only(status: RaycastStatus) -> Self {
    Self {
      status,
      hit: RayHit::default(),
      way: Vec::new(),
    }
  }

  #[inline]
  pub fn is_hit(&self) -> bool {
    self.status == RaycastStatus::Hit
  }
}

/// Raycast inputs beyond the segment itself.
#[derive(Clone, Copy, Debug)]
pub struct RaycastRequest {
  /// Most triangles the ray may cross before `RayTooLong`.
  pub max_way: usize,
  /// End triangle, when known, for the island check.
  pub to_triangle: Option<TriangleId>,
}

impl Default for RaycastRequest {
  fn default() -> Self {
    Self {
      max_way: 512,
      to_triangle: None,
    }
  }
}

impl TileGrid {
  /// Walk the segment `from -> to` (mesh-local) starting at `from_triangle`.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "navmesh::ray_cast"))]
  pub fn ray_cast<F: QueryFilter>(
    &self,
    from: Vec3,
    from_triangle: TriangleId,
    to: Vec3,
    filter: &F,
    request: &RaycastRequest,
  ) -> RaycastResult {
    if !self.is_location_in_triangle(from, from_triangle) {
      return RaycastResult::status_only(RaycastStatus::InvalidStart);
    }
    if let Some(to_triangle) = request.to_triangle {
      let (a, b) = (self.island_of(from_triangle), self.island_of(to_triangle));
      if a.is_some() && b.is_some() && a != b {
        return RaycastResult::status_only(RaycastStatus::Disconnected);
      }
    }

    let (start, end) = (from.truncate(), to.truncate());
    let mut came_from: HashMap<TriangleId, TriangleId> = HashMap::new();
    let mut hit = RayHit::default();
    let mut current = Some(from_triangle);

    while let Some(triangle) = current {
      let Some(verts) = self.vertices(triangle) else {
        log::warn!("ray_cast reached missing triangle {triangle:?}");
        break;
      };
      let verts2 = verts.map(|v| v.truncate());
      let exit = find_exit_edge(start, end, &verts2);

      let Some(edge) = exit.edge else {
        if exit.ending_inside {
          hit = RayHit {
            triangle,
            edge: None,
            distance: 1.0,
          };
          return self.raycast_result(RaycastStatus::NoHit, hit, triangle, &came_from, request);
        }
        // Outside every edge without crossing one: the ray starts on a border.
        hit.triangle = triangle;
        hit.edge = None;
        return self.raycast_result(RaycastStatus::Hit, hit, triangle, &came_from, request);
      };

      hit.triangle = triangle;
      hit.edge = Some(edge);
      hit.distance = hit.distance.max(exit.param);

      current = self
        .step_over_edge(start, end, triangle, edge, filter)
        .filter(|&next| next != from_triangle)
        .filter(|&next| match came_from.entry(next) {
          std::collections::hash_map::Entry::Occupied(_) => {
            log::warn!("ray_cast revisited {next:?}, stopping");
            false
          }
          std::collections::hash_map::Entry::Vacant(slot) => {
            slot.insert(triangle);
            true
          }
        });
    }

    self.raycast_result(RaycastStatus::Hit, hit, hit.triangle, &came_from, request)
  }

  /// Passable triangle across `edge` of `current` that the ray enters.
  fn step_over_edge<F: QueryFilter>(
    &self,
    start: Vec2,
    end: Vec2,
    current: TriangleId,
    edge: u8,
    filter: &F,
  ) -> Option<TriangleId> {
    for link in self.links(current).iter().filter(|l| l.edge == edge && !l.is_off_mesh()) {
      let target = match self.link_target(current, link) {
        Ok(target) => target,
        Err(err) => {
          log::warn!("ray_cast skipped a link of {current:?}: {err}");
          continue;
        }
      };
      let passes = self.triangle(target).is_some_and(|t| filter.pass_filter(t));

      if link.is_internal() {
        return passes.then_some(target);
      }
      if !passes {
        continue;
      }

      // A boundary edge may border several neighbour triangles; take the one
      // whose reciprocal edge the ray actually crosses.
      let back = opposite_side(link.side as usize) as u8;
      let Some(neighbour_verts) = self.vertices(target) else {
        continue;
      };
      let crosses = self
        .links(target)
        .iter()
        .filter(|l| l.side == back && l.triangle == current.local_index())
        .any(|l| {
          let i0 = l.edge as usize;
          let (e0, e1) = (neighbour_verts[i0], neighbour_verts[next_mod3(i0)]);
          intersect_segment_segment_2d(start, end, e0.truncate(), e1.truncate()).is_some()
        });
      if crosses {
        return Some(target);
      }
    }
    None
  }

  /// Rebuild the crossed triangles from `last` back to the start.
  fn raycast_result(
    &self,
    status: RaycastStatus,
    hit: RayHit,
    last: TriangleId,
    came_from: &HashMap<TriangleId, TriangleId>,
    request: &RaycastRequest,
  ) -> RaycastResult {
    let mut way = Vec::new();
    let mut current = last;
    let mut status = status;
    loop {
      if way.len() >= request.max_way {
        status = RaycastStatus::RayTooLong;
        break;
      }
      way.push(current);
      match came_from.get(&current) {
        Some(&prev) => current = prev,
        None => break,
      }
    }
    way.reverse();
    RaycastResult { status, hit, way }
  }
}

#[cfg(test)]
#[path = "raycast_test.rs"]
mod raycast_test;
