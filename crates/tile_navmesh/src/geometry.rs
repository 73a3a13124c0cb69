//! 2D/3D primitives shared by adjacency, A* and raycast.
//!
//! Navmesh triangles are walked in the XY plane (Z up) and wound
//! counter-clockwise when seen from above.

use glam::{Vec2, Vec3};

/// Slack for parametric tests at segment ends.
pub const PARAM_EPSILON: f32 = 1.0e-5;

/// Slack for comparing vertex coordinates on shared tile boundaries.
pub const COORD_EPSILON: f32 = 1.0e-4;

/// Triangles with less area than this are degenerate.
pub const MIN_TRIANGLE_AREA: f32 = 1.0e-6;

#[inline]
pub(crate) fn next_mod3(i: usize) -> usize {
  if i == 2 {
    0
  } else {
    i + 1
  }
}

#[inline]
pub(crate) fn prev_mod3(i: usize) -> usize {
  if i == 0 {
    2
  } else {
    i - 1
  }
}

#[inline]
pub(crate) fn same_coord(a: f32, b: f32) -> bool {
  (a - b).abs() <= COORD_EPSILON
}

/// 2D cross product `a.x * b.y - a.y * b.x`.
#[inline]
pub fn cross2(a: Vec2, b: Vec2) -> f32 {
  a.x * b.y - a.y * b.x
}

/// Area of a 3D triangle.
#[inline]
pub fn triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
  0.5 * (b - a).cross(c - a).length()
}

/// Whether `p` lies inside or on the border of triangle `abc`, either
/// winding.
pub fn point_in_triangle_2d(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
  let d0 = cross2(b - a, p - a);
  let d1 = cross2(c - b, p - b);
  let d2 = cross2(a - c, p - c);

  let has_neg = d0 < -PARAM_EPSILON || d1 < -PARAM_EPSILON || d2 < -PARAM_EPSILON;
  let has_pos = d0 > PARAM_EPSILON || d1 > PARAM_EPSILON || d2 > PARAM_EPSILON;
  !(has_neg && has_pos)
}

/// Intersection of segments `a0a1` and `b0b1` in 2D.
///
/// Returns the parameters `(s, t)` along `a` and `b` when they cross
/// within both segments, `None` for parallel or disjoint segments.
pub fn intersect_segment_segment_2d(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> Option<(f32, f32)> {
  let da = a1 - a0;
  let db = b1 - b0;
  let det = cross2(da, db);
  if det.abs() <= f32::EPSILON {
    return None;
  }

  let diff = b0 - a0;
  let s = cross2(diff, db) / det;
  let t = cross2(diff, da) / det;

  let lo = -PARAM_EPSILON;
  let hi = 1.0 + PARAM_EPSILON;
  if (lo..=hi).contains(&s) && (lo..=hi).contains(&t) {
    Some((s, t))
  } else {
    None
  }
}

/// Point of triangle `abc` closest to `p`.
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
  let ab = b - a;
  let ac = c - a;
  let ap = p - a;
  let d1 = ab.dot(ap);
  let d2 = ac.dot(ap);
  if d1 <= 0.0 && d2 <= 0.0 {
    return a;
  }

  let bp = p - b;
  let d3 = ab.dot(bp);
  let d4 = ac.dot(bp);
  if d3 >= 0.0 && d4 <= d3 {
    return b;
  }

  let vc = d1 * d4 - d3 * d2;
  if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
    let v = d1 / (d1 - d3);
    return a + ab * v;
  }

  let cp = p - c;
  let d5 = ab.dot(cp);
  let d6 = ac.dot(cp);
  if d6 >= 0.0 && d5 <= d6 {
    return c;
  }

  let vb = d5 * d2 - d1 * d6;
  if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
    let w = d2 / (d2 - d6);
    return a + ac * w;
  }

  let va = d3 * d6 - d5 * d4;
  if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
    let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
    return b + (c - b) * w;
  }

  let denom = 1.0 / (va + vb + vc);
  let v = vb * denom;
  let w = vc * denom;
  a + ab * v + ac * w
}

/// Where a ray leaves a triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeExit {
  /// Ray parameter of the exit, `1.0` when no exit edge was found.
  pub param: f32,
  /// Edge the ray leaves through.
  pub edge: Option<u8>,
  /// No edge is crossed before the ray end.
  pub ending_inside: bool,
}

/// Find the edge through which the ray `start -> end` leaves the CCW
/// triangle `verts`.
///
/// Only edges whose half-plane the ray is leaving (`cross(dir, edge) > 0`)
/// are candidates; the nearest one whose intersection actually lies on
/// the edge wins. Intersections at or past the ray end count as "ends
/// inside".
pub fn find_exit_edge(start: Vec2, end: Vec2, verts: &[Vec2; 3]) -> EdgeExit {
  let dir = end - start;
  let min_allowed = -PARAM_EPSILON;

  let mut exit = EdgeExit {
    param: 1.0,
    edge: None,
    ending_inside: true,
  };

  for edge in 0..3 {
    let e0 = verts[edge];
    let e1 = verts[next_mod3(edge)];
    let edge_dir = e1 - e0;
    let diff = e0 - start;

    let det = cross2(dir, edge_dir);
    let n = cross2(diff, edge_dir);

    if det > 0.0 {
      // n / det < param without dividing by a tiny det
      if n < exit.param * det {
        exit.ending_inside = false;

        let m = cross2(diff, dir);
        let max_allowed = det + PARAM_EPSILON;
        if m >= min_allowed && m <= max_allowed {
          exit.param = n / det;
          exit.edge = Some(edge as u8);
        }
      }
    } else if det == 0.0 && n < min_allowed {
      // Parallel and entirely outside this edge.
      exit.ending_inside = false;
    }
  }

  exit
}
