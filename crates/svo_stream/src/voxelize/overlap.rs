//! Triangle / box overlap by the separating axis theorem.
//!
//! Thirteen candidate axes: the three box normals, the triangle normal and
//! the nine cross products of box axes with triangle edges. Touching counts
//! as overlap, so a triangle lying on a shared face is binned into both
//! cells.

use glam::Vec3;

use crate::octree::Aabb;

const AXIS_EPSILON: f32 = 1e-12;

/// Whether triangle `v` overlaps `bounds` (inclusive).
pub fn triangle_overlaps_box(bounds: &Aabb, v: &[Vec3; 3]) -> bool {
  let center = bounds.center();
  let half = bounds.size() * 0.5;
  let p = [v[0] - center, v[1] - center, v[2] - center];

  // Box normals: compare the triangle's own extent.
  let tri_min = p[0].min(p[1]).min(p[2]);
  let tri_max = p[0].max(p[1]).max(p[2]);
  if tri_min.cmpgt(half).any() || tri_max.cmplt(-half).any() {
    return false;
  }

  let edges = [p[1] - p[0], p[2] - p[1], p[0] - p[2]];

  for edge in &edges {
    for box_axis in [Vec3::X, Vec3::Y, Vec3::Z] {
      if separated_on(box_axis.cross(*edge), &p, half) {
        return false;
      }
    }
  }

  !separated_on(edges[0].cross(edges[1]), &p, half)
}

/// Projections of the triangle and the box onto `axis` do not touch.
#[inline]
fn separated_on(axis: Vec3, p: &[Vec3; 3], half: Vec3) -> bool {
  if axis.length_squared() <= AXIS_EPSILON {
    return false;
  }
  let d0 = p[0].dot(axis);
  let d1 = p[1].dot(axis);
  let d2 = p[2].dot(axis);
  let radius = half.dot(axis.abs());
  d0.min(d1).min(d2) > radius || d0.max(d1).max(d2) < -radius
}

/// Bounding box of a triangle.
#[inline]
pub fn triangle_bounds(v: &[Vec3; 3]) -> Aabb {
  Aabb::new(v[0].min(v[1]).min(v[2]), v[0].max(v[1]).max(v[2]))
}
