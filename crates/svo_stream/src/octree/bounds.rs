//! Axis-aligned bounding box for octree nodes and voxel cells.

use glam::Vec3;

/// Single-precision axis-aligned bounding box.
///
/// Octree node boxes are always cubes; voxel and triangle boxes need not be.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  /// Minimum corner (inclusive).
  pub min: Vec3,
  /// Maximum corner (inclusive).
  pub max: Vec3,
}

impl Aabb {
  /// Create a new AABB from min and max corners.
  ///
  /// # Panics
  /// Debug-asserts that min <= max on all axes.
  pub fn new(min: Vec3, max: Vec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  /// Cube with the given minimum corner and edge length.
  pub fn cube(min: Vec3, edge: f32) -> Self {
    Self {
      min,
      max: min + Vec3::splat(edge),
    }
  }

  /// Smallest box containing all points. Returns `None` for no points.
  pub fn from_points(points: &[Vec3]) -> Option<Self> {
    let (first, rest) = points.split_first()?;
    let mut aabb = Self {
      min: *first,
      max: *first,
    };
    for p in rest {
      aabb.add_point(*p);
    }
    Some(aabb)
  }

  /// Grow to include a point.
  #[inline]
  pub fn add_point(&mut self, p: Vec3) {
    self.min = self.min.min(p);
    self.max = self.max.max(p);
  }

  /// Check if this AABB overlaps with another.
  ///
  /// Two AABBs overlap if they share any interior or boundary points.
  #[inline]
  pub fn overlaps(&self, other: &Aabb) -> bool {
    self.min.x <= other.max.x
      && self.max.x >= other.min.x
      && self.min.y <= other.max.y
      && self.max.y >= other.min.y
      && self.min.z <= other.max.z
      && self.max.z >= other.min.z
  }

  /// Check if this AABB contains a point.
  #[inline]
  pub fn contains_point(&self, point: Vec3) -> bool {
    point.cmpge(self.min).all() && point.cmple(self.max).all()
  }

  /// Get the size of the AABB (max - min).
  #[inline]
  pub fn size(&self) -> Vec3 {
    self.max - self.min
  }

  /// Edge length along X. For node boxes this is the node size.
  #[inline]
  pub fn edge(&self) -> f32 {
    self.max.x - self.min.x
  }

  /// Get the center of the AABB.
  #[inline]
  pub fn center(&self) -> Vec3 {
    (self.min + self.max) * 0.5
  }

  /// Box grown by `amount` on every side.
  #[inline]
  pub fn expanded(&self, amount: Vec3) -> Self {
    Self {
      min: self.min - amount,
      max: self.max + amount,
    }
  }

  /// Box moved by `offset`.
  #[inline]
  pub fn translated(&self, offset: Vec3) -> Self {
    Self {
      min: self.min + offset,
      max: self.max + offset,
    }
  }

  /// Euclidean distance from `point` to the box (0 inside).
  #[inline]
  pub fn distance_to_point(&self, point: Vec3) -> f32 {
    let clamped = point.clamp(self.min, self.max);
    clamped.distance(point)
  }

  /// Octant `child_id` of this box.
  ///
  /// Child index bits: X = 4, Y = 2, Z = 1.
  pub fn child_box(&self, child_id: usize) -> Aabb {
    debug_assert!(child_id < 8);
    let x = ((child_id >> 2) & 1) as f32;
    let y = ((child_id >> 1) & 1) as f32;
    let z = (child_id & 1) as f32;
    let half = self.size() * 0.5;
    let min = self.min + half * Vec3::new(x, y, z);
    Aabb { min, max: min + half }
  }

  /// Octant of `point` relative to the box center.
  #[inline]
  pub fn child_index(&self, point: Vec3) -> usize {
    let c = self.center();
    (((point.x > c.x) as usize) << 2) | (((point.y > c.y) as usize) << 1) | ((point.z > c.z) as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new() {
    let aabb = Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -3.0));
    assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 3.0));
  }

  #[test]
  fn test_overlaps_touching() {
    // Touching at boundary should count as overlapping
    let a = Aabb::cube(Vec3::ZERO, 10.0);
    let b = Aabb::cube(Vec3::splat(10.0), 10.0);
    assert!(a.overlaps(&b));
    assert!(b.overlaps(&a));
  }

  #[test]
  fn test_overlaps_false() {
    let a = Aabb::cube(Vec3::ZERO, 10.0);
    let b = Aabb::new(Vec3::splat(11.0), Vec3::splat(20.0));
    assert!(!a.overlaps(&b));
  }

  #[test]
  fn test_from_points() {
    assert!(Aabb::from_points(&[]).is_none());
    let aabb = Aabb::from_points(&[Vec3::new(1.0, 5.0, -1.0), Vec3::new(-2.0, 0.0, 3.0)]).unwrap();
    assert_eq!(aabb.min, Vec3::new(-2.0, 0.0, -1.0));
    assert_eq!(aabb.max, Vec3::new(1.0, 5.0, 3.0));
  }

  #[test]
  fn test_distance_to_point() {
    let aabb = Aabb::cube(Vec3::ZERO, 10.0);
    assert_eq!(aabb.distance_to_point(Vec3::splat(5.0)), 0.0);
    assert_eq!(aabb.distance_to_point(Vec3::new(13.0, 5.0, 5.0)), 3.0);
  }

  #[test]
  fn test_child_box_bits() {
    let aabb = Aabb::cube(Vec3::ZERO, 8.0);
    assert_eq!(aabb.child_box(0), Aabb::cube(Vec3::ZERO, 4.0));
    assert_eq!(aabb.child_box(4), Aabb::cube(Vec3::new(4.0, 0.0, 0.0), 4.0));
    assert_eq!(aabb.child_box(2), Aabb::cube(Vec3::new(0.0, 4.0, 0.0), 4.0));
    assert_eq!(aabb.child_box(1), Aabb::cube(Vec3::new(0.0, 0.0, 4.0), 4.0));
    assert_eq!(aabb.child_box(7), Aabb::cube(Vec3::splat(4.0), 4.0));
  }

  #[test]
  fn test_child_index_matches_child_box() {
    let aabb = Aabb::cube(Vec3::ZERO, 8.0);
    for id in 0..8 {
      let center = aabb.child_box(id).center();
      assert_eq!(aabb.child_index(center), id);
    }
  }
}
