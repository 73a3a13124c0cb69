use glam::Vec3;
use proptest::prelude::*;

use super::*;
use crate::octree::arena::Arena;

fn root_node() -> OctreeNode {
  OctreeNode::new(Aabb::cube(Vec3::ZERO, 1024.0), None)
}

// =========================================================================
// Child slots
// =========================================================================

#[test]
fn test_child_slots_track_ownership() {
  let mut arena = Arena::new();
  let mut root = root_node();
  assert!(!root.has_children());

  let child = arena.insert(OctreeNode::new(root.child_bounds(5), None));
  let child_ref = child.downgrade();
  assert!(root.set_child(5, child).is_none());

  assert!(root.has_child(5));
  assert_eq!(root.child(5), Some(child_ref));
  assert_eq!(root.child_refs().collect::<Vec<_>>(), vec![(5, child_ref)]);

  let taken = root.take_child(5).unwrap();
  assert_eq!(taken.downgrade(), child_ref);
  assert!(!root.has_children());
}

#[test]
fn test_not_needed_bits() {
  let mut node = root_node();
  node.set_child_not_needed(3, true);
  node.set_child_not_needed(6, true);
  assert_eq!(node.child_not_needed_mask(), 0b0100_1000);

  node.move_child_not_needed(6, 2);
  assert!(node.is_child_not_needed(2));
  assert!(!node.is_child_not_needed(6));
  node.set_child_not_needed(3, false);
  assert_eq!(node.child_not_needed_mask(), 0b0000_0100);
}

#[test]
fn test_camera_order_starts_with_nearest_octant() {
  let node = root_node();
  let order = node.camera_order(Vec3::new(900.0, 100.0, 900.0));
  assert_eq!(order[0], 0b101);
  assert_eq!(order, [5, 4, 7, 1, 6, 0, 3, 2]);

  let mut seen = order.to_vec();
  seen.sort_unstable();
  assert_eq!(seen, (0..8).collect::<Vec<_>>());
}

#[test]
fn test_child_bounds_are_octants() {
  let node = root_node();
  let b = node.child_bounds(0b110);
  assert_eq!(b.min, Vec3::new(512.0, 512.0, 0.0));
  assert_eq!(b.max, Vec3::new(1024.0, 1024.0, 512.0));
  assert_eq!(b.edge(), node.size() * 0.5);
}

// =========================================================================
// Child addressing: point inside a node maps to a child that contains it
// =========================================================================

proptest! {
  #[test]
  fn prop_child_index_contains_point(
    min in prop::array::uniform3(-4096i32..4096),
    log_size in 0u32..12,
    t in prop::array::uniform3(0.001f32..0.999),
  ) {
    let size = (1u32 << log_size) as f32;
    let min = Vec3::new(min[0] as f32, min[1] as f32, min[2] as f32);
    let node = OctreeNode::new(Aabb::cube(min, size), None);
    let p = min + Vec3::new(t[0], t[1], t[2]) * size;
    prop_assume!(node.bounds.contains_point(p));

    let child_id = node.bounds.child_index(p);
    prop_assert!(child_id < 8);
    let child = node.child_bounds(child_id);
    prop_assert!(child.contains_point(p), "child {child_id} {child:?} misses {p}");
  }
}
