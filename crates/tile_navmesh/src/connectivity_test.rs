use glam::{UVec3, Vec2, Vec3};

use super::*;
use crate::params::ADJACENCY_TOLERANCE_SQ;

#[test]
fn test_opposite_sides_negate_offsets() {
  for side in 0..SIDE_COUNT {
    let opposite = opposite_side(side);
    assert_ne!(side, opposite);
    assert_eq!(opposite_side(opposite), side);
    assert_eq!(NEIGHBOUR_OFFSETS[side], -NEIGHBOUR_OFFSETS[opposite], "side {side}");
  }
}

#[test]
fn test_neighbour_coord_clamps_at_zero() {
  assert_eq!(neighbour_coord(UVec3::new(0, 0, 0), 0), Some(UVec3::new(1, 0, 0)));
  assert_eq!(neighbour_coord(UVec3::new(0, 0, 0), 7), None);
  assert_eq!(neighbour_coord(UVec3::new(1, 1, 1), 11), Some(UVec3::new(1, 0, 0)));
}

#[test]
fn test_overlap_1d() {
  assert!(edge_overlap_1d(0.0, 4.0, 4.0, 0.0, EDGE_OVERLAP_DX));
  assert!(edge_overlap_1d(0.0, 4.0, 2.0, 6.0, EDGE_OVERLAP_DX));
  // Touching at one end point only.
  assert!(!edge_overlap_1d(0.0, 4.0, 4.0, 8.0, EDGE_OVERLAP_DX));
  assert!(!edge_overlap_1d(0.0, 1.0, 2.0, 3.0, EDGE_OVERLAP_DX));
}

#[test]
fn test_overlap_2d_tolerance() {
  let a0 = Vec2::new(0.0, 1.0);
  let a1 = Vec2::new(4.0, 1.0);
  assert!(edge_overlap_2d(ADJACENCY_TOLERANCE_SQ, a0, a1, Vec2::new(1.0, 1.01), Vec2::new(3.0, 1.01), EDGE_OVERLAP_DX));
  assert!(!edge_overlap_2d(ADJACENCY_TOLERANCE_SQ, a0, a1, Vec2::new(1.0, 1.5), Vec2::new(3.0, 1.5), EDGE_OVERLAP_DX));
  // Sloped edges that cross are apart at the overlap ends.
  assert!(!edge_overlap_2d(ADJACENCY_TOLERANCE_SQ, a0, a1, Vec2::new(0.0, 0.0), Vec2::new(4.0, 2.0), EDGE_OVERLAP_DX));
}

#[test]
fn test_overlap_across_x_face() {
  // Edge on the x = 8 plane of one tile, and the neighbour's x = 0 edge
  // offset by one tile.
  let a0 = Vec3::new(8.0, 0.0, 1.0);
  let a1 = Vec3::new(8.0, 4.0, 1.0);
  let offset = neighbour_offset(0, Vec3::splat(8.0));
  let b0 = offset + Vec3::new(0.0, 4.0, 1.0);
  let b1 = offset + Vec3::new(0.0, 2.0, 1.0);
  assert!(edge_overlap(0, ADJACENCY_TOLERANCE_SQ, a0, a1, b0, b1));

  // Not on the shared plane.
  let c0 = offset + Vec3::new(0.5, 4.0, 1.0);
  let c1 = offset + Vec3::new(0.5, 2.0, 1.0);
  assert!(!edge_overlap(0, ADJACENCY_TOLERANCE_SQ, a0, a1, c0, c1));

  // Different height.
  let d0 = offset + Vec3::new(0.0, 4.0, 2.0);
  let d1 = offset + Vec3::new(0.0, 2.0, 2.0);
  assert!(!edge_overlap(0, ADJACENCY_TOLERANCE_SQ, a0, a1, d0, d1));
}

#[test]
fn test_overlap_across_z_face() {
  let a0 = Vec3::new(1.0, 1.0, 8.0);
  let a1 = Vec3::new(5.0, 1.0, 8.0);
  let offset = neighbour_offset(6, Vec3::splat(8.0));
  let b0 = offset + Vec3::new(5.0, 1.0, 0.0);
  let b1 = offset + Vec3::new(1.0, 1.0, 0.0);
  assert!(edge_overlap(6, ADJACENCY_TOLERANCE_SQ, a0, a1, b0, b1));
}

#[test]
fn test_tile_connectivity_quad() {
  // 3 --- 2
  // | 1 / |
  // | / 0 |
  // 0 --- 1
  let triangles = [Triangle::new([0, 1, 2]), Triangle::new([0, 2, 3])];
  let conn = TileConnectivity::compute(&triangles);

  assert_eq!(conn.edges.len(), 5);
  let diagonal = conn.edge(0, 2);
  assert!(diagonal.is_internal_of(0));
  assert!(diagonal.is_internal_of(1));
  assert_eq!(diagonal.other(0), 1);
  assert_eq!(diagonal.slot, [2, 0]);
  assert_eq!(conn.edge(1, 0), diagonal);

  assert!(conn.edge(0, 0).is_boundary_of(0));
  assert!(!conn.edge(0, 0).is_internal_of(0));
}

#[test]
fn test_non_manifold_edge_stays_boundary() {
  let triangles = [Triangle::new([0, 1, 2]), Triangle::new([1, 0, 3]), Triangle::new([0, 1, 4])];
  let conn = TileConnectivity::compute(&triangles);

  assert!(conn.edge(0, 0).is_internal_of(1));
  assert!(conn.edge(2, 0).is_boundary_of(2));
}
