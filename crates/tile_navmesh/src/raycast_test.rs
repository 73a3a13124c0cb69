use glam::{UVec3, Vec3};
use proptest::prelude::*;

use super::*;
use crate::filter::{AcceptAll, AreaAnnotation, FlagsFilter};
use crate::test_utils::*;

fn start_triangle(grid: &TileGrid, p: Vec3) -> TriangleId {
  grid.triangle_at(p, 1.0, 1.0, &AcceptAll).unwrap()
}

fn cast(grid: &TileGrid, from: Vec3, to: Vec3) -> RaycastResult {
  grid.ray_cast(from, start_triangle(grid, from), to, &AcceptAll, &RaycastRequest::default())
}

#[test]
fn test_ray_inside_quad_has_no_hit() {
  let (grid, ids) = floor_row(1);
  let result = cast(&grid, Vec3::new(1.0, 2.0, 1.0), Vec3::new(6.0, 5.0, 1.0));

  assert_eq!(result.status, RaycastStatus::NoHit);
  assert_eq!(result.hit.distance, 1.0);
  assert_eq!(result.hit.edge, None);
  assert_eq!(result.way, vec![tri(ids[0], 1), tri(ids[0], 0)]);
}

#[test]
fn test_ray_inside_clockwise_quad_has_no_hit() {
  let vertices = vec![
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(TILE, 0.0, 1.0),
    Vec3::new(TILE, TILE, 1.0),
    Vec3::new(0.0, TILE, 1.0),
  ];
  let tile = crate::tile::Tile::from_indices(vertices, &[[0, 2, 1], [0, 3, 2]]).unwrap();
  let (grid, ids) = grid_of(vec![(UVec3::ZERO, tile)]);
  let result = cast(&grid, Vec3::new(1.0, 2.0, 1.0), Vec3::new(6.0, 5.0, 1.0));

  assert_eq!(result.status, RaycastStatus::NoHit);
  assert_eq!(result.hit.distance, 1.0);
  assert_eq!(result.way, vec![tri(ids[0], 1), tri(ids[0], 0)]);
}

#[test]
fn test_ray_leaving_mesh_hits_boundary_edge() {
  let (grid, ids) = floor_row(1);
  let result = cast(&grid, Vec3::new(6.0, 2.0, 1.0), Vec3::new(12.0, 2.0, 1.0));

  assert!(result.is_hit());
  assert_eq!(result.hit.triangle, tri(ids[0], 0));
  assert_eq!(result.hit.edge, Some(1));
  assert!((result.hit.distance - 1.0 / 3.0).abs() < 1e-5);
  assert_eq!(result.way, vec![tri(ids[0], 0)]);
}

#[test]
fn test_ray_crosses_tile_seam() {
  let (grid, ids) = floor_row(2);
  let result = cast(&grid, Vec3::new(2.0, 4.0, 1.0), Vec3::new(14.0, 4.0, 1.0));

  assert_eq!(result.status, RaycastStatus::NoHit);
  assert_eq!(
    result.way,
    vec![tri(ids[0], 1), tri(ids[0], 0), tri(ids[1], 1), tri(ids[1], 0)]
  );
}

#[test]
fn test_filtered_neighbour_blocks_ray() {
  let (mut grid, ids) = floor_row(2);
  grid.set_triangles_annotation(&[tri(ids[1], 0), tri(ids[1], 1)], AreaAnnotation::new(1, 0b100));
  let filter = FlagsFilter::default().excluding(0b100);

  let from = Vec3::new(2.0, 4.0, 1.0);
  let result = grid.ray_cast(
    from,
    start_triangle(&grid, from),
    Vec3::new(14.0, 4.0, 1.0),
    &filter,
    &RaycastRequest::default(),
  );

  assert!(result.is_hit());
  assert_eq!(result.hit.triangle, tri(ids[0], 0));
  assert_eq!(result.hit.edge, Some(1));
  assert!((result.hit.distance - 0.5).abs() < 1e-5);
}

#[test]
fn test_invalid_start() {
  let (grid, ids) = floor_row(1);
  let result = grid.ray_cast(
    Vec3::new(2.0, 6.0, 1.0),
    tri(ids[0], 0),
    Vec3::new(4.0, 6.0, 1.0),
    &AcceptAll,
    &RaycastRequest::default(),
  );
  assert_eq!(result.status, RaycastStatus::InvalidStart);
  assert!(result.way.is_empty());
}

#[test]
fn test_ray_too_long() {
  let (grid, ids) = floor_row(2);
  let from = Vec3::new(2.0, 4.0, 1.0);
  let request = RaycastRequest {
    max_way: 2,
    ..RaycastRequest::default()
  };
  let result = grid.ray_cast(from, start_triangle(&grid, from), Vec3::new(14.0, 4.0, 1.0), &AcceptAll, &request);
  assert_eq!(result.status, RaycastStatus::RayTooLong);
  // The tail of the walk, still ordered start to end.
  assert_eq!(result.way, vec![tri(ids[1], 1), tri(ids[1], 0)]);
}

#[test]
fn test_disconnected_islands() {
  let (mut grid, ids) = grid_of(vec![(UVec3::ZERO, quad_tile(1.0)), (UVec3::new(2, 0, 0), quad_tile(1.0))]);
  grid.compute_islands();

  let from = Vec3::new(2.0, 4.0, 1.0);
  let request = RaycastRequest {
    to_triangle: Some(tri(ids[1], 0)),
    ..RaycastRequest::default()
  };
  let result = grid.ray_cast(from, start_triangle(&grid, from), Vec3::new(22.0, 4.0, 1.0), &AcceptAll, &request);
  assert_eq!(result.status, RaycastStatus::Disconnected);
}

proptest! {
  /// Any segment strictly inside a flat convex quad stays on the mesh.
  #[test]
  fn prop_convex_quad_rays_never_hit(
    x0 in 0.1f32..7.9, y0 in 0.1f32..7.9,
    x1 in 0.1f32..7.9, y1 in 0.1f32..7.9,
  ) {
    let (grid, _) = floor_row(1);
    let result = cast(&grid, Vec3::new(x0, y0, 1.0), Vec3::new(x1, y1, 1.0));
    prop_assert_eq!(result.status, RaycastStatus::NoHit);
    prop_assert_eq!(result.hit.distance, 1.0);
  }
}
