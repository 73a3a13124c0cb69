use glam::{UVec3, Vec3};

use super::*;
use crate::filter::{AcceptAll, FlagsFilter};
use crate::test_utils::*;

// =============================================================================
// Tile lifecycle
// =============================================================================

#[test]
fn test_set_tile_allocates_and_counts() {
  let (grid, ids) = floor_row(2);

  assert_eq!(ids, vec![TileId(1), TileId(2)]);
  assert_eq!(grid.tile_id(UVec3::new(1, 0, 0)), Some(TileId(2)));
  assert_eq!(grid.tile_coord(TileId(2)), Some(UVec3::new(1, 0, 0)));

  let stats = grid.stats();
  assert_eq!(stats.tile_count, 2);
  assert_eq!(stats.triangle_count, 4);
  assert_eq!(stats.vertex_count, 8);
  // One internal link per triangle plus one boundary link each way.
  assert_eq!(stats.link_count, 6);
  assert!(stats.total_memory() > 0);
  assert!(stats.network_builds > 0);
}

#[test]
fn test_replace_keeps_tile_id() {
  let (mut grid, ids) = floor_row(1);
  let replaced = grid.set_tile(UVec3::ZERO, strip_tile()).unwrap();

  assert_eq!(replaced, ids[0]);
  assert_eq!(grid.tile_count(), 1);
  assert_eq!(grid.stats().triangle_count, 4);
  assert_eq!(grid.stats().vertex_count, 6);
  // Links of the old tile are gone with it.
  assert_eq!(grid.stats().link_count, 0);
}

#[test]
fn test_clear_recycles_container() {
  let (mut grid, ids) = floor_row(2);
  grid.clear_tile(ids[1], true).unwrap();

  assert_eq!(grid.tile_count(), 1);
  assert_eq!(grid.stats().triangle_count, 2);
  assert!(grid.tile(ids[1]).is_none());
  assert!(grid.clear_tile(ids[1], true).is_err());

  let reused = grid.set_tile(UVec3::new(5, 0, 0), quad_tile(0.0)).unwrap();
  assert_eq!(reused, ids[1]);
  assert_eq!(grid.container_count(), 2);
}

#[test]
fn test_rejects_coordinate_outside_grid() {
  let mut grid = TileGrid::new(params()).unwrap();
  let err = grid.set_tile(UVec3::new(0, 5000, 0), quad_tile(0.0)).unwrap_err();
  assert!(matches!(err, NavMeshError::Precondition(_)));
}

// =============================================================================
// Adjacency
// =============================================================================

#[test]
fn test_boundary_links_are_reciprocal() {
  let (grid, ids) = floor_row(3);
  grid.verify_adjacency().unwrap();

  // Right edge of tile 0's lower triangle meets the left edge of tile 1's
  // upper triangle.
  let links = grid.links(tri(ids[0], 0));
  let boundary: Vec<_> = links.iter().filter(|l| l.is_boundary()).collect();
  assert_eq!(boundary.len(), 1);
  assert_eq!(boundary[0].side, 0);
  assert_eq!(boundary[0].edge, 1);
  assert_eq!(grid.link_target(tri(ids[0], 0), boundary[0]).unwrap(), tri(ids[1], 1));

  // The middle tile links both ways.
  let middle = [tri(ids[1], 0), tri(ids[1], 1)]
    .iter()
    .flat_map(|&t| grid.links(t).iter().filter(|l| l.is_boundary()).map(|l| l.side))
    .collect::<Vec<_>>();
  assert!(middle.contains(&0));
  assert!(middle.contains(&7));
}

#[test]
fn test_clear_with_network_drops_neighbour_links() {
  let (mut grid, ids) = floor_row(3);
  grid.clear_tile(ids[1], true).unwrap();

  for t in [tri(ids[0], 0), tri(ids[0], 1), tri(ids[2], 0), tri(ids[2], 1)] {
    assert!(grid.links(t).iter().all(|l| !l.is_boundary()), "{t:?}");
  }
  grid.verify_adjacency().unwrap();
  assert_eq!(grid.stats().link_count, 4);
}

#[test]
fn test_clear_without_network_leaves_dangling_links() {
  let (mut grid, ids) = floor_row(2);
  grid.clear_tile(ids[1], false).unwrap();

  let from = tri(ids[0], 0);
  let dangling = *grid.links(from).iter().find(|l| l.is_boundary()).unwrap();
  assert!(matches!(
    grid.link_target(from, &dangling),
    Err(NavMeshError::MalformedGeometry(_))
  ));
  assert!(grid.verify_adjacency().is_err());
}

#[test]
fn test_reconnect_restores_links() {
  let (mut grid, ids) = floor_row(2);
  grid.clear_tile(ids[1], true).unwrap();

  let id = grid.set_tile(UVec3::new(1, 0, 0), quad_tile(1.0)).unwrap();
  grid.connect_to_network(id, None).unwrap();

  grid.verify_adjacency().unwrap();
  assert_eq!(grid.stats().link_count, 6);
}

#[test]
fn test_tiles_at_different_heights_do_not_connect() {
  let (grid, ids) = grid_of(vec![(UVec3::ZERO, quad_tile(1.0)), (UVec3::new(1, 0, 0), quad_tile(3.0))]);
  assert!(grid.links(tri(ids[0], 0)).iter().all(|l| !l.is_boundary()));
}

#[test]
fn test_create_network_matches_incremental_links() {
  let mut grid = TileGrid::new(params()).unwrap();
  for x in 0..3 {
    grid.set_tile(UVec3::new(x, 0, 0), quad_tile(1.0)).unwrap();
  }
  grid.create_network().unwrap();

  let (incremental, _) = floor_row(3);
  assert_eq!(grid.stats().link_count, incremental.stats().link_count);
  grid.verify_adjacency().unwrap();
}

#[test]
fn test_precomputed_connectivity() {
  let mut grid = TileGrid::new(params()).unwrap();
  let tile = quad_tile(0.0);
  let connectivity = crate::connectivity::TileConnectivity::compute(tile.triangles());
  let id = grid.set_tile(UVec3::ZERO, tile).unwrap();
  grid.connect_to_network(id, Some(&connectivity)).unwrap();
  assert_eq!(grid.links(tri(id, 0)), &[Link::internal(2, 1)]);

  let wrong = crate::connectivity::TileConnectivity::compute(strip_tile().triangles());
  assert!(matches!(
    grid.connect_to_network(id, Some(&wrong)),
    Err(NavMeshError::MalformedGeometry(_))
  ));
}

// =============================================================================
// Off-mesh links and annotations
// =============================================================================

#[test]
fn test_off_mesh_links_survive_rebuilds() {
  let (mut grid, ids) = floor_row(2);
  let t = tri(ids[0], 1);
  let before = grid.stats().link_count;

  grid.add_off_mesh_link(t, 7).unwrap();
  assert_eq!(grid.stats().link_count, before + 1);
  grid.connect_to_network(ids[0], None).unwrap();
  assert!(grid.links(t).contains(&Link::off_mesh(7)));

  grid.update_off_mesh_link(t, 9).unwrap();
  assert!(grid.links(t).contains(&Link::off_mesh(9)));

  grid.remove_off_mesh_link(t).unwrap();
  assert!(grid.links(t).iter().all(|l| !l.is_off_mesh()));
  assert_eq!(grid.stats().link_count, before);
  grid.verify_adjacency().unwrap();
}

#[test]
fn test_annotation_painting() {
  let (mut grid, ids) = floor_row(1);
  let blocked = AreaAnnotation::new(3, 0b10);

  assert_eq!(grid.set_triangles_annotation(&[tri(ids[0], 0)], blocked), vec![ids[0]]);
  assert!(grid.set_triangles_annotation(&[tri(ids[0], 0)], blocked).is_empty());
  assert_eq!(grid.triangle(tri(ids[0], 0)).unwrap().annotation, blocked);

  let filter = FlagsFilter::default().excluding(0b10);
  let found = grid.query_triangles(Vec3::ZERO, Vec3::new(8.0, 8.0, 2.0), &filter, 16);
  assert_eq!(found, vec![tri(ids[0], 1)]);
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_query_triangles_respects_max_count() {
  let (grid, _) = floor_row(2);
  // Two leaves and one root per tile.
  assert_eq!(grid.stats().bv_node_count, 6);

  let all = grid.query_triangles(Vec3::ZERO, Vec3::new(16.0, 8.0, 2.0), &AcceptAll, usize::MAX);
  assert_eq!(all.len(), 4);
  let some = grid.query_triangles(Vec3::ZERO, Vec3::new(16.0, 8.0, 2.0), &AcceptAll, 3);
  assert_eq!(some.len(), 3);
  assert!(grid.query_triangles(Vec3::ZERO, Vec3::ONE, &AcceptAll, 0).is_empty());
}

#[test]
fn test_triangle_at() {
  let (grid, ids) = floor_row(1);
  assert_eq!(grid.triangle_at(Vec3::new(6.0, 2.0, 1.5), 2.0, 2.0, &AcceptAll), Some(tri(ids[0], 0)));
  assert_eq!(grid.triangle_at(Vec3::new(2.0, 6.0, 1.0), 2.0, 2.0, &AcceptAll), Some(tri(ids[0], 1)));
  // Floor is out of the vertical range.
  assert_eq!(grid.triangle_at(Vec3::new(2.0, 6.0, 4.0), 1.0, 1.0, &AcceptAll), None);
  assert!(grid.is_location_in_triangle(Vec3::new(6.0, 2.0, 0.0), tri(ids[0], 0)));
  assert!(!grid.is_location_in_triangle(Vec3::new(2.0, 6.0, 0.0), tri(ids[0], 0)));
}

#[test]
fn test_closest_triangle() {
  let (grid, ids) = floor_row(1);
  let closest = grid.closest_triangle(Vec3::new(4.0, -1.0, 1.0), 2.0, 2.0, &AcceptAll).unwrap();

  assert_eq!(closest.id, tri(ids[0], 0));
  assert!(closest.position.distance(Vec3::new(4.0, 0.0, 1.0)) < 1e-5);
  assert!((closest.distance - 1.0).abs() < 1e-5);

  assert!(grid.closest_triangle(Vec3::new(4.0, -10.0, 1.0), 2.0, 2.0, &AcceptAll).is_none());
}

#[test]
fn test_mid_edge_and_pull_string() {
  let (grid, ids) = floor_row(2);
  let (a, b) = (tri(ids[0], 0), tri(ids[0], 1));

  let mid = grid.calculate_mid_edge(a, b).unwrap();
  assert!(mid.distance(Vec3::new(4.0, 4.0, 1.0)) < 1e-5);
  assert!(grid.calculate_mid_edge(a, a).is_none());

  let crossing = grid.pull_string(Vec3::new(6.0, 2.0, 1.0), a, Vec3::new(2.0, 6.0, 1.0), b).unwrap();
  assert!(crossing.distance(Vec3::new(4.0, 4.0, 1.0)) < 1e-4);

  // Across the tile seam at x = 8.
  let seam = grid.calculate_mid_edge(a, tri(ids[1], 1)).unwrap();
  assert!(seam.distance(Vec3::new(8.0, 4.0, 1.0)) < 1e-5);

  // Unlinked triangles.
  assert!(grid.pull_string(Vec3::ZERO, a, Vec3::ONE, tri(ids[1], 0)).is_none());
}

// =============================================================================
// Islands
// =============================================================================

#[test]
fn test_islands_and_min_area_filter() {
  let (mut grid, ids) = grid_of(vec![(UVec3::ZERO, quad_tile(1.0)), (UVec3::new(2, 0, 0), quad_tile(1.0))]);
  assert_eq!(grid.compute_islands(), 2);

  let (i0, i1) = (grid.island_of(tri(ids[0], 0)), grid.island_of(tri(ids[1], 0)));
  assert!(i0.is_some() && i1.is_some());
  assert_ne!(i0, i1);
  assert_eq!(grid.island_of(tri(ids[0], 1)), i0);
  assert!((grid.islands().island_area(i0).unwrap() - 64.0).abs() < 1e-3);

  let big = MinIslandArea::new(&grid, AcceptAll, 100.0);
  assert!(grid.query_triangles(Vec3::ZERO, Vec3::splat(24.0), &big, 16).is_empty());
  let small = MinIslandArea::new(&grid, AcceptAll, 50.0);
  assert_eq!(grid.query_triangles(Vec3::ZERO, Vec3::splat(24.0), &small, 16).len(), 4);

  // Bridging tile merges both.
  let bridge = grid.set_tile(UVec3::new(1, 0, 0), quad_tile(1.0)).unwrap();
  grid.connect_to_network(bridge, None).unwrap();
  assert_eq!(grid.compute_islands(), 1);
  let island = grid.island_of(tri(ids[1], 1));
  assert!((grid.islands().island_area(island).unwrap() - 192.0).abs() < 1e-2);
}
