use std::cell::Cell;

use glam::{UVec3, Vec3};

use super::*;
use crate::filter::{AreaAnnotation, FlagsFilter};
use crate::ids::{OffMeshLinkId, TileId};
use crate::test_utils::*;

fn centroid(grid: &TileGrid, id: TriangleId) -> Vec3 {
  let [a, b, c] = grid.vertices(id).unwrap();
  (a + b + c) / 3.0
}

fn strip() -> (TileGrid, TileId) {
  let (grid, ids) = grid_of(vec![(UVec3::ZERO, strip_tile())]);
  (grid, ids[0])
}

fn triangles(result: &WayQueryResult) -> Vec<TriangleId> {
  result.way().iter().map(|w| w.triangle).collect()
}

#[test]
fn test_strip_shortest_way() {
  let (grid, tile) = strip();
  let (from, to) = (tri(tile, 0), tri(tile, 3));
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to);

  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let mut ws = WayQueryWorkingSet::new();
  let mut result = WayQueryResult::new(64);

  assert_eq!(finder.find_way(&request, &mut ws, &mut result).unwrap(), WayQueryStatus::Done);
  assert_eq!(
    triangles(&result),
    vec![tri(tile, 0), tri(tile, 1), tri(tile, 2), tri(tile, 3)]
  );
  assert!(result.way().iter().all(|w| w.off_mesh_link == INVALID_OFF_MESH_LINK));
  assert!(!ws.can_do_step());
}

#[test]
fn test_one_step_per_call() {
  let (grid, tile) = strip();
  let (from, to) = (tri(tile, 0), tri(tile, 3));
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to);

  let finder = PathFinder::new(&grid, PathfinderConfig::default().with_max_steps(1));
  let mut ws = WayQueryWorkingSet::new();
  let mut result = WayQueryResult::new(64);

  let mut calls = 0;
  loop {
    calls += 1;
    match finder.find_way(&request, &mut ws, &mut result).unwrap() {
      WayQueryStatus::Continuing => {
        assert!(ws.can_do_step());
        assert!(result.way().is_empty());
      }
      WayQueryStatus::Done => break,
    }
    assert!(calls < 16, "search did not finish");
  }

  // One expansion per triangle; the goal pop is the last.
  assert_eq!(calls, 4);
  assert_eq!(ws.steps(), 4);
  assert!(!ws.can_do_step());
  assert_eq!(result.way().len(), 4);
}

#[test]
fn test_prediction_modes_agree_on_strip() {
  let (grid, tile) = strip();
  let (from, to) = (tri(tile, 0), tri(tile, 3));
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to);

  let config = PathfinderConfig::UNLIMITED.with_prediction(PredictionMode::TriangleCenter);
  let finder = PathFinder::new(&grid, config);
  let mut ws = WayQueryWorkingSet::new();
  let mut result = WayQueryResult::new(64);
  finder.find_way(&request, &mut ws, &mut result).unwrap();
  assert_eq!(result.way().len(), 4);
}

#[test]
fn test_same_triangle_and_small_buffer() {
  let (grid, tile) = strip();
  let t = tri(tile, 2);
  let p = centroid(&grid, t);
  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let mut ws = WayQueryWorkingSet::new();

  let mut result = WayQueryResult::new(8);
  let request = WayQueryRequest::new(p, t, p, t);
  assert_eq!(finder.find_way(&request, &mut ws, &mut result).unwrap(), WayQueryStatus::Done);
  assert_eq!(triangles(&result), vec![t, t]);

  let mut tiny = WayQueryResult::new(1);
  assert_eq!(finder.find_way(&request, &mut ws, &mut tiny).unwrap(), WayQueryStatus::Done);
  assert!(tiny.way().is_empty());
}

#[test]
fn test_truncated_way_keeps_goal_end() {
  let (grid, tile) = strip();
  let (from, to) = (tri(tile, 0), tri(tile, 3));
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to);

  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let mut result = WayQueryResult::new(2);
  finder.find_way(&request, &mut WayQueryWorkingSet::new(), &mut result).unwrap();
  assert_eq!(triangles(&result), vec![tri(tile, 2), tri(tile, 3)]);
}

#[test]
fn test_unknown_triangle_is_precondition() {
  let (grid, tile) = strip();
  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let request = WayQueryRequest::new(Vec3::ZERO, tri(tile, 0), Vec3::ONE, tri(TileId(9), 0));
  let err = finder
    .find_way(&request, &mut WayQueryWorkingSet::new(), &mut WayQueryResult::new(8))
    .unwrap_err();
  assert!(matches!(err, NavMeshError::Precondition(_)));
}

#[test]
fn test_disconnected_tiles_exhaust_open_list() {
  let (grid, ids) = grid_of(vec![(UVec3::ZERO, quad_tile(1.0)), (UVec3::new(2, 0, 0), quad_tile(1.0))]);
  let (from, to) = (tri(ids[0], 0), tri(ids[1], 0));
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to);

  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let mut ws = WayQueryWorkingSet::new();
  let mut result = WayQueryResult::new(16);
  assert_eq!(finder.find_way(&request, &mut ws, &mut result).unwrap(), WayQueryStatus::Done);
  assert!(result.way().is_empty());
  assert!(!ws.can_do_step());
}

#[test]
fn test_filter_blocks_only_route() {
  let (mut grid, tile) = strip();
  grid.set_triangles_annotation(&[tri(tile, 1)], AreaAnnotation::new(0, 0b1));
  let (from, to) = (tri(tile, 0), tri(tile, 3));
  let filter = FlagsFilter::default().excluding(0b1);
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to).with_filter(&filter);

  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let mut result = WayQueryResult::new(16);
  finder.find_way(&request, &mut WayQueryWorkingSet::new(), &mut result).unwrap();
  assert!(result.way().is_empty());
}

#[test]
fn test_way_crosses_tile_seam() {
  let (grid, ids) = floor_row(3);
  let (from, to) = (tri(ids[0], 1), tri(ids[2], 0));
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to);

  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let mut result = WayQueryResult::new(16);
  finder.find_way(&request, &mut WayQueryWorkingSet::new(), &mut result).unwrap();

  let way = triangles(&result);
  assert_eq!(way.first(), Some(&from));
  assert_eq!(way.last(), Some(&to));
  // Each step follows a link.
  for pair in way.windows(2) {
    assert!(grid.calculate_mid_edge(pair[0], pair[1]).is_some(), "{pair:?}");
  }
}

struct Jump {
  target: TriangleId,
  allowed: bool,
}

impl OffMeshNavigation for Jump {
  fn links_for_triangle(&self, _triangle: TriangleId, link_index: u16, out: &mut Vec<OffMeshTarget>) {
    if link_index == 5 {
      out.push(OffMeshTarget {
        link: 42,
        triangle: self.target,
      });
    }
  }

  fn can_use(&self, _link: OffMeshLinkId) -> Option<f32> {
    self.allowed.then_some(1.0)
  }
}

#[test]
fn test_off_mesh_link_bridges_islands() {
  let (mut grid, ids) = grid_of(vec![(UVec3::ZERO, quad_tile(1.0)), (UVec3::new(2, 0, 0), quad_tile(1.0))]);
  grid.add_off_mesh_link(tri(ids[0], 0), 5).unwrap();

  let (from, to) = (tri(ids[0], 1), tri(ids[1], 0));
  let jump = Jump {
    target: tri(ids[1], 1),
    allowed: true,
  };
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to).with_off_mesh(&jump);

  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let mut result = WayQueryResult::new(16);
  finder.find_way(&request, &mut WayQueryWorkingSet::new(), &mut result).unwrap();

  assert_eq!(
    result.way(),
    &[
      WayTriangleData::on_mesh(from),
      WayTriangleData::new(tri(ids[0], 0), 42),
      WayTriangleData::on_mesh(tri(ids[1], 1)),
      WayTriangleData::on_mesh(to),
    ]
  );

  let closed = Jump {
    target: tri(ids[1], 1),
    allowed: false,
  };
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to).with_off_mesh(&closed);
  finder.find_way(&request, &mut WayQueryWorkingSet::new(), &mut result).unwrap();
  assert!(result.way().is_empty());
}

struct Counting {
  calls: Cell<usize>,
  cost: f32,
}

impl DangerArea for Counting {
  fn heuristic_cost(&self, _location: Vec3, _start: Vec3) -> f32 {
    self.calls.set(self.calls.get() + 1);
    self.cost
  }
}

impl CustomPathCost for Counting {
  fn step_cost(&self, _from: Vec3, _to: Vec3) -> f32 {
    self.calls.set(self.calls.get() + 1);
    self.cost
  }
}

#[test]
fn test_danger_and_custom_costs_are_consulted() {
  let (grid, tile) = strip();
  let (from, to) = (tri(tile, 0), tri(tile, 3));
  let danger = Counting {
    calls: Cell::new(0),
    cost: 2.0,
  };
  let custom = Counting {
    calls: Cell::new(0),
    cost: 1.0,
  };
  let dangers: [&dyn DangerArea; 1] = [&danger];
  let request = WayQueryRequest::new(centroid(&grid, from), from, centroid(&grid, to), to)
    .with_dangers(&dangers)
    .with_custom_cost(&custom);

  let finder = PathFinder::new(&grid, PathfinderConfig::UNLIMITED);
  let mut result = WayQueryResult::new(16);
  finder.find_way(&request, &mut WayQueryWorkingSet::new(), &mut result).unwrap();

  assert_eq!(result.way().len(), 4);
  // One evaluation per discovered neighbour.
  assert_eq!(danger.calls.get(), 3);
  assert_eq!(custom.calls.get(), 3);
}

#[test]
fn test_new_endpoints_restart_search() {
  let (grid, tile) = strip();
  let finder = PathFinder::new(&grid, PathfinderConfig::default().with_max_steps(1));
  let mut ws = WayQueryWorkingSet::new();
  let mut result = WayQueryResult::new(16);

  let (a, b) = (tri(tile, 0), tri(tile, 3));
  let first = WayQueryRequest::new(centroid(&grid, a), a, centroid(&grid, b), b);
  assert_eq!(finder.find_way(&first, &mut ws, &mut result).unwrap(), WayQueryStatus::Continuing);

  let c = tri(tile, 1);
  let second = WayQueryRequest::new(centroid(&grid, a), a, centroid(&grid, c), c);
  assert_eq!(finder.find_way(&second, &mut ws, &mut result).unwrap(), WayQueryStatus::Continuing);
  assert_eq!(finder.find_way(&second, &mut ws, &mut result).unwrap(), WayQueryStatus::Done);
  assert_eq!(triangles(&result), vec![a, c]);
}
