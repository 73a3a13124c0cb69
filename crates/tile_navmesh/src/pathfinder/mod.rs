//! PathFinder - resumable A* over the triangle link graph.
//!
//! A search lives in a [`WayQueryWorkingSet`] so it can be spread over
//! several calls:
//!
//! ```text
//!   find_way ──► prepare (new from/to) ──► expand while can_do_step
//!                                              │ and budget left
//!                                              ▼
//!        Done(way)  ◄── goal popped      Continuing ◄── budget spent
//!        Done([])   ◄── open list empty
//! ```
//!
//! Step cost is `distance * cost_multiplier + dangers + custom`, with the
//! Euclidean distance to the goal as heuristic. A node's position is a
//! prediction of where the path enters its triangle (see
//! [`PredictionMode`]).
//!
//! # Module Structure
//!
//! - `open_list` - node storage and lazy-deletion heap
//! - `request` - request/result types and the off-mesh, danger and custom
//!   cost collaborators

mod open_list;
mod request;

pub use request::{
  CustomPathCost, DangerArea, OffMeshNavigation, OffMeshTarget, WayQueryRequest, WayQueryResult, WayTriangleData,
};

use glam::Vec3;
use web_time::{Duration, Instant};

use crate::connectivity::opposite_side;
use crate::error::{NavMeshError, Result};
use crate::geometry::{intersect_segment_segment_2d, next_mod3};
use crate::grid::TileGrid;
use crate::ids::{TriangleId, INVALID_OFF_MESH_LINK};
use crate::params::{PathfinderConfig, PredictionMode, MAX_PULLING_THRESHOLD, MIN_PULLING_THRESHOLD};
use open_list::OpenList;

/// Outcome of one `find_way` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WayQueryStatus {
  /// Search finished. The result holds the way, or nothing when the goal
  /// is unreachable.
  Done,
  /// Budget spent with nodes still open; call again with the same working
  /// set.
  Continuing,
}

/// State of an in-progress search.
#[derive(Debug, Default)]
pub struct WayQueryWorkingSet {
  open_list: OpenList,
  query: Option<(TriangleId, TriangleId)>,
  neighbours: Vec<Neighbour>,
  off_mesh_targets: Vec<OffMeshTarget>,
}

impl WayQueryWorkingSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Forget the current search.
  pub fn reset(&mut self) {
    self.open_list.clear();
    self.query = None;
  }

  /// Whether another expansion is possible.
  #[inline]
  pub fn can_do_step(&self) -> bool {
    self.open_list.can_do_step()
  }

  /// Expansions performed since the search started.
  #[inline]
  pub fn steps(&self) -> usize {
    self.open_list.steps()
  }

  /// Nodes discovered since the search started.
  pub fn node_count(&self) -> usize {
    self.open_list.node_count()
  }

  fn prepare(&mut self, request: &WayQueryRequest<'_>) {
    let start = WayTriangleData::on_mesh(request.from_triangle);
    self.open_list.setup(start, request.from, request.from.distance(request.to));
    self.query = Some((request.from_triangle, request.to_triangle));
  }
}

/// Triangle reachable from the node being expanded.
#[derive(Clone, Copy, Debug)]
struct Neighbour {
  data: WayTriangleData,
  /// Edge of the expanded triangle crossed, `None` for off-mesh links.
  edge: Option<u8>,
  cost_multiplier: f32,
}

/// A* over one [`TileGrid`].
pub struct PathFinder<'g> {
  grid: &'g TileGrid,
  config: PathfinderConfig,
}

impl<'g> PathFinder<'g> {
  pub fn new(grid: &'g TileGrid, config: PathfinderConfig) -> Self {
    Self { grid, config }
  }

  pub fn config(&self) -> &PathfinderConfig {
    &self.config
  }

  /// Advance the search for `request`, writing the way into `result` once
  /// it is done.
  ///
  /// A request whose endpoints differ from the working set's current search
  /// starts a new search. Unknown start or goal triangles are a
  /// precondition error.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "navmesh::find_way"))]
  pub fn find_way(
    &self,
    request: &WayQueryRequest<'_>,
    working_set: &mut WayQueryWorkingSet,
    result: &mut WayQueryResult,
  ) -> Result<WayQueryStatus> {
    result.clear();
    if result.max_size() < 2 {
      return Ok(WayQueryStatus::Done);
    }

    for id in [request.from_triangle, request.to_triangle] {
      if self.grid.triangle(id).is_none() {
        return Err(NavMeshError::precondition(format!("{id:?} is not a resident triangle")));
      }
    }

    if request.from_triangle == request.to_triangle {
      let way = result.way_mut();
      way.push(WayTriangleData::on_mesh(request.from_triangle));
      way.push(WayTriangleData::on_mesh(request.to_triangle));
      return Ok(WayQueryStatus::Done);
    }

    if working_set.query != Some((request.from_triangle, request.to_triangle)) {
      working_set.prepare(request);
    }

    let started = Instant::now();
    let budget = self.config.time_budget_us.map(Duration::from_micros);
    let mut steps = 0usize;

    while working_set.can_do_step() {
      if steps >= self.config.max_steps_per_call || budget.is_some_and(|b| started.elapsed() >= b) {
        break;
      }
      let Some(best) = working_set.open_list.pop_best() else {
        break;
      };
      steps += 1;

      let best_node = *working_set.open_list.node(best);
      if best_node.data.triangle == request.to_triangle {
        working_set.open_list.set_goal(best);
        working_set.open_list.step_done();
        break;
      }

      self.gather_neighbours(request, best_node.data.triangle, working_set);

      for i in 0..working_set.neighbours.len() {
        let next = working_set.neighbours[i];
        if next.data == best_node.prev {
          continue;
        }

        let (index, inserted) = working_set.open_list.insert_node(next.data);
        let location = if inserted {
          if next.data.triangle == request.to_triangle {
            request.to
          } else {
            self.predict_entry(best_node.data.triangle, best_node.location, next, request.to)
          }
        } else {
          working_set.open_list.node(index).location
        };

        let step = best_node.location.distance(location);
        let origin = self.grid.params().origin;
        let dangers: f32 = request
          .dangers
          .iter()
          .map(|d| d.heuristic_cost(location + origin, request.from + origin))
          .sum();
        let custom = request
          .custom_cost
          .map_or(0.0, |c| c.step_cost(best_node.location + origin, location + origin));

        let cost = best_node.cost + step * next.cost_multiplier + dangers + custom;
        let total = cost + location.distance(request.to);

        let node = working_set.open_list.node_mut(index);
        if node.total <= total {
          continue;
        }
        node.cost = cost;
        node.total = total;
        node.prev = best_node.data;
        node.location = location;
        working_set.open_list.open(index);
      }

      working_set.open_list.step_done();
    }

    if let Some(goal) = working_set.open_list.goal() {
      self.reconstruct(request, working_set, goal, result);
      return Ok(WayQueryStatus::Done);
    }
    if working_set.open_list.is_empty() {
      log::debug!(
        "no way from {:?} to {:?} after {} steps",
        request.from_triangle,
        request.to_triangle,
        working_set.steps()
      );
      return Ok(WayQueryStatus::Done);
    }
    Ok(WayQueryStatus::Continuing)
  }

  /// Collect the passable triangles linked from `current`.
  fn gather_neighbours(&self, request: &WayQueryRequest<'_>, current: TriangleId, working_set: &mut WayQueryWorkingSet) {
    working_set.neighbours.clear();
    let Some(triangle) = self.grid.triangle(current) else {
      log::warn!("find_way expanded missing triangle {current:?}, skipped");
      return;
    };
    let multiplier = request.filter.cost_multiplier(triangle);

    for link in self.grid.links(current) {
      if link.is_off_mesh() {
        let Some(off_mesh) = request.off_mesh else {
          continue;
        };
        working_set.off_mesh_targets.clear();
        off_mesh.links_for_triangle(current, link.triangle, &mut working_set.off_mesh_targets);
        for target in &working_set.off_mesh_targets {
          let Some(cost_multiplier) = off_mesh.can_use(target.link) else {
            continue;
          };
          if !self.grid.triangle(target.triangle).is_some_and(|t| request.filter.pass_filter(t)) {
            continue;
          }
          working_set.neighbours.push(Neighbour {
            data: WayTriangleData::new(target.triangle, target.link),
            edge: None,
            cost_multiplier,
          });
        }
        continue;
      }

      let target = match self.grid.link_target(current, link) {
        Ok(target) => target,
        Err(err) => {
          log::warn!("find_way skipped a link of {current:?}: {err}");
          continue;
        }
      };
      let Some(next_triangle) = self.grid.triangle(target) else {
        continue;
      };
      if !request.filter.pass_filter(next_triangle) {
        continue;
      }
      if link.is_boundary() {
        let back = opposite_side(link.side as usize) as u8;
        let reciprocal = self
          .grid
          .links(target)
          .iter()
          .any(|l| l.side == back && l.triangle == current.local_index());
        if !reciprocal {
          log::warn!("find_way skipped one-way boundary link {current:?} -> {target:?}");
          continue;
        }
      }

      working_set.neighbours.push(Neighbour {
        data: WayTriangleData::new(target, INVALID_OFF_MESH_LINK),
        edge: Some(link.edge),
        cost_multiplier: multiplier,
      });
    }
  }

  /// Where the path is expected to enter `next` from `current`.
  fn predict_entry(&self, current: TriangleId, current_location: Vec3, next: Neighbour, goal: Vec3) -> Vec3 {
    let Some(edge) = next.edge else {
      return self.centroid(next.data.triangle).unwrap_or(goal);
    };
    let Some(verts) = self.grid.vertices(current) else {
      return current_location;
    };

    match self.config.prediction {
      PredictionMode::TriangleCenter => (verts[0] + verts[1] + verts[2]) / 3.0,
      PredictionMode::Advanced => {
        let edge = edge as usize;
        let (v0, v1) = (verts[edge], verts[next_mod3(edge)]);
        let s = match intersect_segment_segment_2d(v0.truncate(), v1.truncate(), current_location.truncate(), goal.truncate()) {
          Some((s, _)) => s.clamp(MIN_PULLING_THRESHOLD, MAX_PULLING_THRESHOLD),
          // Towards whichever edge end is nearer the goal.
          None if v0.distance_squared(goal) < v1.distance_squared(goal) => MIN_PULLING_THRESHOLD,
          None => MAX_PULLING_THRESHOLD,
        };
        v0.lerp(v1, s)
      }
    }
  }

  fn centroid(&self, id: TriangleId) -> Option<Vec3> {
    let [a, b, c] = self.grid.vertices(id)?;
    Some((a + b + c) / 3.0)
  }

  /// Walk predecessors back from `goal`, moving each off-mesh link id onto
  /// the triangle the link starts from.
  ///
  /// A way longer than the result buffer keeps its goal end.
  fn reconstruct(
    &self,
    request: &WayQueryRequest<'_>,
    working_set: &WayQueryWorkingSet,
    goal: u32,
    result: &mut WayQueryResult,
  ) {
    let max_size = result.max_size();
    let node_count = working_set.open_list.node_count();
    let way = result.way_mut();

    let mut current = working_set.open_list.node(goal).data;
    let mut insertion = WayTriangleData::on_mesh(current.triangle);
    while current.triangle != request.from_triangle {
      let Some(node) = working_set.open_list.find_node(&current) else {
        log::warn!("find_way lost the predecessor chain at {:?}", current.triangle);
        way.clear();
        return;
      };
      way.push(insertion);

      insertion.off_mesh_link = current.off_mesh_link;
      current = node.prev;
      insertion.triangle = current.triangle;

      if way.len() == max_size || way.len() > node_count {
        break;
      }
    }
    if way.len() < max_size {
      way.push(WayTriangleData::new(request.from_triangle, insertion.off_mesh_link));
    }
    way.reverse();
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
