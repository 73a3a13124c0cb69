//! Path request, result and the collaborators A* consults.

use glam::Vec3;

use crate::filter::{AcceptAll, QueryFilter};
use crate::ids::{OffMeshLinkId, TriangleId, INVALID_OFF_MESH_LINK};

/// One entry of a way: a triangle and the off-mesh link leaving it, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WayTriangleData {
  pub triangle: TriangleId,
  pub off_mesh_link: OffMeshLinkId,
}

impl WayTriangleData {
  pub fn new(triangle: TriangleId, off_mesh_link: OffMeshLinkId) -> Self {
    Self {
      triangle,
      off_mesh_link,
    }
  }

  pub fn on_mesh(triangle: TriangleId) -> Self {
    Self::new(triangle, INVALID_OFF_MESH_LINK)
  }
}

/// Destination of an off-mesh link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffMeshTarget {
  pub link: OffMeshLinkId,
  pub triangle: TriangleId,
}

/// Provider of off-mesh connections (jumps, ladders, doors).
pub trait OffMeshNavigation {
  /// Destinations reachable from `triangle` through the link stored at
  /// `link_index` in its link list.
  fn links_for_triangle(&self, triangle: TriangleId, link_index: u16, out: &mut Vec<OffMeshTarget>);

  /// Cost multiplier for using `link`, `None` when the requester may not.
  fn can_use(&self, link: OffMeshLinkId) -> Option<f32>;
}

/// Hazard volume adding cost around it.
pub trait DangerArea {
  /// Extra cost of a path node at `location` for a path starting at
  /// `start`. Both are world positions.
  fn heuristic_cost(&self, location: Vec3, start: Vec3) -> f32;
}

/// Caller-defined cost of one step between world positions.
pub trait CustomPathCost {
  fn step_cost(&self, from: Vec3, to: Vec3) -> f32;
}

/// Inputs of a [`super::PathFinder::find_way`] search.
///
/// Positions are mesh-local.
pub struct WayQueryRequest<'a> {
  pub from: Vec3,
  pub from_triangle: TriangleId,
  pub to: Vec3,
  pub to_triangle: TriangleId,
  pub filter: &'a dyn QueryFilter,
  pub off_mesh: Option<&'a dyn OffMeshNavigation>,
  pub dangers: &'a [&'a dyn DangerArea],
  pub custom_cost: Option<&'a dyn CustomPathCost>,
}

impl<'a> WayQueryRequest<'a> {
  pub fn new(from: Vec3, from_triangle: TriangleId, to: Vec3, to_triangle: TriangleId) -> Self {
    Self {
      from,
      from_triangle,
      to,
      to_triangle,
      filter: &AcceptAll,
      off_mesh: None,
      dangers: &[],
      custom_cost: None,
    }
  }

  pub fn with_filter(mut self, filter: &'a dyn QueryFilter) -> Self {
    self.filter = filter;
    self
  }

  pub fn with_off_mesh(mut self, off_mesh: &'a dyn OffMeshNavigation) -> Self {
    self.off_mesh = Some(off_mesh);
    self
  }

  pub fn with_dangers(mut self, dangers: &'a [&'a dyn DangerArea]) -> Self {
    self.dangers = dangers;
    self
  }

  pub fn with_custom_cost(mut self, custom_cost: &'a dyn CustomPathCost) -> Self {
    self.custom_cost = Some(custom_cost);
    self
  }
}

/// Bounded output buffer of a search.
#[derive(Clone, Debug, Default)]
pub struct WayQueryResult {
  way: Vec<WayTriangleData>,
  max_size: usize,
}

impl WayQueryResult {
  pub fn new(max_size: usize) -> Self {
    Self {
      way: Vec::with_capacity(max_size.min(1024)),
      max_size,
    }
  }

  /// Triangles from start to goal. Empty when no path exists.
  pub fn way(&self) -> &[WayTriangleData] {
    &self.way
  }

  pub fn max_size(&self) -> usize {
    self.max_size
  }

  pub fn clear(&mut self) {
    self.way.clear();
  }

  pub(crate) fn way_mut(&mut self) -> &mut Vec<WayTriangleData> {
    &mut self.way
  }
}
