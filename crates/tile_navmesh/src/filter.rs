//! Triangle filters for queries, A* and raycast.

use crate::tile::Triangle;

/// Area type and flags painted onto a triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AreaAnnotation {
  pub area_type: u8,
  pub flags: u32,
}

impl AreaAnnotation {
  pub const fn new(area_type: u8, flags: u32) -> Self {
    Self { area_type, flags }
  }
}

/// Decides which triangles an agent may use and what they cost.
pub trait QueryFilter {
  fn pass_filter(&self, triangle: &Triangle) -> bool;

  /// Multiplier applied to the length of a step leaving `triangle`.
  fn cost_multiplier(&self, _triangle: &Triangle) -> f32 {
    1.0
  }
}

/// Accepts every triangle at unit cost.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl QueryFilter for AcceptAll {
  #[inline]
  fn pass_filter(&self, _triangle: &Triangle) -> bool {
    true
  }
}

/// Include/exclude flag masks plus a per-area-type cost table.
#[derive(Clone, Debug)]
pub struct FlagsFilter {
  pub include_flags: u32,
  pub exclude_flags: u32,
  pub area_costs: [f32; 64],
}

impl Default for FlagsFilter {
  fn default() -> Self {
    Self {
      include_flags: u32::MAX,
      exclude_flags: 0,
      area_costs: [1.0; 64],
    }
  }
}

impl FlagsFilter {
  pub fn excluding(mut self, flags: u32) -> Self {
    self.exclude_flags |= flags;
    self
  }

  pub fn with_area_cost(mut self, area_type: u8, cost: f32) -> Self {
    if let Some(slot) = self.area_costs.get_mut(area_type as usize) {
      *slot = cost;
    }
    self
  }
}

impl QueryFilter for FlagsFilter {
  fn pass_filter(&self, triangle: &Triangle) -> bool {
    let flags = triangle.annotation.flags;
    let included = self.include_flags == u32::MAX || (flags & self.include_flags) != 0;
    included && (flags & self.exclude_flags) == 0
  }

  fn cost_multiplier(&self, triangle: &Triangle) -> f32 {
    self
      .area_costs
      .get(triangle.annotation.area_type as usize)
      .copied()
      .unwrap_or(1.0)
  }
}

impl<F: QueryFilter + ?Sized> QueryFilter for &F {
  #[inline]
  fn pass_filter(&self, triangle: &Triangle) -> bool {
    (**self).pass_filter(triangle)
  }

  #[inline]
  fn cost_multiplier(&self, triangle: &Triangle) -> f32 {
    (**self).cost_multiplier(triangle)
  }
}
