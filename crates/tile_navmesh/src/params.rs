//! Grid and pathfinder configuration.

use glam::{UVec3, Vec3};

use crate::error::{NavMeshError, Result};

/// Squared distance two boundary edges may drift apart and still connect.
pub const ADJACENCY_TOLERANCE_SQ: f32 = 0.02 * 0.02;

/// Margin trimmed from both ends of an edge overlap interval.
pub const EDGE_OVERLAP_DX: f32 = 1.0 / 1000.0;

/// Entry predictions never land closer than this to an edge end.
pub const MIN_PULLING_THRESHOLD: f32 = 0.05;

/// Entry predictions never land further than this along an edge.
pub const MAX_PULLING_THRESHOLD: f32 = 0.95;

/// Layout of the tile grid.
///
/// Positions handed to queries are mesh-local: relative to `origin`. Tile
/// `(x, y, z)` covers `[x, y, z] * tile_size ..+ tile_size`, and its
/// vertices are stored relative to that corner.
#[derive(Clone, Debug, PartialEq)]
pub struct NavMeshParams {
  /// World position of the grid corner.
  pub origin: Vec3,

  /// Edge lengths of one tile.
  pub tile_size: Vec3,

  /// Generation voxel size. The full-network rebuild uses the larger of
  /// the X and Z voxel sizes as its seam tolerance.
  pub voxel_size: Vec3,

  /// Containers reserved up front.
  pub tile_capacity: usize,

  /// Largest tile coordinate accepted on each axis.
  pub max_tile_coord: UVec3,
}

impl Default for NavMeshParams {
  fn default() -> Self {
    Self {
      origin: Vec3::ZERO,
      tile_size: Vec3::new(8.0, 8.0, 8.0),
      voxel_size: Vec3::new(0.1, 0.1, 0.1),
      tile_capacity: 64,
      max_tile_coord: UVec3::splat(4095),
    }
  }
}

impl NavMeshParams {
  pub fn with_origin(mut self, origin: Vec3) -> Self {
    self.origin = origin;
    self
  }

  pub fn with_tile_size(mut self, tile_size: Vec3) -> Self {
    self.tile_size = tile_size;
    self
  }

  pub fn with_tile_capacity(mut self, tile_capacity: usize) -> Self {
    self.tile_capacity = tile_capacity;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if !(self.tile_size.cmpgt(Vec3::ZERO).all() && self.tile_size.is_finite()) {
      return Err(NavMeshError::precondition(format!(
        "tile size must be positive, got {}",
        self.tile_size
      )));
    }
    if !(self.voxel_size.cmpgt(Vec3::ZERO).all() && self.voxel_size.is_finite()) {
      return Err(NavMeshError::precondition(format!(
        "voxel size must be positive, got {}",
        self.voxel_size
      )));
    }
    Ok(())
  }

  /// Mesh-local corner of tile `(x, y, z)`.
  #[inline]
  pub fn tile_origin(&self, coord: UVec3) -> Vec3 {
    coord.as_vec3() * self.tile_size
  }

  /// Squared seam tolerance used by [`crate::TileGrid::create_network`].
  #[inline]
  pub fn network_tolerance_sq(&self) -> f32 {
    let t = self.voxel_size.x.max(self.voxel_size.z);
    t * t
  }
}

/// How A* guesses where a path enters a newly discovered triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PredictionMode {
  /// Intersection of the straight line towards the goal with the shared
  /// edge, clamped into the pulling thresholds.
  #[default]
  Advanced,
  /// Centroid of the triangle being left.
  TriangleCenter,
}

/// Pathfinder tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathfinderConfig {
  pub prediction: PredictionMode,

  /// Expansions allowed per `find_way` call. `usize::MAX` runs to
  /// completion.
  pub max_steps_per_call: usize,

  /// Wall-clock budget per `find_way` call in microseconds, checked
  /// between expansions. `None` disables the clock.
  pub time_budget_us: Option<u64>,
}

impl Default for PathfinderConfig {
  fn default() -> Self {
    Self {
      prediction: PredictionMode::Advanced,
      max_steps_per_call: 256,
      time_budget_us: None,
    }
  }
}

impl PathfinderConfig {
  /// Run every search to completion in one call.
  pub const UNLIMITED: PathfinderConfig = PathfinderConfig {
    prediction: PredictionMode::Advanced,
    max_steps_per_call: usize::MAX,
    time_budget_us: None,
  };

  pub fn with_max_steps(mut self, steps: usize) -> Self {
    self.max_steps_per_call = steps;
    self
  }

  pub fn with_prediction(mut self, prediction: PredictionMode) -> Self {
    self.prediction = prediction;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_params_are_valid() {
    assert!(NavMeshParams::default().validate().is_ok());
  }

  #[test]
  fn test_rejects_zero_tile_size() {
    let params = NavMeshParams::default().with_tile_size(Vec3::new(8.0, 0.0, 8.0));
    assert!(matches!(params.validate(), Err(NavMeshError::Precondition(_))));
  }

  #[test]
  fn test_tile_origin() {
    let params = NavMeshParams::default().with_tile_size(Vec3::new(4.0, 6.0, 2.0));
    assert_eq!(params.tile_origin(UVec3::new(1, 2, 3)), Vec3::new(4.0, 12.0, 6.0));
  }
}
