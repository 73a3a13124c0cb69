//! SvoConfig - tree shape, voxelization and lighting-checksum settings.

use glam::Vec3;

use super::bounds::Aabb;
use crate::error::{Result, SvoError};
use crate::types::Subset;

/// Configuration of the voxel octree.
///
/// Node sizes are edge lengths in world units and must be powers of two
/// times each other: `min_node_size <= max_node_size < rootless_parent_size`.
#[derive(Clone, Debug, PartialEq)]
pub struct SvoConfig {
  /// Smallest node edge. Nodes of this size never subdivide.
  pub min_node_size: f32,

  /// Largest node that is voxelized. Bigger nodes are structural and hold
  /// empty bricks.
  pub max_node_size: f32,

  /// Size of the top structural level. Its children (half this size) are
  /// the unit of area export and streaming.
  pub rootless_parent_size: f32,

  /// Rootless mode: the root is one `rootless_parent_size` cube that
  /// follows the camera. Otherwise the root covers `world_size`.
  pub rootless: bool,

  /// World extent used for the root box when not rootless.
  pub world_size: f32,

  /// A node is refined while `distance < size * lod_ratio`.
  pub lod_ratio: f32,

  /// Brick subsets produced per voxel (1 = opacity only, 3 = opacity,
  /// colour, normal).
  pub subset_count: usize,

  /// Stream bricks from exported area files instead of voxelizing.
  pub streaming_active: bool,

  /// Streaming worker threads. 0 runs jobs on the calling thread inside
  /// `process_sync_callbacks`.
  pub worker_threads: usize,

  /// GI cone length, widens the light search border.
  pub cone_max_length: f32,

  /// Light bounces. Every bounce past the first adds `cone_max_length` to
  /// the light search border.
  pub bounces: u32,

  /// Folded into the lighting checksum so setting changes re-inject light.
  pub voxel_node_ratio: f32,

  /// Folded into the lighting checksum so setting changes re-inject light.
  pub voxel_dist_ratio: f32,

  /// Continuously refresh radiance of resident bricks round-robin.
  pub update_lighting: bool,
}

impl SvoConfig {
  /// Edge length of the root cube.
  #[inline]
  pub fn get_root_size(&self) -> f32 {
    if self.rootless {
      self.rootless_parent_size
    } else {
      self.world_size.max(self.rootless_parent_size)
    }
  }

  /// Root box anchored at the world origin.
  #[inline]
  pub fn get_root_bounds(&self) -> Aabb {
    Aabb::cube(Vec3::ZERO, self.get_root_size())
  }

  /// Size of an area node (one export file).
  #[inline]
  pub fn get_area_size(&self) -> f32 {
    self.rootless_parent_size * 0.5
  }

  /// Refinement distance of a node of edge `size`.
  #[inline]
  pub fn get_lod_distance(&self, size: f32) -> f32 {
    size * self.lod_ratio
  }

  /// Light search border around a node of edge `size`.
  #[inline]
  pub fn get_light_border(&self, size: f32) -> f32 {
    size / 4.0 + self.cone_max_length * self.bounces.saturating_sub(1) as f32
  }

  /// Check node size ordering and subset count.
  pub fn validate(&self) -> Result<()> {
    if !(self.min_node_size > 0.0 && self.min_node_size <= self.max_node_size) {
      return Err(SvoError::precondition(format!(
        "min_node_size {} must be in (0, max_node_size {}]",
        self.min_node_size, self.max_node_size
      )));
    }
    // Area roots are read as a bare child table, so they must never carry
    // a brick.
    if self.max_node_size >= self.get_area_size() {
      return Err(SvoError::precondition(format!(
        "max_node_size {} must be below the area size {}",
        self.max_node_size,
        self.get_area_size()
      )));
    }
    if self.subset_count == 0 || self.subset_count > Subset::ALL.len() {
      return Err(SvoError::precondition(format!(
        "subset_count {} out of range",
        self.subset_count
      )));
    }
    if self.lod_ratio <= 0.0 {
      return Err(SvoError::precondition("lod_ratio must be positive"));
    }
    Ok(())
  }

  /// Sum of every setting that changes injected lighting.
  pub fn settings_checksum(&self) -> f64 {
    let mut value = 0.0f64;
    value += self.cone_max_length as f64;
    value += self.bounces as f64;
    value += self.min_node_size as f64;
    value += self.max_node_size as f64;
    value += self.voxel_node_ratio as f64;
    value += self.voxel_dist_ratio as f64;
    value += self.subset_count as f64 * 10.0;
    value += self.update_lighting as u8 as f64;
    value
  }

  /// Set the node size range.
  pub fn with_node_sizes(mut self, min: f32, max: f32) -> Self {
    self.min_node_size = min;
    self.max_node_size = max;
    self
  }

  /// Set the streaming worker count.
  pub fn with_worker_threads(mut self, threads: usize) -> Self {
    self.worker_threads = threads;
    self
  }

  /// Switch between archive streaming and CPU voxelization.
  pub fn with_streaming(mut self, active: bool) -> Self {
    self.streaming_active = active;
    self
  }
}

impl Default for SvoConfig {
  fn default() -> Self {
    Self {
      min_node_size: 4.0,
      max_node_size: 32.0,
      rootless_parent_size: 1024.0,
      rootless: true,
      world_size: 1024.0,
      lod_ratio: 4.0,
      subset_count: 3,
      streaming_active: false,
      worker_threads: 2,
      cone_max_length: 50.0,
      bounces: 1,
      voxel_node_ratio: 4.0,
      voxel_dist_ratio: 14.0,
      update_lighting: false,
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
