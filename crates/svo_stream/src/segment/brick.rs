//! Brick storage, cropping and layer merge.
//!
//! A brick holds one RGBA8 plane per subset (see [`Subset`]). During
//! voxelization every object layer gets its own full-size brick; after
//! cropping all layers share the same crop box, and [`combine_layers`]
//! folds the active ones into the brick that is uploaded to the atlas.

use std::collections::BTreeMap;

use glam::UVec3;

use crate::constants::{crop_index, BRICK_SIZE};
use crate::error::{Result, SvoError};
use crate::types::{ObjectLayerId, Rgba8, Subset};

/// Per-layer bricks, ordered by layer id so iteration is stable.
pub type LayerMap = BTreeMap<ObjectLayerId, VoxelBrick>;

/// Dense RGBA8 voxel block with one plane per subset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoxelBrick {
  dims: UVec3,
  planes: Vec<Vec<Rgba8>>,
}

impl VoxelBrick {
  /// Zeroed brick of `dims` voxels with `subset_count` planes.
  pub fn new(dims: UVec3, subset_count: usize) -> Self {
    let volume = (dims.x * dims.y * dims.z) as usize;
    Self {
      dims,
      planes: vec![vec![Rgba8::ZERO; volume]; subset_count],
    }
  }

  /// Zeroed full-resolution brick.
  pub fn full(subset_count: usize) -> Self {
    Self::new(UVec3::splat(BRICK_SIZE as u32), subset_count)
  }

  /// Wrap existing planes. Every plane must hold exactly `dims` voxels.
  pub fn from_planes(dims: UVec3, planes: Vec<Vec<Rgba8>>) -> Result<Self> {
    let volume = (dims.x * dims.y * dims.z) as usize;
    if planes.iter().any(|p| p.len() != volume) {
      return Err(SvoError::corruption(format!(
        "brick plane size does not match dims {dims}"
      )));
    }
    Ok(Self { dims, planes })
  }

  #[inline]
  pub fn dims(&self) -> UVec3 {
    self.dims
  }

  #[inline]
  pub fn volume(&self) -> usize {
    (self.dims.x * self.dims.y * self.dims.z) as usize
  }

  #[inline]
  pub fn subset_count(&self) -> usize {
    self.planes.len()
  }

  #[inline]
  pub fn plane(&self, subset: usize) -> &[Rgba8] {
    &self.planes[subset]
  }

  #[inline]
  pub fn plane_mut(&mut self, subset: usize) -> &mut [Rgba8] {
    &mut self.planes[subset]
  }

  /// Flat index of `(x, y, z)` in this brick.
  #[inline]
  pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
    crop_index(
      x as usize,
      y as usize,
      z as usize,
      [self.dims.x as usize, self.dims.y as usize, self.dims.z as usize],
    )
  }

  /// Voxel has any opacity channel set.
  #[inline]
  pub fn is_solid(&self, index: usize) -> bool {
    self.planes[Subset::Opacity.index()][index].has_rgb()
  }

  /// Number of voxels with non-zero opacity.
  pub fn solid_count(&self) -> usize {
    self.planes[Subset::Opacity.index()]
      .iter()
      .filter(|v| v.has_rgb())
      .count()
  }

  /// Raw bytes of one plane, RGBA order.
  pub fn plane_bytes(&self, subset: usize) -> impl Iterator<Item = u8> + '_ {
    self.planes[subset].iter().flat_map(|c| c.to_array())
  }
}

/// Occupied sub-region of a brick, in voxels from the brick origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CropBox {
  pub min: UVec3,
  pub size: UVec3,
}

impl CropBox {
  #[inline]
  pub fn volume(&self) -> usize {
    (self.size.x * self.size.y * self.size.z) as usize
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.volume() == 0
  }
}

/// Shrink every layer to the tight box of solid voxels plus a one voxel
/// margin, clamped to the current brick.
///
/// `origin` is the current crop min of the layers (zero for full bricks).
/// Non-solid voxels inside the new box are cleared and solid voxels get
/// `normal.a = 255`. When no layer has a solid voxel the map is emptied and
/// an empty crop is returned.
pub fn crop_layers(layers: &mut LayerMap, origin: UVec3) -> CropBox {
  let Some(dims) = layers.values().next().map(|b| b.dims()) else {
    return CropBox::default();
  };

  let mut lo = dims;
  let mut hi = UVec3::ZERO;
  for brick in layers.values_mut() {
    let has_normals = brick.subset_count() > Subset::Normal.index();
    for z in 0..dims.z {
      for y in 0..dims.y {
        for x in 0..dims.x {
          let id = brick.index(x, y, z);
          if brick.is_solid(id) {
            lo = lo.min(UVec3::new(x, y, z));
            hi = hi.max(UVec3::new(x + 1, y + 1, z + 1));
            if has_normals {
              brick.planes[Subset::Normal.index()][id].a = 255;
            }
          }
        }
      }
    }
  }

  if hi.cmple(lo).any() {
    layers.clear();
    return CropBox::default();
  }

  let lo = lo.saturating_sub(UVec3::ONE);
  let hi = (hi + UVec3::ONE).min(dims);
  let size = hi - lo;

  for brick in layers.values_mut() {
    let mut cropped = VoxelBrick::new(size, brick.subset_count());
    for z in 0..size.z {
      for y in 0..size.y {
        for x in 0..size.x {
          let id_in = brick.index(x + lo.x, y + lo.y, z + lo.z);
          if !brick.is_solid(id_in) {
            continue;
          }
          let id_out = cropped.index(x, y, z);
          for s in 0..brick.subset_count() {
            cropped.planes[s][id_out] = brick.planes[s][id_in];
          }
        }
      }
    }
    *brick = cropped;
  }

  CropBox {
    min: origin + lo,
    size,
  }
}

/// Fold active layers into one brick by per-channel maximum.
///
/// Layer 0 is always active. A single-layer map is returned as is.
pub fn combine_layers(
  layers: &LayerMap,
  is_active: impl Fn(ObjectLayerId) -> bool,
) -> Option<VoxelBrick> {
  let first = layers.values().next()?;
  if layers.len() == 1 {
    return Some(first.clone());
  }

  let mut out = VoxelBrick::new(first.dims(), first.subset_count());
  for (&layer_id, brick) in layers {
    if layer_id != 0 && !is_active(layer_id) {
      continue;
    }
    for s in 0..out.subset_count().min(brick.subset_count()) {
      for (dst, src) in out.planes[s].iter_mut().zip(&brick.planes[s]) {
        *dst = dst.max(*src);
      }
    }
  }
  Some(out)
}

/// Solid voxels of the merged brick (all layers active).
pub fn solid_voxel_count(layers: &LayerMap) -> usize {
  match layers.len() {
    0 => 0,
    1 => layers.values().map(VoxelBrick::solid_count).sum(),
    _ => combine_layers(layers, |_| true).map_or(0, |b| b.solid_count()),
  }
}

#[cfg(test)]
#[path = "brick_test.rs"]
mod brick_test;
