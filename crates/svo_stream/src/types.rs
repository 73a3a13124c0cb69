//! Core voxel value types.

use glam::Vec3;

/// 8-bit RGBA texel used by every brick subset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Rgba8 {
  pub r: u8,
  pub g: u8,
  pub b: u8,
  pub a: u8,
}

impl Rgba8 {
  pub const ZERO: Self = Self::new(0, 0, 0, 0);

  #[inline]
  pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
    Self { r, g, b, a }
  }

  /// Any opacity channel set. The alpha channel is reserved and ignored.
  #[inline]
  pub fn has_rgb(&self) -> bool {
    self.r != 0 || self.g != 0 || self.b != 0
  }

  #[inline]
  pub fn to_array(self) -> [u8; 4] {
    [self.r, self.g, self.b, self.a]
  }

  #[inline]
  pub fn from_array(c: [u8; 4]) -> Self {
    Self::new(c[0], c[1], c[2], c[3])
  }

  /// Per-channel maximum.
  #[inline]
  pub fn max(self, other: Self) -> Self {
    Self::new(
      self.r.max(other.r),
      self.g.max(other.g),
      self.b.max(other.b),
      self.a.max(other.a),
    )
  }
}

/// Saturating float to byte conversion (truncating, like an integer cast).
#[inline]
pub fn saturate_u8(value: f32) -> u8 {
  if value <= 0.0 {
    0
  } else if value >= 255.0 {
    255
  } else {
    value as u8
  }
}

/// Brick subsets. Planes are stored in this order on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Subset {
  /// Tri-planar opacity in rgb, reserved alpha.
  Opacity = 0,
  /// Albedo in rgb, emittance in alpha.
  Color = 1,
  /// Face normal in rgb (z, y, x), solid flag in alpha.
  Normal = 2,
}

impl Subset {
  pub const ALL: [Subset; 3] = [Subset::Opacity, Subset::Color, Subset::Normal];

  #[inline]
  pub fn index(self) -> usize {
    self as usize
  }
}

/// Object layer a triangle belongs to. Layer 0 collects everything.
pub type ObjectLayerId = u32;

/// Layer id used when no per-layer split is requested.
pub const ALL_OBJECT_LAYERS: ObjectLayerId = 0;

/// Stable material handle (index into the scene material table).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

impl MaterialId {
  /// Triangles with no material are treated as terrain-like.
  pub const NONE: Self = Self(0);
}

/// One triangle handed to the voxelizer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelTriangle {
  pub vertices: [Vec3; 3],
  /// Opacity cap for voxels this triangle touches.
  pub opacity: u8,
  pub material: MaterialId,
  pub layer: ObjectLayerId,
  /// Vis-area (portal) geometry forces full opacity and black colour.
  pub vis_area: bool,
}

impl VoxelTriangle {
  pub fn new(vertices: [Vec3; 3], material: MaterialId) -> Self {
    Self {
      vertices,
      opacity: 255,
      material,
      layer: ALL_OBJECT_LAYERS,
      vis_area: false,
    }
  }

  /// Unit face normal, zero for degenerate triangles.
  pub fn face_normal(&self) -> Vec3 {
    let [a, b, c] = self.vertices;
    (b - a).cross(c - a).normalize_or_zero()
  }
}

/// Per-material surface description used while voxelizing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceMaterial {
  /// Linear albedo, alpha = coverage.
  pub albedo: [f32; 4],
  /// Luminance of the emissive term.
  pub emittance: f32,
}

impl Default for SurfaceMaterial {
  fn default() -> Self {
    Self {
      albedo: [0.5, 0.5, 0.5, 1.0],
      emittance: 0.0,
    }
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
