//! Collaborator traits: scene queries, atlas upload and archive I/O.
//!
//! The crate ships no renderer, file system or entity system. Engines plug
//! those in through the traits below. [`MemoryArchive`] is an in-memory
//! archive usable for tests and tooling.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use glam::{UVec3, Vec3};

use crate::error::{Result, SvoError};
use crate::octree::Aabb;
use crate::segment::brick::VoxelBrick;
use crate::types::{MaterialId, SurfaceMaterial, VoxelTriangle};

/// Static object summary used by the geometry checksum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticObject {
  pub bounds: Aabb,
  pub material: MaterialId,
}

/// Light summary used by the lighting checksum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightInfo {
  pub position: Vec3,
  pub radius: f32,
  /// Linear colour.
  pub color: Vec3,
  /// Projector direction, unit length.
  pub direction: Vec3,
  /// Projector field of view in degrees, `None` for omni lights.
  pub projector_fov: Option<f32>,
  pub casts_shadows: bool,
  /// Sun lights affect every node; their position is ignored.
  pub is_sun: bool,
}

impl LightInfo {
  /// Influence box of the light.
  pub fn bounds(&self) -> Aabb {
    Aabb::new(
      self.position - Vec3::splat(self.radius),
      self.position + Vec3::splat(self.radius),
    )
  }
}

/// Read-only view of the scene used by voxelization and change detection.
///
/// Implementations are shared with the streaming workers and must be
/// callable from any thread.
pub trait SceneGeometry: Send + Sync {
  /// Append every triangle that may overlap `bounds`.
  fn triangles_in_box(&self, bounds: &Aabb, out: &mut Vec<VoxelTriangle>);

  /// Surface description of a material.
  fn material(&self, _id: MaterialId) -> SurfaceMaterial {
    SurfaceMaterial::default()
  }

  /// Append static objects overlapping `bounds`.
  fn static_objects_in_box(&self, _bounds: &Aabb, _out: &mut Vec<StaticObject>) {}

  /// Append static lights whose influence overlaps `bounds`.
  fn lights_in_box(&self, _bounds: &Aabb, _out: &mut Vec<LightInfo>) {}

  /// Append portal (vis-area) boxes overlapping `bounds`.
  fn portals_in_box(&self, _bounds: &Aabb, _out: &mut Vec<Aabb>) {}

  /// Terrain height at `(x, y)`. Voxels within 1.5 units above it are
  /// tagged as terrain.
  fn terrain_elevation(&self, _x: f32, _y: f32) -> f32 {
    f32::NEG_INFINITY
  }

  /// Whether object layer `layer` is currently shown.
  fn is_layer_active(&self, _layer: u32) -> bool {
    true
  }
}

/// Write side of the shared brick atlas.
///
/// Called on the main thread only.
pub trait AtlasUploader {
  /// Copy a combined brick into the atlas at `origin` (in voxels).
  fn upload_brick(&mut self, origin: UVec3, brick: &VoxelBrick);

  /// Refresh the per-node record at `atlas_offset`: world box and the
  /// child offset cache (see [`crate::segment::encode_child_offset`]).
  fn update_node_data(&mut self, atlas_offset: i32, bounds: &Aabb, child_offsets: &[i32; 8]);
}

/// Uploader that drops everything, for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullUploader;

impl AtlasUploader for NullUploader {
  fn upload_brick(&mut self, _origin: UVec3, _brick: &VoxelBrick) {}

  fn update_node_data(&mut self, _atlas_offset: i32, _bounds: &Aabb, _child_offsets: &[i32; 8]) {}
}

/// Read access to exported area files. Used from streaming workers.
pub trait ArchiveReader: Send + Sync {
  fn exists(&self, name: &str) -> bool;

  /// Read `len` bytes at `offset` of entry `name`.
  fn read(&self, name: &str, offset: u64, len: usize) -> Result<Vec<u8>>;
}

/// Write access used by the area export.
pub trait ArchiveWriter {
  fn contains(&self, name: &str) -> bool;

  /// Create or replace entry `name`.
  fn write_entry(&self, name: &str, data: &[u8]) -> Result<()>;

  /// Delete entry `name` if present.
  fn remove_entry(&self, name: &str) -> Result<()>;
}

/// Archive held in memory, shareable between the exporter and workers.
#[derive(Default)]
pub struct MemoryArchive {
  entries: RwLock<HashMap<String, Arc<Vec<u8>>>>,
}

impl MemoryArchive {
  pub fn new() -> Self {
    Self::default()
  }

  /// Entry names, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = match self.entries.read() {
      Ok(entries) => entries.keys().cloned().collect(),
      Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
    };
    names.sort();
    names
  }

  /// Whole entry contents.
  pub fn get(&self, name: &str) -> Option<Arc<Vec<u8>>> {
    match self.entries.read() {
      Ok(entries) => entries.get(name).cloned(),
      Err(poisoned) => poisoned.into_inner().get(name).cloned(),
    }
  }

  fn with_entries_mut<R>(&self, f: impl FnOnce(&mut HashMap<String, Arc<Vec<u8>>>) -> R) -> R {
    match self.entries.write() {
      Ok(mut entries) => f(&mut entries),
      Err(poisoned) => f(&mut poisoned.into_inner()),
    }
  }
}

impl ArchiveReader for MemoryArchive {
  fn exists(&self, name: &str) -> bool {
    self.get(name).is_some()
  }

  fn read(&self, name: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
    let entry = self.get(name).ok_or_else(|| {
      SvoError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("archive entry {name} not found"),
      ))
    })?;
    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    let end = start.saturating_add(len);
    if end > entry.len() {
      return Err(SvoError::corruption(format!(
        "read {start}..{end} past end of {name} ({} bytes)",
        entry.len()
      )));
    }
    Ok(entry[start..end].to_vec())
  }
}

impl ArchiveWriter for MemoryArchive {
  fn contains(&self, name: &str) -> bool {
    self.exists(name)
  }

  fn write_entry(&self, name: &str, data: &[u8]) -> Result<()> {
    self.with_entries_mut(|entries| {
      entries.insert(name.to_string(), Arc::new(data.to_vec()));
    });
    Ok(())
  }

  fn remove_entry(&self, name: &str) -> Result<()> {
    self.with_entries_mut(|entries| {
      entries.remove(name);
    });
    Ok(())
  }
}
