//! Per-job material cache: open addressing keyed by material index.
//!
//! A voxelization job touches a handful of materials many thousands of
//! times. The table resolves each one through the scene once and then
//! serves lookups from a flat open-addressed array.

use crate::interfaces::SceneGeometry;
use crate::types::{MaterialId, SurfaceMaterial};

const EMPTY: u32 = u32::MAX;

#[derive(Clone, Copy)]
struct Entry {
  key: u32,
  material: SurfaceMaterial,
}

/// Open-addressed hash table from `MaterialId` to its surface description.
pub struct MaterialTable {
  entries: Vec<Entry>,
  len: usize,
}

impl MaterialTable {
  /// Table sized for about `expected` materials.
  pub fn with_capacity(expected: usize) -> Self {
    let capacity = (expected.max(4) * 2).next_power_of_two();
    Self {
      entries: vec![
        Entry {
          key: EMPTY,
          material: SurfaceMaterial::default(),
        };
        capacity
      ],
      len: 0,
    }
  }

  /// Resolve every id in `ids` through `scene`.
  pub fn resolve(scene: &dyn SceneGeometry, ids: impl IntoIterator<Item = MaterialId>) -> Self {
    let ids: Vec<MaterialId> = ids.into_iter().collect();
    let mut table = Self::with_capacity(ids.len());
    for id in ids {
      if table.get(id).is_none() {
        table.insert(id, scene.material(id));
      }
    }
    table
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  #[inline]
  fn slot(&self, key: u32) -> usize {
    // Multiplicative hash; capacity is a power of two.
    (key.wrapping_mul(0x9E37_79B9) as usize) & (self.entries.len() - 1)
  }

  /// `MaterialId(u32::MAX)` is reserved as the empty marker.
  pub fn insert(&mut self, id: MaterialId, material: SurfaceMaterial) {
    debug_assert_ne!(id.0, EMPTY);
    if (self.len + 1) * 2 > self.entries.len() {
      self.grow();
    }
    let mask = self.entries.len() - 1;
    let mut i = self.slot(id.0);
    loop {
      let entry = &mut self.entries[i];
      if entry.key == EMPTY {
        *entry = Entry { key: id.0, material };
        self.len += 1;
        return;
      }
      if entry.key == id.0 {
        entry.material = material;
        return;
      }
      i = (i + 1) & mask;
    }
  }

  pub fn get(&self, id: MaterialId) -> Option<&SurfaceMaterial> {
    let mask = self.entries.len() - 1;
    let mut i = self.slot(id.0);
    loop {
      let entry = &self.entries[i];
      if entry.key == EMPTY {
        return None;
      }
      if entry.key == id.0 {
        return Some(&entry.material);
      }
      i = (i + 1) & mask;
    }
  }

  /// Material of `id`, or the default surface for ids never resolved.
  #[inline]
  pub fn lookup(&self, id: MaterialId) -> SurfaceMaterial {
    self.get(id).copied().unwrap_or_default()
  }

  fn grow(&mut self) {
    let old = std::mem::take(&mut self.entries);
    *self = Self::with_capacity(old.len());
    for entry in old.into_iter().filter(|e| e.key != EMPTY) {
      self.insert(MaterialId(entry.key), entry.material);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::octree::Aabb;
  use crate::types::VoxelTriangle;

  struct Palette;

  impl SceneGeometry for Palette {
    fn triangles_in_box(&self, _bounds: &Aabb, _out: &mut Vec<VoxelTriangle>) {}

    fn material(&self, id: MaterialId) -> SurfaceMaterial {
      SurfaceMaterial {
        albedo: [id.0 as f32 / 100.0, 0.0, 0.0, 1.0],
        emittance: 0.0,
      }
    }
  }

  #[test]
  fn test_resolve_dedups() {
    let ids = [3, 7, 3, 3, 11, 7].map(MaterialId);
    let table = MaterialTable::resolve(&Palette, ids);
    assert_eq!(table.len(), 3);
    assert_eq!(table.lookup(MaterialId(7)).albedo[0], 0.07);
    assert!(table.get(MaterialId(8)).is_none());
    assert_eq!(table.lookup(MaterialId(8)), SurfaceMaterial::default());
  }

  #[test]
  fn test_grow_keeps_entries() {
    let mut table = MaterialTable::with_capacity(1);
    for i in 0..100 {
      table.insert(MaterialId(i * 31), Palette.material(MaterialId(i)));
    }
    assert_eq!(table.len(), 100);
    for i in 0..100 {
      assert_eq!(table.lookup(MaterialId(i * 31)).albedo[0], i as f32 / 100.0);
    }
  }

  #[test]
  fn test_insert_overwrites() {
    let mut table = MaterialTable::with_capacity(4);
    table.insert(MaterialId(1), SurfaceMaterial::default());
    let red = SurfaceMaterial {
      albedo: [1.0, 0.0, 0.0, 1.0],
      emittance: 2.0,
    };
    table.insert(MaterialId(1), red);
    assert_eq!(table.len(), 1);
    assert_eq!(table.lookup(MaterialId(1)), red);
  }
}
