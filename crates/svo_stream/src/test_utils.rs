//! Shared scene fixtures for unit tests.

use std::collections::HashMap;
use std::sync::RwLock;

use glam::Vec3;

use crate::interfaces::{LightInfo, SceneGeometry, StaticObject};
use crate::octree::Aabb;
use crate::voxelize::overlap::triangle_bounds;
use crate::types::{MaterialId, ObjectLayerId, SurfaceMaterial, VoxelTriangle};

/// Plain scene contents.
#[derive(Clone, Debug, Default)]
pub struct SceneData {
  pub triangles: Vec<VoxelTriangle>,
  pub materials: HashMap<MaterialId, SurfaceMaterial>,
  pub statics: Vec<StaticObject>,
  pub lights: Vec<LightInfo>,
  pub portals: Vec<Aabb>,
  pub inactive_layers: Vec<ObjectLayerId>,
}

impl SceneData {
  /// Horizontal quad at height `z` over `[min, max]` in x and y.
  pub fn add_floor(&mut self, min: f32, max: f32, z: f32, material: MaterialId) -> &mut Self {
    let a = Vec3::new(min, min, z);
    let b = Vec3::new(max, min, z);
    let c = Vec3::new(max, max, z);
    let d = Vec3::new(min, max, z);
    self.triangles.push(VoxelTriangle::new([a, b, c], material));
    self.triangles.push(VoxelTriangle::new([a, c, d], material));
    self
  }

  /// Closed axis-aligned box made of twelve triangles.
  pub fn add_box(&mut self, bounds: Aabb, material: MaterialId, layer: ObjectLayerId) -> &mut Self {
    let (lo, hi) = (bounds.min, bounds.max);
    let corner = |i: usize| {
      Vec3::new(
        if i & 4 != 0 { hi.x } else { lo.x },
        if i & 2 != 0 { hi.y } else { lo.y },
        if i & 1 != 0 { hi.z } else { lo.z },
      )
    };
    const FACES: [[usize; 4]; 6] = [
      [0, 1, 3, 2],
      [4, 6, 7, 5],
      [0, 4, 5, 1],
      [2, 3, 7, 6],
      [0, 2, 6, 4],
      [1, 5, 7, 3],
    ];
    for face in FACES {
      let [a, b, c, d] = face.map(corner);
      for vertices in [[a, b, c], [a, c, d]] {
        let mut tri = VoxelTriangle::new(vertices, material);
        tri.layer = layer;
        self.triangles.push(tri);
      }
    }
    self.statics.push(StaticObject { bounds, material });
    self
  }
}

/// Thread-safe scene that tests can edit between frames.
#[derive(Debug, Default)]
pub struct TestScene {
  data: RwLock<SceneData>,
}

impl TestScene {
  pub fn new(data: SceneData) -> Self {
    Self {
      data: RwLock::new(data),
    }
  }

  pub fn edit(&self, f: impl FnOnce(&mut SceneData)) {
    f(&mut self.data.write().unwrap());
  }
}

impl SceneGeometry for TestScene {
  fn triangles_in_box(&self, bounds: &Aabb, out: &mut Vec<VoxelTriangle>) {
    let data = self.data.read().unwrap();
    out.extend(
      data
        .triangles
        .iter()
        .filter(|t| triangle_bounds(&t.vertices).overlaps(bounds)),
    );
  }

  fn material(&self, id: MaterialId) -> SurfaceMaterial {
    let data = self.data.read().unwrap();
    data.materials.get(&id).copied().unwrap_or_default()
  }

  fn static_objects_in_box(&self, bounds: &Aabb, out: &mut Vec<StaticObject>) {
    let data = self.data.read().unwrap();
    out.extend(data.statics.iter().filter(|o| o.bounds.overlaps(bounds)));
  }

  fn lights_in_box(&self, bounds: &Aabb, out: &mut Vec<LightInfo>) {
    let data = self.data.read().unwrap();
    out.extend(
      data
        .lights
        .iter()
        .filter(|l| l.is_sun || l.bounds().overlaps(bounds)),
    );
  }

  fn portals_in_box(&self, bounds: &Aabb, out: &mut Vec<Aabb>) {
    let data = self.data.read().unwrap();
    out.extend(data.portals.iter().filter(|p| p.overlaps(bounds)));
  }

  fn is_layer_active(&self, layer: ObjectLayerId) -> bool {
    let data = self.data.read().unwrap();
    !data.inactive_layers.contains(&layer)
  }
}

/// Scene with a single 1000 × 1000 floor at `z`.
pub fn floor_scene(z: f32) -> TestScene {
  let mut data = SceneData::default();
  data.add_floor(0.0, 1000.0, z, MaterialId(1));
  TestScene::new(data)
}
