//! Triangle voxelization of one octree node into a `BRICK_SIZE³` brick.
//!
//! # Flow
//!
//! ```text
//! scene.triangles_in_box ──► bin per voxel cell (tri box + 1/8 voxel)
//!                                 │
//!           rayon, one job per Z slice, ordered collect
//!                                 │
//!     per voxel:  exact SAT filter ─► 2³ sub lists ─► 4³ samples
//!                                 │
//!     tri-planar max projection ─► opacity (r, g, b)
//!     averaged face normal, albedo, emittance
//!                                 │
//!                       crop_layers ─► VoxelizeOutput
//! ```
//!
//! Each voxel depends only on the immutable triangle list and bins, and the
//! slices are collected in index order, so the result is identical for any
//! worker count.

pub mod material;
pub mod overlap;

use std::collections::BTreeSet;

use glam::{UVec3, Vec3};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::constants::{brick_index, BRICK_SIZE, BRICK_SIZE_SQ, BRICK_VOXELS, MAX_TRIS_PER_VOXEL};
use crate::interfaces::SceneGeometry;
use crate::octree::Aabb;
use crate::segment::brick::{crop_layers, solid_voxel_count, CropBox, LayerMap, VoxelBrick};
use crate::types::{saturate_u8, MaterialId, ObjectLayerId, Rgba8, Subset, VoxelTriangle};
use material::MaterialTable;
use overlap::{triangle_bounds, triangle_overlaps_box};

/// Super-sampling resolution per voxel axis.
const SAMPLES: usize = 4;

/// Voxel centres this far above the terrain are tagged as non-terrain.
const TERRAIN_CLEARANCE: f32 = 1.5;

/// Portal boxes are grown by this much before rejecting samples.
const PORTAL_MARGIN: f32 = 0.25;

/// Result of voxelizing one node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelizeOutput {
  /// Cropped bricks per object layer. Empty when nothing was hit.
  pub layers: LayerMap,
  pub crop: CropBox,
  pub solid_voxels: usize,
  /// Bit `i` set when child octant `i` has triangles.
  pub child_tris_mask: u8,
  /// Triangles considered after filtering.
  pub triangle_count: usize,
}

type TriList = SmallVec<[u32; 16]>;

/// Immutable inputs shared by the slice jobs.
struct Job<'a> {
  scene: &'a dyn SceneGeometry,
  bounds: Aabb,
  voxel: f32,
  tris: &'a [VoxelTriangle],
  normals: &'a [Vec3],
  bins: &'a [TriList],
  tri_box: Aabb,
  materials: &'a MaterialTable,
  portals: &'a [Aabb],
  subset_count: usize,
}

/// One Z slice of one layer.
struct Slice {
  planes: Vec<Vec<Rgba8>>,
}

/// Voxelize the scene triangles inside `bounds`.
///
/// Nodes larger than `max_node_size` are structural and return an empty
/// output.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "voxelize::voxelize_meshes"))]
pub fn voxelize_meshes(
  scene: &dyn SceneGeometry,
  bounds: &Aabb,
  subset_count: usize,
  max_node_size: f32,
) -> VoxelizeOutput {
  let size = bounds.edge();
  if size > max_node_size || subset_count == 0 || subset_count > Subset::ALL.len() {
    return VoxelizeOutput::default();
  }
  let voxel = size / BRICK_SIZE as f32;

  let tris = collect_triangles(scene, bounds, voxel);
  if tris.is_empty() {
    return VoxelizeOutput::default();
  }
  let normals: Vec<Vec3> = tris.iter().map(VoxelTriangle::face_normal).collect();

  let child_tris_mask = child_mask(bounds, &tris, voxel * 0.25);

  let mut tri_box = triangle_bounds(&tris[0].vertices);
  for tri in &tris[1..] {
    for v in tri.vertices {
      tri_box.add_point(v);
    }
  }

  let bins = bin_triangles(bounds, &tris, voxel);
  let materials = MaterialTable::resolve(scene, tris.iter().map(|t| t.material));

  let mut portals = Vec::new();
  if subset_count > 1 {
    scene.portals_in_box(bounds, &mut portals);
  }

  let job = Job {
    scene,
    bounds: *bounds,
    voxel,
    tris: &tris,
    normals: &normals,
    bins: &bins,
    tri_box,
    materials: &materials,
    portals: &portals,
    subset_count,
  };

  let layer_ids: BTreeSet<ObjectLayerId> = tris.iter().map(|t| t.layer).collect();
  let mut layers = LayerMap::new();
  for layer in layer_ids {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("voxelize_layer", layer).entered();

    let slices: Vec<Slice> = (0..BRICK_SIZE)
      .into_par_iter()
      .map(|z| voxelize_slice(&job, layer, z))
      .collect();

    let mut brick = VoxelBrick::full(subset_count);
    for (z, slice) in slices.into_iter().enumerate() {
      for (s, plane) in slice.planes.into_iter().enumerate() {
        let start = z * BRICK_SIZE_SQ;
        brick.plane_mut(s)[start..start + BRICK_SIZE_SQ].copy_from_slice(&plane);
      }
    }
    layers.insert(layer, brick);
  }

  let crop = crop_layers(&mut layers, UVec3::ZERO);
  VoxelizeOutput {
    solid_voxels: solid_voxel_count(&layers),
    layers,
    crop,
    child_tris_mask,
    triangle_count: tris.len(),
  }
}

/// Scene triangles touching the node, degenerate ones dropped.
fn collect_triangles(scene: &dyn SceneGeometry, bounds: &Aabb, voxel: f32) -> Vec<VoxelTriangle> {
  let search = bounds.expanded(Vec3::splat(voxel * 0.25));
  let mut tris = Vec::new();
  scene.triangles_in_box(&search, &mut tris);

  let before = tris.len();
  tris.retain(|t| t.face_normal() != Vec3::ZERO && triangle_overlaps_box(&search, &t.vertices));
  let dropped = before - tris.len();
  if dropped != 0 {
    log::trace!("voxelize: {dropped} of {before} triangles outside or degenerate");
  }
  tris
}

fn child_mask(bounds: &Aabb, tris: &[VoxelTriangle], margin: f32) -> u8 {
  let mut mask = 0u8;
  for child in 0..8 {
    let child_box = bounds.child_box(child).expanded(Vec3::splat(margin));
    if tris
      .iter()
      .any(|t| triangle_overlaps_box(&child_box, &t.vertices))
    {
      mask |= 1 << child;
    }
  }
  mask
}

/// Per-cell candidate lists from triangle boxes grown by 1/8 voxel.
/// Lists keep triangle order.
fn bin_triangles(bounds: &Aabb, tris: &[VoxelTriangle], voxel: f32) -> Vec<TriList> {
  let mut bins = vec![TriList::new(); BRICK_VOXELS];
  let last = (BRICK_SIZE - 1) as f32;
  for (t, tri) in tris.iter().enumerate() {
    let tb = triangle_bounds(&tri.vertices).expanded(Vec3::splat(voxel / 8.0));
    if !tb.overlaps(bounds) {
      continue;
    }
    let lo = ((tb.min - bounds.min) / voxel).floor().clamp(Vec3::ZERO, Vec3::splat(last));
    let hi = ((tb.max - bounds.min) / voxel).floor().clamp(Vec3::ZERO, Vec3::splat(last));
    for z in lo.z as usize..=hi.z as usize {
      for y in lo.y as usize..=hi.y as usize {
        for x in lo.x as usize..=hi.x as usize {
          bins[brick_index(x, y, z)].push(t as u32);
        }
      }
    }
  }
  bins
}

fn voxelize_slice(job: &Job<'_>, layer: ObjectLayerId, z: usize) -> Slice {
  let mut planes = vec![vec![Rgba8::ZERO; BRICK_SIZE_SQ]; job.subset_count];
  let mut scratch = TriList::new();
  for y in 0..BRICK_SIZE {
    for x in 0..BRICK_SIZE {
      if let Some(texels) = voxelize_voxel(job, layer, x, y, z, &mut scratch) {
        let id = y * BRICK_SIZE + x;
        for (s, plane) in planes.iter_mut().enumerate() {
          plane[id] = texels[s];
        }
      }
    }
  }
  Slice { planes }
}

/// Boxes tested against triangles without a material reach one unit
/// higher, so a terrain skin also fills the voxels just below it.
#[inline]
fn test_box(tri: &VoxelTriangle, sample: &Aabb) -> Aabb {
  if tri.material == MaterialId::NONE {
    Aabb {
      min: sample.min,
      max: sample.max + Vec3::Z,
    }
  } else {
    *sample
  }
}

/// Texels of one voxel (opacity, colour, normal), `None` when untouched.
fn voxelize_voxel(
  job: &Job<'_>,
  layer: ObjectLayerId,
  x: usize,
  y: usize,
  z: usize,
  tris_int: &mut TriList,
) -> Option<[Rgba8; 3]> {
  let vmin = job.bounds.min + Vec3::new(x as f32, y as f32, z as f32) * job.voxel;
  let vox_box = Aabb::cube(vmin, job.voxel);
  if !vox_box.overlaps(&job.tri_box) {
    return None;
  }

  tris_int.clear();
  let mut vis_area = false;
  for &t in &job.bins[brick_index(x, y, z)] {
    if tris_int.len() >= MAX_TRIS_PER_VOXEL {
      break;
    }
    let tri = &job.tris[t as usize];
    if tri.layer == layer && triangle_overlaps_box(&vox_box, &tri.vertices) {
      vis_area |= tri.vis_area;
      tris_int.push(t);
    }
  }
  if tris_int.is_empty() {
    return None;
  }

  // 2³ sub-voxel candidate lists.
  let half = job.voxel * 0.5;
  let mut sub_lists: [TriList; 8] = Default::default();
  for (i, list) in sub_lists.iter_mut().enumerate() {
    let offset = Vec3::new((i >> 2) as f32, ((i >> 1) & 1) as f32, (i & 1) as f32) * half;
    let sub_box = Aabb::cube(vmin + offset, half);
    list.extend(
      tris_int
        .iter()
        .copied()
        .filter(|&t| {
          let tri = &job.tris[t as usize];
          triangle_overlaps_box(&test_box(tri, &sub_box), &tri.vertices)
        }),
    );
  }

  // 4³ samples.
  let step = job.voxel / SAMPLES as f32;
  let mut opa = [[[0u8; SAMPLES]; SAMPLES]; SAMPLES];
  let mut normal_sum = Vec3::ZERO;
  let mut normal_weight = 0.0f32;
  let mut color_sum = Vec3::ZERO;
  let mut color_count = 0.0f32;
  let mut emi_sum = 0.0f32;

  for sx in 0..SAMPLES {
    for sy in 0..SAMPLES {
      for sz in 0..SAMPLES {
        let sample_box = Aabb::cube(
          vmin + Vec3::new(sx as f32, sy as f32, sz as f32) * step,
          step,
        );
        if job.subset_count > 1 {
          let grown = sample_box.expanded(Vec3::splat(PORTAL_MARGIN));
          if job.portals.iter().any(|p| p.overlaps(&grown)) {
            continue;
          }
        }

        let list = &sub_lists[(sx / 2) << 2 | (sy / 2) << 1 | (sz / 2)];
        let mut o = 0u8;
        let mut emi = 0.0f32;
        for &t in list {
          let tri = &job.tris[t as usize];
          if !triangle_overlaps_box(&test_box(tri, &sample_box), &tri.vertices) {
            continue;
          }
          let mat = job.materials.lookup(tri.material);
          let coverage = mat.albedo[3];
          if coverage == 0.0 {
            continue;
          }
          o = o.max(tri.opacity.min(saturate_u8(coverage * 255.0)));
          if job.subset_count > 1 {
            normal_sum += job.normals[t as usize];
            normal_weight += 1.0;
            color_sum += Vec3::new(mat.albedo[0], mat.albedo[1], mat.albedo[2]);
            color_count += 1.0;
            emi = mat.emittance;
          } else if o == 255 {
            break;
          }
        }
        opa[sx][sy][sz] = o;
        emi_sum += emi;
      }
    }
  }

  // Tri-planar max projection along each axis.
  let mut quad = [[[0u8; SAMPLES]; SAMPLES]; 3];
  for sx in 0..SAMPLES {
    for sy in 0..SAMPLES {
      for sz in 0..SAMPLES {
        let o = opa[sx][sy][sz];
        quad[0][sy][sz] = quad[0][sy][sz].max(o);
        quad[1][sx][sz] = quad[1][sx][sz].max(o);
        quad[2][sx][sy] = quad[2][sx][sy].max(o);
      }
    }
  }
  let average = |q: &[[u8; SAMPLES]; SAMPLES]| {
    let sum: u32 = q.iter().flatten().map(|&v| v as u32).sum();
    (sum / (SAMPLES * SAMPLES) as u32) as u8
  };

  let center = vox_box.center();
  let above_terrain = center.z > job.scene.terrain_elevation(center.x, center.y) + TERRAIN_CLEARANCE;
  let mut opacity = Rgba8::new(
    average(&quad[2]),
    average(&quad[1]),
    average(&quad[0]),
    above_terrain as u8,
  );

  let normal = if normal_weight > 0.0 {
    normal_sum / normal_weight
  } else {
    Vec3::ZERO
  };
  let (mut color, emittance) = if color_count > 0.0 {
    (color_sum / color_count, emi_sum / color_count)
  } else {
    (Vec3::ZERO, 0.0)
  };

  let solid = opacity.has_rgb();
  if vis_area && solid {
    opacity.r = 255;
    opacity.g = 255;
    opacity.b = 255;
    color = Vec3::ZERO;
  }

  let mut texels = [Rgba8::ZERO; 3];
  texels[Subset::Opacity.index()] = opacity;
  texels[Subset::Color.index()] = Rgba8::new(
    saturate_u8(color.x * 255.0),
    saturate_u8(color.y * 255.0),
    saturate_u8(color.z * 255.0),
    saturate_u8(emittance * 255.0),
  );
  let n = [normal.x, normal.y, normal.z];
  texels[Subset::Normal.index()] = Rgba8::new(
    saturate_u8(n[2] * 127.5 + 127.5),
    saturate_u8(n[1] * 127.5 + 127.5),
    saturate_u8(n[0] * 127.5 + 127.5),
    if solid { 255 } else { 0 },
  );
  Some(texels)
}
