//! Scene change detection and GI brick snapshots.
//!
//! Two integer checksums are kept per segment:
//!
//! - geometry: static objects and portals around the node
//! - lighting: static lights reaching the node
//!
//! A geometry change marks the node chain `force_recreate` up to
//! `max_node_size`; the render walk then rebuilds the subtree once no load
//! is in flight below it. A lighting change only flags the brick for the
//! next [`OctreeManager::svo_bricks_for_update`] snapshot.

use glam::{IVec3, Vec3};

use super::OctreeManager;
use crate::constants::{ATLAS_DIM_XY, ATLAS_DIM_Z, BRICK_SIZE};
use crate::interfaces::{LightInfo, StaticObject};
use crate::octree::{Aabb, NodeRef};
use crate::segment::StreamingStatus;

/// Fixed-point scale of box coordinates in checksums.
const CHECKSUM_PRECISION: f32 = 1000.0;

/// Per-component slack before a lighting checksum counts as changed.
const LIGHTS_CHECKSUM_TOLERANCE: i32 = 2;

/// Bricks farther than this from the camera are skipped by filtered
/// snapshots.
const FILTERED_UPDATE_DISTANCE: f32 = 24.0;

/// Atlas-resident brick handed to the GI pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeInfo {
  /// World box of the node.
  pub ws_box: Aabb,
  /// Atlas texture-coordinate box in `[0, 1]`.
  pub tc_box: Aabb,
  pub atlas_offset: i32,
}

fn box_checksum(bounds: &Aabb) -> IVec3 {
  (bounds.min * CHECKSUM_PRECISION)
    .as_ivec3()
    .wrapping_add((bounds.max * CHECKSUM_PRECISION * 2.0).as_ivec3())
}

fn is_equivalent(a: IVec3, b: IVec3, tolerance: i32) -> bool {
  (a - b).abs().max_element() <= tolerance
}

fn sphere_overlaps_box(center: Vec3, radius: f32, bounds: &Aabb) -> bool {
  bounds.distance_to_point(center) <= radius
}

impl OctreeManager {
  /// Geometry checksum of a node box; zero above `max_node_size`.
  pub(crate) fn geom_checksum(&self, bounds: &Aabb) -> IVec3 {
    let size = bounds.edge();
    if size > self.config.max_node_size {
      return IVec3::ZERO;
    }

    let border = size / BRICK_SIZE as f32;
    let search = bounds.expanded(Vec3::splat(border));
    let mut objects: Vec<StaticObject> = Vec::new();
    self.scene.static_objects_in_box(&search, &mut objects);

    let mut sum = IVec3::ZERO;
    for object in &objects {
      sum = sum.wrapping_add(box_checksum(&object.bounds));
      sum.x = sum.x.wrapping_add(object.material.0 as u16 as i32);
    }

    let mut portals: Vec<Aabb> = Vec::new();
    self.scene.portals_in_box(bounds, &mut portals);
    for portal in &portals {
      sum = sum.wrapping_add(box_checksum(portal));
    }
    sum
  }

  /// Lighting checksum of a node box.
  pub(crate) fn lights_checksum(&self, bounds: &Aabb) -> IVec3 {
    let border = self.config.get_light_border(bounds.edge());
    let search = bounds.expanded(Vec3::splat(border));
    let mut lights: Vec<LightInfo> = Vec::new();
    self.scene.lights_in_box(&search, &mut lights);

    let mut sum = IVec3::ZERO;
    for light in &lights {
      if !light.is_sun && !sphere_overlaps_box(light.position, light.radius, bounds) {
        continue;
      }
      if let Some(fov) = light.projector_fov.filter(|fov| *fov < 90.0) {
        sum.x = sum.x.wrapping_add(fov as i32);
        sum = sum.wrapping_add((light.direction * 10.0).as_ivec3());
      }
      if light.casts_shadows {
        sum.z = sum.z.wrapping_add(10);
      }
      sum = sum.wrapping_add((light.color * 50.0).as_ivec3());
      if light.is_sun {
        continue;
      }
      sum = sum.wrapping_add(box_checksum(&light.bounds()));
    }

    if sum != IVec3::ZERO {
      sum.x = sum.x.wrapping_add(self.config.voxel_node_ratio as i32);
      sum.y = sum.y.wrapping_add(self.config.voxel_dist_ratio as i32);
    }
    sum
  }

  /// Owners of every live atlas block, in block order.
  fn block_owners(&self) -> Vec<NodeRef> {
    self
      .packer
      .iter()
      .filter_map(|(_, info)| info.user_data)
      .collect()
  }

  /// Recompute geometry checksums of resident bricks and schedule rebuilds
  /// where they changed. Returns the number of changed bricks.
  ///
  /// Also clears "not needed" marks of empty octants that gained geometry.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::detect_movement_static_geom"))]
  pub fn detect_movement_static_geom(&mut self) -> usize {
    let mut changed = 0;
    for owner in self.block_owners() {
      let Some(node) = self.nodes.get(owner) else {
        continue;
      };
      let checksum = self.geom_checksum(&node.bounds);
      let Some(seg) = node.segment.as_ref() else {
        continue;
      };
      if seg.stat_geom_checksum == checksum {
        continue;
      }
      changed += 1;
      let loaded = seg.status != StreamingStatus::NotLoaded;
      if let Some(seg) = self.nodes.get_mut(owner).and_then(|n| n.segment.as_mut()) {
        seg.stat_geom_checksum = checksum;
      }
      if loaded {
        self.mark_force_recreate(owner);
      }
    }

    let mut reopened = Vec::new();
    for (node_ref, node) in self.nodes.iter() {
      let mask = node.child_not_needed_mask();
      if mask == 0 {
        continue;
      }
      for child_id in (0..8).filter(|i| mask & (1 << i) != 0) {
        if self.geom_checksum(&node.child_bounds(child_id)) != IVec3::ZERO {
          reopened.push((node_ref, child_id));
        }
      }
    }
    for &(node_ref, child_id) in &reopened {
      if let Some(node) = self.nodes.get_mut(node_ref) {
        node.set_child_not_needed(child_id, false);
      }
    }

    if changed > 0 || !reopened.is_empty() {
      log::debug!(
        "static geometry changed in {changed} bricks, {} empty octants reopened",
        reopened.len()
      );
    }
    changed
  }

  /// Flag `node` and its ancestors up to `max_node_size` for rebuild.
  fn mark_force_recreate(&mut self, node_ref: NodeRef) {
    let max_node_size = self.config.max_node_size;
    let mut current = Some(node_ref);
    while let Some(r) = current {
      let Some(node) = self.nodes.get_mut(r) else {
        break;
      };
      node.force_recreate = true;
      if node.size() >= max_node_size {
        break;
      }
      current = node.parent;
    }
  }

  /// Recompute lighting checksums of resident bricks. Returns the number of
  /// bricks flagged as changed.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::detect_movement_stat_lights"))]
  pub fn detect_movement_stat_lights(&mut self) -> usize {
    let mut changed = 0;
    for owner in self.block_owners() {
      let Some(node) = self.nodes.get(owner) else {
        continue;
      };
      let checksum = self.lights_checksum(&node.bounds);
      let Some(seg) = self.nodes.get_mut(owner).and_then(|n| n.segment.as_mut()) else {
        continue;
      };
      if !is_equivalent(seg.stat_lights_checksum, checksum, LIGHTS_CHECKSUM_TOLERANCE) {
        seg.stat_lights_checksum = checksum;
        seg.stat_lights_changed = true;
        changed += 1;
      }
    }
    changed
  }

  /// Snapshot of atlas-resident bricks the GI pass should refresh.
  ///
  /// `node_size == 0` is the full pass: it detects settings changes (which
  /// force every brick) and spends the automatic refresh allowance. A
  /// non-zero `node_size` returns every brick between `node_size` and
  /// `max_node_size` near the camera.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::svo_bricks_for_update"))]
  pub fn svo_bricks_for_update(&mut self, node_size: f32) -> Vec<NodeInfo> {
    let frame = self.frame_id;
    let max_node_size = self.config.max_node_size;
    let size_ok = |size: f32| node_size == 0.0 || (size >= node_size && size <= max_node_size);

    let mut sync_all = true;
    if node_size == 0.0 {
      let checksum = self.config.settings_checksum() + self.startup_done as u8 as f64;
      let previous = *self.settings_checksum.get_or_insert(checksum);
      sync_all = previous != checksum;
      self.settings_checksum = Some(checksum);
      if sync_all {
        log::info!("svo radiance full update");
      }

      if self.config.update_lighting {
        self.auto_update(frame, &size_ok);
      }
    }

    let num_blocks = self.packer.num_blocks();
    let camera = self.camera;
    let mut out = Vec::new();
    for _ in 0..num_blocks {
      self.block_cursor = (self.block_cursor + 1) % num_blocks;
      let id = crate::packer::BlockId(self.block_cursor as u32);
      let Some(info) = self.packer.block_info(id) else {
        continue;
      };
      let Some(owner) = info.user_data else {
        continue;
      };
      let (block_min, block_max) = (info.min, info.max);
      let Some(node) = self.nodes.get_mut(owner) else {
        continue;
      };
      let requested = node.request_segment_update_frame >= frame;
      let ws_box = node.bounds;
      let size = node.size();
      let Some(seg) = node.segment.as_mut() else {
        continue;
      };
      if !(requested || sync_all || seg.stat_lights_changed) || !size_ok(size) {
        continue;
      }
      if node_size != 0.0 && ws_box.distance_to_point(camera) > FILTERED_UPDATE_DISTANCE {
        continue;
      }

      let dims = Vec3::new(ATLAS_DIM_XY as f32, ATLAS_DIM_XY as f32, ATLAS_DIM_Z as f32);
      seg.stat_lights_changed = false;
      out.push(NodeInfo {
        ws_box,
        tc_box: Aabb::new(block_min.as_vec3() / dims, block_max.as_vec3() / dims),
        atlas_offset: seg.atlas_offset,
      });
    }
    out
  }

  /// Round-robin refresh requests, limited by `auto_update_voxels`.
  fn auto_update(&mut self, frame: u32, size_ok: &dyn Fn(f32) -> bool) {
    let num_blocks = self.packer.num_blocks();
    let allowance = self.budget.auto_update_voxels;
    let overhead = self.budget.auto_update_overhead;
    let stale_before = frame.saturating_sub(self.budget.auto_update_interval);
    let mut spent = 0usize;

    for _ in 0..num_blocks {
      if self.auto_update_cursor >= num_blocks {
        self.auto_update_cursor = 0;
      }
      let id = crate::packer::BlockId(self.auto_update_cursor as u32);
      let owner = self.packer.block_info(id).and_then(|b| b.user_data);
      if let Some(node) = owner.and_then(|o| self.nodes.get_mut(o)) {
        let size = node.size();
        let solid = node.segment.as_ref().map_or(0, |s| s.solid_voxels);
        if size_ok(size) && node.request_segment_update_frame < stale_before {
          let cost = (solid as f64).sqrt() as usize + overhead;
          if spent != 0 && spent + cost > allowance {
            break;
          }
          node.request_segment_update_frame = node.request_segment_update_frame.max(frame);
          spent += cost;
        }
      }
      self.auto_update_cursor += 1;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_box_checksum_weights_max_twice() {
    let b = Aabb::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(2.0, 3.0, 4.0));
    assert_eq!(box_checksum(&b), IVec3::new(5000, 8000, 11000));
  }

  #[test]
  fn test_is_equivalent_tolerance() {
    let a = IVec3::new(10, 10, 10);
    assert!(is_equivalent(a, IVec3::new(12, 8, 10), 2));
    assert!(!is_equivalent(a, IVec3::new(13, 10, 10), 2));
  }
}
