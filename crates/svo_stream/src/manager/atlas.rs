//! Atlas slots: allocation with bounded eviction, brick upload, dirty
//! propagation and the per-node child offset cache.

use std::sync::Arc;

use glam::{IVec3, UVec3};
use smallvec::SmallVec;

use super::OctreeManager;
use crate::constants::{chunks_for, ALLOC_CHUNK_SIZE, ATLAS_OFFSET_UNALLOCATED};
use crate::interfaces::AtlasUploader;
use crate::octree::NodeRef;
use crate::packer::BlockId;
use crate::segment::brick::combine_layers;
use crate::segment::{encode_child_offset, StreamingStatus};

impl OctreeManager {
  /// Give queued Ready segments an atlas slot, up to the frame limit.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::update_bricks"))]
  pub(crate) fn update_bricks(&mut self, uploader: &mut dyn AtlasUploader) {
    let limit = self.budget.brick_update_limit(self.startup_done);
    let mut updates = 0usize;

    let mut queues = std::mem::take(&mut self.brick_updates);
    'levels: for queue in &queues {
      for &node in queue {
        if updates >= limit {
          break 'levels;
        }
        let Some(seg) = self.segment(node) else {
          continue;
        };
        if seg.status != StreamingStatus::Ready {
          continue;
        }
        updates += 1;
        if seg.has_atlas_slot() {
          continue;
        }
        if !self.update_brick_render_data(node, uploader) {
          break;
        }
        self.propagate_dirty_flag(node);
      }
    }
    for queue in &mut queues {
      queue.clear();
    }
    self.brick_updates = queues;
  }

  /// Allocate an atlas slot for the segment's cropped brick and upload it.
  ///
  /// On a full atlas the oldest unused blocks are released and the
  /// allocation retried a bounded number of times. Returns `false` when the
  /// update is postponed.
  pub(crate) fn update_brick_render_data(&mut self, node_ref: NodeRef, uploader: &mut dyn AtlasUploader) -> bool {
    self.release_atlas_block(node_ref);

    let frame = self.frame_id;
    let Some(seg) = self.segment(node_ref) else {
      return false;
    };
    let crop = seg.crop.size;
    let dims = UVec3::new(
      chunks_for(crop.x as usize),
      chunks_for(crop.y as usize),
      chunks_for(crop.z as usize),
    );
    let data_size = crop.x * crop.y * crop.z;

    let mut block = None;
    for _ in 0..self.budget.atlas_eviction_passes {
      block = self.packer.add_block(dims, node_ref, frame, data_size);
      if block.is_some() || self.steal_atlas_blocks() == 0 {
        break;
      }
    }

    let Some(block) = block else {
      log::warn!("brick update postponed at frame {frame}: atlas full");
      self.stats.brick_updates_postponed += 1;
      return false;
    };
    let Some(origin) = self.packer.block_info(block).map(|b| b.min) else {
      return false;
    };
    let atlas_offset = self.packer.chunk_offset(origin) as i32;

    let scene = Arc::clone(&self.scene);
    let Some(node) = self.nodes.get_mut(node_ref) else {
      return false;
    };
    node.request_segment_update_frame = node.request_segment_update_frame.max(frame);
    let bounds = node.bounds;
    let Some(seg) = node.segment.as_mut() else {
      return false;
    };
    seg.block = Some(block);
    seg.atlas_offset = atlas_offset;
    seg.stat_lights_checksum = IVec3::ZERO;
    seg.last_tex_update_frame = frame;
    seg.last_rendered_frame = frame;

    if !seg.is_empty() {
      if let Some(brick) = combine_layers(&seg.layers, |layer| scene.is_layer_active(layer)) {
        uploader.upload_brick(origin * ALLOC_CHUNK_SIZE as u32, &brick);
      }
    }
    uploader.update_node_data(atlas_offset, &bounds, &seg.child_offsets);
    self.stats.brick_updates += 1;
    true
  }

  /// Release up to `atlas_eviction_batch` blocks whose owners were not
  /// drawn or updated recently, oldest first (bigger nodes count as newer).
  fn steal_atlas_blocks(&mut self) -> usize {
    let frame = self.frame_id;
    let max_allowed = frame.saturating_sub(self.budget.atlas_recency_frames);
    let min_node_size = self.config.min_node_size;

    let mut slots: SmallVec<[(u32, Option<NodeRef>); 4]> =
      SmallVec::from_elem((u32::MAX, None), self.budget.atlas_eviction_batch.max(1));

    let ids: Vec<BlockId> = self.packer.iter().map(|(id, _)| id).collect();
    for id in ids {
      let newest = slots
        .iter()
        .enumerate()
        .max_by_key(|(_, s)| s.0)
        .map_or(0, |(i, _)| i);
      let Some(info) = self.packer.block_info_mut(id) else {
        continue;
      };
      if info.last_visited_frame >= slots[newest].0 || info.last_visited_frame >= max_allowed {
        continue;
      }
      let Some(owner) = info.user_data else {
        continue;
      };
      let Some(node) = self.nodes.get(owner) else {
        continue;
      };
      let Some(seg) = node.segment.as_ref() else {
        continue;
      };
      info.last_visited_frame = seg.last_rendered_frame;
      let weighted = seg
        .last_rendered_frame
        .saturating_add((node.size() / min_node_size) as u32);
      if weighted < slots[newest].0
        && seg.last_tex_update_frame < max_allowed
        && seg.last_rendered_frame < max_allowed
      {
        slots[newest] = (weighted, Some(owner));
      }
    }

    let mut released = 0;
    for owner in slots.into_iter().filter_map(|(_, owner)| owner) {
      self.release_atlas_block(owner);
      released += 1;
    }
    self.stats.atlas_evictions += released;
    released
  }

  /// Free the segment's atlas block and mark the ancestors dirty.
  pub(crate) fn release_atlas_block(&mut self, node_ref: NodeRef) {
    let Some(node) = self.nodes.get_mut(node_ref) else {
      return;
    };
    node.request_segment_update_frame = 0;
    let Some(seg) = node.segment.as_mut() else {
      return;
    };
    if let Some(block) = seg.block.take() {
      self.packer.remove_block(block);
    }
    seg.atlas_offset = ATLAS_OFFSET_UNALLOCATED;
    seg.stat_lights_checksum = IVec3::ZERO;
    self.propagate_dirty_flag(node_ref);
  }

  /// Parent and grandparent re-upload their node data, further ancestors
  /// re-walk their children.
  pub(crate) fn propagate_dirty_flag(&mut self, node_ref: NodeRef) {
    let parent = self.nodes.get(node_ref).and_then(|n| n.parent);
    if let Some(parent) = parent {
      self.mark_parent_dirty(parent);
    }
  }

  /// Dirty marks for a node whose child set or child slots changed.
  pub(crate) fn mark_parent_dirty(&mut self, parent: NodeRef) {
    let mut current = Some(parent);
    let mut depth = 0;
    while let Some(r) = current {
      let Some(node) = self.nodes.get_mut(r) else {
        break;
      };
      if let Some(seg) = node.segment.as_mut() {
        seg.child_offsets_dirty = if depth < 2 { 2 } else { seg.child_offsets_dirty.max(1) };
      }
      current = node.parent;
      depth += 1;
    }
  }

  /// Refresh cached child atlas offsets top-down where marked dirty.
  ///
  /// A child offset is negated when the child's own children are not all
  /// resident (or it has none), telling the tracer to stop descending.
  pub(crate) fn update_node_render_data_ptrs(&mut self, node_ref: NodeRef, uploader: &mut dyn AtlasUploader) {
    let Some(node) = self.nodes.get(node_ref) else {
      return;
    };
    let Some(seg) = node.segment.as_ref() else {
      return;
    };
    if !node.has_children() || !seg.has_atlas_slot() || seg.child_offsets_dirty == 0 {
      return;
    }
    let children: SmallVec<[(usize, NodeRef); 8]> = node.child_refs().collect();

    let mut offsets = [0i32; 8];
    for (child_id, child) in children {
      if self.segment(child).is_none() {
        continue;
      }
      self.update_node_render_data_ptrs(child, uploader);

      let Some(child_node) = self.nodes.get(child) else {
        continue;
      };
      let Some(child_seg) = child_node.segment.as_ref() else {
        continue;
      };
      if !child_seg.has_atlas_slot() {
        continue;
      }
      let (mut all, mut resident) = (0, 0);
      for (_, sub) in child_node.child_refs() {
        if let Some(sub_seg) = self.segment(sub) {
          all += 1;
          if sub_seg.has_atlas_slot() {
            resident += 1;
          }
        }
      }
      offsets[child_id] = encode_child_offset(child_seg.atlas_offset, all == resident && all != 0);
    }

    let Some(node) = self.nodes.get_mut(node_ref) else {
      return;
    };
    let bounds = node.bounds;
    let Some(seg) = node.segment.as_mut() else {
      return;
    };
    seg.child_offsets = offsets;
    if seg.child_offsets_dirty == 2 {
      uploader.update_node_data(seg.atlas_offset, &bounds, &offsets);
    }
    seg.child_offsets_dirty = 0;
  }
}
