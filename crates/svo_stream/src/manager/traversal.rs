//! Readiness check, render walk, child allocation and stream starts.

use smallvec::SmallVec;

use super::export::area_file_name;
use super::{DrawItem, OctreeManager};
use crate::constants::{AREA_ROOT_RECORD_BYTES, STREAM_BUCKETS};
use crate::octree::NodeRef;
use crate::segment::StreamingStatus;
use crate::streaming::{StreamRequest, StreamSource};

impl OctreeManager {
  /// Ready to draw: the segment is loaded and owns an atlas slot.
  ///
  /// Unloaded segments are queued for streaming, loaded ones without a slot
  /// for a brick update. Refreshes the segment's last-rendered frame.
  pub(crate) fn check_ready(&mut self, node_ref: NodeRef, level: usize) -> bool {
    let frame = self.frame_id;
    let camera = self.camera;
    let budget = self.budget;
    let update_limit = budget.brick_update_limit(self.startup_done);

    let Some(node) = self.nodes.get_mut(node_ref) else {
      return false;
    };
    let size = node.size();
    let distance = node.bounds.distance_to_point(camera);
    let Some(seg) = node.segment.as_mut() else {
      return true;
    };

    if frame > 1 {
      seg.last_rendered_frame = seg.last_rendered_frame.max(frame - 1);
    }

    let level = level.min(STREAM_BUCKETS - 1);
    match seg.status {
      StreamingStatus::NotLoaded => {
        let band = ((distance / size) as usize).min(STREAM_BUCKETS - 1);
        let bucket = &mut self.stream_buckets[level * STREAM_BUCKETS + band];
        if budget.can_queue_request(bucket.len()) {
          bucket.push(node_ref);
        }
        false
      }
      StreamingStatus::InProgress => false,
      StreamingStatus::Ready if seg.has_atlas_slot() => true,
      StreamingStatus::Ready => {
        let queue = &mut self.brick_updates[level];
        if queue.len() < update_limit {
          queue.push(node_ref);
        }
        false
      }
    }
  }

  /// Public readiness query used by tools and tests.
  pub fn check_ready_for_rendering(&mut self, node: NodeRef) -> bool {
    let level = self.node_level(node);
    self.check_ready(node, level)
  }

  fn node_level(&self, node: NodeRef) -> usize {
    let mut level = 0;
    let mut current = self.nodes.get(node).and_then(|n| n.parent);
    while let Some(parent) = current {
      level += 1;
      current = self.nodes.get(parent).and_then(|n| n.parent);
    }
    level
  }

  /// A load is in flight somewhere in the subtree.
  pub(crate) fn subtree_streaming(&self, node_ref: NodeRef) -> bool {
    let mut stack = vec![node_ref];
    while let Some(r) = stack.pop() {
      let Some(node) = self.nodes.get(r) else {
        continue;
      };
      if node
        .segment
        .as_ref()
        .is_some_and(|s| s.status == StreamingStatus::InProgress)
      {
        return true;
      }
      stack.extend(node.child_refs().map(|(_, c)| c));
    }
    false
  }

  /// Camera-ordered walk deciding per node whether to draw it or refine.
  pub(crate) fn render_node(&mut self, node_ref: NodeRef, level: usize, draw_list: &mut Vec<DrawItem>) {
    self.stats.nodes_visited += 1;

    let Some(node) = self.nodes.get(node_ref) else {
      return;
    };
    let stale: SmallVec<[(usize, NodeRef); 8]> = node
      .child_refs()
      .filter(|&(_, c)| self.nodes.get(c).is_some_and(|n| n.force_recreate))
      .collect();
    for (child_id, child) in stale {
      if !self.subtree_streaming(child) {
        log::debug!("recreating changed subtree at {:?}", self.nodes.get(child).map(|n| n.bounds));
        self.delete_child(node_ref, child_id);
      }
    }

    let Some(node) = self.nodes.get(node_ref) else {
      return;
    };
    let size = node.size();
    let bounds = node.bounds;
    let distance = bounds.distance_to_point(self.camera);
    let lod_distance = self.config.get_lod_distance(size);
    let (ready_with_slot, tris_mask) = node
      .segment
      .as_ref()
      .map_or((false, 0), |s| (s.is_ready() && s.has_atlas_slot(), s.child_tris_mask));

    if ready_with_slot
      && (tris_mask != 0 || size > self.config.max_node_size)
      && distance < lod_distance
    {
      self.check_allocate_children(node_ref, self.config.streaming_active);
    }

    let Some(node) = self.nodes.get(node_ref) else {
      return;
    };
    let mut draw_self =
      !node.has_children() || distance > lod_distance || size <= self.config.min_node_size;

    let children: SmallVec<[(usize, NodeRef); 8]> = node.child_refs().collect();
    let order = node.camera_order(self.camera);
    let level = level + 1;

    if !draw_self {
      // Every child is checked so each one gets queued.
      for &(_, child) in &children {
        let has_segment = self.segment(child).is_some();
        if has_segment && !self.check_ready(child, level) {
          draw_self = true;
        }
      }
    }

    if draw_self {
      if let Some(seg) = self.segment(node_ref) {
        if seg.is_ready() && seg.has_atlas_slot() && !seg.is_empty() {
          draw_list.push(DrawItem {
            node: node_ref,
            bounds,
            atlas_offset: seg.atlas_offset,
          });
        }
      }
      return;
    }

    for child_id in order {
      if let Some(&(_, child)) = children.iter().find(|(i, _)| *i == child_id) {
        self.render_node(child, level, draw_list);
      }
    }
  }

  /// Create missing children, honouring "not needed" bits and, when
  /// streaming, the child table of the stored record.
  pub(crate) fn check_allocate_children(&mut self, node_ref: NodeRef, streaming: bool) {
    let frame = self.frame_id;
    let rootless = self.config.rootless_parent_size;
    let area_size = self.config.get_area_size();

    let Some(node) = self.nodes.get_mut(node_ref) else {
      return;
    };
    let size = node.size();
    if size <= self.config.min_node_size {
      return;
    }
    if let Some(seg) = node.segment.as_mut() {
      seg.last_rendered_frame = frame;
    }

    for child_id in 0..8 {
      let Some(node) = self.nodes.get(node_ref) else {
        return;
      };
      let no_record = node
        .child_file_offsets
        .as_ref()
        .map_or(true, |t| t[child_id].size == 0);
      let not_needed =
        node.is_child_not_needed(child_id) || (streaming && size < rootless && no_record);

      if not_needed {
        if node.has_child(child_id) {
          self.delete_child(node_ref, child_id);
        }
        continue;
      }

      if let Some(child) = node.child(child_id) {
        if let Some(seg) = self.nodes.get_mut(child).and_then(|n| n.segment.as_mut()) {
          seg.last_rendered_frame = frame;
        }
        continue;
      }

      let child_bounds = node.child_bounds(child_id);
      let mut record = None;
      if streaming && size <= rootless {
        if child_bounds.edge() == area_size {
          let exists = self
            .archive
            .as_ref()
            .is_some_and(|a| a.exists(&area_file_name(&child_bounds)));
          if !exists {
            if let Some(node) = self.nodes.get_mut(node_ref) {
              node.set_child_not_needed(child_id, true);
            }
            continue;
          }
          record = Some((0, AREA_ROOT_RECORD_BYTES as i32));
        } else if let Some(table) = &node.child_file_offsets {
          let entry = table[child_id];
          record = Some((entry.offset as u64, entry.size as i32));
        }
      }

      let child = self.new_node(child_bounds, Some(node_ref));
      let child_ref = child.downgrade();
      if let Some(node) = self.nodes.get_mut(node_ref) {
        node.set_child(child_id, child);
      }
      if let Some((offset, len)) = record {
        if let Some(seg) = self.nodes.get_mut(child_ref).and_then(|n| n.segment.as_mut()) {
          seg.file_offset = offset;
          seg.file_size = len;
        }
      }
    }
  }

  /// Load request for a segment: area file record when streaming, scene
  /// voxelization otherwise.
  pub(crate) fn stream_request(&self, node_ref: NodeRef) -> Option<StreamRequest> {
    let node = self.nodes.get(node_ref)?;
    let seg = node.segment.as_ref()?;
    let area_size = self.config.get_area_size();

    let source = if self.config.streaming_active && node.size() <= area_size && seg.file_size > 0 {
      let mut area = node;
      while area.size() < area_size {
        area = self.nodes.get(area.parent?)?;
      }
      StreamSource::Archive {
        file: area_file_name(&area.bounds),
        offset: seg.file_offset,
        size: seg.file_size as u32,
      }
    } else {
      StreamSource::Voxelize
    };

    Some(StreamRequest {
      node: node_ref,
      bounds: node.bounds,
      source,
    })
  }

  /// Queue the load of one segment. `false` when the engine refused it.
  pub(crate) fn start_streaming(&mut self, node_ref: NodeRef) -> bool {
    let Some(request) = self.stream_request(node_ref) else {
      return true;
    };
    let Some(seg) = self.nodes.get_mut(node_ref).and_then(|n| n.segment.as_mut()) else {
      return true;
    };
    if seg.status != StreamingStatus::NotLoaded {
      return true;
    }
    if seg.start_streaming(request, &mut self.engine) {
      self.stats.streams_started += 1;
      true
    } else {
      self.stats.streams_rejected += 1;
      false
    }
  }

  /// Drain the request buckets, nearest and shallowest first.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::start_streams"))]
  pub(crate) fn start_streams(&mut self) {
    let mut buckets = std::mem::take(&mut self.stream_buckets);
    for bucket in &mut buckets {
      for &node in bucket.iter() {
        if !self.budget.can_start_stream(self.engine.in_flight()) {
          break;
        }
        if self.budget.over_cpu_cap(self.loaded.len()) {
          break;
        }
        if !self.start_streaming(node) {
          break;
        }
      }
      bucket.clear();
    }
    self.stream_buckets = buckets;

    if self.stats.streams_started > 0 {
      log::debug!(
        "frame {}: started {} streams, {} in flight",
        self.frame_id,
        self.stats.streams_started,
        self.engine.in_flight()
      );
    }
  }
}
