//! Resident segment eviction.
//!
//! Above the high-water mark the loaded segments are sorted by
//! `last_rendered + size * 4` and the oldest are dropped together with
//! their subtree. The walk stops at the first segment that is in flight or
//! was drawn within the recency window.

use super::OctreeManager;
use crate::octree::NodeRef;
use crate::segment::StreamingStatus;

impl OctreeManager {
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::evict_segments"))]
  pub(crate) fn evict_segments(&mut self) {
    if !self.budget.should_evict(self.loaded.len()) {
      return;
    }

    let recency_floor = self
      .frame_id
      .saturating_sub(self.budget.eviction_recency_frames);
    let batch = self.budget.eviction_batch();

    let mut order: Vec<(u64, u32, NodeRef)> = self
      .loaded
      .iter()
      .filter_map(|&r| {
        let node = self.nodes.get(r)?;
        let seg = node.segment.as_ref()?;
        let key = seg.last_rendered_frame as u64 + (node.size() * 4.0) as u64;
        Some((key, seg.id, r))
      })
      .collect();
    order.sort_unstable();

    let mut evicted = 0;
    for (_, _, node_ref) in order {
      if evicted >= batch {
        break;
      }
      let Some(seg) = self.segment(node_ref) else {
        continue;
      };
      if seg.status == StreamingStatus::InProgress || seg.last_rendered_frame >= recency_floor {
        break;
      }
      let Some(parent) = self.nodes.get(node_ref).and_then(|n| n.parent) else {
        // The root is never evicted.
        continue;
      };

      self.release_atlas_block(node_ref);
      if let Some(seg) = self.nodes.get_mut(node_ref).and_then(|n| n.segment.as_mut()) {
        seg.unload();
      }
      if let Some(slot) = self.child_slot(parent, node_ref) {
        self.delete_child(parent, slot);
      }
      evicted += 1;
    }

    if evicted > 0 {
      log::debug!(
        "frame {}: evicted {evicted} segments, {} loaded",
        self.frame_id,
        self.loaded.len()
      );
    }
    self.stats.segments_evicted += evicted;
  }
}
