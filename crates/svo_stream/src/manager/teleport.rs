//! Rootless root scrolling.
//!
//! When the camera gets within a quarter of the root size of a root face,
//! the root box moves half its size along that axis. The two octant layers
//! on the trailing side are dropped and the leading layer moves into the
//! freed slots; their boxes already match the new slots.
//!
//! ```text
//!   before           after (+x)
//!   ┌────┬────┐          ┌────┬────┐
//!   │ 0  │ 4  │ cam →    │ 4' │ -- │
//!   └────┴────┘          └────┴────┘
//!   child 0 deleted, child 4 moved to slot 0
//! ```

use glam::Vec3;

use super::OctreeManager;
use crate::octree::NodeId;

/// Distance past the quarter line before the root scrolls.
const TELEPORT_THRESHOLD: f32 = 2.0;

/// Old and new octant for the `(i, j)` pair of the two other axes.
fn teleport_slots(axis: usize, leading: bool, i: bool, j: bool) -> (usize, usize) {
  let bit = |b: bool, v: usize| if b { v } else { 0 };
  let slot = |side: bool| match axis {
    0 => bit(side, 4) | bit(i, 2) | bit(j, 1),
    1 => bit(i, 4) | bit(side, 2) | bit(j, 1),
    _ => bit(j, 4) | bit(i, 2) | bit(side, 1),
  };
  (slot(leading), slot(!leading))
}

impl OctreeManager {
  /// Scroll the root toward the camera. Returns `true` when it moved; that
  /// frame should not be presented.
  pub(crate) fn process_root_teleport(&mut self) -> bool {
    if !self.config.rootless
      || self.config.rootless_parent_size >= self.config.world_size
      || !self.engine.is_idle()
    {
      return false;
    }
    let Some(root_ref) = self.root() else {
      return false;
    };
    let camera = self.camera;
    let mut dropped: Vec<NodeId> = Vec::new();

    let Some(root) = self.nodes.get_mut(root_ref) else {
      return false;
    };
    let old_bounds = root.bounds;
    let center = old_bounds.center();
    let size = old_bounds.edge();
    let mut moved = false;

    for axis in 0..3 {
      let scroll = if camera[axis] > old_bounds.max[axis] - size / 4.0 + TELEPORT_THRESHOLD {
        1.0
      } else if camera[axis] < old_bounds.min[axis] + size / 4.0 - TELEPORT_THRESHOLD {
        -1.0
      } else {
        continue;
      };
      moved = true;

      let mut shift = Vec3::ZERO;
      shift[axis] = size / 2.0 * scroll;
      root.bounds = root.bounds.translated(shift);
      if let Some(seg) = root.segment.as_mut() {
        seg.child_offsets_dirty = 2;
      }

      let leading = camera[axis] > center[axis];
      for i in [false, true] {
        for j in [false, true] {
          let (old, new) = teleport_slots(axis, leading, i, j);
          dropped.extend(root.take_child(new));
          if let Some(child) = root.take_child(old) {
            root.set_child(new, child);
          }
          root.move_child_not_needed(old, new);
        }
      }
    }

    if !moved {
      return false;
    }
    let new_bounds = root.bounds;
    for id in dropped {
      self.destroy_subtree(id);
    }
    log::info!(
      "svo root teleported from {:?} to {:?}",
      old_bounds.min,
      new_bounds.min
    );
    true
  }
}
