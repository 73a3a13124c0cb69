//! OctreeNode - one cube of the sparse voxel octree.
//!
//! A node owns up to eight children through [`NodeId`] handles and
//! optionally one [`VoxelSegment`]. The parent link is a [`NodeRef`] and
//! never keeps the parent alive.
//!
//! Child index is the octant code `x << 2 | y << 1 | z` relative to the box
//! centre (see [`Aabb::child_index`]).

use super::arena::{NodeId, NodeRef};
use super::bounds::Aabb;
use crate::segment::format::ChildTable;
use crate::segment::VoxelSegment;

/// Tree node.
pub struct OctreeNode {
  /// Cube covered by this node.
  pub bounds: Aabb,
  /// Owning parent, `None` for the root.
  pub parent: Option<NodeRef>,
  children: [Option<NodeId>; 8],
  /// Bit `i` set: child `i` turned out empty and is not recreated.
  child_not_needed: u8,
  /// Scene change under this node; the subtree is rebuilt when idle.
  pub force_recreate: bool,
  /// Frame of the last explicit brick update request.
  pub request_segment_update_frame: u32,
  /// Where the children live inside the area file, if streamed.
  pub child_file_offsets: Option<ChildTable>,
  pub segment: Option<VoxelSegment>,
}

impl OctreeNode {
  pub fn new(bounds: Aabb, parent: Option<NodeRef>) -> Self {
    Self {
      bounds,
      parent,
      children: Default::default(),
      child_not_needed: 0,
      force_recreate: false,
      request_segment_update_frame: 0,
      child_file_offsets: None,
      segment: None,
    }
  }

  /// Edge length of the node cube.
  #[inline]
  pub fn size(&self) -> f32 {
    self.bounds.edge()
  }

  /// Child box for octant `child_id`.
  #[inline]
  pub fn child_bounds(&self, child_id: usize) -> Aabb {
    self.bounds.child_box(child_id)
  }

  /// Non-owning handle of child `child_id`.
  #[inline]
  pub fn child(&self, child_id: usize) -> Option<NodeRef> {
    self.children[child_id].as_ref().map(NodeId::downgrade)
  }

  #[inline]
  pub fn has_child(&self, child_id: usize) -> bool {
    self.children[child_id].is_some()
  }

  /// Any child slot occupied.
  pub fn has_children(&self) -> bool {
    self.children.iter().any(Option::is_some)
  }

  /// Child handles of occupied slots, with their octant.
  pub fn child_refs(&self) -> impl Iterator<Item = (usize, NodeRef)> + '_ {
    self
      .children
      .iter()
      .enumerate()
      .filter_map(|(i, c)| c.as_ref().map(|id| (i, id.downgrade())))
  }

  /// Install `child` in slot `child_id`, returning whatever was there.
  pub fn set_child(&mut self, child_id: usize, child: NodeId) -> Option<NodeId> {
    self.children[child_id].replace(child)
  }

  /// Detach the child in slot `child_id`.
  pub fn take_child(&mut self, child_id: usize) -> Option<NodeId> {
    self.children[child_id].take()
  }

  /// Detach every child.
  pub fn take_children(&mut self) -> [Option<NodeId>; 8] {
    std::mem::take(&mut self.children)
  }

  #[inline]
  pub fn is_child_not_needed(&self, child_id: usize) -> bool {
    self.child_not_needed & (1 << child_id) != 0
  }

  #[inline]
  pub fn set_child_not_needed(&mut self, child_id: usize, not_needed: bool) {
    if not_needed {
      self.child_not_needed |= 1 << child_id;
    } else {
      self.child_not_needed &= !(1 << child_id);
    }
  }

  #[inline]
  pub fn child_not_needed_mask(&self) -> u8 {
    self.child_not_needed
  }

  /// Move the "not needed" bit from slot `from` to slot `to`, clearing `from`.
  pub fn move_child_not_needed(&mut self, from: usize, to: usize) {
    let bit = self.is_child_not_needed(from);
    self.set_child_not_needed(to, bit);
    self.set_child_not_needed(from, false);
  }

  /// Octant order for a camera-relative walk: nearest octant first.
  pub fn camera_order(&self, camera: glam::Vec3) -> [usize; 8] {
    let first = self.bounds.child_index(camera);
    [
      first,
      first ^ 1,
      first ^ 2,
      first ^ 4,
      first ^ 3,
      first ^ 5,
      first ^ 6,
      first ^ 7,
    ]
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
