//! VoxelSegment - the brick payload of one octree node.
//!
//! # Streaming state machine
//!
//! ```text
//!              start_streaming            process_sync_callbacks
//!  NotLoaded ───────────────────► InProgress ─────────────────────► Ready
//!      ▲                              │  (stale or failed)            │
//!      │                              ▼                               │
//!      └──────────────────────────────┴───────── unload ◄─────────────┘
//! ```
//!
//! The atlas slot is a separate sub-state: a `Ready` segment may or may not
//! own a packer block. `atlas_offset >= 0` holds exactly while `block` is
//! `Some`.
//!
//! # Module Structure
//!
//! - [`brick`]: brick planes, cropping and layer merge
//! - [`format`]: payload and stream record codec
//! - [`compressor`]: block compression of stored payloads

pub mod brick;
pub mod compressor;
pub mod format;

use glam::IVec3;

use brick::{CropBox, LayerMap};
use format::ChildTable;

use crate::constants::ATLAS_OFFSET_UNALLOCATED;
use crate::octree::NodeRef;
use crate::packer::BlockId;
use crate::streaming::{SegmentPayload, StreamRequest, StreamingEngine};

/// Where a segment is in its load cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StreamingStatus {
  #[default]
  NotLoaded,
  InProgress,
  Ready,
}

/// Voxel payload and render bookkeeping of one node.
#[derive(Debug)]
pub struct VoxelSegment {
  /// Unique per manager, assigned on creation.
  pub id: u32,
  pub status: StreamingStatus,
  /// Node owning the parent segment.
  pub parent: Option<NodeRef>,
  /// Cropped bricks, one per object layer.
  pub layers: LayerMap,
  pub crop: CropBox,
  /// Flat atlas chunk offset, or `ATLAS_OFFSET_UNALLOCATED`.
  pub atlas_offset: i32,
  pub block: Option<BlockId>,
  /// Child offset cache, one [`encode_child_offset`] entry per octant.
  pub child_offsets: [i32; 8],
  /// 0 = clean, 1 = re-walk children, 2 = re-walk and re-upload node data.
  pub child_offsets_dirty: u8,
  pub solid_voxels: usize,
  pub stat_geom_checksum: IVec3,
  pub stat_lights_checksum: IVec3,
  pub stat_lights_changed: bool,
  /// Stream record position inside the area file.
  pub file_offset: u64,
  /// Stream record length; negative means "voxelize from the scene".
  pub file_size: i32,
  pub last_rendered_frame: u32,
  pub last_tex_update_frame: u32,
  /// Bit `i` set when child octant `i` contains triangles.
  pub child_tris_mask: u8,
  /// Ticket of the in-flight request. Completions carrying another ticket
  /// are stale.
  pub stream_ticket: u64,
}

impl VoxelSegment {
  pub fn new(id: u32, parent: Option<NodeRef>) -> Self {
    Self {
      id,
      status: StreamingStatus::NotLoaded,
      parent,
      layers: LayerMap::new(),
      crop: CropBox::default(),
      atlas_offset: ATLAS_OFFSET_UNALLOCATED,
      block: None,
      child_offsets: [0; 8],
      child_offsets_dirty: 0,
      solid_voxels: 0,
      stat_geom_checksum: IVec3::ZERO,
      stat_lights_checksum: IVec3::ZERO,
      stat_lights_changed: false,
      file_offset: 0,
      file_size: -1,
      last_rendered_frame: 0,
      last_tex_update_frame: 0,
      child_tris_mask: 0,
      stream_ticket: 0,
    }
  }

  #[inline]
  pub fn is_ready(&self) -> bool {
    self.status == StreamingStatus::Ready
  }

  /// Owns an atlas block.
  #[inline]
  pub fn has_atlas_slot(&self) -> bool {
    self.block.is_some()
  }

  /// Loaded and holds no voxels.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.crop.is_empty() || self.layers.is_empty()
  }

  /// Queue the load of this segment.
  ///
  /// Returns `true` when the segment is already past `NotLoaded` or the
  /// request was accepted, `false` when the engine queue is full.
  pub fn start_streaming(&mut self, request: StreamRequest, engine: &mut StreamingEngine) -> bool {
    if self.status != StreamingStatus::NotLoaded {
      return true;
    }
    match engine.start_read(request) {
      Some(ticket) => {
        self.stream_ticket = ticket;
        self.status = StreamingStatus::InProgress;
        true
      }
      None => false,
    }
  }

  /// Install a finished load. Returns the child table read with the record.
  pub fn stream_on_complete(&mut self, payload: SegmentPayload) -> Option<ChildTable> {
    self.layers = payload.layers;
    self.crop = payload.crop;
    self.solid_voxels = payload.solid_voxels;
    self.child_tris_mask = payload.child_tris_mask | child_table_mask(payload.child_table.as_ref());
    self.status = StreamingStatus::Ready;
    payload.child_table
  }

  /// Drop the CPU bricks. The atlas block must already be released.
  pub fn unload(&mut self) {
    debug_assert!(self.block.is_none(), "unload with a live atlas block");
    self.layers.clear();
    self.crop = CropBox::default();
    self.solid_voxels = 0;
    self.child_tris_mask = 0;
    self.status = StreamingStatus::NotLoaded;
  }

  /// Cancel an in-flight load; its completion will be discarded.
  pub fn cancel_streaming(&mut self) {
    if self.status == StreamingStatus::InProgress {
      self.status = StreamingStatus::NotLoaded;
      self.stream_ticket = 0;
    }
  }
}

/// Child offset cache entry for a child at `atlas_offset`.
///
/// `0` means no drawable child. Otherwise the magnitude is
/// `atlas_offset + 1` and the sign is negative while the child's own
/// children are not all resident.
pub fn encode_child_offset(atlas_offset: i32, children_resident: bool) -> i32 {
  let biased = atlas_offset + 1;
  if children_resident {
    biased
  } else {
    -biased
  }
}

/// Inverse of [`encode_child_offset`]: `(atlas_offset, children_resident)`.
pub fn decode_child_offset(entry: i32) -> Option<(i32, bool)> {
  match entry {
    0 => None,
    e => Some((e.abs() - 1, e > 0)),
  }
}

/// Bit `i` set when child `i` has a record in `table`.
pub fn child_table_mask(table: Option<&ChildTable>) -> u8 {
  table.map_or(0, |t| {
    t.iter()
      .enumerate()
      .filter(|(_, c)| c.size != 0)
      .fold(0u8, |mask, (i, _)| mask | (1 << i))
  })
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
