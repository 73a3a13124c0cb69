use std::sync::Arc;

use glam::{UVec3, Vec3};

use super::brick::VoxelBrick;
use super::format::ChildFileOffset;
use super::*;
use crate::error::Result;
use crate::octree::{Aabb, Arena};
use crate::streaming::{SegmentLoader, StreamSource};

struct EmptyLoader;

impl SegmentLoader for EmptyLoader {
  fn stream_async(&self, _request: &StreamRequest) -> Result<SegmentPayload> {
    Ok(SegmentPayload::default())
  }
}

fn engine() -> StreamingEngine {
  StreamingEngine::new(Arc::new(EmptyLoader), 0).unwrap()
}

fn request(node: NodeRef) -> StreamRequest {
  StreamRequest {
    node,
    bounds: Aabb::cube(Vec3::ZERO, 16.0),
    source: StreamSource::Voxelize,
  }
}

fn node_ref() -> NodeRef {
  let mut arena = Arena::new();
  arena.insert(()).downgrade()
}

fn solid_payload() -> SegmentPayload {
  let mut brick = VoxelBrick::new(UVec3::splat(2), 3);
  brick.plane_mut(0)[0] = crate::types::Rgba8::new(255, 0, 0, 0);
  let mut layers = LayerMap::new();
  layers.insert(0, brick);
  SegmentPayload {
    crop: CropBox {
      min: UVec3::splat(3),
      size: UVec3::splat(2),
    },
    layers,
    child_table: None,
    child_tris_mask: 0b0000_0011,
    solid_voxels: 1,
    load_us: 0,
  }
}

#[test]
fn test_new_segment_is_unloaded_without_slot() {
  let seg = VoxelSegment::new(7, None);
  assert_eq!(seg.id, 7);
  assert_eq!(seg.status, StreamingStatus::NotLoaded);
  assert_eq!(seg.atlas_offset, ATLAS_OFFSET_UNALLOCATED);
  assert!(!seg.has_atlas_slot());
  assert!(seg.is_empty());
  assert!(seg.layers.is_empty());
  assert_eq!(seg.file_size, -1);
}

#[test]
fn test_stream_cycle() {
  let mut engine = engine();
  let node = node_ref();
  let mut seg = VoxelSegment::new(0, None);

  assert!(seg.start_streaming(request(node), &mut engine));
  assert_eq!(seg.status, StreamingStatus::InProgress);
  assert_ne!(seg.stream_ticket, 0);
  assert_eq!(engine.in_flight(), 1);

  // Already in flight: accepted without queuing again.
  assert!(seg.start_streaming(request(node), &mut engine));
  assert_eq!(engine.in_flight(), 1);

  let done = engine.process_sync_callbacks();
  assert_eq!(done.len(), 1);
  assert_eq!(done[0].ticket, seg.stream_ticket);

  seg.stream_on_complete(solid_payload());
  assert!(seg.is_ready());
  assert!(!seg.is_empty());
  assert_eq!(seg.solid_voxels, 1);
  assert_eq!(seg.child_tris_mask, 0b0000_0011);

  seg.unload();
  assert_eq!(seg.status, StreamingStatus::NotLoaded);
  assert!(seg.layers.is_empty());
  assert!(seg.is_empty());
  assert_eq!(seg.solid_voxels, 0);
}

#[test]
fn test_stream_on_complete_merges_table_mask() {
  let mut seg = VoxelSegment::new(0, None);
  let mut table = ChildTable::default();
  table[5] = ChildFileOffset { offset: 68, size: 4 };
  let payload = SegmentPayload {
    child_table: Some(table),
    ..solid_payload()
  };

  let returned = seg.stream_on_complete(payload);
  assert_eq!(returned, Some(table));
  assert_eq!(seg.child_tris_mask, 0b0010_0011);
}

#[test]
fn test_cancel_drops_ticket() {
  let mut engine = engine();
  let mut seg = VoxelSegment::new(0, None);
  assert!(seg.start_streaming(request(node_ref()), &mut engine));
  let ticket = seg.stream_ticket;

  seg.cancel_streaming();
  assert_eq!(seg.status, StreamingStatus::NotLoaded);
  assert_ne!(seg.stream_ticket, ticket);

  // Cancelling a loaded segment does nothing.
  seg.stream_on_complete(SegmentPayload::default());
  seg.cancel_streaming();
  assert!(seg.is_ready());
}

#[test]
fn test_child_table_mask() {
  assert_eq!(child_table_mask(None), 0);
  let mut table = ChildTable::default();
  table[0].size = 12;
  table[7].size = 4;
  table[3].offset = 100;
  assert_eq!(child_table_mask(Some(&table)), 0b1000_0001);
}

#[test]
fn test_child_offset_at_atlas_start_keeps_residency() {
  let partial = encode_child_offset(0, false);
  let complete = encode_child_offset(0, true);
  assert_ne!(partial, complete);
  assert_ne!(partial, 0);
  assert_eq!(decode_child_offset(partial), Some((0, false)));
  assert_eq!(decode_child_offset(complete), Some((0, true)));
  assert_eq!(decode_child_offset(encode_child_offset(37, false)), Some((37, false)));
  assert_eq!(decode_child_offset(0), None);
}
