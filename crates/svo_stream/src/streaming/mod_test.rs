use glam::{UVec3, Vec3};

use super::*;
use crate::interfaces::{ArchiveWriter, MemoryArchive};
use crate::octree::Arena;
use crate::segment::brick::VoxelBrick;
use crate::segment::compressor::Lz4Compressor;
use crate::segment::format::{save_voxels, write_child_table, write_stream_record, ChildFileOffset};
use crate::test_utils::floor_scene;
use crate::types::Rgba8;

fn node_ref() -> NodeRef {
  let mut arena = Arena::new();
  arena.insert(()).downgrade()
}

fn loader(archive: Option<Arc<MemoryArchive>>) -> Arc<VoxelLoader> {
  Arc::new(VoxelLoader {
    scene: Arc::new(floor_scene(2.5)),
    archive: archive.map(|a| a as Arc<dyn ArchiveReader>),
    compressor: Arc::new(Lz4Compressor),
    subset_count: 3,
    max_node_size: 32.0,
  })
}

fn voxelize_request(node: NodeRef) -> StreamRequest {
  StreamRequest {
    node,
    bounds: Aabb::cube(Vec3::ZERO, 16.0),
    source: StreamSource::Voxelize,
  }
}

// =============================================================================
// Inline mode
// =============================================================================

#[test]
fn test_inline_engine_runs_jobs_on_drain() {
  let mut engine = StreamingEngine::new(loader(None), 0).unwrap();
  let node = node_ref();

  let ticket = engine.start_read(voxelize_request(node)).unwrap();
  assert_eq!(engine.in_flight(), 1);

  let done = engine.process_sync_callbacks();
  assert_eq!(done.len(), 1);
  assert_eq!(done[0].ticket, ticket);
  assert_eq!(done[0].node, node);
  let payload = done[0].result.as_ref().unwrap();
  assert_eq!(payload.solid_voxels, 256);
  assert!(!payload.is_empty());
  assert!(engine.is_idle());
}

#[test]
fn test_queue_full_is_backpressure() {
  let mut engine = StreamingEngine::new(loader(None), 0).unwrap();
  let node = node_ref();
  let bounds = Aabb::cube(Vec3::splat(500.0), 16.0);
  for _ in 0..STREAM_QUEUE_CAPACITY {
    let request = StreamRequest {
      node,
      bounds,
      source: StreamSource::Voxelize,
    };
    assert!(engine.start_read(request).is_some());
  }
  assert!(engine.start_read(voxelize_request(node)).is_none());

  assert_eq!(engine.process_sync_callbacks().len(), STREAM_QUEUE_CAPACITY);
  assert!(engine.start_read(voxelize_request(node)).is_some());
}

#[test]
fn test_tickets_are_unique() {
  let mut engine = StreamingEngine::new(loader(None), 0).unwrap();
  let node = node_ref();
  let a = engine.start_read(voxelize_request(node)).unwrap();
  let b = engine.start_read(voxelize_request(node)).unwrap();
  assert_ne!(a, b);
}

// =============================================================================
// Worker threads
// =============================================================================

#[test]
fn test_workers_complete_every_request() {
  let mut engine = StreamingEngine::new(loader(None), 3).unwrap();
  assert_eq!(engine.worker_count(), 3);
  let node = node_ref();

  let mut tickets: Vec<u64> = (0..10)
    .map(|_| engine.start_read(voxelize_request(node)).unwrap())
    .collect();

  let mut seen = Vec::new();
  while seen.len() < tickets.len() {
    let completion = engine
      .wait_completion(Duration::from_secs(30))
      .expect("worker timed out");
    assert!(completion.result.is_ok());
    seen.push(completion.ticket);
  }
  seen.sort_unstable();
  tickets.sort_unstable();
  assert_eq!(seen, tickets);
  assert!(engine.is_idle());
}

#[test]
fn test_drop_with_pending_requests_joins_workers() {
  let mut engine = StreamingEngine::new(loader(None), 2).unwrap();
  let node = node_ref();
  for _ in 0..20 {
    engine.start_read(voxelize_request(node));
  }
  drop(engine);
}

// =============================================================================
// Archive source
// =============================================================================

fn store_record(archive: &MemoryArchive, with_table: bool) -> u32 {
  let mut brick = VoxelBrick::new(UVec3::new(2, 2, 2), 3);
  brick.plane_mut(0)[0] = Rgba8::new(200, 200, 200, 1);
  let mut layers = LayerMap::new();
  layers.insert(0, brick);
  let crop = CropBox {
    min: UVec3::new(3, 4, 5),
    size: UVec3::new(2, 2, 2),
  };
  let payload = save_voxels(&crop, &layers).unwrap();

  let mut file = Vec::new();
  write_stream_record(&mut file, Some(&payload), &Lz4Compressor);
  if with_table {
    let mut table = ChildTable::default();
    table[6] = ChildFileOffset { offset: 1000, size: 40 };
    write_child_table(&mut file, &table);
  }
  archive.write_entry("0256_0256_0256_0512.svo", &file).unwrap();
  file.len() as u32
}

#[test]
fn test_archive_record_is_decoded() {
  let archive = Arc::new(MemoryArchive::new());
  let size = store_record(&archive, true);
  let loader = loader(Some(Arc::clone(&archive)));

  let request = StreamRequest {
    node: node_ref(),
    bounds: Aabb::cube(Vec3::ZERO, 8.0),
    source: StreamSource::Archive {
      file: "0256_0256_0256_0512.svo".into(),
      offset: 0,
      size,
    },
  };
  let payload = loader.stream_async(&request).unwrap();
  assert_eq!(payload.crop.min, UVec3::new(3, 4, 5));
  assert_eq!(payload.solid_voxels, 1);
  let table = payload.child_table.unwrap();
  assert_eq!(table[6], ChildFileOffset { offset: 1000, size: 40 });
}

#[test]
fn test_truncated_archive_record_is_corruption() {
  let archive = Arc::new(MemoryArchive::new());
  let size = store_record(&archive, false);
  let bytes = archive.get("0256_0256_0256_0512.svo").unwrap();
  archive
    .write_entry("bad.svo", &bytes[..bytes.len() - 6])
    .unwrap();

  let request = StreamRequest {
    node: node_ref(),
    bounds: Aabb::cube(Vec3::ZERO, 8.0),
    source: StreamSource::Archive {
      file: "bad.svo".into(),
      offset: 0,
      size: size - 6,
    },
  };
  let err = loader(Some(archive)).stream_async(&request).unwrap_err();
  assert!(err.is_corruption());
}

#[test]
fn test_archive_source_without_archive_fails() {
  let request = StreamRequest {
    node: node_ref(),
    bounds: Aabb::cube(Vec3::ZERO, 8.0),
    source: StreamSource::Archive {
      file: "x.svo".into(),
      offset: 0,
      size: 4,
    },
  };
  let err = loader(None).stream_async(&request).unwrap_err();
  assert!(matches!(err, SvoError::Precondition(_)));
}
