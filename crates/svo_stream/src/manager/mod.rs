//! OctreeManager - owns the tree and drives the per-frame pass.
//!
//! # Frame order
//!
//! ```text
//! render(ctx)
//!   │
//!   ├─ root teleport            (rootless mode, engine idle)
//!   ├─ check_ready(root)        ─┐
//!   ├─ render_node(root)         ├─ fill stream buckets [level][distance]
//!   │    camera-ordered walk    ─┘  and brick update queues [level]
//!   ├─ start_streams            bounded by in-flight and CPU brick caps
//!   ├─ evict_segments           high-water LRU with recency floor
//!   ├─ process_sync_callbacks   the only place a segment becomes Ready
//!   ├─ update_bricks            bounded atlas uploads
//!   └─ update_node_render_data_ptrs
//! ```
//!
//! All mutation happens on the caller thread. Workers only see
//! [`StreamRequest`]s and hand back owned payloads.
//!
//! # Module Structure
//!
//! - [`traversal`]: readiness check, render walk, child allocation, stream starts
//! - [`eviction`]: resident segment eviction
//! - [`atlas`]: atlas slots, uploads and the child offset cache
//! - [`teleport`]: rootless root scrolling
//! - [`change_detection`]: geometry / lighting checksums and GI brick snapshots
//! - [`export`]: area file export

mod atlas;
mod change_detection;
mod eviction;
mod export;
mod teleport;
mod traversal;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use glam::{UVec3, Vec3};
use web_time::Instant;

pub use change_detection::NodeInfo;
pub use export::area_file_name;

use crate::constants::{ATLAS_DIM_XY, ATLAS_DIM_Z, STREAM_BUCKETS};
use crate::error::Result;
use crate::interfaces::{ArchiveReader, AtlasUploader, SceneGeometry};
use crate::metrics::StreamingMetrics;
use crate::octree::{Aabb, Arena, FrameStats, NodeId, NodeRef, OctreeNode, StreamingBudget, SvoConfig};
use crate::packer::BlockPacker3D;
use crate::segment::compressor::{BrickCompressor, Lz4Compressor};
use crate::segment::{StreamingStatus, VoxelSegment};
use crate::streaming::{SegmentPayload, StreamCompletion, StreamingEngine, VoxelLoader};

/// Per-frame inputs that used to be engine globals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
  pub camera: Vec3,
  /// Monotonic frame counter, starting at 1.
  pub frame_id: u32,
}

impl FrameContext {
  pub fn new(camera: Vec3, frame_id: u32) -> Self {
    Self { camera, frame_id }
  }
}

/// One node selected for drawing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
  pub node: NodeRef,
  pub bounds: Aabb,
  pub atlas_offset: i32,
}

/// Result of one `render` call.
#[derive(Clone, Debug, Default)]
pub struct FrameOutput {
  /// Nodes drawn this frame, nearest first within each parent.
  pub draw_list: Vec<DrawItem>,
  /// The root moved; the renderer should skip presenting this frame.
  pub skip_frame: bool,
  /// Nothing was queued and no load is in flight.
  pub settled: bool,
  pub stats: FrameStats,
}

/// Sparse voxel octree with streaming, atlas management and export.
pub struct OctreeManager {
  config: SvoConfig,
  budget: StreamingBudget,
  nodes: Arena<OctreeNode>,
  root: Option<NodeId>,
  packer: BlockPacker3D<NodeRef>,
  engine: StreamingEngine,
  scene: Arc<dyn SceneGeometry>,
  archive: Option<Arc<dyn ArchiveReader>>,
  compressor: Arc<dyn BrickCompressor>,
  /// Segments that completed a load, in completion order.
  loaded: Vec<NodeRef>,
  /// Membership index over `loaded`.
  loaded_set: HashSet<NodeRef>,
  /// `STREAM_BUCKETS × STREAM_BUCKETS` request buckets, level-major.
  stream_buckets: Vec<Vec<NodeRef>>,
  /// Ready segments waiting for an atlas slot, per tree level.
  brick_updates: Vec<Vec<NodeRef>>,
  frame_id: u32,
  camera: Vec3,
  next_segment_id: u32,
  /// Switch to `StreamingBudget::post_load` once startup settles.
  auto_post_load: bool,
  startup_done: bool,
  settled_frames: u32,
  settings_checksum: Option<f64>,
  auto_update_cursor: usize,
  block_cursor: usize,
  stats: FrameStats,
  metrics: StreamingMetrics,
}

impl OctreeManager {
  /// Build a manager with an empty tree. Call [`allocate_root_node`] before
  /// the first frame.
  ///
  /// [`allocate_root_node`]: Self::allocate_root_node
  pub fn new(
    config: SvoConfig,
    budget: StreamingBudget,
    scene: Arc<dyn SceneGeometry>,
    archive: Option<Arc<dyn ArchiveReader>>,
  ) -> Result<Self> {
    config.validate()?;

    let compressor: Arc<dyn BrickCompressor> = Arc::new(Lz4Compressor);
    let loader = Arc::new(VoxelLoader {
      scene: Arc::clone(&scene),
      archive: archive.clone(),
      compressor: Arc::clone(&compressor),
      subset_count: config.subset_count,
      max_node_size: config.max_node_size,
    });
    let engine = StreamingEngine::new(loader, config.worker_threads)?;

    Ok(Self {
      config,
      budget,
      nodes: Arena::new(),
      root: None,
      packer: BlockPacker3D::new(UVec3::new(ATLAS_DIM_XY, ATLAS_DIM_XY, ATLAS_DIM_Z)),
      engine,
      scene,
      archive,
      compressor,
      loaded: Vec::new(),
      loaded_set: HashSet::new(),
      stream_buckets: vec![Vec::new(); STREAM_BUCKETS * STREAM_BUCKETS],
      brick_updates: vec![Vec::new(); STREAM_BUCKETS],
      frame_id: 0,
      camera: Vec3::ZERO,
      next_segment_id: 0,
      auto_post_load: true,
      startup_done: false,
      settled_frames: 0,
      settings_checksum: None,
      auto_update_cursor: 0,
      block_cursor: 0,
      stats: FrameStats::default(),
      metrics: StreamingMetrics::new(),
    })
  }

  /// Keep the startup budget forever.
  pub fn without_post_load(mut self) -> Self {
    self.auto_post_load = false;
    self
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  #[inline]
  pub fn config(&self) -> &SvoConfig {
    &self.config
  }

  #[inline]
  pub fn budget(&self) -> &StreamingBudget {
    &self.budget
  }

  pub fn set_budget(&mut self, budget: StreamingBudget) {
    self.budget = budget;
  }

  /// Non-owning handle of the root.
  #[inline]
  pub fn root(&self) -> Option<NodeRef> {
    self.root.as_ref().map(NodeId::downgrade)
  }

  #[inline]
  pub fn node(&self, node: NodeRef) -> Option<&OctreeNode> {
    self.nodes.get(node)
  }

  #[inline]
  pub fn segment(&self, node: NodeRef) -> Option<&VoxelSegment> {
    self.nodes.get(node).and_then(|n| n.segment.as_ref())
  }

  /// Live nodes, including structural ones.
  #[inline]
  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// Segments holding CPU bricks.
  #[inline]
  pub fn loaded_count(&self) -> usize {
    self.loaded.len()
  }

  #[inline]
  pub fn packer(&self) -> &BlockPacker3D<NodeRef> {
    &self.packer
  }

  #[inline]
  pub fn in_flight(&self) -> usize {
    self.engine.in_flight()
  }

  #[inline]
  pub fn frame_id(&self) -> u32 {
    self.frame_id
  }

  #[inline]
  pub fn is_startup_done(&self) -> bool {
    self.startup_done
  }

  /// Timings and totals, filled with the `metrics` feature.
  #[inline]
  pub fn metrics(&self) -> &StreamingMetrics {
    &self.metrics
  }

  /// Find the deepest existing node containing `point`, at most `max_level`
  /// levels below the root.
  pub fn find_node(&self, point: Vec3, max_level: usize) -> Option<NodeRef> {
    let mut current = self.root()?;
    for _ in 0..max_level {
      let node = self.nodes.get(current)?;
      match node.child(node.bounds.child_index(point)) {
        Some(child) => current = child,
        None => break,
      }
    }
    Some(current)
  }

  // ===========================================================================
  // Tree lifetime
  // ===========================================================================

  /// Replace the tree with a single root whose segment is `NotLoaded`.
  pub fn allocate_root_node(&mut self) -> NodeRef {
    if let Some(old) = self.root.take() {
      self.destroy_subtree(old);
    }
    let id = self.new_node(self.config.get_root_bounds(), None);
    let root = id.downgrade();
    self.root = Some(id);
    log::debug!(
      "allocated svo root of size {}",
      self.config.get_root_size()
    );
    root
  }

  fn new_node(&mut self, bounds: Aabb, parent: Option<NodeRef>) -> NodeId {
    let mut node = OctreeNode::new(bounds, parent);
    node.segment = Some(VoxelSegment::new(self.next_segment_id, parent));
    self.next_segment_id = self.next_segment_id.wrapping_add(1);
    self.nodes.insert(node)
  }

  /// Delete child `child_id` of `parent` with its whole subtree.
  fn delete_child(&mut self, parent: NodeRef, child_id: usize) {
    let Some(child) = self.nodes.get_mut(parent).and_then(|n| n.take_child(child_id)) else {
      return;
    };
    self.mark_parent_dirty(parent);
    self.destroy_subtree(child);
  }

  /// Free nodes, segments and atlas blocks of a detached subtree. In-flight
  /// loads of removed segments come back stale and are dropped.
  fn destroy_subtree(&mut self, id: NodeId) {
    let mut stack = vec![id];
    while let Some(id) = stack.pop() {
      let Some(mut node) = self.nodes.remove(id) else {
        continue;
      };
      stack.extend(node.take_children().into_iter().flatten());
      if let Some(block) = node.segment.as_mut().and_then(|s| s.block.take()) {
        self.packer.remove_block(block);
      }
    }
    let nodes = &self.nodes;
    self.loaded.retain(|r| nodes.contains(*r));
    self.loaded_set.retain(|r| nodes.contains(*r));
  }

  /// Octant of `child` inside `parent`.
  fn child_slot(&self, parent: NodeRef, child: NodeRef) -> Option<usize> {
    self
      .nodes
      .get(parent)?
      .child_refs()
      .find_map(|(i, c)| (c == child).then_some(i))
  }

  // ===========================================================================
  // Frame
  // ===========================================================================

  /// Run one frame: walk, stream, evict, install loads and upload bricks.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::render"))]
  pub fn render(&mut self, ctx: &FrameContext, uploader: &mut dyn AtlasUploader) -> FrameOutput {
    let start = Instant::now();
    self.frame_id = ctx.frame_id;
    self.camera = ctx.camera;
    self.stats = FrameStats::default();

    let skip_frame = self.process_root_teleport();

    let mut draw_list = Vec::new();
    if let Some(root) = self.root() {
      self.check_ready(root, 0);
      self.render_node(root, 0, &mut draw_list);
    }

    let queued = self.stream_buckets.iter().map(Vec::len).sum::<usize>()
      + self.brick_updates.iter().map(Vec::len).sum::<usize>();

    self.start_streams();
    self.evict_segments();

    for completion in self.engine.process_sync_callbacks() {
      self.install_completion(completion);
    }

    self.update_bricks(uploader);
    if let Some(root) = self.root() {
      self.update_node_render_data_ptrs(root, uploader);
    }

    let settled = queued == 0 && self.engine.is_idle();
    self.update_startup_state(settled);

    self.stats.nodes_drawn = draw_list.len();
    self
      .metrics
      .record_frame(&self.stats, start.elapsed().as_micros() as u64);
    FrameOutput {
      draw_list,
      skip_frame,
      settled,
      stats: self.stats,
    }
  }

  /// Render frames from `camera` until nothing is left to load or
  /// `max_wait` passes. Blocks on the workers in between. Returns whether
  /// the tree settled.
  pub fn flush_sync(
    &mut self,
    camera: Vec3,
    uploader: &mut dyn AtlasUploader,
    max_wait: Duration,
  ) -> bool {
    let start = Instant::now();
    loop {
      let frame = self.frame_id.wrapping_add(1).max(1);
      let out = self.render(&FrameContext::new(camera, frame), uploader);
      if out.settled {
        return true;
      }
      let elapsed = start.elapsed();
      if elapsed >= max_wait {
        log::warn!("svo sync flush gave up after {:.1}s", elapsed.as_secs_f32());
        return false;
      }
      if !self.engine.is_idle() {
        if let Some(completion) = self.engine.wait_completion(max_wait - elapsed) {
          self.install_completion(completion);
        }
      }
    }
  }

  /// Two settled frames in a row end startup.
  fn update_startup_state(&mut self, settled: bool) {
    if self.startup_done {
      return;
    }
    self.settled_frames = if settled { self.settled_frames + 1 } else { 0 };
    if self.settled_frames >= 2 {
      self.startup_done = true;
      if self.auto_post_load {
        self.budget = self.budget.post_load();
      }
      log::info!(
        "svo startup streaming done at frame {} ({} segments loaded)",
        self.frame_id,
        self.loaded.len()
      );
    }
  }

  // ===========================================================================
  // Completions
  // ===========================================================================

  fn install_completion(&mut self, completion: StreamCompletion) {
    let current = self
      .segment(completion.node)
      .is_some_and(|s| s.status == StreamingStatus::InProgress && s.stream_ticket == completion.ticket);
    if !current {
      self.stats.stale_completions += 1;
      return;
    }

    match completion.result {
      Ok(payload) => {
        self.stats.streams_completed += 1;
        self.metrics.record_load_timing(payload.load_us);
        self.install_payload(completion.node, payload);
      }
      Err(err) => {
        // The segment stays empty instead of being retried every frame.
        log::warn!("segment load failed, node left empty: {err}");
        self.stats.failed_loads += 1;
        if let Some(seg) = self.nodes.get_mut(completion.node).and_then(|n| n.segment.as_mut()) {
          seg.stream_on_complete(SegmentPayload::default());
        }
        self.mark_loaded(completion.node);
      }
    }
  }

  /// Record a completed segment once, keeping completion order.
  fn mark_loaded(&mut self, node_ref: NodeRef) {
    if self.loaded_set.insert(node_ref) {
      self.loaded.push(node_ref);
    }
  }

  /// Move a finished payload into its segment and update the parent.
  fn install_payload(&mut self, node_ref: NodeRef, payload: SegmentPayload) {
    let empty = payload.is_empty();
    let Some(node) = self.nodes.get_mut(node_ref) else {
      return;
    };
    let Some(seg) = node.segment.as_mut() else {
      return;
    };
    let table = seg.stream_on_complete(payload);
    node.child_file_offsets = table.filter(|t| t.iter().any(|c| c.size != 0));
    let (size, parent, bounds) = (node.size(), node.parent, node.bounds);

    let checksum = self.geom_checksum(&bounds);
    if let Some(seg) = self.nodes.get_mut(node_ref).and_then(|n| n.segment.as_mut()) {
      seg.stat_geom_checksum = checksum;
    }
    self.mark_loaded(node_ref);

    if empty && size <= self.config.max_node_size {
      if let Some(parent) = parent {
        if let Some(slot) = self.child_slot(parent, node_ref) {
          if let Some(p) = self.nodes.get_mut(parent) {
            p.set_child_not_needed(slot, true);
          }
        }
      }
    }
  }
}
