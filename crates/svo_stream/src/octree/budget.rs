//! Per-frame work limits for streaming, eviction and atlas updates.
//!
//! Keeps a frame from doing unbounded work: stream starts, resident bricks
//! and atlas uploads are all capped, and eviction is batched.

use crate::constants::ATLAS_BRICK_CAPACITY;

/// Frame budget for the octree manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamingBudget {
  /// Maximum streaming jobs in flight (0 = unlimited).
  /// Also caps each level × distance request bucket.
  pub max_stream_requests: usize,
  /// Resident CPU bricks before stream starts stop (0 = unlimited).
  /// Eviction kicks in at `max_bricks_on_cpu - max_stream_requests`.
  pub max_bricks_on_cpu: usize,
  /// Atlas uploads per frame (0 = unlimited).
  pub max_brick_updates: usize,
  /// Multiplier on `max_brick_updates` until startup streaming is done.
  pub startup_update_multiplier: usize,
  /// Evicted segments per frame on top of `max_stream_requests`.
  pub eviction_batch_base: usize,
  /// Segments rendered within this many frames are never evicted.
  pub eviction_recency_frames: u32,
  /// Atlas blocks used within this many frames are never stolen.
  pub atlas_recency_frames: u32,
  /// Evict-and-retry passes per atlas allocation.
  pub atlas_eviction_passes: usize,
  /// Oldest atlas blocks released per pass.
  pub atlas_eviction_batch: usize,
  /// Auto refresh allowance, in sqrt(solid voxels) units (0 = off).
  pub auto_update_voxels: usize,
  /// Fixed cost added per auto refreshed brick.
  pub auto_update_overhead: usize,
  /// Frames between automatic refreshes of the same brick.
  pub auto_update_interval: u32,
}

impl StreamingBudget {
  /// Startup budget: generous so the first view fills quickly.
  pub const DEFAULT: Self = Self {
    max_stream_requests: 32,
    max_bricks_on_cpu: 8192,
    max_brick_updates: 128,
    startup_update_multiplier: 100,
    eviction_batch_base: 4,
    eviction_recency_frames: 32,
    atlas_recency_frames: 16,
    atlas_eviction_passes: 16,
    atlas_eviction_batch: 4,
    auto_update_voxels: 100,
    auto_update_overhead: 10,
    auto_update_interval: 30,
  };

  /// Unlimited budget for tests and synchronous flushes.
  pub const UNLIMITED: Self = Self {
    max_stream_requests: usize::MAX,
    max_bricks_on_cpu: 0,
    max_brick_updates: usize::MAX,
    startup_update_multiplier: 1,
    eviction_batch_base: 4,
    eviction_recency_frames: 32,
    atlas_recency_frames: 16,
    atlas_eviction_passes: 16,
    atlas_eviction_batch: 4,
    auto_update_voxels: 0,
    auto_update_overhead: 0,
    auto_update_interval: 30,
  };

  /// Steady-state budget applied once startup streaming finished:
  /// 4 uploads and 4 stream requests per frame, CPU cap at 1.5× atlas.
  pub fn post_load(self) -> Self {
    Self {
      max_brick_updates: 4,
      max_stream_requests: 4,
      max_bricks_on_cpu: ATLAS_BRICK_CAPACITY * 3 / 2,
      ..self
    }
  }

  /// Check if another stream can be started.
  #[inline]
  pub fn can_start_stream(&self, in_flight: usize) -> bool {
    self.max_stream_requests == 0 || in_flight < self.max_stream_requests
  }

  /// Check if a request bucket accepts another entry.
  #[inline]
  pub fn can_queue_request(&self, bucket_len: usize) -> bool {
    self.can_start_stream(bucket_len)
  }

  /// Resident count is above the CPU cap.
  #[inline]
  pub fn over_cpu_cap(&self, loaded: usize) -> bool {
    self.max_bricks_on_cpu != 0 && loaded > self.max_bricks_on_cpu
  }

  /// Resident count that triggers eviction.
  #[inline]
  pub fn eviction_high_water(&self) -> usize {
    self.max_bricks_on_cpu.saturating_sub(self.max_stream_requests)
  }

  /// Resident count is above the eviction high-water mark.
  #[inline]
  pub fn should_evict(&self, loaded: usize) -> bool {
    self.max_bricks_on_cpu != 0 && loaded > self.eviction_high_water()
  }

  /// Segments evicted per frame: `4 + max_stream_requests`.
  #[inline]
  pub fn eviction_batch(&self) -> usize {
    self.eviction_batch_base.saturating_add(self.max_stream_requests)
  }

  /// Atlas upload cap for this frame.
  #[inline]
  pub fn brick_update_limit(&self, startup_done: bool) -> usize {
    if self.max_brick_updates == 0 {
      return usize::MAX;
    }
    if startup_done {
      self.max_brick_updates
    } else {
      self.max_brick_updates.saturating_mul(self.startup_update_multiplier)
    }
  }
}

impl Default for StreamingBudget {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Statistics from one `render` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
  /// Nodes visited by the render walk.
  pub nodes_visited: usize,
  /// Nodes put on the draw list.
  pub nodes_drawn: usize,
  /// Streaming jobs started.
  pub streams_started: usize,
  /// Starts refused by the engine queue.
  pub streams_rejected: usize,
  /// Completions installed.
  pub streams_completed: usize,
  /// Completions for deleted or re-requested segments, dropped.
  pub stale_completions: usize,
  /// Completions that failed to decode.
  pub failed_loads: usize,
  /// Segments unloaded by the high-water pass.
  pub segments_evicted: usize,
  /// Bricks uploaded to the atlas.
  pub brick_updates: usize,
  /// Uploads that found no atlas space.
  pub brick_updates_postponed: usize,
  /// Atlas blocks stolen from older bricks.
  pub atlas_evictions: usize,
}

impl FrameStats {
  /// Streaming jobs that left the engine this frame.
  #[inline]
  pub fn total_completions(&self) -> usize {
    self.streams_completed + self.stale_completions + self.failed_loads
  }

  /// Bricks that left CPU memory or the atlas this frame.
  #[inline]
  pub fn total_evictions(&self) -> usize {
    self.segments_evicted + self.atlas_evictions
  }
}
