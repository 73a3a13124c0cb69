//! Engine-agnostic streaming statistics.
//!
//! Feature-gated and runtime-toggled so nothing is recorded unless asked.
//!
//! # Usage
//!
//! ```ignore
//! use svo_stream::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let out = manager.render(&ctx, &mut uploader);
//! println!("avg load {:.0}us", manager.metrics().avg_load_us());
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

use crate::octree::FrameStats;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Metrics are compiled in and switched on.
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Fixed-capacity history of recent values.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a value, dropping the oldest at capacity.
  pub fn push(&mut self, value: T) {
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Oldest to newest.
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
  pub fn sum(&self) -> T {
    self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
  }
}

impl RollingWindow<u64> {
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = *self.buffer.iter().min()?;
    let max = *self.buffer.iter().max()?;
    Some((min, max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(128)
  }
}

/// Streaming statistics accumulated over frames.
#[derive(Debug, Clone, Default)]
pub struct StreamingMetrics {
  /// Worker time per completed load, in microseconds.
  pub load_timings: RollingWindow<u64>,
  /// Main-thread time per `render`, in microseconds.
  pub frame_timings: RollingWindow<u64>,
  /// Counters of the last frame.
  pub last_frame: FrameStats,
  pub total_streams_completed: u64,
  pub total_failed_loads: u64,
  pub total_segments_evicted: u64,
  pub total_atlas_evictions: u64,
  pub total_brick_updates: u64,
  pub total_brick_updates_postponed: u64,
}

impl StreamingMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record the worker time of one completed load.
  pub fn record_load_timing(&mut self, timing_us: u64) {
    if is_enabled() {
      self.load_timings.push(timing_us);
    }
  }

  /// Fold one frame's counters and timing into the totals.
  pub fn record_frame(&mut self, stats: &FrameStats, timing_us: u64) {
    if !is_enabled() {
      return;
    }
    self.frame_timings.push(timing_us);
    self.last_frame = *stats;
    self.total_streams_completed += stats.streams_completed as u64;
    self.total_failed_loads += stats.failed_loads as u64;
    self.total_segments_evicted += stats.segments_evicted as u64;
    self.total_atlas_evictions += stats.atlas_evictions as u64;
    self.total_brick_updates += stats.brick_updates as u64;
    self.total_brick_updates_postponed += stats.brick_updates_postponed as u64;
  }

  pub fn avg_load_us(&self) -> f64 {
    self.load_timings.average()
  }

  pub fn avg_frame_us(&self) -> f64 {
    self.frame_timings.average()
  }

  /// Clear timings and totals.
  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rolling_window() {
    let mut window = RollingWindow::new(3);
    assert!(window.is_empty());
    assert_eq!(window.min_max(), None);

    window.push(10u64);
    window.push(20);
    window.push(30);
    assert_eq!(window.sum(), 60);
    assert_eq!(window.average(), 20.0);

    window.push(40);
    assert_eq!(window.len(), 3);
    assert_eq!(window.sum(), 90);
    assert_eq!(window.min_max(), Some((20, 40)));
    assert_eq!(window.last(), Some(&40));
  }

  #[cfg(feature = "metrics")]
  #[test]
  fn test_record_frame_accumulates() {
    let mut metrics = StreamingMetrics::new();
    let stats = FrameStats {
      streams_completed: 3,
      brick_updates: 2,
      segments_evicted: 1,
      ..FrameStats::default()
    };
    metrics.record_frame(&stats, 500);
    metrics.record_frame(&stats, 700);
    metrics.record_load_timing(100);

    assert_eq!(metrics.total_streams_completed, 6);
    assert_eq!(metrics.total_brick_updates, 4);
    assert_eq!(metrics.total_segments_evicted, 2);
    assert_eq!(metrics.avg_frame_us(), 600.0);
    assert_eq!(metrics.avg_load_us(), 100.0);
    assert_eq!(metrics.last_frame, stats);
  }

  #[cfg(not(feature = "metrics"))]
  #[test]
  fn test_disabled_metrics_record_nothing() {
    let mut metrics = StreamingMetrics::new();
    metrics.record_frame(&FrameStats::default(), 500);
    metrics.record_load_timing(100);
    assert!(metrics.frame_timings.is_empty());
    assert!(metrics.load_timings.is_empty());
  }
}
