//! Streaming engine: bounded request queue, fixed worker pool, bounded
//! completion queue drained on the main thread.
//!
//! # Flow
//!
//! ```text
//! Main Thread                          Workers (std::thread × N)
//! ┌──────────────────┐
//! │ start_read()     │── try_send ──► requests (bounded MPMC)
//! │  false = full    │                      │
//! └──────────────────┘                      ▼
//!                                   ┌────────────────────┐
//!                                   │ loader.stream_async│
//!                                   │ (archive read or   │
//!                                   │  voxelization)     │
//!                                   └─────────┬──────────┘
//! ┌──────────────────────────┐                │
//! │ process_sync_callbacks() │◄── completions (bounded)
//! │  install segments        │
//! └──────────────────────────┘
//! ```
//!
//! With `worker_threads == 0` no threads are spawned and queued jobs run on
//! the caller inside `process_sync_callbacks`.
//!
//! Every accepted request gets a ticket. A segment remembers the ticket of
//! its in-flight request; a completion whose ticket no longer matches (the
//! node was deleted or re-requested) is stale and dropped by the caller.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use web_time::Instant;

use crate::constants::STREAM_QUEUE_CAPACITY;
use crate::error::{Result, SvoError};
use crate::interfaces::{ArchiveReader, SceneGeometry};
use crate::octree::{Aabb, NodeRef};
use crate::segment::brick::{solid_voxel_count, CropBox, LayerMap};
use crate::segment::compressor::BrickCompressor;
use crate::segment::format::{read_stream_record, ChildTable};
use crate::voxelize::voxelize_meshes;

/// Where a segment's voxels come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamSource {
  /// Voxelize scene triangles.
  Voxelize,
  /// Read a stream record from an area file.
  Archive { file: String, offset: u64, size: u32 },
}

/// One segment load.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
  pub node: NodeRef,
  pub bounds: Aabb,
  pub source: StreamSource,
}

/// Decoded segment contents produced by a worker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentPayload {
  pub crop: CropBox,
  pub layers: LayerMap,
  pub child_table: Option<ChildTable>,
  pub child_tris_mask: u8,
  pub solid_voxels: usize,
  /// Worker time in microseconds.
  pub load_us: u64,
}

impl SegmentPayload {
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.crop.is_empty() || self.layers.is_empty()
  }
}

/// A finished load, handed back to the main thread.
#[derive(Debug)]
pub struct StreamCompletion {
  pub node: NodeRef,
  pub ticket: u64,
  pub result: Result<SegmentPayload>,
}

/// Worker-side load of one segment.
pub trait SegmentLoader: Send + Sync {
  fn stream_async(&self, request: &StreamRequest) -> Result<SegmentPayload>;
}

/// Loader backed by scene voxelization and an optional archive.
pub struct VoxelLoader {
  pub scene: Arc<dyn SceneGeometry>,
  pub archive: Option<Arc<dyn ArchiveReader>>,
  pub compressor: Arc<dyn BrickCompressor>,
  pub subset_count: usize,
  pub max_node_size: f32,
}

impl SegmentLoader for VoxelLoader {
  fn stream_async(&self, request: &StreamRequest) -> Result<SegmentPayload> {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("stream_async").entered();

    let start = Instant::now();
    let mut payload = match &request.source {
      StreamSource::Voxelize => {
        let out = voxelize_meshes(
          self.scene.as_ref(),
          &request.bounds,
          self.subset_count,
          self.max_node_size,
        );
        SegmentPayload {
          crop: out.crop,
          layers: out.layers,
          child_table: None,
          child_tris_mask: out.child_tris_mask,
          solid_voxels: out.solid_voxels,
          load_us: 0,
        }
      }
      StreamSource::Archive { file, offset, size } => {
        let archive = self
          .archive
          .as_ref()
          .ok_or_else(|| SvoError::precondition("archive streaming without an archive"))?;
        let bytes = archive.read(file, *offset, *size as usize)?;
        let record = read_stream_record(&bytes, self.compressor.as_ref(), self.subset_count)?;
        let (crop, layers) = record
          .brick
          .map(|b| (b.crop, b.layers))
          .unwrap_or_default();
        SegmentPayload {
          solid_voxels: solid_voxel_count(&layers),
          crop,
          layers,
          child_table: record.child_table,
          child_tris_mask: 0,
          load_us: 0,
        }
      }
    };
    payload.load_us = start.elapsed().as_micros() as u64;
    Ok(payload)
  }
}

struct Job {
  ticket: u64,
  request: StreamRequest,
}

/// Bounded asynchronous loader of segments.
pub struct StreamingEngine {
  loader: Arc<dyn SegmentLoader>,
  requests: Sender<Job>,
  /// Request receiver kept for inline execution when there are no workers.
  inline_requests: Option<Receiver<Job>>,
  completion_sender: Sender<StreamCompletion>,
  completions: Receiver<StreamCompletion>,
  workers: Vec<JoinHandle<()>>,
  next_ticket: u64,
  in_flight: usize,
}

impl StreamingEngine {
  /// Start `worker_threads` workers (0 = run jobs inline).
  pub fn new(loader: Arc<dyn SegmentLoader>, worker_threads: usize) -> Result<Self> {
    let (requests, request_rx) = channel::bounded::<Job>(STREAM_QUEUE_CAPACITY);
    let (completion_sender, completions) = channel::bounded(STREAM_QUEUE_CAPACITY);

    let mut workers = Vec::with_capacity(worker_threads);
    for i in 0..worker_threads {
      let rx = request_rx.clone();
      let tx = completion_sender.clone();
      let loader = Arc::clone(&loader);
      let handle = std::thread::Builder::new()
        .name(format!("svo-stream-{i}"))
        .spawn(move || worker_loop(loader.as_ref(), &rx, &tx))?;
      workers.push(handle);
    }

    log::debug!("streaming engine started with {worker_threads} workers");
    Ok(Self {
      loader,
      requests,
      inline_requests: (worker_threads == 0).then_some(request_rx),
      completion_sender,
      completions,
      workers,
      next_ticket: 1,
      in_flight: 0,
    })
  }

  /// Queue a load. Returns its ticket, or `None` when the queue is full.
  pub fn start_read(&mut self, request: StreamRequest) -> Option<u64> {
    if self.in_flight >= STREAM_QUEUE_CAPACITY {
      return None;
    }
    let ticket = self.next_ticket;
    match self.requests.try_send(Job { ticket, request }) {
      Ok(()) => {
        self.next_ticket += 1;
        self.in_flight += 1;
        Some(ticket)
      }
      Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => None,
    }
  }

  /// Requests accepted and not yet drained.
  #[inline]
  pub fn in_flight(&self) -> usize {
    self.in_flight
  }

  #[inline]
  pub fn is_idle(&self) -> bool {
    self.in_flight == 0
  }

  #[inline]
  pub fn worker_count(&self) -> usize {
    self.workers.len()
  }

  /// Drain every finished load without blocking.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "streaming::process_sync_callbacks"))]
  pub fn process_sync_callbacks(&mut self) -> Vec<StreamCompletion> {
    self.run_inline_jobs();

    let mut out = Vec::new();
    loop {
      match self.completions.try_recv() {
        Ok(completion) => {
          self.in_flight = self.in_flight.saturating_sub(1);
          out.push(completion);
        }
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
      }
    }
    out
  }

  /// Block until one load finishes or `timeout` passes.
  pub fn wait_completion(&mut self, timeout: Duration) -> Option<StreamCompletion> {
    self.run_inline_jobs();
    match self.completions.recv_timeout(timeout) {
      Ok(completion) => {
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(completion)
      }
      Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
    }
  }

  fn run_inline_jobs(&mut self) {
    let Some(rx) = &self.inline_requests else {
      return;
    };
    while let Ok(job) = rx.try_recv() {
      let completion = run_job(self.loader.as_ref(), job);
      // Capacity matches the request queue, so this never blocks.
      let _ = self.completion_sender.try_send(completion);
    }
  }
}

impl Drop for StreamingEngine {
  fn drop(&mut self) {
    // Disconnect both queues so blocked workers wake up and exit.
    let (closed, _) = channel::bounded(0);
    drop(std::mem::replace(&mut self.requests, closed));
    self.inline_requests = None;
    self.completions = channel::never();

    for handle in self.workers.drain(..) {
      if handle.join().is_err() {
        log::warn!("streaming worker panicked");
      }
    }
  }
}

fn worker_loop(loader: &dyn SegmentLoader, rx: &Receiver<Job>, tx: &Sender<StreamCompletion>) {
  for job in rx.iter() {
    if tx.send(run_job(loader, job)).is_err() {
      break;
    }
  }
}

fn run_job(loader: &dyn SegmentLoader, job: Job) -> StreamCompletion {
  let result = loader.stream_async(&job.request);
  if let Err(err) = &result {
    log::warn!("segment load failed: {err}");
  }
  StreamCompletion {
    node: job.request.node,
    ticket: job.ticket,
    result,
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
