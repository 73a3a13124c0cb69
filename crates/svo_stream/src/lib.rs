//! svo_stream - Sparse voxel octree streaming for voxel cone tracing
//!
//! This crate keeps a sparse voxel octree of the scene around the camera,
//! voxelizes or streams bricks for its nodes and packs them into a shared 3D
//! atlas. Rendering, file systems and scene management stay outside and are
//! plugged in through the traits in [`interfaces`].
//!
//! # Features
//!
//! - **Voxelization**: Conservative triangle/box tests with 4³ super-sampling,
//!   deterministic for any worker count
//! - **Streaming**: Bounded worker pool with backpressure, request buckets
//!   ordered by level and camera distance
//! - **Atlas Packing**: First-fit 3D block packer with LRU block stealing
//! - **Area Export**: Per-area files with compressed stream records
//! - **Change Detection**: Geometry and lighting checksums that rebuild or
//!   refresh only what changed
//!
//! # Example
//!
//! ```ignore
//! use svo_stream::{FrameContext, NullUploader, OctreeManager, StreamingBudget, SvoConfig};
//!
//! let mut manager = OctreeManager::new(SvoConfig::default(), StreamingBudget::DEFAULT, scene, None)?;
//! manager.allocate_root_node();
//!
//! for frame_id in 1.. {
//!     let out = manager.render(&FrameContext::new(camera, frame_id), &mut NullUploader);
//!     for item in &out.draw_list {
//!         // trace item.atlas_offset ...
//!     }
//! }
//! ```

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Result, SvoError};
pub use types::{MaterialId, ObjectLayerId, Rgba8, Subset, SurfaceMaterial, VoxelTriangle};

// 3D atlas allocator
pub mod packer;
pub use packer::{BlockId, BlockInfo, BlockPacker3D};

// Node storage, configuration and frame budget
pub mod octree;
pub use octree::{Aabb, FrameStats, NodeRef, OctreeNode, StreamingBudget, SvoConfig};

// Brick payloads and their wire format
pub mod segment;
pub use segment::{decode_child_offset, encode_child_offset, StreamingStatus, VoxelSegment};

// Triangle voxelization
pub mod voxelize;
pub use voxelize::{voxelize_meshes, VoxelizeOutput};

// Collaborator traits
pub mod interfaces;
pub use interfaces::{
  ArchiveReader, ArchiveWriter, AtlasUploader, LightInfo, MemoryArchive, NullUploader, SceneGeometry,
  StaticObject,
};

// Worker pool
pub mod streaming;
pub use streaming::{SegmentLoader, StreamRequest, StreamingEngine};

// Per-frame tree driver
pub mod manager;
pub use manager::{area_file_name, DrawItem, FrameContext, FrameOutput, NodeInfo, OctreeManager};

pub mod metrics;

#[cfg(test)]
mod test_utils;
