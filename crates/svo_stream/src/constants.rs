//! Brick, atlas and stream-format constants.
//!
//! A brick is a `BRICK_SIZE³` block of RGBA8 voxels. Bricks are cropped to
//! their occupied region and packed into a shared 3D atlas whose allocation
//! unit is an `ALLOC_CHUNK_SIZE³` chunk of voxels.
//!
//! Brick layout: `index = z * BRICK_SIZE² + y * BRICK_SIZE + x`.

/// Voxels per brick edge.
pub const BRICK_SIZE: usize = 16;

/// Voxels per brick layer (BRICK_SIZE²).
pub const BRICK_SIZE_SQ: usize = BRICK_SIZE * BRICK_SIZE;

/// Voxels per brick (BRICK_SIZE³).
pub const BRICK_VOXELS: usize = BRICK_SIZE * BRICK_SIZE * BRICK_SIZE;

/// Atlas allocation granularity in voxels per axis.
pub const ALLOC_CHUNK_SIZE: usize = 4;

/// Atlas extent in allocation chunks along X and Y.
pub const ATLAS_DIM_XY: u32 = 64;

/// Atlas extent in allocation chunks along Z.
pub const ATLAS_DIM_Z: u32 = 32;

/// Whole bricks that fit in the atlas.
pub const ATLAS_BRICK_CAPACITY: usize =
  (ATLAS_DIM_XY as usize / (BRICK_SIZE / ALLOC_CHUNK_SIZE)).pow(2)
    * (ATLAS_DIM_Z as usize / (BRICK_SIZE / ALLOC_CHUNK_SIZE));

/// Triangles considered per voxel during voxelization.
pub const MAX_TRIS_PER_VOXEL: usize = 512;

/// Atlas offset of a segment without a packer slot.
pub const ATLAS_OFFSET_UNALLOCATED: i32 = -2;

/// Atlas offset reserved for "slot requested, not yet placed".
pub const ATLAS_OFFSET_RESERVED: i32 = -1;

/// Size of the serialized segment header in bytes.
pub const SEGMENT_HEADER_BYTES: usize = 12;

/// Size of the optional child offset table (8 × (offset u32, size u32)).
pub const CHILD_TABLE_BYTES: usize = 8 * 2 * 4;

/// Stream record size of an area root: `u32 compressed_size` + child table.
pub const AREA_ROOT_RECORD_BYTES: usize = 4 + CHILD_TABLE_BYTES;

/// Largest compressed brick accepted by the stream decoder.
pub const MAX_COMPRESSED_BRICK_BYTES: usize = BRICK_VOXELS * 4 * 2;

/// Padding byte used to align stream records to 4 bytes.
pub const STREAM_PAD_BYTE: u8 = 103;

/// Bucket count per axis of the streaming request table (level × distance).
pub const STREAM_BUCKETS: usize = 16;

/// Capacity of the streaming engine's request and completion queues.
pub const STREAM_QUEUE_CAPACITY: usize = 512;

/// Area export file extension.
pub const AREA_FILE_EXTENSION: &str = "svo";

/// Voxel index inside a full brick.
#[inline]
pub const fn brick_index(x: usize, y: usize, z: usize) -> usize {
  z * BRICK_SIZE_SQ + y * BRICK_SIZE + x
}

/// Voxel index inside a cropped brick of size `dims`.
#[inline]
pub const fn crop_index(x: usize, y: usize, z: usize, dims: [usize; 3]) -> usize {
  z * dims[0] * dims[1] + y * dims[0] + x
}

/// Allocation chunks needed to hold `voxels` along one axis (at least 1).
#[inline]
pub const fn chunks_for(voxels: usize) -> u32 {
  let chunks = voxels.div_ceil(ALLOC_CHUNK_SIZE);
  if chunks == 0 {
    1
  } else {
    chunks as u32
  }
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
