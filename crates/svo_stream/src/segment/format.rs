//! Binary segment payload and stream record codec.
//!
//! Payload (little endian, tightly packed):
//!
//! ```text
//! offset  size  field
//! 0       3     crop size x, y, z (u8)
//! 3       1     layer count
//! 4       3     crop min x, y, z (u8)
//! 7       1     subset count
//! 8       4     reserved (zero)
//! 12      ..    per layer: u32 layer id, then subset_count planes of
//!               crop volume × RGBA8
//! ```
//!
//! Stream record (one per node inside an area file):
//!
//! ```text
//! u32 compressed_size     0 = no brick
//! compressed payload      size-prepended block compression
//! pad to 4 bytes          STREAM_PAD_BYTE
//! [optional] 8 × (u32 file_offset, u32 data_size)
//! ```
//!
//! Every length mismatch is reported as `DataCorruption`.

use glam::UVec3;

use super::brick::{CropBox, LayerMap, VoxelBrick};
use super::compressor::BrickCompressor;
use crate::constants::{
  BRICK_SIZE, CHILD_TABLE_BYTES, MAX_COMPRESSED_BRICK_BYTES, SEGMENT_HEADER_BYTES, STREAM_PAD_BYTE,
};
use crate::error::{Result, SvoError};
use crate::types::Rgba8;

/// Location of a child's stream record inside the area file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChildFileOffset {
  pub offset: u32,
  pub size: u32,
}

/// Child record table stored after a node's own record.
pub type ChildTable = [ChildFileOffset; 8];

/// Result of [`load_voxels`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedBrick {
  pub crop: CropBox,
  pub layers: LayerMap,
}

/// Result of [`read_stream_record`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamRecord {
  /// `None` when the record carries no brick.
  pub brick: Option<DecodedBrick>,
  /// `None` when absent or when every child size is zero.
  pub child_table: Option<ChildTable>,
}

impl StreamRecord {
  /// Bit `i` set when child `i` has a record.
  pub fn child_mask(&self) -> u8 {
    super::child_table_mask(self.child_table.as_ref())
  }
}

struct Reader<'a> {
  bytes: &'a [u8],
  pos: usize,
}

impl<'a> Reader<'a> {
  fn new(bytes: &'a [u8]) -> Self {
    Self { bytes, pos: 0 }
  }

  fn remaining(&self) -> usize {
    self.bytes.len().saturating_sub(self.pos)
  }

  fn take(&mut self, n: usize) -> Result<&'a [u8]> {
    if self.remaining() < n {
      return Err(SvoError::corruption(format!(
        "read of {n} bytes at {} past end of {} byte buffer",
        self.pos,
        self.bytes.len()
      )));
    }
    let slice = &self.bytes[self.pos..self.pos + n];
    self.pos += n;
    Ok(slice)
  }

  fn u32(&mut self) -> Result<u32> {
    let b = self.take(4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
  }
}

/// Serialize a cropped brick. Layers must share `crop.size`.
pub fn save_voxels(crop: &CropBox, layers: &LayerMap) -> Result<Vec<u8>> {
  if crop.size.cmpgt(UVec3::splat(BRICK_SIZE as u32)).any() {
    return Err(SvoError::precondition(format!(
      "crop size {} exceeds brick size",
      crop.size
    )));
  }
  let subset_count = layers.values().next().map_or(0, |b| b.subset_count());
  let has_data = !crop.is_empty() && !layers.is_empty();
  let layer_count = if has_data { layers.len() } else { 0 };
  if layer_count > u8::MAX as usize || subset_count > u8::MAX as usize {
    return Err(SvoError::precondition("too many layers or subsets"));
  }

  let plane_bytes = crop.volume() * 4;
  let mut out = Vec::with_capacity(
    SEGMENT_HEADER_BYTES + layer_count * (4 + subset_count * plane_bytes),
  );
  out.extend_from_slice(&[
    crop.size.x as u8,
    crop.size.y as u8,
    crop.size.z as u8,
    layer_count as u8,
    crop.min.x as u8,
    crop.min.y as u8,
    crop.min.z as u8,
    subset_count as u8,
  ]);
  out.extend_from_slice(&[0; 4]);

  if has_data {
    for (&layer_id, brick) in layers {
      if brick.dims() != crop.size || brick.subset_count() != subset_count {
        return Err(SvoError::precondition(format!(
          "layer {layer_id} does not match the crop box"
        )));
      }
      out.extend_from_slice(&layer_id.to_le_bytes());
      for s in 0..subset_count {
        out.extend(brick.plane_bytes(s));
      }
    }
  }
  Ok(out)
}

/// Parse a payload written by [`save_voxels`].
///
/// `expected_subsets` is the subset count the current configuration
/// renders; a file written with a different count is rejected.
pub fn load_voxels(bytes: &[u8], expected_subsets: usize) -> Result<DecodedBrick> {
  let mut r = Reader::new(bytes);
  let h = r.take(SEGMENT_HEADER_BYTES)?;
  let size = UVec3::new(h[0] as u32, h[1] as u32, h[2] as u32);
  let layer_count = h[3] as usize;
  let min = UVec3::new(h[4] as u32, h[5] as u32, h[6] as u32);
  let subset_count = h[7] as usize;

  if (min + size).cmpgt(UVec3::splat(BRICK_SIZE as u32)).any() {
    return Err(SvoError::corruption(format!(
      "crop box {min}+{size} outside brick"
    )));
  }

  let crop = CropBox { min, size };
  let mut layers = LayerMap::new();

  if crop.volume() != 0 {
    if layer_count != 0 && subset_count != expected_subsets {
      return Err(SvoError::corruption(format!(
        "payload has {subset_count} subsets, expected {expected_subsets}"
      )));
    }
    for _ in 0..layer_count {
      let layer_id = r.u32()?;
      let mut planes = Vec::with_capacity(subset_count);
      for _ in 0..subset_count {
        let raw = r.take(crop.volume() * 4)?;
        planes.push(
          raw
            .chunks_exact(4)
            .map(|c| Rgba8::new(c[0], c[1], c[2], c[3]))
            .collect(),
        );
      }
      layers.insert(layer_id, VoxelBrick::from_planes(size, planes)?);
    }
  }

  if r.remaining() != 0 {
    return Err(SvoError::corruption(format!(
      "{} trailing bytes after segment payload",
      r.remaining()
    )));
  }
  Ok(DecodedBrick { crop, layers })
}

/// Append a stream record holding `payload` (or an empty record).
pub fn write_stream_record(out: &mut Vec<u8>, payload: Option<&[u8]>, compressor: &dyn BrickCompressor) {
  match payload {
    Some(payload) => {
      let packed = compressor.compress(payload);
      out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
      out.extend_from_slice(&packed);
      while out.len() & 3 != 0 {
        out.push(STREAM_PAD_BYTE);
      }
    }
    None => out.extend_from_slice(&0u32.to_le_bytes()),
  }
}

/// Append a child table.
pub fn write_child_table(out: &mut Vec<u8>, table: &ChildTable) {
  for child in table {
    out.extend_from_slice(&child.offset.to_le_bytes());
    out.extend_from_slice(&child.size.to_le_bytes());
  }
}

/// Parse one stream record. `bytes` must start at the record.
pub fn read_stream_record(
  bytes: &[u8],
  compressor: &dyn BrickCompressor,
  expected_subsets: usize,
) -> Result<StreamRecord> {
  let mut r = Reader::new(bytes);
  let compressed_size = r.u32()? as i32;
  let mut record = StreamRecord::default();

  if compressed_size != 0 {
    if compressed_size < 0 || compressed_size as usize > MAX_COMPRESSED_BRICK_BYTES {
      return Err(SvoError::corruption(format!(
        "compressed brick size {compressed_size} out of range"
      )));
    }
    let packed = r.take(compressed_size as usize)?;
    let payload = compressor.decompress(packed)?;
    if payload.is_empty() {
      return Err(SvoError::corruption("brick decompressed to nothing"));
    }
    record.brick = Some(load_voxels(&payload, expected_subsets)?);

    let aligned = (r.pos + 3) & !3;
    if aligned > bytes.len() {
      return Err(SvoError::corruption("stream record padding past end"));
    }
    r.pos = aligned;
  }

  if r.remaining() >= CHILD_TABLE_BYTES {
    let mut table = ChildTable::default();
    for child in table.iter_mut() {
      child.offset = r.u32()?;
      child.size = r.u32()?;
    }
    if table.iter().any(|c| c.size != 0) {
      record.child_table = Some(table);
    }
  }

  Ok(record)
}

#[cfg(test)]
#[path = "format_test.rs"]
mod format_test;
