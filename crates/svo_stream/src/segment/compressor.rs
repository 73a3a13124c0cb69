//! Whole-payload block compression for stream records.

use crate::error::Result;

/// Compresses serialized brick payloads before they are written to an area
/// file, and reverses it on the streaming workers.
pub trait BrickCompressor: Send + Sync {
  fn compress(&self, data: &[u8]) -> Vec<u8>;

  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// LZ4 block compression with the uncompressed size prepended.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lz4Compressor;

impl BrickCompressor for Lz4Compressor {
  fn compress(&self, data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
  }

  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
    Ok(lz4_flex::decompress_size_prepended(data)?)
  }
}
