//! Error types for segment loading, streaming and export.
//!
//! Resource exhaustion (atlas full, stream queue full) is never an error:
//! those paths return `bool`/`Option` and are retried on a later frame.

use thiserror::Error;

/// Errors surfaced by the SVO streaming engine.
#[derive(Error, Debug)]
pub enum SvoError {
  /// Serialized voxel data does not match its declared layout.
  #[error("data corruption: {0}")]
  DataCorruption(String),

  /// An operation was called before its required setup.
  #[error("precondition violated: {0}")]
  Precondition(String),

  /// Block decompression failed.
  #[error("decompression failed: {0}")]
  Decompress(#[from] lz4_flex::block::DecompressError),

  /// Archive read/write failed.
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl SvoError {
  pub(crate) fn corruption(msg: impl Into<String>) -> Self {
    Self::DataCorruption(msg.into())
  }

  pub(crate) fn precondition(msg: impl Into<String>) -> Self {
    Self::Precondition(msg.into())
  }

  /// True for errors that mean the stored data can not be trusted.
  pub fn is_corruption(&self) -> bool {
    matches!(self, Self::DataCorruption(_) | Self::Decompress(_))
  }
}

/// Result type for SVO operations.
pub type Result<T> = std::result::Result<T, SvoError>;
