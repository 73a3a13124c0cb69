//! Error types for tile insertion, adjacency and queries.
//!
//! A bad element only ever fails the element: callers log and skip it, the
//! rest of the grid keeps working.

use thiserror::Error;

/// Errors surfaced by the navmesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavMeshError {
  /// Geometry or link data that can not be walked (degenerate triangle,
  /// dangling link, missing reciprocal).
  #[error("malformed geometry: {0}")]
  MalformedGeometry(String),

  /// An operation was called without its required setup (unknown tile,
  /// coordinate outside the grid, invalid parameters).
  #[error("precondition violated: {0}")]
  Precondition(String),
}

impl NavMeshError {
  pub(crate) fn malformed(msg: impl Into<String>) -> Self {
    Self::MalformedGeometry(msg.into())
  }

  pub(crate) fn precondition(msg: impl Into<String>) -> Self {
    Self::Precondition(msg.into())
  }
}

/// Result type for navmesh operations.
pub type Result<T> = std::result::Result<T, NavMeshError>;
