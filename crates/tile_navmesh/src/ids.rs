//! Packed tile and triangle handles.
//!
//! ```text
//! TriangleId (u32)
//! ┌────────────────────────────┬────────────┐
//! │ TileId (22 bits)           │ local (10) │
//! └────────────────────────────┴────────────┘
//! TileId = container index + 1, 0 = invalid
//! ```
//!
//! Both stay stable for as long as the tile they name is resident: tile
//! containers are recycled through a free-list, never compacted.

/// Bits of a [`TriangleId`] used for the triangle's index inside its tile.
pub const TRIANGLE_INDEX_BITS: u32 = 10;

/// Most triangles a single tile can hold.
pub const TILE_TRIANGLES_MAX: usize = 1 << TRIANGLE_INDEX_BITS;

const TRIANGLE_INDEX_MASK: u32 = (1 << TRIANGLE_INDEX_BITS) - 1;

/// Handle of a resident tile. `TileId::INVALID` (0) names nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u32);

impl TileId {
  pub const INVALID: TileId = TileId(0);

  #[inline]
  pub fn from_index(index: usize) -> Self {
    TileId(index as u32 + 1)
  }

  /// Container index, `None` for the invalid id.
  #[inline]
  pub fn index(self) -> Option<usize> {
    (self.0 as usize).checked_sub(1)
  }

  #[inline]
  pub fn is_valid(self) -> bool {
    self.0 != 0
  }
}

/// Handle of one triangle of one tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriangleId(pub u32);

impl TriangleId {
  pub const INVALID: TriangleId = TriangleId(0);

  #[inline]
  pub fn new(tile: TileId, local_index: u16) -> Self {
    debug_assert!((local_index as usize) < TILE_TRIANGLES_MAX);
    TriangleId((tile.0 << TRIANGLE_INDEX_BITS) | (local_index as u32 & TRIANGLE_INDEX_MASK))
  }

  #[inline]
  pub fn tile(self) -> TileId {
    TileId(self.0 >> TRIANGLE_INDEX_BITS)
  }

  #[inline]
  pub fn local_index(self) -> u16 {
    (self.0 & TRIANGLE_INDEX_MASK) as u16
  }

  #[inline]
  pub fn is_valid(self) -> bool {
    self.tile().is_valid()
  }
}

/// Id of a connected triangle component. 0 means "not computed".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IslandId(pub u32);

impl IslandId {
  pub const NONE: IslandId = IslandId(0);

  #[inline]
  pub fn is_some(self) -> bool {
    self.0 != 0
  }
}

/// Identifier of an off-mesh link, owned by the off-mesh provider.
pub type OffMeshLinkId = u32;

/// Sentinel for "no off-mesh link".
pub const INVALID_OFF_MESH_LINK: OffMeshLinkId = 0;
