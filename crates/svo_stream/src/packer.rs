//! 3D block packer for the brick atlas.
//!
//! Places axis-aligned integer boxes into a fixed `[x × y × z]` grid of
//! allocation chunks. Allocation is a first-fit scan (z, then y, then x) so
//! blocks gravitate towards low atlas offsets.
//!
//! ```text
//!   descriptors:  [ used | FREE | used | FREE | used ]
//!                          ^             |
//!                          +--- prev ----+   free list (head = 3)
//! ```
//!
//! Descriptors are never deallocated. A freed descriptor is marked with
//! the `FREE_SENTINEL` min-x value and threaded onto a doubly linked free
//! list so the next `add_block` reuses it before the array grows.
//!
//! Eviction is not the packer's business: callers read `last_visited_frame`,
//! extents and user data from [`BlockInfo`] to pick victims.

use glam::UVec3;

/// Min-x value of a descriptor that is not holding a block.
pub const FREE_SENTINEL: u32 = u32::MAX;

const NIL: u32 = u32::MAX;

/// Stable index of a block descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// One block descriptor.
#[derive(Clone, Debug)]
pub struct BlockInfo<T> {
  /// Minimum chunk (inclusive). `min.x == FREE_SENTINEL` marks a free descriptor.
  pub min: UVec3,
  /// Maximum chunk (exclusive).
  pub max: UVec3,
  /// Payload size in bytes, for accounting.
  pub data_size: u32,
  /// Opaque owner handle.
  pub user_data: Option<T>,
  /// Last frame the owner touched this block.
  pub last_visited_frame: u32,
  prev_free: u32,
  next_free: u32,
}

impl<T> BlockInfo<T> {
  #[inline]
  pub fn is_free(&self) -> bool {
    self.min.x == FREE_SENTINEL
  }

  /// Extent in chunks.
  #[inline]
  pub fn size(&self) -> UVec3 {
    self.max - self.min
  }

  /// Number of chunks covered.
  #[inline]
  pub fn volume(&self) -> u32 {
    let s = self.size();
    s.x * s.y * s.z
  }

  fn overlaps(&self, other: &BlockInfo<T>) -> bool {
    self.min.cmplt(other.max).all() && other.min.cmplt(self.max).all()
  }
}

/// First-fit 3D bin packer over a fixed chunk grid.
pub struct BlockPacker3D<T> {
  dims: UVec3,
  blocks: Vec<BlockInfo<T>>,
  /// One bit per chunk, x fastest.
  used: Vec<u64>,
  free_head: u32,
  num_used: usize,
}

impl<T> BlockPacker3D<T> {
  /// Create an empty packer over `dims` chunks.
  pub fn new(dims: UVec3) -> Self {
    let cells = (dims.x * dims.y * dims.z) as usize;
    Self {
      dims,
      blocks: Vec::new(),
      used: vec![0; cells.div_ceil(64)],
      free_head: NIL,
      num_used: 0,
    }
  }

  /// Grid extent in chunks.
  #[inline]
  pub fn dims(&self) -> UVec3 {
    self.dims
  }

  /// Descriptor capacity. Grows only when no free descriptor exists.
  #[inline]
  pub fn num_blocks(&self) -> usize {
    self.blocks.len()
  }

  /// Descriptors currently holding a block.
  #[inline]
  pub fn num_sub_blocks(&self) -> usize {
    self.num_used
  }

  /// Flat chunk offset of a block origin: `z * dx * dy + y * dx + x`.
  #[inline]
  pub fn chunk_offset(&self, min: UVec3) -> u32 {
    min.z * self.dims.x * self.dims.y + min.y * self.dims.x + min.x
  }

  #[inline]
  fn cell_index(&self, x: u32, y: u32, z: u32) -> usize {
    ((z * self.dims.y + y) * self.dims.x + x) as usize
  }

  /// Whether the chunk at `p` is marked used.
  #[inline]
  pub fn is_cell_used(&self, p: UVec3) -> bool {
    let i = self.cell_index(p.x, p.y, p.z);
    self.used[i >> 6] & (1u64 << (i & 63)) != 0
  }

  fn set_region(&mut self, min: UVec3, max: UVec3, value: bool) {
    for z in min.z..max.z {
      for y in min.y..max.y {
        for x in min.x..max.x {
          let i = self.cell_index(x, y, z);
          if value {
            self.used[i >> 6] |= 1u64 << (i & 63);
          } else {
            self.used[i >> 6] &= !(1u64 << (i & 63));
          }
        }
      }
    }
  }

  /// First used cell in the region, scanning x last so the caller can skip
  /// past it.
  fn first_blocking_x(&self, min: UVec3, size: UVec3) -> Option<u32> {
    let mut blocking: Option<u32> = None;
    for z in min.z..min.z + size.z {
      for y in min.y..min.y + size.y {
        for x in (min.x..min.x + size.x).rev() {
          let i = self.cell_index(x, y, z);
          if self.used[i >> 6] & (1u64 << (i & 63)) != 0 {
            blocking = Some(blocking.map_or(x, |b| b.max(x)));
            break;
          }
        }
      }
    }
    blocking
  }

  fn find_free_region(&self, size: UVec3) -> Option<UVec3> {
    if size.cmpgt(self.dims).any() || size.cmpeq(UVec3::ZERO).any() {
      return None;
    }
    for z in 0..=self.dims.z - size.z {
      for y in 0..=self.dims.y - size.y {
        let mut x = 0;
        while x + size.x <= self.dims.x {
          let min = UVec3::new(x, y, z);
          match self.first_blocking_x(min, size) {
            None => return Some(min),
            Some(bx) => x = bx + 1,
          }
        }
      }
    }
    None
  }

  /// Allocate a `size` block. `None` means the grid has no free region of
  /// that shape; evict and retry.
  pub fn add_block(
    &mut self,
    size: UVec3,
    user_data: T,
    frame_id: u32,
    data_size: u32,
  ) -> Option<BlockId> {
    let min = self.find_free_region(size)?;
    let max = min + size;
    self.set_region(min, max, true);

    let info = BlockInfo {
      min,
      max,
      data_size,
      user_data: Some(user_data),
      last_visited_frame: frame_id,
      prev_free: NIL,
      next_free: NIL,
    };

    let id = match self.pop_free() {
      Some(id) => {
        self.blocks[id.index()] = info;
        id
      }
      None => {
        self.blocks.push(info);
        BlockId(self.blocks.len() as u32 - 1)
      }
    };
    self.num_used += 1;
    Some(id)
  }

  /// Release a block. Returns the owner handle, or `None` for an unknown or
  /// already free id.
  pub fn remove_block(&mut self, id: BlockId) -> Option<T> {
    let info = self.blocks.get(id.index())?;
    if info.is_free() {
      return None;
    }
    let (min, max) = (info.min, info.max);
    self.set_region(min, max, false);

    let old_head = self.free_head;
    let block = &mut self.blocks[id.index()];
    let user_data = block.user_data.take();
    block.min = UVec3::new(FREE_SENTINEL, 0, 0);
    block.max = UVec3::ZERO;
    block.data_size = 0;
    block.prev_free = NIL;
    block.next_free = old_head;
    if old_head != NIL {
      self.blocks[old_head as usize].prev_free = id.0;
    }
    self.free_head = id.0;
    self.num_used -= 1;
    user_data
  }

  fn pop_free(&mut self) -> Option<BlockId> {
    if self.free_head == NIL {
      return None;
    }
    let id = self.free_head;
    let next = self.blocks[id as usize].next_free;
    if next != NIL {
      self.blocks[next as usize].prev_free = NIL;
    }
    self.free_head = next;
    Some(BlockId(id))
  }

  /// O(1) lookup. Free descriptors report `None`.
  #[inline]
  pub fn block_info(&self, id: BlockId) -> Option<&BlockInfo<T>> {
    self.blocks.get(id.index()).filter(|b| !b.is_free())
  }

  /// Mutable lookup, for refreshing `last_visited_frame`.
  #[inline]
  pub fn block_info_mut(&mut self, id: BlockId) -> Option<&mut BlockInfo<T>> {
    self.blocks.get_mut(id.index()).filter(|b| !b.is_free())
  }

  /// Occupied blocks in descriptor order.
  pub fn iter(&self) -> impl Iterator<Item = (BlockId, &BlockInfo<T>)> {
    self
      .blocks
      .iter()
      .enumerate()
      .filter(|(_, b)| !b.is_free())
      .map(|(i, b)| (BlockId(i as u32), b))
  }

  /// Number of chunks marked in the usage bitmap.
  pub fn used_cells(&self) -> u32 {
    self.used.iter().map(|w| w.count_ones()).sum()
  }

  /// Check that no two live blocks overlap and the bitmap equals the union
  /// of their extents.
  pub fn validate(&self) -> bool {
    let live: Vec<&BlockInfo<T>> = self.blocks.iter().filter(|b| !b.is_free()).collect();
    for (i, a) in live.iter().enumerate() {
      for b in &live[i + 1..] {
        if a.overlaps(b) {
          return false;
        }
      }
    }
    let covered: u32 = live.iter().map(|b| b.volume()).sum();
    covered == self.used_cells() && live.iter().all(|b| self.region_marked(b.min, b.max))
  }

  fn region_marked(&self, min: UVec3, max: UVec3) -> bool {
    (min.z..max.z).all(|z| {
      (min.y..max.y).all(|y| (min.x..max.x).all(|x| self.is_cell_used(UVec3::new(x, y, z))))
    })
  }
}

#[cfg(test)]
#[path = "packer_test.rs"]
mod packer_test;
