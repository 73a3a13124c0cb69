//! Generational node arena.
//!
//! Tree ownership is expressed through handle types rather than pointers:
//!
//! - [`NodeId`] is the *owning* handle. It is neither `Clone` nor `Copy`,
//!   only [`Arena::insert`] creates one and [`Arena::remove`] consumes it,
//!   so a node has exactly one owner (its parent, or the manager for the
//!   root).
//! - [`NodeRef`] is the *non-owning* handle used for back references
//!   (parent links, packer user data, stream requests). It is `Copy`, and a
//!   lookup through a stale `NodeRef` returns `None` once the slot was
//!   reused, because the generation no longer matches.

/// Owning handle of an arena slot.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
  index: u32,
  generation: u32,
}

impl NodeId {
  /// Non-owning view of this handle.
  #[inline]
  pub fn downgrade(&self) -> NodeRef {
    NodeRef {
      index: self.index,
      generation: self.generation,
    }
  }
}

/// Non-owning handle of an arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
  index: u32,
  generation: u32,
}

impl NodeRef {
  /// Slot index, stable while the node lives.
  #[inline]
  pub fn index(self) -> u32 {
    self.index
  }
}

struct Slot<T> {
  generation: u32,
  value: Option<T>,
}

/// Slot arena with generation-checked handles and a free list.
pub struct Arena<T> {
  slots: Vec<Slot<T>>,
  free: Vec<u32>,
  len: usize,
}

impl<T> Arena<T> {
  pub fn new() -> Self {
    Self {
      slots: Vec::new(),
      free: Vec::new(),
      len: 0,
    }
  }

  /// Live values.
  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Store `value` and hand out its owning handle.
  pub fn insert(&mut self, value: T) -> NodeId {
    self.len += 1;
    if let Some(index) = self.free.pop() {
      let slot = &mut self.slots[index as usize];
      slot.value = Some(value);
      return NodeId {
        index,
        generation: slot.generation,
      };
    }
    let index = self.slots.len() as u32;
    self.slots.push(Slot {
      generation: 0,
      value: Some(value),
    });
    NodeId { index, generation: 0 }
  }

  /// Take the value out, invalidating every `NodeRef` to it.
  pub fn remove(&mut self, id: NodeId) -> Option<T> {
    let slot = self.slots.get_mut(id.index as usize)?;
    if slot.generation != id.generation {
      return None;
    }
    let value = slot.value.take()?;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(id.index);
    self.len -= 1;
    Some(value)
  }

  #[inline]
  pub fn contains(&self, node: NodeRef) -> bool {
    self.get(node).is_some()
  }

  #[inline]
  pub fn get(&self, node: NodeRef) -> Option<&T> {
    let slot = self.slots.get(node.index as usize)?;
    if slot.generation != node.generation {
      return None;
    }
    slot.value.as_ref()
  }

  #[inline]
  pub fn get_mut(&mut self, node: NodeRef) -> Option<&mut T> {
    let slot = self.slots.get_mut(node.index as usize)?;
    if slot.generation != node.generation {
      return None;
    }
    slot.value.as_mut()
  }

  /// Live values with their handles, in slot order.
  pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &T)> {
    self.slots.iter().enumerate().filter_map(|(i, slot)| {
      slot.value.as_ref().map(|v| {
        (
          NodeRef {
            index: i as u32,
            generation: slot.generation,
          },
          v,
        )
      })
    })
  }
}

impl<T> Default for Arena<T> {
  fn default() -> Self {
    Self::new()
  }
}
