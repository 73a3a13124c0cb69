//! A* node storage and open list.
//!
//! Nodes are keyed by [`WayTriangleData`]: the same triangle reached over an
//! off-mesh link is a different node. The heap uses lazy deletion; an entry
//! is live only while its node is open and still carries the same total.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use glam::Vec3;

use super::request::WayTriangleData;

/// Search record of one node.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Node {
  pub(crate) data: WayTriangleData,
  pub(crate) prev: WayTriangleData,
  /// Predicted entry position, mesh-local.
  pub(crate) location: Vec3,
  pub(crate) cost: f32,
  pub(crate) total: f32,
  pub(crate) open: bool,
}

#[derive(Clone, Copy, Debug)]
struct OpenEntry {
  total: f32,
  node: u32,
}

impl PartialEq for OpenEntry {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for OpenEntry {
  // Min-heap on total, ties broken by insertion order.
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .total
      .total_cmp(&self.total)
      .then_with(|| other.node.cmp(&self.node))
  }
}

#[derive(Debug, Default)]
pub(crate) struct OpenList {
  nodes: Vec<Node>,
  lookup: HashMap<WayTriangleData, u32>,
  heap: BinaryHeap<OpenEntry>,
  open_count: usize,
  goal: Option<u32>,
  steps: usize,
}

impl OpenList {
  pub(crate) fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.heap.clear();
    self.open_count = 0;
    self.goal = None;
    self.steps = 0;
  }

  /// Reset and seed with the start node.
  pub(crate) fn setup(&mut self, start: WayTriangleData, location: Vec3, heuristic: f32) {
    self.clear();
    let (index, _) = self.insert_node(start);
    let node = &mut self.nodes[index as usize];
    node.prev = start;
    node.location = location;
    node.cost = 0.0;
    node.total = heuristic;
    self.open(index);
  }

  /// Node for `data`, created closed with infinite cost when new.
  pub(crate) fn insert_node(&mut self, data: WayTriangleData) -> (u32, bool) {
    if let Some(&index) = self.lookup.get(&data) {
      return (index, false);
    }
    let index = self.nodes.len() as u32;
    self.nodes.push(Node {
      data,
      prev: WayTriangleData::default(),
      location: Vec3::ZERO,
      cost: f32::INFINITY,
      total: f32::INFINITY,
      open: false,
    });
    self.lookup.insert(data, index);
    (index, true)
  }

  /// Put `index` on the open list with its current total.
  pub(crate) fn open(&mut self, index: u32) {
    let node = &mut self.nodes[index as usize];
    if !node.open {
      node.open = true;
      self.open_count += 1;
    }
    self.heap.push(OpenEntry {
      total: node.total,
      node: index,
    });
  }

  /// Pop and close the open node with the lowest total.
  pub(crate) fn pop_best(&mut self) -> Option<u32> {
    while let Some(entry) = self.heap.pop() {
      let node = &mut self.nodes[entry.node as usize];
      if !node.open || node.total != entry.total {
        continue;
      }
      node.open = false;
      self.open_count -= 1;
      return Some(entry.node);
    }
    None
  }

  #[inline]
  pub(crate) fn node(&self, index: u32) -> &Node {
    &self.nodes[index as usize]
  }

  #[inline]
  pub(crate) fn node_mut(&mut self, index: u32) -> &mut Node {
    &mut self.nodes[index as usize]
  }

  pub(crate) fn find_node(&self, data: &WayTriangleData) -> Option<&Node> {
    self.lookup.get(data).map(|&i| &self.nodes[i as usize])
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.open_count == 0
  }

  pub(crate) fn set_goal(&mut self, index: u32) {
    self.goal = Some(index);
  }

  #[inline]
  pub(crate) fn goal(&self) -> Option<u32> {
    self.goal
  }

  /// More expansions are possible: nodes are open and the goal has not
  /// been reached.
  #[inline]
  pub(crate) fn can_do_step(&self) -> bool {
    !self.is_empty() && self.goal.is_none()
  }

  #[inline]
  pub(crate) fn step_done(&mut self) {
    self.steps += 1;
  }

  #[inline]
  pub(crate) fn steps(&self) -> usize {
    self.steps
  }

  pub(crate) fn node_count(&self) -> usize {
    self.nodes.len()
  }
}
