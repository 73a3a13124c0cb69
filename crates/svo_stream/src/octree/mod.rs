//! Octree storage: node arena, node boxes, configuration and frame budget.
//!
//! Nodes live in an [`Arena`] and are addressed by handles. A parent owns
//! its children through [`NodeId`]; everything else (parent links, packer
//! user data, stream requests, draw lists) holds a [`NodeRef`].
//!
//! ```text
//!            root (NodeId held by the manager)
//!           /    \
//!     child 0 .. child 7   (NodeId in parent.children)
//!        |
//!     parent: NodeRef ───► back to the owner, never keeps it alive
//! ```
//!
//! # Module Structure
//!
//! - [`arena`]: generational slot arena with owning / non-owning handles
//! - [`bounds`]: `Aabb` with octant math
//! - [`node`]: `OctreeNode`
//! - [`config`]: `SvoConfig`
//! - [`budget`]: `StreamingBudget` and per-frame `FrameStats`

pub mod arena;
pub mod bounds;
pub mod budget;
pub mod config;
pub mod node;

// Re-exports
pub use arena::{Arena, NodeId, NodeRef};
pub use bounds::Aabb;
pub use budget::{FrameStats, StreamingBudget};
pub use config::SvoConfig;
pub use node::OctreeNode;
