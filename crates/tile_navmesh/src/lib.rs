//! tile_navmesh - Tiled triangle navigation mesh
//!
//! Triangles live in fixed-size tiles on a sparse 3D grid. Tiles can be
//! added, replaced and removed at runtime; links between triangles are
//! patched incrementally across the 14 neighbour directions of a tile.
//!
//! # Features
//!
//! - **TileGrid**: Free-list tile storage with stable packed triangle ids
//! - **Connectivity**: Edge-hash internal adjacency and tolerance-based seam
//!   matching between independently generated tiles
//! - **PathFinder**: Resumable A* with per-call step and time budgets,
//!   off-mesh links, danger areas and custom step costs
//! - **Raycast**: Exit-edge walk reporting the first blocking edge
//! - **Queries**: BV-tree triangle lookup, closest triangle, islands
//!
//! # Example
//!
//! ```ignore
//! use tile_navmesh::{NavMeshParams, PathFinder, PathfinderConfig, Tile, TileGrid};
//! use tile_navmesh::{WayQueryRequest, WayQueryResult, WayQueryWorkingSet, WayQueryStatus};
//!
//! let mut grid = TileGrid::new(NavMeshParams::default())?;
//! let id = grid.set_tile(UVec3::ZERO, Tile::from_indices(vertices, &indices)?)?;
//! grid.connect_to_network(id, None)?;
//!
//! let finder = PathFinder::new(&grid, PathfinderConfig::default());
//! let request = WayQueryRequest::new(from, from_tri, to, to_tri);
//! let (mut ws, mut way) = (WayQueryWorkingSet::new(), WayQueryResult::new(256));
//! while finder.find_way(&request, &mut ws, &mut way)? == WayQueryStatus::Continuing {}
//! ```

pub mod error;
pub mod ids;
pub mod params;

pub use error::{NavMeshError, Result};
pub use ids::{IslandId, OffMeshLinkId, TileId, TriangleId, INVALID_OFF_MESH_LINK, TILE_TRIANGLES_MAX};
pub use params::{NavMeshParams, PathfinderConfig, PredictionMode};

pub mod geometry;

// Triangle soup of one grid cell
pub mod tile;
pub use tile::{BvNode, Link, Tile, Triangle};

// Edge adjacency and seam matching
pub mod connectivity;
pub use connectivity::{opposite_side, Edge, TileConnectivity, SIDE_COUNT};

pub mod filter;
pub use filter::{AcceptAll, AreaAnnotation, FlagsFilter, QueryFilter};

pub mod stats;
pub use stats::MeshStats;

// Sparse tile storage and queries
pub mod grid;
pub use grid::{ClosestTriangle, Islands, MinIslandArea, TileGrid};

// Resumable A*
pub mod pathfinder;
pub use pathfinder::{
  CustomPathCost, DangerArea, OffMeshNavigation, OffMeshTarget, PathFinder, WayQueryRequest, WayQueryResult,
  WayQueryStatus, WayQueryWorkingSet, WayTriangleData,
};

pub mod raycast;
pub use raycast::{RayHit, RaycastRequest, RaycastResult, RaycastStatus};

#[cfg(test)]
mod test_utils;
