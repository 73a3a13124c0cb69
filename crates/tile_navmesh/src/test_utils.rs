//! Mesh fixtures for unit tests.

use glam::{UVec3, Vec3};

use crate::grid::TileGrid;
use crate::ids::{TileId, TriangleId};
use crate::params::NavMeshParams;
use crate::tile::Tile;

pub const TILE: f32 = 8.0;

pub fn params() -> NavMeshParams {
  NavMeshParams::default().with_tile_size(Vec3::splat(TILE))
}

/// Flat square over the whole tile at local height `z`.
///
/// ```text
/// 3 --- 2
/// | 1 / |
/// | / 0 |
/// 0 --- 1
/// ```
pub fn quad_tile(z: f32) -> Tile {
  let vertices = vec![
    Vec3::new(0.0, 0.0, z),
    Vec3::new(TILE, 0.0, z),
    Vec3::new(TILE, TILE, z),
    Vec3::new(0.0, TILE, z),
  ];
  Tile::from_indices(vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
}

/// Four triangles in a row along X, unit width.
///
/// ```text
/// 3 --- 4 --- 5
/// | \ 1 | \ 3 |
/// | 0 \ | 2 \ |
/// 0 --- 1 --- 2
/// ```
pub fn strip_tile() -> Tile {
  let vertices = vec![
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(2.0, 0.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(2.0, 1.0, 0.0),
  ];
  Tile::from_indices(vertices, &[[0, 1, 3], [1, 4, 3], [1, 2, 4], [2, 5, 4]]).unwrap()
}

/// Grid with one connected tile per coordinate.
pub fn grid_of(tiles: Vec<(UVec3, Tile)>) -> (TileGrid, Vec<TileId>) {
  let mut grid = TileGrid::new(params()).unwrap();
  let mut ids = Vec::new();
  for (coord, tile) in tiles {
    let id = grid.set_tile(coord, tile).unwrap();
    grid.connect_to_network(id, None).unwrap();
    ids.push(id);
  }
  (grid, ids)
}

/// Row of `count` flat quad tiles along X.
pub fn floor_row(count: u32) -> (TileGrid, Vec<TileId>) {
  grid_of((0..count).map(|x| (UVec3::new(x, 0, 0), quad_tile(1.0))).collect())
}

pub fn tri(tile: TileId, local: u16) -> TriangleId {
  TriangleId::new(tile, local)
}
