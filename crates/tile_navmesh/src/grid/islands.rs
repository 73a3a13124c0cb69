//! Connected triangle components ("islands") and their surface area.

use std::collections::VecDeque;

use super::TileGrid;
use crate::filter::QueryFilter;
use crate::geometry::triangle_area;
use crate::ids::{IslandId, TriangleId};
use crate::tile::Triangle;

/// Area of every island, indexed by `IslandId - 1`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Islands {
  areas: Vec<f32>,
}

impl Islands {
  pub fn len(&self) -> usize {
    self.areas.len()
  }

  pub fn is_empty(&self) -> bool {
    self.areas.is_empty()
  }

  /// Surface area of `island`, `None` for unknown islands.
  pub fn island_area(&self, island: IslandId) -> Option<f32> {
    (island.0 as usize).checked_sub(1).and_then(|i| self.areas.get(i).copied())
  }
}

impl TileGrid {
  /// Label every triangle with its connected component over internal and
  /// boundary links. Returns the number of islands.
  ///
  /// Off-mesh links do not merge islands. Ids are only valid until the next
  /// tile change.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "navmesh::compute_islands"))]
  pub fn compute_islands(&mut self) -> usize {
    for container in self.containers.iter_mut().filter(|c| c.in_use) {
      for triangle in &mut container.tile.triangles {
        triangle.island = IslandId::NONE;
      }
    }

    let mut areas: Vec<f32> = Vec::new();
    let mut queue: VecDeque<TriangleId> = VecDeque::new();
    let seeds: Vec<TriangleId> = self
      .tiles()
      .flat_map(|(id, _, tile)| (0..tile.triangles.len()).map(move |t| TriangleId::new(id, t as u16)))
      .collect();

    for seed in seeds {
      if self.triangle(seed).is_some_and(|t| t.island.is_some()) {
        continue;
      }
      let island = IslandId(areas.len() as u32 + 1);
      let mut area = 0.0;

      self.set_island(seed, island);
      queue.push_back(seed);
      while let Some(current) = queue.pop_front() {
        if let Some([a, b, c]) = self.vertices(current) {
          area += triangle_area(a, b, c);
        }
        let next: Vec<TriangleId> = self
          .links(current)
          .iter()
          .filter(|l| !l.is_off_mesh())
          .filter_map(|l| match self.link_target(current, l) {
            Ok(target) => Some(target),
            Err(err) => {
              log::warn!("island walk skipped a link of {current:?}: {err}");
              None
            }
          })
          .collect();
        for target in next {
          if self.triangle(target).is_some_and(|t| !t.island.is_some()) {
            self.set_island(target, island);
            queue.push_back(target);
          }
        }
      }
      areas.push(area);
    }

    log::debug!("navmesh islands: {}", areas.len());
    self.islands = Islands { areas };
    self.islands.len()
  }

  fn set_island(&mut self, id: TriangleId, island: IslandId) {
    let Some(index) = id.tile().index() else {
      return;
    };
    if let Some(triangle) = self
      .containers
      .get_mut(index)
      .and_then(|c| c.tile.triangles.get_mut(id.local_index() as usize))
    {
      triangle.island = island;
    }
  }

  /// Island of triangle `id`, `IslandId::NONE` before [`Self::compute_islands`].
  pub fn island_of(&self, id: TriangleId) -> IslandId {
    self.triangle(id).map_or(IslandId::NONE, |t| t.island)
  }
}

/// Filter that rejects triangles on islands smaller than `min_area`.
pub struct MinIslandArea<'a, F> {
  pub grid: &'a TileGrid,
  pub inner: F,
  pub min_area: f32,
}

impl<'a, F: QueryFilter> MinIslandArea<'a, F> {
  pub fn new(grid: &'a TileGrid, inner: F, min_area: f32) -> Self {
    Self { grid, inner, min_area }
  }
}

impl<F: QueryFilter> QueryFilter for MinIslandArea<'_, F> {
  fn pass_filter(&self, triangle: &Triangle) -> bool {
    if !self.inner.pass_filter(triangle) {
      return false;
    }
    // Unlabelled triangles pass.
    match self.grid.islands().island_area(triangle.island) {
      Some(area) => area >= self.min_area,
      None => true,
    }
  }

  fn cost_multiplier(&self, triangle: &Triangle) -> f32 {
    self.inner.cost_multiplier(triangle)
  }
}
