//! Area file export.
//!
//! The world is split into area nodes (children of rootless-parent-size
//! nodes). Each area is voxelized synchronously and written as one file:
//!
//! ```text
//! offset 0   area root record: u32 0 + child table       (68 bytes)
//! ...        child records, depth first; each record is followed by its
//!            own child table when it has children
//! ```
//!
//! A table entry covers the child's record and table only, not its
//! descendants. Offsets are relative to the start of the area file. Subtrees
//! without any brick are left out of their parent's table. Areas without
//! a brick are removed from the archive.

use glam::Vec3;

use super::OctreeManager;
use crate::constants::{AREA_FILE_EXTENSION, CHILD_TABLE_BYTES};
use crate::error::Result;
use crate::interfaces::ArchiveWriter;
use crate::octree::{Aabb, NodeRef};
use crate::segment::format::{save_voxels, write_child_table, write_stream_record, ChildFileOffset, ChildTable};
use crate::streaming::SegmentPayload;
use crate::voxelize::voxelize_meshes;

/// File name of the area whose box is `bounds`: centre and size as
/// four-digit integers.
pub fn area_file_name(bounds: &Aabb) -> String {
  let c = bounds.center();
  let digits = |v: f32| v as i32 as u16;
  format!(
    "{:04}_{:04}_{:04}_{:04}.{AREA_FILE_EXTENSION}",
    digits(c.x),
    digits(c.y),
    digits(c.z),
    digits(bounds.edge())
  )
}

/// Result of writing one subtree.
#[derive(Clone, Copy, Debug, Default)]
struct Saved {
  /// Bytes of the node record plus its child table.
  size: u32,
  /// Nodes with a brick in the subtree.
  bricks: usize,
}

impl OctreeManager {
  /// Voxelize the whole world and write one file per area into `writer`.
  ///
  /// Areas already present in `writer` are kept as they are. The live tree
  /// is rebuilt from a fresh root afterwards. Returns the bytes written.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::export_svo"))]
  pub fn export_svo(&mut self, writer: &dyn ArchiveWriter) -> Result<u64> {
    if let Some(old) = self.root.take() {
      self.destroy_subtree(old);
    }
    let size = self.config.world_size.max(self.config.rootless_parent_size);
    let id = self.new_node(Aabb::cube(Vec3::ZERO, size), None);
    let root = id.downgrade();
    self.root = Some(id);

    let world = Aabb::cube(Vec3::ZERO, self.config.world_size);
    let mut written = 0u64;
    let mut areas = 0usize;
    let result = self.export_node(root, &world, writer, &mut written, &mut areas);

    self.allocate_root_node();
    result?;
    log::info!("svo export done: {areas} area files, {written} bytes");
    Ok(written)
  }

  /// Walk down to the rootless-parent level and export its areas.
  fn export_node(
    &mut self,
    node_ref: NodeRef,
    world: &Aabb,
    writer: &dyn ArchiveWriter,
    written: &mut u64,
    areas: &mut usize,
  ) -> Result<()> {
    let Some(node) = self.nodes.get(node_ref) else {
      return Ok(());
    };
    let size = node.size();
    let rootless = self.config.rootless_parent_size;
    if size < rootless {
      return Ok(());
    }

    self.check_allocate_children(node_ref, false);
    let Some(node) = self.nodes.get(node_ref) else {
      return Ok(());
    };
    let children: Vec<(usize, NodeRef, Aabb)> = node
      .child_refs()
      .filter_map(|(i, c)| Some((i, c, self.nodes.get(c)?.bounds)))
      .collect();

    if size > rootless {
      for (child_id, child, _) in children {
        self.export_node(child, world, writer, written, areas)?;
        self.delete_child(node_ref, child_id);
      }
      return Ok(());
    }

    for (child_id, child, bounds) in children {
      let name = area_file_name(&bounds);
      if bounds.overlaps(world) && !writer.contains(&name) {
        let mut out = Vec::new();
        let saved = self.save_node(child, &mut out)?;
        if saved.bricks > 0 {
          writer.write_entry(&name, &out)?;
          *written += out.len() as u64;
          *areas += 1;
          log::debug!("area {name}: {} bricks, {} bytes", saved.bricks, out.len());
        } else {
          writer.remove_entry(&name)?;
        }
      }
      self.delete_child(node_ref, child_id);
    }
    Ok(())
  }

  /// Voxelize `node` now if it was never loaded.
  fn load_for_export(&mut self, node_ref: NodeRef) {
    let Some(node) = self.nodes.get(node_ref) else {
      return;
    };
    if node.segment.as_ref().map_or(true, |s| s.is_ready()) {
      return;
    }
    let out = voxelize_meshes(
      self.scene.as_ref(),
      &node.bounds,
      self.config.subset_count,
      self.config.max_node_size,
    );
    self.install_payload(
      node_ref,
      SegmentPayload {
        crop: out.crop,
        layers: out.layers,
        child_table: None,
        child_tris_mask: out.child_tris_mask,
        solid_voxels: out.solid_voxels,
        load_us: 0,
      },
    );
  }

  /// Append the record of `node` and its subtree to `out`.
  fn save_node(&mut self, node_ref: NodeRef, out: &mut Vec<u8>) -> Result<Saved> {
    self.load_for_export(node_ref);
    let Some(node) = self.nodes.get(node_ref) else {
      return Ok(Saved::default());
    };
    let Some(seg) = node.segment.as_ref() else {
      return Ok(Saved::default());
    };
    let refine = seg.child_tris_mask != 0 || node.size() > self.config.max_node_size;

    let start = out.len();
    let mut saved = Saved::default();
    if seg.is_empty() {
      write_stream_record(out, None, self.compressor.as_ref());
    } else {
      let payload = save_voxels(&seg.crop, &seg.layers)?;
      write_stream_record(out, Some(&payload), self.compressor.as_ref());
      saved.bricks += 1;
    }

    if refine {
      self.check_allocate_children(node_ref, false);
    }
    let children: Vec<(usize, NodeRef)> = self
      .nodes
      .get(node_ref)
      .map(|n| n.child_refs().collect())
      .unwrap_or_default();

    let table_at = out.len();
    saved.size = (table_at - start) as u32;
    if children.is_empty() {
      return Ok(saved);
    }

    out.resize(table_at + CHILD_TABLE_BYTES, 0);
    let mut table = ChildTable::default();
    for (child_id, child) in children {
      let offset = out.len();
      let child_saved = self.save_node(child, out)?;
      if child_saved.bricks == 0 {
        out.truncate(offset);
      } else {
        table[child_id] = ChildFileOffset {
          offset: offset as u32,
          size: child_saved.size,
        };
        saved.bricks += child_saved.bricks;
      }
      self.delete_child(node_ref, child_id);
    }

    if table.iter().all(|c| c.size == 0) {
      out.truncate(table_at);
      return Ok(saved);
    }
    let mut encoded = Vec::with_capacity(CHILD_TABLE_BYTES);
    write_child_table(&mut encoded, &table);
    out[table_at..table_at + CHILD_TABLE_BYTES].copy_from_slice(&encoded);
    saved.size += CHILD_TABLE_BYTES as u32;
    Ok(saved)
  }
}
