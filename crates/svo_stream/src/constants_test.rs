use super::*;

#[test]
fn test_brick_size_is_multiple_of_chunk() {
  assert!(BRICK_SIZE.is_power_of_two());
  assert_eq!(BRICK_SIZE % ALLOC_CHUNK_SIZE, 0);
  assert_eq!(BRICK_VOXELS, 4096);
}

#[test]
fn test_brick_index_layout() {
  assert_eq!(brick_index(0, 0, 0), 0);
  assert_eq!(brick_index(1, 0, 0), 1);
  assert_eq!(brick_index(0, 1, 0), BRICK_SIZE);
  assert_eq!(brick_index(0, 0, 1), BRICK_SIZE_SQ);
  assert_eq!(
    brick_index(BRICK_SIZE - 1, BRICK_SIZE - 1, BRICK_SIZE - 1),
    BRICK_VOXELS - 1
  );
}

#[test]
fn test_crop_index_layout() {
  let dims = [3, 2, 1];
  assert_eq!(crop_index(0, 0, 0, dims), 0);
  assert_eq!(crop_index(2, 0, 0, dims), 2);
  assert_eq!(crop_index(0, 1, 0, dims), 3);
  assert_eq!(crop_index(2, 1, 0, dims), 5);
}

#[test]
fn test_chunks_for_rounds_up_and_never_zero() {
  assert_eq!(chunks_for(0), 1);
  assert_eq!(chunks_for(1), 1);
  assert_eq!(chunks_for(ALLOC_CHUNK_SIZE), 1);
  assert_eq!(chunks_for(ALLOC_CHUNK_SIZE + 1), 2);
  assert_eq!(chunks_for(BRICK_SIZE), (BRICK_SIZE / ALLOC_CHUNK_SIZE) as u32);
}

#[test]
fn test_stream_record_sizes() {
  assert_eq!(CHILD_TABLE_BYTES, 64);
  assert_eq!(AREA_ROOT_RECORD_BYTES, 68);
  assert_eq!(MAX_COMPRESSED_BRICK_BYTES, BRICK_VOXELS * 8);
}

#[test]
fn test_atlas_capacity() {
  // 16 x 16 x 8 whole bricks at 4 chunks per brick edge
  assert_eq!(ATLAS_BRICK_CAPACITY, 16 * 16 * 8);
}
