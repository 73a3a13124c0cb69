use super::*;

#[test]
fn test_default_is_valid() {
  let config = SvoConfig::default();
  assert!(config.validate().is_ok());
  assert_eq!(config.get_root_size(), 1024.0);
  assert_eq!(config.get_area_size(), 512.0);
}

#[test]
fn test_root_size_without_rootless() {
  let config = SvoConfig {
    rootless: false,
    world_size: 4096.0,
    ..Default::default()
  };
  assert_eq!(config.get_root_size(), 4096.0);
  assert_eq!(config.get_root_bounds().max, Vec3::splat(4096.0));

  let small = SvoConfig {
    rootless: false,
    world_size: 100.0,
    ..Default::default()
  };
  assert_eq!(small.get_root_size(), 1024.0);
}

#[test]
fn test_light_border_grows_with_bounces() {
  let mut config = SvoConfig::default();
  assert_eq!(config.get_light_border(32.0), 8.0);
  config.bounces = 3;
  assert_eq!(config.get_light_border(32.0), 8.0 + 2.0 * config.cone_max_length);
  config.bounces = 0;
  assert_eq!(config.get_light_border(32.0), 8.0);
}

#[test]
fn test_validate_rejects_bad_sizes() {
  let inverted = SvoConfig::default().with_node_sizes(64.0, 8.0);
  assert!(inverted.validate().is_err());

  let too_big = SvoConfig::default().with_node_sizes(4.0, 512.0);
  assert!(too_big.validate().is_err());

  let no_subsets = SvoConfig {
    subset_count: 0,
    ..Default::default()
  };
  assert!(no_subsets.validate().is_err());
}

#[test]
fn test_settings_checksum_tracks_lighting_settings() {
  let a = SvoConfig::default();
  let mut b = a.clone();
  assert_eq!(a.settings_checksum(), b.settings_checksum());
  b.cone_max_length += 1.0;
  assert_ne!(a.settings_checksum(), b.settings_checksum());

  // Worker count does not affect lighting.
  let c = a.clone().with_worker_threads(8);
  assert_eq!(a.settings_checksum(), c.settings_checksum());
}

#[test]
fn test_lod_distance() {
  let config = SvoConfig::default();
  assert_eq!(config.get_lod_distance(16.0), 64.0);
}
