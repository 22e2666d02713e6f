use voxmap_core::{DisplayConfig, RoutingTable, VoxelBuffer, VoxelColor, PIXELS_PER_UNIVERSE};

const EXAMPLE: &str = include_str!("../../../resources/display.example.json");

#[test]
fn test_example_display_config_is_valid() {
    let config = DisplayConfig::from_json_str(EXAMPLE).expect("example config should parse");

    assert_eq!(config.cubes.len(), 2);
    assert_eq!(config.listener_count(), 3);
    assert_eq!(config.cubes[0].listeners[1].port, 6455);
    assert_eq!(config.total_voxels(), 2 * 20 * 20 * 20);
}

#[test]
fn test_example_routes_second_cube_after_first() {
    let config = DisplayConfig::from_json_str(EXAMPLE).unwrap();
    let table = RoutingTable::build(&config).unwrap();

    assert_eq!(table.listeners().len(), 3);
    assert_eq!(table.cube_offsets(), &[0, 8000]);

    // Second listener of cube 0: layer 0 is z = 10
    let entry = table.listener(1).unwrap().lookup(1).unwrap();
    assert_eq!(entry.z_slice, 10);
    assert_eq!(entry.pixel_buffer_offset, 10 * 400 + PIXELS_PER_UNIVERSE);

    // Cube 1, layer 19, third universe holds the last 60 pixels of the slice
    let entry = table.listener(2).unwrap().lookup(59).unwrap();
    assert_eq!(entry.pixel_buffer_offset, 8000 + 19 * 400 + 340);
    assert_eq!(entry.pixel_count, 60);
}

#[test]
fn test_routed_write_fills_exactly_one_slice() {
    let config = DisplayConfig::from_json_str(EXAMPLE).unwrap();
    let table = RoutingTable::build(&config).unwrap();
    let buffer = VoxelBuffer::new(config.total_voxels());
    let routes = table.listener(0).unwrap();

    for universe in 0..3 {
        let entry = routes.lookup(universe).unwrap();
        buffer.write_dmx(entry.pixel_buffer_offset, &[255; 512], entry.pixel_count);
    }

    let colors = buffer.colors();
    let lit = colors.iter().filter(|c| !c.is_black()).count();
    assert_eq!(lit, 400);
    assert!(colors[..400].iter().all(|c| *c == VoxelColor::new(255, 255, 255)));
}

#[test]
fn test_malformed_json_is_rejected() {
    assert!(DisplayConfig::from_json_str("{ \"cubes\": [").is_err());
    assert!(DisplayConfig::from_json_str("{ \"cubes\": [] }").is_err());
}
