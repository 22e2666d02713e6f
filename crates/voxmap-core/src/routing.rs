//! Universe → voxel routing
//!
//! Each listener receives its own universe space on its own socket. A universe
//! `u` addresses layer `u / universes_per_layer` of that listener and the
//! `(u % universes_per_layer)`-th run of [`PIXELS_PER_UNIVERSE`] pixels within
//! the layer. The layer is looked up in the listener's `z_indices` to find the
//! z-slice in the owning cube.
//!
//! The table is built once from configuration and never changes. Gaps (layers
//! without a z-index, runs past the slice capacity) are simply absent; packets
//! for them are dropped at runtime.

use crate::config::DisplayConfig;
use crate::error::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{debug, warn};

/// 512 DMX channels / 3 channels per pixel, floored
pub const PIXELS_PER_UNIVERSE: usize = 170;

/// Highest universe number the 15-bit Art-Net port address allows
pub const MAX_UNIVERSE: u32 = 0x7FFF;

/// Where one universe's pixels land in the shared buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub cube_index: usize,
    /// Layer index within the listener's universe range
    pub layer_in_listener: usize,
    /// Absolute z-slice in the cube
    pub z_slice: u32,
    /// Index in the voxel buffer of the universe's first pixel
    pub pixel_buffer_offset: usize,
    /// Pixels this universe may write before overflowing the slice
    pub pixel_count: usize,
}

/// Routing for one listener endpoint
#[derive(Debug, Clone)]
pub struct ListenerRoutes {
    pub cube_index: usize,
    pub addr: SocketAddr,
    routes: HashMap<u16, RouteEntry>,
}

impl ListenerRoutes {
    pub fn new(cube_index: usize, addr: SocketAddr, routes: HashMap<u16, RouteEntry>) -> Self {
        Self {
            cube_index,
            addr,
            routes,
        }
    }

    pub fn lookup(&self, universe: u16) -> Option<&RouteEntry> {
        self.routes.get(&universe)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routed universes in ascending order
    pub fn universes(&self) -> Vec<u16> {
        let mut universes: Vec<u16> = self.routes.keys().copied().collect();
        universes.sort_unstable();
        universes
    }
}

/// Routing for every listener, in configuration order
#[derive(Debug, Clone)]
pub struct RoutingTable {
    listeners: Vec<ListenerRoutes>,
    cube_offsets: Vec<usize>,
    total_voxels: usize,
}

impl RoutingTable {
    /// Build the table from a validated configuration.
    ///
    /// Fails only when a listener address cannot be parsed.
    pub fn build(config: &DisplayConfig) -> Result<Self> {
        let upl = config.universes_per_layer.max(1) as usize;
        let span = config.layer_span.max(1);

        let mut listeners = Vec::new();
        let mut cube_offsets = Vec::with_capacity(config.cubes.len());
        let mut cube_base = 0usize;

        for (cube_index, cube) in config.cubes.iter().enumerate() {
            cube_offsets.push(cube_base);
            let slice_capacity = cube.width as usize * cube.height as usize;

            for listener in &cube.listeners {
                let addr = listener.socket_addr()?;
                let mut routes = HashMap::new();

                let universe_count = listener.z_indices.len() * upl;
                for universe in 0..universe_count {
                    if universe as u32 > MAX_UNIVERSE {
                        warn!(
                            "Listener {} addresses more than {} universes; truncating",
                            addr,
                            MAX_UNIVERSE + 1
                        );
                        break;
                    }

                    let layer = universe / upl;
                    let universe_in_layer = universe % upl;
                    let z = listener.z_indices[layer];

                    if z >= cube.length {
                        warn!(
                            "Listener {} layer {} maps to z={} outside cube {} (length {})",
                            addr, layer, z, cube_index, cube.length
                        );
                        continue;
                    }
                    if z % span != 0 {
                        debug!(
                            "Listener {} layer {} maps to z={} which layer_span {} does not store",
                            addr, layer, z, span
                        );
                        continue;
                    }

                    let start_pixel = universe_in_layer * PIXELS_PER_UNIVERSE;
                    if start_pixel >= slice_capacity {
                        debug!(
                            "Universe {} on {} starts at pixel {} beyond slice capacity {}",
                            universe, addr, start_pixel, slice_capacity
                        );
                        continue;
                    }

                    let stored_slice = (z / span) as usize;
                    routes.insert(
                        universe as u16,
                        RouteEntry {
                            cube_index,
                            layer_in_listener: layer,
                            z_slice: z,
                            pixel_buffer_offset: cube_base
                                + stored_slice * slice_capacity
                                + start_pixel,
                            pixel_count: PIXELS_PER_UNIVERSE.min(slice_capacity - start_pixel),
                        },
                    );
                }

                debug!(
                    "Listener {} (cube {}) routes {} universe(s)",
                    addr,
                    cube_index,
                    routes.len()
                );
                listeners.push(ListenerRoutes {
                    cube_index,
                    addr,
                    routes,
                });
            }

            cube_base += cube.voxel_count(span);
        }

        Ok(Self {
            listeners,
            cube_offsets,
            total_voxels: cube_base,
        })
    }

    pub fn listeners(&self) -> &[ListenerRoutes] {
        &self.listeners
    }

    pub fn listener(&self, index: usize) -> Option<&ListenerRoutes> {
        self.listeners.get(index)
    }

    /// Buffer index of each cube's first voxel
    pub fn cube_offsets(&self) -> &[usize] {
        &self.cube_offsets
    }

    /// Length of the voxel buffer this table addresses
    pub fn total_voxels(&self) -> usize {
        self.total_voxels
    }
}
