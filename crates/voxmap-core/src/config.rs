//! Display configuration
//!
//! The on-disk format is JSON:
//!
//! ```json
//! {
//!   "universes_per_layer": 3,
//!   "cubes": [
//!     {
//!       "position": [0, 0, 0],
//!       "width": 20, "height": 20, "length": 20,
//!       "orientation": ["-Z", "Y", "X"],
//!       "listeners": [
//!         { "ip": "127.0.0.1", "port": "6454", "z_indices": [0, 1, 2] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! [`DisplayConfig::validate`] must pass before the configuration is handed to
//! the topology, routing or ingestion code; loading does this automatically.

use crate::error::{CoreError, Result};
use crate::logging::LogConfig;
use crate::topology::{CubeTopology, Orientation};
use glam::{UVec3, Vec3};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// Maximum accepted configuration file size (1 MB)
pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// One UDP endpoint feeding part of a cube
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtNetListenerConfig {
    pub ip: String,
    #[serde(deserialize_with = "port_from_int_or_string")]
    pub port: u16,
    /// Layer index within this listener's universe range → z-slice in the cube
    pub z_indices: Vec<u32>,
}

impl ArtNetListenerConfig {
    pub fn new(ip: impl Into<String>, port: u16, z_indices: Vec<u32>) -> Self {
        Self {
            ip: ip.into(),
            port,
            z_indices,
        }
    }

    /// Parsed bind address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .ip
            .trim()
            .parse()
            .map_err(|e: std::net::AddrParseError| CoreError::InvalidAddress {
                ip: self.ip.clone(),
                port: self.port.to_string(),
                reason: e.to_string(),
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn port_from_int_or_string<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Int(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Int(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}

fn default_dimension() -> u32 {
    20
}

fn default_orientation() -> Vec<String> {
    vec!["-Z".to_string(), "Y".to_string(), "X".to_string()]
}

fn default_world_orientation() -> Vec<String> {
    vec!["X".to_string(), "Y".to_string(), "Z".to_string()]
}

/// One cube of the display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeConfig {
    /// World-space origin of the cube
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_dimension")]
    pub length: u32,
    /// How local XYZ maps onto the wiring order
    #[serde(default = "default_orientation")]
    pub orientation: Vec<String>,
    /// How the cube frame maps into world space
    #[serde(default = "default_world_orientation")]
    pub world_orientation: Vec<String>,
    #[serde(default)]
    pub listeners: Vec<ArtNetListenerConfig>,
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            width: default_dimension(),
            height: default_dimension(),
            length: default_dimension(),
            orientation: default_orientation(),
            world_orientation: default_world_orientation(),
            listeners: Vec::new(),
        }
    }
}

impl CubeConfig {
    pub fn dimensions(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.length)
    }

    pub fn parsed_orientation(&self) -> Result<Orientation> {
        Orientation::parse(&self.orientation)
    }

    pub fn parsed_world_orientation(&self) -> Result<Orientation> {
        Orientation::parse(&self.world_orientation)
    }

    /// Voxels this cube stores when every `layer_span`-th layer is kept.
    ///
    /// A partial trailing group still gets a layer, so the layer count is
    /// `ceil(length / layer_span)` rather than the floored quotient: a cube
    /// of length 5 with span 2 stores layers 0, 2 and 4.
    pub fn voxel_count(&self, layer_span: u32) -> usize {
        self.width as usize
            * self.height as usize
            * self.length.div_ceil(layer_span.max(1)) as usize
    }

    /// Compute the cube's transforms and voxel layout
    pub fn topology(&self, layer_span: u32) -> Result<CubeTopology> {
        CubeTopology::compute(
            self.dimensions(),
            layer_span,
            self.parsed_orientation()?,
            self.parsed_world_orientation()?,
            self.position,
        )
    }
}

fn default_universes_per_layer() -> u32 {
    3
}

fn default_layer_span() -> u32 {
    1
}

fn default_alpha() -> f32 {
    0.7
}

fn default_true() -> bool {
    true
}

/// Complete display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub cubes: Vec<CubeConfig>,
    /// Universes that make up one z-layer
    #[serde(default = "default_universes_per_layer")]
    pub universes_per_layer: u32,
    /// Keep every n-th z-layer
    #[serde(default = "default_layer_span")]
    pub layer_span: u32,
    /// Alpha given to non-black voxels in snapshots
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Apply reverse LED color correction in snapshots
    #[serde(default = "default_true")]
    pub color_correction: bool,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            cubes: Vec::new(),
            universes_per_layer: default_universes_per_layer(),
            layer_span: default_layer_span(),
            alpha: default_alpha(),
            color_correction: true,
            log: LogConfig::default(),
        }
    }
}

impl DisplayConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DisplayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_limit(path.as_ref(), MAX_CONFIG_FILE_SIZE)
    }

    fn load_with_limit(path: &Path, limit: u64) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        if size > limit {
            return Err(CoreError::FileTooLarge { size, limit });
        }

        let mut content = String::new();
        File::open(path)?.read_to_string(&mut content)?;
        let config = Self::from_json_str(&content)?;

        tracing::debug!(
            "Loaded display configuration from {:?}: {} cube(s), {} listener(s)",
            path,
            config.cubes.len(),
            config.listener_count()
        );
        Ok(config)
    }

    /// Check every invariant the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.cubes.is_empty() {
            return Err(CoreError::EmptyCubeList);
        }
        if self.universes_per_layer == 0 {
            return Err(CoreError::InvalidParameter(
                "universes_per_layer must be at least 1".to_string(),
            ));
        }
        if self.layer_span == 0 {
            return Err(CoreError::InvalidParameter(
                "layer_span must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(CoreError::InvalidParameter(format!(
                "alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }

        for (index, cube) in self.cubes.iter().enumerate() {
            if cube.width == 0 || cube.height == 0 || cube.length == 0 {
                return Err(CoreError::InvalidDimensions {
                    cube: index,
                    width: cube.width,
                    height: cube.height,
                    length: cube.length,
                });
            }
            cube.parsed_orientation()?;
            cube.parsed_world_orientation()?;

            for listener in &cube.listeners {
                listener.socket_addr()?;
                if listener.z_indices.is_empty() {
                    return Err(CoreError::MissingZIndices {
                        cube: index,
                        ip: listener.ip.clone(),
                        port: listener.port,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.cubes.iter().map(|c| c.listeners.len()).sum()
    }

    /// Length of the shared voxel buffer
    pub fn total_voxels(&self) -> usize {
        self.cubes
            .iter()
            .map(|c| c.voxel_count(self.layer_span))
            .sum()
    }

    /// Topology of every cube, in configuration order
    pub fn topologies(&self) -> Result<Vec<CubeTopology>> {
        self.cubes
            .iter()
            .map(|cube| cube.topology(self.layer_span))
            .collect()
    }
}
