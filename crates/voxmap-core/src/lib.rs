//! Voxmap Core - Voxel Model and Data Structures
//!
//! This crate contains the data model shared by the ingestion engine and any
//! display front end:
//! - Display configuration (cubes, listeners, z-index mapping)
//! - Cube topology: orientation parsing and per-cube affine transforms
//! - Universe-to-voxel routing table
//! - The shared, mutex-guarded voxel color buffer and its snapshot API
//! - LED color correction tables
//! - Logging configuration

#![warn(missing_docs)]

pub use glam::{Mat4, UVec3, Vec3};

/// Error types
pub mod error;

/// Shared voxel color buffer
#[allow(missing_docs)]
pub mod buffer;
/// LED color correction
#[allow(missing_docs)]
pub mod color;
/// Display configuration
#[allow(missing_docs)]
pub mod config;
/// Renderer-facing geometry and frames
#[allow(missing_docs)]
pub mod display;
/// Logging configuration
pub mod logging;
/// Universe routing
#[allow(missing_docs)]
pub mod routing;
/// Cube orientation and transforms
#[allow(missing_docs)]
pub mod topology;

// --- Re-exports grouped by category ---

// Configuration
pub use config::{ArtNetListenerConfig, CubeConfig, DisplayConfig};
pub use logging::LogConfig;

// Geometry
pub use display::{DisplayModel, VoxelInstance};
pub use topology::{Axis, CubeTopology, Orientation, SignedAxis};

// Routing
pub use routing::{ListenerRoutes, RouteEntry, RoutingTable, PIXELS_PER_UNIVERSE};

// Colors
pub use buffer::{VoxelBuffer, VoxelColor, VoxelColorF};
pub use color::{
    ColorCorrector, ColorCorrectorOptions, GammaCorrector, IdentityCorrector,
    ReverseGammaCorrector,
};

// Errors
pub use error::{CoreError, Result};
