//! Error types for the voxel model and its configuration
use thiserror::Error;

/// Errors raised while loading or validating a display configuration.
///
/// Every variant is fatal at startup: the ingestion engine must not run on a
/// configuration that failed here.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The configuration declares no cubes
    #[error("Cube configuration cannot be empty")]
    EmptyCubeList,

    /// An orientation list is not a signed permutation of X, Y, Z
    #[error("Invalid orientation {labels:?}: {reason}")]
    InvalidOrientation {
        /// The labels as written in the configuration
        labels: Vec<String>,
        /// What is wrong with them
        reason: String,
    },

    /// A cube has a zero dimension
    #[error("Cube {cube} has invalid dimensions {width}x{height}x{length}")]
    InvalidDimensions {
        /// Index of the cube in configuration order
        cube: usize,
        /// Voxels along local X
        width: u32,
        /// Voxels along local Y
        height: u32,
        /// Voxels along local Z
        length: u32,
    },

    /// A listener address could not be parsed
    #[error("Invalid listener address {ip}:{port}: {reason}")]
    InvalidAddress {
        /// Configured IP
        ip: String,
        /// Configured port, as written
        port: String,
        /// Parser message
        reason: String,
    },

    /// A listener has no z-indices
    #[error("Listener {ip}:{port} of cube {cube} has no z_indices")]
    MissingZIndices {
        /// Index of the owning cube
        cube: usize,
        /// Configured IP
        ip: String,
        /// Configured port
        port: u16,
    },

    /// Any other invalid setting
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration file exceeds the size limit
    #[error("Configuration file too large: {size} bytes (limit {limit})")]
    FileTooLarge {
        /// Actual size in bytes
        size: u64,
        /// Accepted maximum
        limit: u64,
    },

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
