//! Error types for the ingestion engine
use std::net::SocketAddr;
use thiserror::Error;
use voxmap_core::CoreError;

/// Ingestion errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// A listener socket could not be bound
    #[error("Failed to bind Art-Net listener to {addr}: {source}")]
    BindError {
        /// Configured address
        addr: SocketAddr,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    /// A worker thread could not be started
    #[error("Failed to spawn listener thread for {addr}: {source}")]
    SpawnError {
        /// Listener address
        addr: SocketAddr,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// DMX send/encode error
    #[error("DMX error: {0}")]
    DmxError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, ControlError>;
