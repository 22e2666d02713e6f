//! Voxmap Control - Art-Net ingestion
//!
//! This crate turns Art-Net traffic into voxel colors:
//! - **DMX**: Art-Net packet decoding and an ArtDmx/ArtSync sender
//! - **Listeners**: one UDP socket and thread per configured endpoint
//! - **Ingestion**: starts every listener of a display and stops them together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voxmap_control::IngestEngine;
//! use voxmap_core::DisplayConfig;
//!
//! # fn main() -> voxmap_control::Result<()> {
//! let config = DisplayConfig::load("display.json")?;
//! let mut engine = IngestEngine::start(&config)?;
//!
//! let colors = engine.buffer().snapshot(config.color_correction, config.alpha);
//! println!("{} voxels", colors.len());
//!
//! engine.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`dmx`] - Art-Net codec and sender
//! - [`listener`] - Per-endpoint receive worker
//! - [`ingest`] - Engine owning all workers
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;

/// DMX over Ethernet (Art-Net)
pub mod dmx;

/// Ingestion engine
pub mod ingest;
/// Listener workers
pub mod listener;

// Re-exports
pub use dmx::{ArtNetMessage, ArtNetSender, DecodeError};
pub use error::{ControlError, Result};
pub use ingest::IngestEngine;
pub use listener::{DatagramSource, ListenerStats, ListenerWorker, WorkerState};
