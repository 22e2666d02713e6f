//! DMX over Ethernet
//!
//! ## Art-Net
//!
//! Art-Net is a UDP protocol for DMX transmission over Ethernet.
//! - Default port 6454
//! - Supports 32768 universes
//! - Includes sequence numbering and an ArtSync frame marker
//!
//! Only the ArtDmx packet is decoded; every other opcode is reported as
//! [`ArtNetMessage::Other`] and ignored by the listeners.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use voxmap_control::dmx::ArtNetSender;
//! use voxmap_core::VoxelColor;
//!
//! # fn main() -> voxmap_control::Result<()> {
//! let mut sender = ArtNetSender::new("127.0.0.1:6454")?;
//!
//! // 510 red pixels for one z-slice, sent as universes 0, 1 and 2
//! let slice = vec![VoxelColor::new(255, 0, 0); 510];
//! sender.send_slice(0, &slice)?;
//! sender.send_sync()?;
//! # Ok(())
//! # }
//! ```

pub mod artnet;

pub use artnet::{
    decode, encode_dmx, encode_sync, ArtDmx, ArtNetMessage, ArtNetSender, DecodeError,
    ARTNET_PORT, HEADER_LEN, MAX_DMX_CHANNELS, MIN_PACKET_LEN, OP_DMX, OP_SYNC,
};
