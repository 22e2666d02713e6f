//! Art-Net protocol subset (ArtDmx, ArtSync)
//!
//! Art-Net is a UDP-based protocol for transmitting DMX512 over Ethernet.
//!
//! ```text
//! 0..8    "Art-Net\0"
//! 8..10   OpCode             little-endian
//! 10..12  Protocol version   big-endian (14)
//! 12      Sequence
//! 13      Physical
//! 14..16  Universe           little-endian
//! 16..18  Length             big-endian, <= 512
//! 18..    DMX data
//! ```

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use voxmap_core::{VoxelColor, PIXELS_PER_UNIVERSE};

use crate::{error::ControlError, Result};

/// Packet signature
pub const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
/// Size of the ArtDmx header; minimum size of an ArtDmx packet
pub const HEADER_LEN: usize = 18;
/// Signature plus opcode; minimum size of any Art-Net packet
pub const MIN_PACKET_LEN: usize = 10;
/// Maximum DMX channels per universe
pub const MAX_DMX_CHANNELS: usize = 512;
/// ArtDmx opcode
pub const OP_DMX: u16 = 0x5000;
/// ArtSync opcode
pub const OP_SYNC: u16 = 0x5200;
/// Protocol revision written by the encoders
pub const PROTOCOL_VERSION: u16 = 14;
/// Standard Art-Net UDP port
pub const ARTNET_PORT: u16 = 6454;

/// Reasons a datagram is not an Art-Net packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Shorter than the header its opcode requires
    #[error("malformed Art-Net header: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
    /// First eight bytes are not `Art-Net\0`
    #[error("malformed Art-Net header: bad signature")]
    BadSignature,
}

/// DMX payload of an ArtDmx packet, borrowed from the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtDmx<'a> {
    pub sequence: u8,
    pub physical: u8,
    pub universe: u16,
    /// Length field as sent, after clamping to 512
    pub declared_length: u16,
    /// Channel data, truncated to the bytes actually present
    pub data: &'a [u8],
}

impl ArtDmx<'_> {
    /// Complete RGB triads in the payload
    pub fn pixels(&self) -> impl Iterator<Item = VoxelColor> + '_ {
        self.data
            .chunks_exact(3)
            .map(|t| VoxelColor::new(t[0], t[1], t[2]))
    }

    /// Declared length exceeded what the datagram carried
    pub fn is_truncated(&self) -> bool {
        (self.declared_length as usize) > self.data.len()
    }
}

/// Decoded Art-Net packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtNetMessage<'a> {
    Dmx(ArtDmx<'a>),
    Other(u16),
}

impl ArtNetMessage<'_> {
    pub fn opcode(&self) -> u16 {
        match self {
            ArtNetMessage::Dmx(_) => OP_DMX,
            ArtNetMessage::Other(op) => *op,
        }
    }

    /// ArtSync: the sender finished a frame. Advisory only.
    pub fn is_sync(&self) -> bool {
        self.opcode() == OP_SYNC
    }
}

/// Parse one datagram. Never reads past `bytes`.
///
/// Any packet needs the signature and opcode; only ArtDmx needs the full
/// 18-byte header, so a 14-byte ArtSync decodes as [`ArtNetMessage::Other`].
pub fn decode(bytes: &[u8]) -> std::result::Result<ArtNetMessage<'_>, DecodeError> {
    if bytes.len() < MIN_PACKET_LEN {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            min: MIN_PACKET_LEN,
        });
    }
    if &bytes[0..8] != ARTNET_ID {
        return Err(DecodeError::BadSignature);
    }

    let opcode = u16::from_le_bytes([bytes[8], bytes[9]]);
    if opcode != OP_DMX {
        return Ok(ArtNetMessage::Other(opcode));
    }
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            min: HEADER_LEN,
        });
    }

    let universe = u16::from_le_bytes([bytes[14], bytes[15]]);
    let declared_length =
        u16::from_be_bytes([bytes[16], bytes[17]]).min(MAX_DMX_CHANNELS as u16);
    let available = bytes.len() - HEADER_LEN;
    let end = HEADER_LEN + (declared_length as usize).min(available);

    Ok(ArtNetMessage::Dmx(ArtDmx {
        sequence: bytes[12],
        physical: bytes[13],
        universe,
        declared_length,
        data: &bytes[HEADER_LEN..end],
    }))
}

/// Build an ArtDmx packet. `data` beyond 512 channels is cut off.
pub fn encode_dmx(universe: u16, sequence: u8, data: &[u8]) -> Vec<u8> {
    let data = &data[..data.len().min(MAX_DMX_CHANNELS)];
    let mut packet = Vec::with_capacity(HEADER_LEN + data.len());

    packet.extend_from_slice(ARTNET_ID);
    packet.extend_from_slice(&OP_DMX.to_le_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.push(sequence);
    // Physical (0)
    packet.push(0);
    packet.extend_from_slice(&universe.to_le_bytes());
    packet.extend_from_slice(&(data.len() as u16).to_be_bytes());
    packet.extend_from_slice(data);

    packet
}

/// Build an ArtSync packet
pub fn encode_sync() -> Vec<u8> {
    let mut packet = Vec::with_capacity(14);
    packet.extend_from_slice(ARTNET_ID);
    packet.extend_from_slice(&OP_SYNC.to_le_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    // Aux1, Aux2
    packet.extend_from_slice(&[0, 0]);
    packet
}

/// Art-Net sender for outputting DMX data
pub struct ArtNetSender {
    socket: UdpSocket,
    target: SocketAddr,
    sequence: u8,
}

impl ArtNetSender {
    /// Create a new Art-Net sender
    ///
    /// # Arguments
    /// * `target` - Destination, e.g. "255.255.255.255:6454" or "127.0.0.1:6454"
    pub fn new(target: &str) -> Result<Self> {
        let target = target
            .to_socket_addrs()
            .map_err(|e| ControlError::DmxError(format!("Invalid Art-Net target address: {}", e)))?
            .next()
            .ok_or_else(|| {
                ControlError::DmxError(format!("Art-Net target {} did not resolve", target))
            })?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;

        tracing::info!("Art-Net sender created -> {}", target);

        Ok(Self {
            socket,
            target,
            sequence: 0,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one universe of channel data
    pub fn send_dmx(&mut self, universe: u16, data: &[u8]) -> Result<()> {
        // Art-Net reserves sequence 0 for "sequencing disabled"
        self.sequence = self.sequence.wrapping_add(1).max(1);
        let packet = encode_dmx(universe, self.sequence, data);
        self.socket.send_to(&packet, self.target)?;

        tracing::trace!("Sent Art-Net DMX packet for universe {}", universe);
        Ok(())
    }

    /// Send an ArtSync frame marker
    pub fn send_sync(&mut self) -> Result<()> {
        self.socket.send_to(&encode_sync(), self.target)?;
        Ok(())
    }

    /// Send one z-slice, split into consecutive universes of 170 pixels
    /// starting at `base_universe`. Returns the number of universes sent.
    pub fn send_slice(&mut self, base_universe: u16, pixels: &[VoxelColor]) -> Result<usize> {
        let mut sent = 0;
        for (i, chunk) in pixels.chunks(PIXELS_PER_UNIVERSE).enumerate() {
            let universe = base_universe
                .checked_add(i as u16)
                .ok_or_else(|| ControlError::DmxError("universe number overflow".to_string()))?;
            let data: Vec<u8> = chunk.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
            self.send_dmx(universe, &data)?;
            sent += 1;
        }
        Ok(sent)
    }
}
