//! Shared voxel color store
//!
//! One flat buffer holds every cube's voxels back to back, in the order produced
//! by [`CubeTopology::voxel_centers`](crate::topology::CubeTopology::voxel_centers).
//! Writers (listener threads) and readers (the display side) meet only through
//! this type: a single mutex guards the colors, a condition variable wakes
//! readers when a packet has been applied.

use crate::color::{ColorCorrector, ReverseGammaCorrector};
use bytemuck::{Pod, Zeroable};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One RGB voxel as received over the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl VoxelColor {
    pub const BLACK: VoxelColor = VoxelColor { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from a 3-byte DMX triad
    pub fn from_triad(triad: &[u8]) -> Option<Self> {
        match triad {
            [r, g, b, ..] => Some(Self::new(*r, *g, *b)),
            _ => None,
        }
    }

    pub fn is_black(&self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}

/// Normalized RGBA, laid out for direct upload as an instance attribute
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct VoxelColorF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl VoxelColorF {
    /// Convert to `[0, 1]` floats. Black voxels get alpha 0 so the renderer can
    /// discard them; everything else gets `alpha`.
    pub fn from_color(color: VoxelColor, alpha: f32) -> Self {
        let a = if color.is_black() { 0.0 } else { alpha };
        Self {
            r: color.r as f32 / 255.0,
            g: color.g as f32 / 255.0,
            b: color.b as f32 / 255.0,
            a,
        }
    }
}

struct BufferState {
    pixels: Vec<VoxelColor>,
    generation: u64,
}

/// Thread-safe voxel color buffer
pub struct VoxelBuffer {
    state: Mutex<BufferState>,
    updated: Condvar,
    corrector: Arc<dyn ColorCorrector>,
}

impl std::fmt::Debug for VoxelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("VoxelBuffer")
            .field("len", &state.pixels.len())
            .field("generation", &state.generation)
            .finish()
    }
}

impl VoxelBuffer {
    /// Create an all-black buffer of `len` voxels using the WS2812B reverse
    /// corrector for corrected snapshots.
    pub fn new(len: usize) -> Self {
        Self::with_corrector(len, Arc::new(ReverseGammaCorrector::ws2812b()))
    }

    pub fn with_corrector(len: usize, corrector: Arc<dyn ColorCorrector>) -> Self {
        Self {
            state: Mutex::new(BufferState {
                pixels: vec![VoxelColor::BLACK; len],
                generation: 0,
            }),
            updated: Condvar::new(),
            corrector,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of completed writes (and sync signals) so far
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Write a single voxel. Out-of-range offsets are ignored; returns whether
    /// the write landed.
    pub fn write_pixel(&self, offset: usize, color: VoxelColor) -> bool {
        let written = {
            let mut state = self.state.lock();
            match state.pixels.get_mut(offset) {
                Some(slot) => {
                    *slot = color;
                    state.generation += 1;
                    true
                }
                None => false,
            }
        };
        if written {
            self.updated.notify_all();
        }
        written
    }

    /// Write consecutive voxels starting at `offset` under one lock, then wake
    /// readers once. Voxels past the end of the buffer are dropped. Returns the
    /// number written.
    pub fn write_pixels(&self, offset: usize, colors: &[VoxelColor]) -> usize {
        let written = {
            let mut state = self.state.lock();
            let len = state.pixels.len();
            if offset >= len {
                0
            } else {
                let count = colors.len().min(len - offset);
                state.pixels[offset..offset + count].copy_from_slice(&colors[..count]);
                state.generation += 1;
                count
            }
        };
        if written > 0 {
            self.updated.notify_all();
        }
        written
    }

    /// Write DMX channel data (R, G, B, R, G, B, ...) starting at `offset`.
    ///
    /// At most `max_pixels` triads are taken; a trailing partial triad is
    /// ignored. One lock and one wake-up per call.
    pub fn write_dmx(&self, offset: usize, channels: &[u8], max_pixels: usize) -> usize {
        let written = {
            let mut state = self.state.lock();
            let mut count = 0;
            for (i, triad) in channels.chunks_exact(3).take(max_pixels).enumerate() {
                let Some(slot) = state.pixels.get_mut(offset + i) else {
                    break;
                };
                *slot = VoxelColor::new(triad[0], triad[1], triad[2]);
                count += 1;
            }
            if count > 0 {
                state.generation += 1;
            }
            count
        };
        if written > 0 {
            self.updated.notify_all();
        }
        written
    }

    /// Advance the generation and wake readers without changing any colors.
    /// Used for ArtSync frame markers.
    pub fn signal(&self) {
        self.state.lock().generation += 1;
        self.updated.notify_all();
    }

    /// Reset every voxel to black
    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.pixels.fill(VoxelColor::BLACK);
            state.generation += 1;
        }
        self.updated.notify_all();
    }

    /// Copy of the raw colors
    pub fn colors(&self) -> Vec<VoxelColor> {
        self.state.lock().pixels.clone()
    }

    /// Single voxel, if in range
    pub fn get(&self, offset: usize) -> Option<VoxelColor> {
        self.state.lock().pixels.get(offset).copied()
    }

    /// Normalized copy of the buffer for the display side.
    ///
    /// The lock is held only while copying; correction and float conversion
    /// happen afterwards.
    pub fn snapshot(&self, apply_correction: bool, alpha: f32) -> Vec<VoxelColorF> {
        let pixels = self.colors();
        pixels
            .into_iter()
            .map(|color| {
                let color = if apply_correction {
                    self.corrector.correct(color)
                } else {
                    color
                };
                VoxelColorF::from_color(color, alpha)
            })
            .collect()
    }

    /// Block until the generation moves past `seen` or `timeout` elapses.
    /// Returns the current generation.
    pub fn wait_for_update(&self, seen: u64, timeout: Duration) -> u64 {
        let mut state = self.state.lock();
        if state.generation == seen {
            // A missed wake-up only delays the reader until the next poll
            let _ = self
                .updated
                .wait_while_for(&mut state, |s| s.generation == seen, timeout);
        }
        state.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::IdentityCorrector;
    use std::thread;

    #[test]
    fn test_new_buffer_is_black() {
        let buffer = VoxelBuffer::new(8);
        assert_eq!(buffer.len(), 8);
        assert!(buffer.colors().iter().all(VoxelColor::is_black));
        assert_eq!(buffer.generation(), 0);
    }

    #[test]
    fn test_write_pixel_bounds() {
        let buffer = VoxelBuffer::new(4);
        assert!(buffer.write_pixel(3, VoxelColor::new(1, 2, 3)));
        assert!(!buffer.write_pixel(4, VoxelColor::new(1, 2, 3)));
        assert_eq!(buffer.get(3), Some(VoxelColor::new(1, 2, 3)));
        assert_eq!(buffer.generation(), 1);
    }

    #[test]
    fn test_write_pixels_truncates_at_end() {
        let buffer = VoxelBuffer::new(4);
        let colors = [VoxelColor::new(9, 9, 9); 3];
        assert_eq!(buffer.write_pixels(2, &colors), 2);
        assert_eq!(buffer.write_pixels(10, &colors), 0);
        assert_eq!(buffer.get(3), Some(VoxelColor::new(9, 9, 9)));
    }

    #[test]
    fn test_write_dmx_ignores_partial_triad() {
        let buffer = VoxelBuffer::new(4);
        let written = buffer.write_dmx(1, &[10, 20, 30, 40, 50], 170);
        assert_eq!(written, 1);
        assert_eq!(buffer.get(1), Some(VoxelColor::new(10, 20, 30)));
        assert_eq!(buffer.get(2), Some(VoxelColor::BLACK));
    }

    #[test]
    fn test_write_dmx_respects_max_pixels() {
        let buffer = VoxelBuffer::new(10);
        let data = [255u8; 30];
        assert_eq!(buffer.write_dmx(0, &data, 4), 4);
        assert_eq!(buffer.get(4), Some(VoxelColor::BLACK));
    }

    #[test]
    fn test_snapshot_black_is_transparent() {
        let buffer = VoxelBuffer::with_corrector(2, Arc::new(IdentityCorrector));
        buffer.write_pixel(1, VoxelColor::new(255, 0, 51));

        let snapshot = buffer.snapshot(false, 0.7);
        assert_eq!(snapshot[0], VoxelColorF::default());
        assert_eq!(snapshot[1].r, 1.0);
        assert_eq!(snapshot[1].g, 0.0);
        assert!((snapshot[1].b - 0.2).abs() < 1e-6);
        assert_eq!(snapshot[1].a, 0.7);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let buffer = VoxelBuffer::new(16);
        buffer.write_pixels(3, &[VoxelColor::new(12, 200, 7); 5]);
        assert_eq!(buffer.snapshot(true, 0.5), buffer.snapshot(true, 0.5));
        assert_eq!(buffer.snapshot(false, 0.5), buffer.snapshot(false, 0.5));
    }

    #[test]
    fn test_snapshot_applies_correction() {
        let buffer = VoxelBuffer::new(1);
        buffer.write_pixel(0, VoxelColor::new(100, 100, 100));
        let raw = buffer.snapshot(false, 1.0)[0];
        let corrected = buffer.snapshot(true, 1.0)[0];
        assert_ne!(raw, corrected);
    }

    #[test]
    fn test_wait_for_update_wakes_on_write() {
        let buffer = Arc::new(VoxelBuffer::new(4));
        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                buffer.write_pixel(0, VoxelColor::new(1, 1, 1));
            })
        };
        let generation = buffer.wait_for_update(0, Duration::from_secs(5));
        writer.join().unwrap();
        assert_eq!(generation, 1);
    }

    #[test]
    fn test_wait_for_update_times_out() {
        let buffer = VoxelBuffer::new(4);
        assert_eq!(buffer.wait_for_update(0, Duration::from_millis(10)), 0);
    }

    #[test]
    fn test_signal_and_clear_advance_generation() {
        let buffer = VoxelBuffer::new(2);
        buffer.write_pixel(0, VoxelColor::new(5, 5, 5));
        buffer.signal();
        buffer.clear();
        assert_eq!(buffer.generation(), 3);
        assert!(buffer.colors().iter().all(VoxelColor::is_black));
    }
}
