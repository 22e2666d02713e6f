//! Per-channel color correction tables
//!
//! LED strips are driven with gamma-encoded, brightness-balanced values. The
//! forward corrector turns linear content into what the strip should be sent;
//! the reverse corrector undoes that so a preview shows what the content
//! author intended. Both are 256-entry lookup tables per channel, built once.

use crate::buffer::VoxelColor;
use serde::{Deserialize, Serialize};

/// Gamma and relative brightness per channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorCorrectorOptions {
    /// Gamma exponent for R, G, B
    pub gamma: [f32; 3],
    /// Peak brightness for R, G, B (datasheet units, e.g. mcd)
    pub brightness: [f32; 3],
}

impl ColorCorrectorOptions {
    /// WS2812B: gamma 2.8, brightness at the midpoint of the datasheet ranges
    pub fn ws2812b() -> Self {
        Self {
            gamma: [2.8, 2.8, 2.8],
            brightness: [
                (550.0 + 700.0) / 2.0,
                (1100.0 + 1400.0) / 2.0,
                (200.0 + 400.0) / 2.0,
            ],
        }
    }

    fn min_brightness(&self) -> f32 {
        self.brightness.iter().copied().fold(f32::INFINITY, f32::min)
    }
}

impl Default for ColorCorrectorOptions {
    fn default() -> Self {
        Self::ws2812b()
    }
}

/// Maps one RGB triad to another
pub trait ColorCorrector: Send + Sync {
    fn correct(&self, color: VoxelColor) -> VoxelColor;
}

type Tables = [[u8; 256]; 3];

fn apply(tables: &Tables, color: VoxelColor) -> VoxelColor {
    VoxelColor {
        r: tables[0][color.r as usize],
        g: tables[1][color.g as usize],
        b: tables[2][color.b as usize],
    }
}

/// Linear content → strip values
#[derive(Debug, Clone)]
pub struct GammaCorrector {
    options: ColorCorrectorOptions,
    tables: Tables,
}

impl GammaCorrector {
    pub fn new(options: ColorCorrectorOptions) -> Self {
        let min = options.min_brightness();
        let mut tables = [[0u8; 256]; 3];

        for (channel, table) in tables.iter_mut().enumerate() {
            let scale = min / options.brightness[channel];
            let gamma = options.gamma[channel];
            for (j, entry) in table.iter_mut().enumerate() {
                let value = (j as f32 / 255.0).powf(gamma) * 255.0 * scale;
                *entry = value.ceil().clamp(0.0, 255.0) as u8;
            }
        }

        Self { options, tables }
    }

    pub fn options(&self) -> &ColorCorrectorOptions {
        &self.options
    }
}

impl ColorCorrector for GammaCorrector {
    fn correct(&self, color: VoxelColor) -> VoxelColor {
        apply(&self.tables, color)
    }
}

/// Strip values → linear content, for previewing what a strip would show
#[derive(Debug, Clone)]
pub struct ReverseGammaCorrector {
    options: ColorCorrectorOptions,
    tables: Tables,
}

impl ReverseGammaCorrector {
    pub fn new(options: ColorCorrectorOptions) -> Self {
        let min = options.min_brightness();
        let mut tables = [[0u8; 256]; 3];

        for (channel, table) in tables.iter_mut().enumerate() {
            // Inverse of the forward brightness scale
            let scale = options.brightness[channel] / min;
            let inv_gamma = 1.0 / options.gamma[channel];
            for (j, entry) in table.iter_mut().enumerate() {
                let normalized = (j as f32 / 255.0 * scale).clamp(0.0, 1.0);
                *entry = (normalized.powf(inv_gamma) * 255.0).ceil().min(255.0) as u8;
            }
        }

        Self { options, tables }
    }

    pub fn ws2812b() -> Self {
        Self::new(ColorCorrectorOptions::ws2812b())
    }

    pub fn options(&self) -> &ColorCorrectorOptions {
        &self.options
    }
}

impl ColorCorrector for ReverseGammaCorrector {
    fn correct(&self, color: VoxelColor) -> VoxelColor {
        apply(&self.tables, color)
    }
}

/// Leaves colors untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCorrector;

impl ColorCorrector for IdentityCorrector {
    fn correct(&self, color: VoxelColor) -> VoxelColor {
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_stays_black() {
        let forward = GammaCorrector::new(ColorCorrectorOptions::ws2812b());
        let reverse = ReverseGammaCorrector::ws2812b();
        assert_eq!(forward.correct(VoxelColor::BLACK), VoxelColor::BLACK);
        assert_eq!(reverse.correct(VoxelColor::BLACK), VoxelColor::BLACK);
    }

    #[test]
    fn test_dimmest_channel_reaches_full_scale() {
        // Blue has the lowest brightness, so it is not scaled down.
        let forward = GammaCorrector::new(ColorCorrectorOptions::ws2812b());
        let out = forward.correct(VoxelColor::new(255, 255, 255));
        assert_eq!(out.b, 255);
        assert!(out.r < 255);
        assert!(out.g < out.r);
    }

    #[test]
    fn test_reverse_tables_are_monotonic() {
        let reverse = ReverseGammaCorrector::ws2812b();
        let mut last = VoxelColor::BLACK;
        for v in 0..=255u8 {
            let out = reverse.correct(VoxelColor::new(v, v, v));
            assert!(out.r >= last.r && out.g >= last.g && out.b >= last.b);
            last = out;
        }
    }

    #[test]
    fn test_reverse_undoes_forward_approximately() {
        let options = ColorCorrectorOptions::ws2812b();
        let forward = GammaCorrector::new(options);
        let reverse = ReverseGammaCorrector::new(options);
        let input = VoxelColor::new(200, 200, 200);
        let round = reverse.correct(forward.correct(input));
        assert!((round.r as i32 - 200).abs() <= 8, "{:?}", round);
        assert!((round.g as i32 - 200).abs() <= 8, "{:?}", round);
        assert!((round.b as i32 - 200).abs() <= 8, "{:?}", round);
    }

    #[test]
    fn test_identity_gamma_flat_brightness() {
        let options = ColorCorrectorOptions {
            gamma: [1.0; 3],
            brightness: [1.0; 3],
        };
        let forward = GammaCorrector::new(options);
        for v in [0u8, 1, 17, 128, 254, 255] {
            let out = forward.correct(VoxelColor::new(v, v, v));
            assert!((out.r as i32 - v as i32).abs() <= 1);
            assert_eq!(out.r, out.g);
            assert_eq!(out.g, out.b);
        }
    }
}
