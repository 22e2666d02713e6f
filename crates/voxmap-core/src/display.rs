//! Display-side view of the voxel model
//!
//! A renderer needs two things: where every voxel sits (fixed for the lifetime
//! of a configuration) and what color it currently has (sampled each frame).
//! [`DisplayModel`] precomputes the former and pairs it with buffer snapshots.

use crate::buffer::{VoxelBuffer, VoxelColorF};
use crate::config::DisplayConfig;
use crate::error::Result;
use crate::topology::CubeTopology;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// One renderable voxel
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct VoxelInstance {
    pub position: [f32; 3],
    pub color: VoxelColorF,
}

/// Immutable geometry for every cube plus snapshot settings
#[derive(Debug, Clone)]
pub struct DisplayModel {
    topologies: Vec<CubeTopology>,
    positions: Vec<Vec3>,
    alpha: f32,
    apply_correction: bool,
}

impl DisplayModel {
    pub fn new(config: &DisplayConfig) -> Result<Self> {
        let topologies = config.topologies()?;
        let positions = topologies
            .iter()
            .flat_map(|topology| topology.world_positions())
            .collect();

        Ok(Self {
            topologies,
            positions,
            alpha: config.alpha,
            apply_correction: config.color_correction,
        })
    }

    pub fn topologies(&self) -> &[CubeTopology] {
        &self.topologies
    }

    /// `(local_transform, world_transform)` per cube
    pub fn cube_transforms(&self) -> Vec<(Mat4, Mat4)> {
        self.topologies
            .iter()
            .map(|t| (t.local_transform(), t.world_transform()))
            .collect()
    }

    /// World-space voxel positions, in buffer order
    pub fn instance_positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn voxel_count(&self) -> usize {
        self.positions.len()
    }

    /// Axis-aligned bounds of all cubes in world space
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for topology in &self.topologies {
            let model = topology.model_matrix();
            for corner in topology.corners() {
                let p = model.transform_point3(corner);
                min = min.min(p);
                max = max.max(p);
            }
        }
        if self.topologies.is_empty() {
            (Vec3::ZERO, Vec3::ZERO)
        } else {
            (min, max)
        }
    }

    /// Current colors with the configured alpha and correction
    pub fn colors(&self, buffer: &VoxelBuffer) -> Vec<VoxelColorF> {
        buffer.snapshot(self.apply_correction, self.alpha)
    }

    /// Positions and current colors zipped into an instance list.
    ///
    /// Both sides follow the same enumeration order, so they are paired by index.
    pub fn frame(&self, buffer: &VoxelBuffer) -> Vec<VoxelInstance> {
        let colors = self.colors(buffer);
        if colors.len() != self.positions.len() {
            tracing::warn!(
                "Voxel buffer holds {} voxels but the model has {} positions",
                colors.len(),
                self.positions.len()
            );
        }

        self.positions
            .iter()
            .zip(colors)
            .map(|(position, color)| VoxelInstance {
                position: position.to_array(),
                color,
            })
            .collect()
    }

    /// Instances that are not fully transparent
    pub fn visible_frame(&self, buffer: &VoxelBuffer) -> Vec<VoxelInstance> {
        self.frame(buffer)
            .into_iter()
            .filter(|instance| instance.color.a > 0.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::VoxelColor;
    use crate::config::CubeConfig;

    fn two_cubes() -> DisplayConfig {
        DisplayConfig {
            cubes: vec![
                CubeConfig {
                    width: 2,
                    height: 2,
                    length: 2,
                    orientation: vec!["X".into(), "Y".into(), "Z".into()],
                    ..Default::default()
                },
                CubeConfig {
                    position: Vec3::new(10.0, 0.0, 0.0),
                    width: 2,
                    height: 2,
                    length: 2,
                    orientation: vec!["X".into(), "Y".into(), "Z".into()],
                    ..Default::default()
                },
            ],
            color_correction: false,
            alpha: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_positions_follow_buffer_order() {
        let model = DisplayModel::new(&two_cubes()).unwrap();
        assert_eq!(model.voxel_count(), 16);
        assert_eq!(model.instance_positions()[0], Vec3::splat(0.5));
        assert_eq!(model.instance_positions()[8], Vec3::new(10.5, 0.5, 0.5));
    }

    #[test]
    fn test_frame_pairs_colors_with_positions() {
        let config = two_cubes();
        let model = DisplayModel::new(&config).unwrap();
        let buffer = VoxelBuffer::new(config.total_voxels());
        buffer.write_pixel(9, VoxelColor::new(255, 255, 255));

        let frame = model.frame(&buffer);
        assert_eq!(frame.len(), 16);
        assert_eq!(frame[9].position, [11.5, 0.5, 0.5]);
        assert_eq!(frame[9].color.a, 0.5);

        let visible = model.visible_frame(&buffer);
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn test_bounds_cover_all_cubes() {
        let model = DisplayModel::new(&two_cubes()).unwrap();
        let (min, max) = model.bounds();
        assert_eq!(min, Vec3::ZERO);
        assert_eq!(max, Vec3::new(12.0, 2.0, 2.0));
    }

    #[test]
    fn test_instance_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<VoxelInstance>(), 7 * 4);
    }
}
