//! Cube topology: orientation parsing, per-cube affine transforms and voxel
//! center enumeration.
//!
//! A cube's voxels arrive in *wiring order*: the order in which the physical LED
//! chain (or the sender) walks the grid. `local_transform` maps wiring
//! coordinates into the cube's own frame, `world_transform` places that frame in
//! the scene.
//!
//! Voxel centers are enumerated with `x` innermost, then `y`, then `z`
//! (stepping by `layer_span`). The voxel buffer uses exactly the same order for
//! each cube's slice; the two are correlated only by position in sequence.

use crate::error::{CoreError, Result};
use glam::{Mat4, UVec3, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three cardinal axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index (X = 0, Y = 1, Z = 2)
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    fn label(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}

/// An axis with a direction, written `X`, `-Y`, `+Z` in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignedAxis {
    pub axis: Axis,
    pub negative: bool,
}

impl SignedAxis {
    pub const fn positive(axis: Axis) -> Self {
        Self {
            axis,
            negative: false,
        }
    }

    pub const fn negative(axis: Axis) -> Self {
        Self {
            axis,
            negative: true,
        }
    }

    /// +1.0 or -1.0
    pub fn coefficient(self) -> f32 {
        if self.negative {
            -1.0
        } else {
            1.0
        }
    }
}

impl FromStr for SignedAxis {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let axis = match rest {
            "X" | "x" => Axis::X,
            "Y" | "y" => Axis::Y,
            "Z" | "z" => Axis::Z,
            _ => return Err(format!("'{}' is not one of X, Y, Z, -X, -Y, -Z", s)),
        };
        Ok(Self { axis, negative })
    }
}

impl fmt::Display for SignedAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.axis.label())
        } else {
            write!(f, "{}", self.axis.label())
        }
    }
}

/// A signed permutation of the three axes.
///
/// Slot `i` names the source axis (and direction) that output axis `i` reads
/// from. Each axis appears exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Orientation([SignedAxis; 3]);

impl Orientation {
    pub const IDENTITY: Orientation = Orientation([
        SignedAxis::positive(Axis::X),
        SignedAxis::positive(Axis::Y),
        SignedAxis::positive(Axis::Z),
    ]);

    /// Parse configuration labels such as `["-Z", "Y", "X"]`.
    pub fn parse<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let invalid = |reason: String| CoreError::InvalidOrientation {
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            reason,
        };

        if labels.len() != 3 {
            return Err(invalid(format!(
                "expected exactly 3 axes, got {}",
                labels.len()
            )));
        }

        let mut slots = [SignedAxis::positive(Axis::X); 3];
        let mut seen = [false; 3];
        for (slot, label) in slots.iter_mut().zip(labels) {
            let parsed: SignedAxis = label.as_ref().parse().map_err(invalid)?;
            let idx = parsed.axis.index();
            if seen[idx] {
                return Err(invalid(format!(
                    "axis {} used more than once",
                    parsed.axis.label()
                )));
            }
            seen[idx] = true;
            *slot = parsed;
        }

        Ok(Self(slots))
    }

    pub fn axes(&self) -> &[SignedAxis; 3] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Build the affine transform for this orientation over a box of `size`.
    ///
    /// Row `i` of the linear block carries `±1` in the column of the referenced
    /// axis. A flipped axis is shifted by the extent of the axis it reads from,
    /// so every point of `[0, size]` lands in the non-negative octant.
    pub fn to_transform(&self, size: Vec3) -> Mat4 {
        // cols[c][r]: glam matrices are column-major
        let mut cols = [[0.0f32; 4]; 4];
        cols[3][3] = 1.0;

        for (row, signed) in self.0.iter().enumerate() {
            let col = signed.axis.index();
            cols[col][row] = signed.coefficient();
            if signed.negative {
                cols[3][row] = size[col];
            }
        }

        Mat4::from_cols_array_2d(&cols)
    }

    /// Extent of the output box when `size` is mapped through this orientation.
    pub fn permuted_size(&self, size: Vec3) -> Vec3 {
        Vec3::new(
            size[self.0[0].axis.index()],
            size[self.0[1].axis.index()],
            size[self.0[2].axis.index()],
        )
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

/// Transforms and voxel layout of one cube, computed once at startup.
#[derive(Debug, Clone)]
pub struct CubeTopology {
    dimensions: UVec3,
    layer_span: u32,
    orientation: Orientation,
    world_orientation: Orientation,
    local_transform: Mat4,
    local_inverse: Mat4,
    world_transform: Mat4,
    voxel_centers: Vec<Vec3>,
}

impl CubeTopology {
    /// Compute the transforms and voxel centers for one cube.
    pub fn compute(
        dimensions: UVec3,
        layer_span: u32,
        orientation: Orientation,
        world_orientation: Orientation,
        position: Vec3,
    ) -> Result<Self> {
        if dimensions.min_element() == 0 {
            return Err(CoreError::InvalidParameter(format!(
                "cube dimensions must be positive, got {}x{}x{}",
                dimensions.x, dimensions.y, dimensions.z
            )));
        }
        if layer_span == 0 {
            return Err(CoreError::InvalidParameter(
                "layer_span must be at least 1".to_string(),
            ));
        }

        let local_transform = orientation.to_transform(dimensions.as_vec3());
        let local_inverse = local_transform.inverse();

        // Rotation by world_orientation is not applied yet; only the offset is.
        if !world_orientation.is_identity() {
            tracing::warn!(
                "world_orientation {} is not applied; cube at {:?} is placed by translation only",
                world_orientation,
                position
            );
        }
        let world_transform = Mat4::from_translation(position);

        let voxel_centers = enumerate_centers(dimensions, layer_span);

        Ok(Self {
            dimensions,
            layer_span,
            orientation,
            world_orientation,
            local_transform,
            local_inverse,
            world_transform,
            voxel_centers,
        })
    }

    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    pub fn layer_span(&self) -> u32 {
        self.layer_span
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn world_orientation(&self) -> Orientation {
        self.world_orientation
    }

    /// Wiring coordinates → cube-local coordinates
    pub fn local_transform(&self) -> Mat4 {
        self.local_transform
    }

    /// Cube-local coordinates → wiring coordinates
    pub fn local_inverse(&self) -> Mat4 {
        self.local_inverse
    }

    /// Cube-local coordinates → world coordinates
    pub fn world_transform(&self) -> Mat4 {
        self.world_transform
    }

    /// `world_transform * local_transform`
    pub fn model_matrix(&self) -> Mat4 {
        self.world_transform * self.local_transform
    }

    /// Number of voxel layers stored for this cube.
    ///
    /// Rounds up: with `length % layer_span != 0` the last, partial group
    /// still contributes one layer, matching [`CubeConfig::voxel_count`].
    ///
    /// [`CubeConfig::voxel_count`]: crate::CubeConfig::voxel_count
    pub fn layer_count(&self) -> u32 {
        self.dimensions.z.div_ceil(self.layer_span)
    }

    /// Pixels in one z-slice
    pub fn slice_capacity(&self) -> usize {
        self.dimensions.x as usize * self.dimensions.y as usize
    }

    /// Voxels this cube contributes to the shared buffer,
    /// `width * height * layer_count()`
    pub fn voxel_count(&self) -> usize {
        self.voxel_centers.len()
    }

    /// Voxel centers in wiring coordinates, in buffer order
    pub fn voxel_centers(&self) -> &[Vec3] {
        &self.voxel_centers
    }

    /// Voxel centers mapped through the model matrix, in buffer order
    pub fn world_positions(&self) -> Vec<Vec3> {
        let model = self.model_matrix();
        self.voxel_centers
            .iter()
            .map(|c| model.transform_point3(*c))
            .collect()
    }

    /// The eight corners of the wiring-space bounding box
    pub fn corners(&self) -> [Vec3; 8] {
        let s = self.dimensions.as_vec3();
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = Vec3::new(
                if i & 1 != 0 { s.x } else { 0.0 },
                if i & 2 != 0 { s.y } else { 0.0 },
                if i & 4 != 0 { s.z } else { 0.0 },
            );
        }
        corners
    }

    /// Map a wiring-space point through `local_transform`
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        (self.local_transform * Vec4::new(point.x, point.y, point.z, 1.0)).truncate()
    }

    /// Map a local point back to wiring space
    pub fn from_local(&self, point: Vec3) -> Vec3 {
        (self.local_inverse * Vec4::new(point.x, point.y, point.z, 1.0)).truncate()
    }
}

fn enumerate_centers(dimensions: UVec3, layer_span: u32) -> Vec<Vec3> {
    let layers = dimensions.z.div_ceil(layer_span) as usize;
    let mut centers =
        Vec::with_capacity(dimensions.x as usize * dimensions.y as usize * layers);

    for z in (0..dimensions.z).step_by(layer_span as usize) {
        for y in 0..dimensions.y {
            for x in 0..dimensions.x {
                centers.push(Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5));
            }
        }
    }

    centers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology(dims: UVec3, labels: &[&str]) -> CubeTopology {
        CubeTopology::compute(
            dims,
            1,
            Orientation::parse(labels).unwrap(),
            Orientation::IDENTITY,
            Vec3::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_orientation() {
        let o = Orientation::parse(&["-Z", "Y", "X"]).unwrap();
        assert_eq!(o.axes()[0], SignedAxis::negative(Axis::Z));
        assert_eq!(o.axes()[1], SignedAxis::positive(Axis::Y));
        assert_eq!(o.axes()[2], SignedAxis::positive(Axis::X));
        assert_eq!(o.to_string(), "[-Z, Y, X]");
    }

    #[test]
    fn test_parse_orientation_rejects_duplicates() {
        let err = Orientation::parse(&["X", "-X", "Z"]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOrientation { .. }));
    }

    #[test]
    fn test_parse_orientation_rejects_bad_label() {
        assert!(Orientation::parse(&["X", "Y", "W"]).is_err());
        assert!(Orientation::parse(&["X", "Y"]).is_err());
        assert!(Orientation::parse(&["--X", "Y", "Z"]).is_err());
    }

    #[test]
    fn test_sign_flip_compensation() {
        let topo = topology(UVec3::splat(10), &["-Z", "Y", "X"]);
        let mapped = topo.to_local(Vec3::ZERO);
        assert!((mapped - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);

        let far = topo.to_local(Vec3::new(0.0, 0.0, 10.0));
        assert!((far - Vec3::ZERO).length() < 1e-5);
    }

    #[test]
    fn test_identity_orientation_is_identity_matrix() {
        let topo = topology(UVec3::new(4, 5, 6), &["X", "Y", "Z"]);
        assert_eq!(topo.local_transform(), Mat4::IDENTITY);
    }

    #[test]
    fn test_non_cubic_flip_stays_in_bounds() {
        let dims = UVec3::new(4, 6, 8);
        let topo = topology(dims, &["-Z", "-X", "Y"]);
        let out_size = topo.orientation().permuted_size(dims.as_vec3());
        assert_eq!(out_size, Vec3::new(8.0, 4.0, 6.0));
        for corner in topo.corners() {
            let p = topo.to_local(corner);
            assert!(p.cmpge(Vec3::splat(-1e-5)).all(), "{:?} -> {:?}", corner, p);
            assert!(p.cmple(out_size + Vec3::splat(1e-5)).all());
        }
    }

    #[test]
    fn test_world_transform_is_translation() {
        let topo = CubeTopology::compute(
            UVec3::splat(2),
            1,
            Orientation::IDENTITY,
            Orientation::IDENTITY,
            Vec3::new(20.0, 0.0, -5.0),
        )
        .unwrap();
        let p = topo.world_transform().transform_point3(Vec3::ONE);
        assert_eq!(p, Vec3::new(21.0, 1.0, -4.0));
    }

    #[test]
    fn test_voxel_center_order() {
        let topo = topology(UVec3::new(2, 2, 2), &["X", "Y", "Z"]);
        let centers = topo.voxel_centers();
        assert_eq!(centers.len(), 8);
        assert_eq!(centers[0], Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(centers[1], Vec3::new(1.5, 0.5, 0.5));
        assert_eq!(centers[2], Vec3::new(0.5, 1.5, 0.5));
        assert_eq!(centers[4], Vec3::new(0.5, 0.5, 1.5));
    }

    #[test]
    fn test_layer_span_skips_layers() {
        let topo = CubeTopology::compute(
            UVec3::new(3, 3, 5),
            2,
            Orientation::IDENTITY,
            Orientation::IDENTITY,
            Vec3::ZERO,
        )
        .unwrap();
        assert_eq!(topo.layer_count(), 3);
        assert_eq!(topo.voxel_count(), 27);
        assert_eq!(topo.voxel_centers()[9].z, 2.5);
        assert_eq!(topo.voxel_centers()[18].z, 4.5);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result = CubeTopology::compute(
            UVec3::new(0, 3, 3),
            1,
            Orientation::IDENTITY,
            Orientation::IDENTITY,
            Vec3::ZERO,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_world_positions_use_model_matrix() {
        let topo = CubeTopology::compute(
            UVec3::splat(10),
            1,
            Orientation::parse(&["-Z", "Y", "X"]).unwrap(),
            Orientation::IDENTITY,
            Vec3::new(100.0, 0.0, 0.0),
        )
        .unwrap();
        let positions = topo.world_positions();
        // wiring (0.5, 0.5, 0.5) -> local (9.5, 0.5, 0.5) -> world (109.5, 0.5, 0.5)
        assert!((positions[0] - Vec3::new(109.5, 0.5, 0.5)).length() < 1e-4);
    }
}
