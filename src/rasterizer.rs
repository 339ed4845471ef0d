//! Fine-grid voxel rasterisation: for each feature, sweep its rotated
//! bounding box against the output grid and claim voxels whose
//! normalised coordinate falls inside the shape.
//!
//! Contested voxels (claimed by more than one feature) are resolved by
//! keeping whichever feature's inside-value is larger: a voxel already
//! owned only yields to a challenger with a strictly greater
//! inside-value, and an unclaimed voxel (`owner == -1`) is always taken.

use nalgebra::{Matrix3, Vector3};

use crate::feature::Feature;
use crate::shape_ops::ShapeOps;

/// Per-voxel claim state during rasterisation: `-1` means unclaimed.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Claim {
    owner: i32,
    inside_value: f32,
}

impl Default for Claim {
    fn default() -> Self {
        Self { owner: -1, inside_value: -1.0 }
    }
}

/// Owns the per-voxel claim buffers for one rasterisation pass, sized to
/// the output grid's voxel count. Reused across features rather than
/// allocated per feature.
pub struct RasterBuffers {
    dims: [i64; 3],
    claims: Vec<Claim>,
}

impl RasterBuffers {
    pub fn new(dims: [i64; 3]) -> Self {
        let total = (dims[0] * dims[1] * dims[2]).max(0) as usize;
        Self { dims, claims: vec![Claim::default(); total] }
    }

    pub fn dims(&self) -> [i64; 3] {
        self.dims
    }

    fn flat_index(&self, column: i64, row: i64, plane: i64) -> usize {
        (plane * self.dims[0] * self.dims[1] + row * self.dims[0] + column) as usize
    }

    /// Resolves the voxel at `(column, row, plane)` into whichever
    /// feature owns it, or `0` (background) if unclaimed.
    pub fn owner_at(&self, column: i64, row: i64, plane: i64) -> i32 {
        let claim = self.claims[self.flat_index(column, row, plane)];
        if claim.owner < 0 {
            0
        } else {
            claim.owner
        }
    }

    pub fn reset(&mut self) {
        self.claims.iter_mut().for_each(|c| *c = Claim::default());
    }
}

/// Wraps a raw grid coordinate into `[0, extent)` for periodic volumes,
/// or leaves it untouched for clipped volumes (the caller has already
/// bounded the sweep range to the valid range in that case).
fn wrap_coordinate(value: i64, extent: i64, periodic: bool) -> i64 {
    if periodic {
        value.rem_euclid(extent)
    } else {
        value
    }
}

/// Rasterises one feature's shape into `buffers`, claiming voxels inside
/// its rotated, scaled shape. `spacing` is the output grid's voxel size,
/// `semi_axes` the feature's principal semi-axes `(a, b, c)` in world
/// units, `rotation` the crystal-to-sample (Bunge) rotation matrix.
#[allow(clippy::too_many_arguments)]
pub fn rasterize_feature(
    buffers: &mut RasterBuffers,
    feature: &Feature,
    shape: &dyn ShapeOps,
    semi_axes: [f64; 3],
    rotation: &Matrix3<f64>,
    spacing: [f64; 3],
    periodic: bool,
) {
    let dims = buffers.dims();
    let inv_radius = [1.0 / semi_axes[0], 1.0 / semi_axes[1], 1.0 / semi_axes[2]];
    let centroid = feature.centroid;

    let column_centre = (centroid[0] / spacing[0]).round() as i64;
    let row_centre = (centroid[1] / spacing[1]).round() as i64;
    let plane_centre = (centroid[2] / spacing[2]).round() as i64;

    let padded_radius = semi_axes[0].max(semi_axes[1]).max(semi_axes[2]);
    let half_extent = [
        (padded_radius / spacing[0]) as i64 + 1,
        (padded_radius / spacing[1]) as i64 + 1,
        (padded_radius / spacing[2]) as i64 + 1,
    ];

    let (x_range, y_range, z_range) = sweep_bounds(
        [column_centre, row_centre, plane_centre],
        half_extent,
        dims,
        periodic,
    );

    for iter1 in x_range {
        let column = wrap_coordinate(iter1, dims[0], periodic);
        if !(0..dims[0]).contains(&column) {
            continue;
        }
        for iter2 in y_range.clone() {
            let row = wrap_coordinate(iter2, dims[1], periodic);
            if !(0..dims[1]).contains(&row) {
                continue;
            }
            for iter3 in z_range.clone() {
                let plane = wrap_coordinate(iter3, dims[2], periodic);
                if !(0..dims[2]).contains(&plane) {
                    continue;
                }

                let world = Vector3::new(
                    iter1 as f64 * spacing[0] - centroid[0],
                    iter2 as f64 * spacing[1] - centroid[1],
                    iter3 as f64 * spacing[2] - centroid[2],
                );
                let rotated = rotation * world;
                let inside = shape.inside(
                    rotated.x * inv_radius[0],
                    rotated.y * inv_radius[1],
                    rotated.z * inv_radius[2],
                );

                if inside < 0.0 {
                    continue;
                }
                let flat = buffers.flat_index(column, row, plane);
                let claim = &mut buffers.claims[flat];
                let inside_f32 = inside as f32;
                if claim.owner < 0 || (claim.owner > 0 && inside_f32 > claim.inside_value) {
                    claim.owner = feature.id;
                    claim.inside_value = inside_f32;
                }
            }
        }
    }
}

pub(crate) type SweepRange = std::ops::RangeInclusive<i64>;

pub(crate) fn sweep_bounds(
    centre: [i64; 3],
    half_extent: [i64; 3],
    dims: [i64; 3],
    periodic: bool,
) -> (SweepRange, SweepRange, SweepRange) {
    let axis_range = |c: i64, half: i64, dim: i64| -> SweepRange {
        let mut lo = c - half;
        let mut hi = c + half;
        if periodic {
            lo = lo.max(-dim);
            hi = hi.min(2 * dim - 1);
        } else {
            lo = lo.max(0);
            hi = hi.min(dim - 1);
        }
        lo..=hi
    };
    (
        axis_range(centre[0], half_extent[0], dims[0]),
        axis_range(centre[1], half_extent[1], dims[1]),
        axis_range(centre[2], half_extent[2], dims[2]),
    )
}
