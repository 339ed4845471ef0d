//! The [`Feature`] record and its voxel footprint, stored as parallel
//! arrays (struct-of-arrays) rather than an array of per-voxel structs so
//! that translating a footprint by a centroid shift is a componentwise
//! add over contiguous buffers.

use crate::orientation::EulerAngles;
use crate::phase::ShapeClass;

/// A feature's voxel footprint in packing-grid coordinates: the column,
/// row and plane of every packing cell the shape covers at its current
/// centroid, plus the inside-value recorded at that cell (used by the
/// rasteriser and by [`crate::packing_grid::PackingGrid`]'s exclusion
/// bookkeeping).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Footprint {
    pub columns: Vec<i64>,
    pub rows: Vec<i64>,
    pub planes: Vec<i64>,
    pub inside_values: Vec<f32>,
}

impl Footprint {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Translates every entry by the given cell shift, without
    /// regenerating the shape query. Valid because the footprint's shape
    /// relative to its own centroid is invariant under translation
    /// modulo grid snapping.
    pub fn translate(&mut self, shift: (i64, i64, i64)) {
        for c in self.columns.iter_mut() {
            *c += shift.0;
        }
        for r in self.rows.iter_mut() {
            *r += shift.1;
        }
        for p in self.planes.iter_mut() {
            *p += shift.2;
        }
    }
}

/// One placed (or candidate) particle.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: i32,
    pub phase: u32,
    pub shape_class: ShapeClass,
    pub volume: f64,
    pub equivalent_diameter: f64,
    /// Axis lengths normalised so `axis_lengths[0] == 1.0`.
    pub axis_lengths: [f64; 3],
    pub axis_euler: EulerAngles,
    pub omega3: f64,
    pub centroid: [f64; 3],
    pub footprint: Footprint,
    pub neighborhood_count: i32,
    /// Diagnostic-only mean squared owner count over the feature's own
    /// footprint. Not used by move acceptance.
    pub pack_quality: f64,
}

impl Feature {
    pub fn b_over_a(&self) -> f64 {
        self.axis_lengths[1]
    }

    pub fn c_over_a(&self) -> f64 {
        self.axis_lengths[2]
    }
}
