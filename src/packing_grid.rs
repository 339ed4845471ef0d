//! The coarse packing grid: half the linear resolution of the output
//! grid, tracking per-cell ownership and exclusion counts for the
//! placement optimiser.

use crate::feature::Footprint;
use crate::numeric::signed_rem_euclid;

/// Design-value threshold above which a footprint entry's inside-value
/// counts as "excluded".
pub const EXCLUSION_THRESHOLD: f32 = 0.1;

/// Outcome of [`PackingGrid::add_footprint`]: the raw (unnormalised)
/// change in the sum `Σ(o(c)-1)^2`, and the cells whose exclusion status
/// flipped, for the caller to commit or discard on move accept/reject.
#[derive(Clone, Debug, Default)]
pub struct FootprintUpdate {
    pub filling_error_delta: f64,
    pub newly_excluded: Vec<usize>,
    pub newly_available: Vec<usize>,
}

/// Coarse 3-D integer grid holding per-cell ownership and exclusion
/// counts.
#[derive(Clone, Debug)]
pub struct PackingGrid {
    extents: [i64; 3],
    spacing: [f64; 3],
    periodic: bool,
    owner_count: Vec<i32>,
    exclusion_count: Vec<i32>,
}

impl PackingGrid {
    /// Builds the packing grid from the output volume's extents and
    /// spacing: packing spacing is `2x` the output spacing, packing
    /// extents are `floor(output_extent / 2)` with a floor of 1 per axis.
    pub fn new(output_extents: [i64; 3], output_spacing: [f64; 3], periodic: bool) -> Self {
        let extents = [
            (output_extents[0] / 2).max(1),
            (output_extents[1] / 2).max(1),
            (output_extents[2] / 2).max(1),
        ];
        let spacing = [
            output_spacing[0] * 2.0,
            output_spacing[1] * 2.0,
            output_spacing[2] * 2.0,
        ];
        let total = (extents[0] * extents[1] * extents[2]) as usize;
        Self {
            extents,
            spacing,
            periodic,
            owner_count: vec![0; total],
            exclusion_count: vec![0; total],
        }
    }

    pub fn extents(&self) -> [i64; 3] {
        self.extents
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn periodic(&self) -> bool {
        self.periodic
    }

    pub fn total_cells(&self) -> i64 {
        self.extents[0] * self.extents[1] * self.extents[2]
    }

    pub fn owner_count(&self, flat_index: usize) -> i32 {
        self.owner_count[flat_index]
    }

    /// Owner count at a cell index, wrapping or rejecting per
    /// [`Self::wrap`]; `None` for an out-of-range cell under non-periodic
    /// boundaries.
    pub fn owner_count_at(&self, i: i64, j: i64, k: i64) -> Option<i32> {
        self.wrap(i, j, k).map(|(wi, wj, wk)| self.owner_count[self.flat_index(wi, wj, wk)])
    }

    /// Mean of `(owner_count - 1)^2` over a footprint's cells, the "pack
    /// quality" diagnostic: zero where every covered cell has exactly one
    /// owner, growing with both overlap and (after removal) vacancy.
    pub fn mean_squared_owner_deviation(&self, footprint: &Footprint) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for idx in 0..footprint.len() {
            if let Some((i, j, k)) = self.wrap(footprint.columns[idx], footprint.rows[idx], footprint.planes[idx]) {
                let owner = self.owner_count[self.flat_index(i, j, k)] as f64;
                sum += (owner - 1.0).powi(2);
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn exclusion_count(&self, flat_index: usize) -> i32 {
        self.exclusion_count[flat_index]
    }

    fn flat_index(&self, i: i64, j: i64, k: i64) -> usize {
        (self.extents[0] * self.extents[1] * k + self.extents[0] * j + i) as usize
    }

    /// Maps a world coordinate to its packing cell.
    pub fn cell_of(&self, x: f64, y: f64, z: f64) -> (i64, i64, i64) {
        let half = [self.spacing[0] / 2.0, self.spacing[1] / 2.0, self.spacing[2] / 2.0];
        (
            ((x - half[0]) / self.spacing[0]).floor() as i64,
            ((y - half[1]) / self.spacing[1]).floor() as i64,
            ((z - half[2]) / self.spacing[2]).floor() as i64,
        )
    }

    /// Wraps (periodic) or rejects (clipped, non-periodic) a candidate
    /// cell index. Uses true Euclidean modulo rather than a single
    /// conditional add/subtract, which would fail for shifts larger than
    /// one extent.
    pub fn wrap(&self, i: i64, j: i64, k: i64) -> Option<(i64, i64, i64)> {
        if self.periodic {
            Some((
                signed_rem_euclid(i, self.extents[0]),
                signed_rem_euclid(j, self.extents[1]),
                signed_rem_euclid(k, self.extents[2]),
            ))
        } else if i >= 0 && i < self.extents[0] && j >= 0 && j < self.extents[1] && k >= 0 && k < self.extents[2] {
            Some((i, j, k))
        } else {
            None
        }
    }

    /// Adds `±1` to owner counts over the feature's footprint, updating
    /// exclusion bookkeeping along the way, and returns the resulting
    /// filling-error delta and pending exclusion-list changes (spec
    /// §4.2). `signed_delta` must be `1` or `-1`.
    pub fn add_footprint(&mut self, footprint: &Footprint, signed_delta: i32) -> FootprintUpdate {
        debug_assert!(signed_delta == 1 || signed_delta == -1);
        let mut update = FootprintUpdate::default();

        for idx in 0..footprint.len() {
            let Some((i, j, k)) = self.wrap(footprint.columns[idx], footprint.rows[idx], footprint.planes[idx])
            else {
                continue;
            };
            let flat = self.flat_index(i, j, k);
            let owner_before = self.owner_count[flat] as i64;
            crate::numeric::debug_assert_filling_identity(owner_before);

            let delta = if signed_delta > 0 {
                2 * owner_before - 1
            } else {
                -2 * owner_before + 3
            };
            update.filling_error_delta += delta as f64;
            self.owner_count[flat] = (owner_before + signed_delta as i64) as i32;

            if footprint.inside_values[idx] > EXCLUSION_THRESHOLD {
                if signed_delta > 0 {
                    if self.exclusion_count[flat] == 0 {
                        update.newly_excluded.push(flat);
                    }
                    self.exclusion_count[flat] += 1;
                } else {
                    self.exclusion_count[flat] -= 1;
                    if self.exclusion_count[flat] == 0 {
                        update.newly_available.push(flat);
                    }
                }
            }
        }

        update
    }
}
