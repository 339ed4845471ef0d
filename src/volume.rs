//! The output volume: a fine voxel grid holding per-voxel feature and
//! phase ids, plus an optional mask.
//!
//! Voxel feature ids follow a simple contract: `-1` marks a voxel still
//! needing a gap-filler decision, `0` is settled background (or a
//! masked-out voxel), anything `> 0` is a surviving feature id.

use crate::error::{PackingError, Result};
use crate::feature::Feature;
use crate::generator::generate_feature;
use crate::phase::Phase;
use crate::rasterizer::RasterBuffers;
use crate::rng::PackingRng;
use crate::stats::PhaseStats;

/// A fine voxel grid with extents, spacing and origin, created empty and
/// grown monotonically as the pipeline runs.
#[derive(Clone, Debug)]
pub struct OutputVolume {
    extents: [i64; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
    unit: Option<String>,
    feature_ids: Vec<i32>,
    phase_ids: Vec<i32>,
    mask: Option<Vec<bool>>,
}

impl OutputVolume {
    /// Creates an empty volume: every voxel starts as settled background
    /// (`0`); the pipeline is what introduces `-1` placeholders during
    /// rasterisation.
    pub fn new(
        extents: [i64; 3],
        spacing: [f64; 3],
        origin: [f64; 3],
        unit: Option<String>,
    ) -> Result<Self> {
        if extents.iter().any(|&e| e <= 0) {
            return Err(PackingError::GeometryMismatch(
                "output volume extents must be positive".to_string(),
            ));
        }
        if spacing.iter().any(|&s| s <= 0.0) {
            return Err(PackingError::GeometryMismatch(
                "output volume spacing must be positive".to_string(),
            ));
        }
        let total = (extents[0] * extents[1] * extents[2]) as usize;
        Ok(Self {
            extents,
            spacing,
            origin,
            unit,
            feature_ids: vec![0; total],
            phase_ids: vec![0; total],
            mask: None,
        })
    }

    /// Attaches a mask array, one boolean per voxel in `(column, row,
    /// plane)` raster order; `false` means masked out. Fails with
    /// `GeometryMismatch` if the length does not match the voxel count.
    pub fn set_mask(&mut self, mask: Vec<bool>) -> Result<()> {
        if mask.len() != self.feature_ids.len() {
            return Err(PackingError::GeometryMismatch(format!(
                "mask length {} does not match voxel count {}",
                mask.len(),
                self.feature_ids.len()
            )));
        }
        self.mask = Some(mask);
        Ok(())
    }

    pub fn extents(&self) -> [i64; 3] {
        self.extents
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn total_voxels(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn feature_ids(&self) -> &[i32] {
        &self.feature_ids
    }

    pub fn feature_ids_mut(&mut self) -> &mut [i32] {
        &mut self.feature_ids
    }

    pub fn phase_ids(&self) -> &[i32] {
        &self.phase_ids
    }

    pub fn is_masked(&self, index: usize) -> bool {
        self.mask.as_ref().is_some_and(|m| !m[index])
    }

    fn flat_index(&self, column: i64, row: i64, plane: i64) -> usize {
        (plane * self.extents[0] * self.extents[1] + row * self.extents[0] + column) as usize
    }

    /// Copies one feature's rasterised claims from `buffers` into this
    /// volume's feature-id array: masked voxels stay `0`, voxels the
    /// rasteriser left unclaimed become `-1` (pending the gap filler),
    /// everything else takes the winning owner id.
    pub fn apply_rasterization(&mut self, buffers: &RasterBuffers, use_mask: bool) {
        let [nx, ny, nz] = self.extents;
        for plane in 0..nz {
            for row in 0..ny {
                for column in 0..nx {
                    let flat = self.flat_index(column, row, plane);
                    if use_mask && self.is_masked(flat) {
                        self.feature_ids[flat] = 0;
                        continue;
                    }
                    let owner = buffers.owner_at(column, row, plane);
                    self.feature_ids[flat] = if owner == 0 { -1 } else { owner };
                }
            }
        }
    }

    /// Derives `phase_ids` from `feature_ids` and a feature table, the
    /// way phases get recomputed after features with no surviving voxels
    /// are dropped.
    pub fn recompute_phase_ids(&mut self, features: &[Feature]) {
        let mut phase_by_id = crate::new_map();
        for feature in features {
            phase_by_id.insert(feature.id, feature.phase as i32);
        }
        for (voxel, phase) in self.feature_ids.iter().zip(self.phase_ids.iter_mut()) {
            *phase = if *voxel > 0 {
                phase_by_id.get(voxel).copied().unwrap_or(0)
            } else {
                0
            };
        }
    }
}

/// Simulates the generation phase with no placement, to estimate how
/// many primary features a given set of statistics would produce for a
/// volume of `total_volume`, purely for UI display.
pub fn estimate_feature_count(phase: &Phase, stats: &PhaseStats, total_volume: f64, seed: u64) -> Result<usize> {
    let target_volume = total_volume * phase.fraction;
    let mut placed_volume = 0.0;
    let mut rng = PackingRng::from_seed(seed);
    let mut next_id: i32 = 1;
    let mut count = 0usize;

    while placed_volume < target_volume {
        let feature = generate_feature(next_id, phase, stats, &mut rng)?;
        placed_volume += feature.volume;
        next_id += 1;
        count += 1;
        if count > 10_000_000 {
            return Err(PackingError::InternalInvariant(
                "feature count estimate did not converge".to_string(),
            ));
        }
    }
    Ok(count)
}
