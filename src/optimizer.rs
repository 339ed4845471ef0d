//! Placement optimisation: jump/nudge Monte-Carlo moves that minimise a
//! filling-error term while tracking neighbourhood- and size-distribution
//! error as diagnostics.

use nalgebra::{Matrix3, Vector3};

use crate::feature::{Feature, Footprint};
use crate::generator::{generate_feature, semi_axes_for};
use crate::numeric::{bhattacharyya_coefficient, clamp_bin, diameter_bin_index};
use crate::packing_grid::PackingGrid;
use crate::phase::Phase;
use crate::rasterizer::sweep_bounds;
use crate::rng::PackingRng;
use crate::shape_ops::{shape_ops_for, ShapeOps};
use crate::stats::PhaseStats;
use crate::Result;

/// Which of the two move kinds an iteration performs, alternating by
/// parity (`option = iteration % 2`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKind {
    /// Relocates a feature to a uniformly random available point.
    Jump,
    /// Relocates a feature to a point within two packing cells of its
    /// current centroid.
    Nudge,
}

/// Initial-centroid proposal rule used by [`initial_placement`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementStrategy {
    /// Uniformly random starting cell.
    Uniform,
    /// Prefers an empty cell with at least one already-occupied neighbour,
    /// nucleating near existing feature surfaces rather than in open
    /// matrix. Falls back to [`PlacementStrategy::Uniform`] if no such
    /// cell turns up within a bounded number of tries.
    SurfaceBiased,
}

/// Runtime bookkeeping for the optimisation loop: the coarse packing
/// grid, per-feature neighbour counts, and the three running error
/// terms.
pub struct PlacementOptimizer {
    grid: PackingGrid,
    filling_error: f64,
    accepted_moves: u32,
}

impl PlacementOptimizer {
    pub fn new(grid: PackingGrid) -> Self {
        Self { grid, filling_error: 1.0, accepted_moves: 0 }
    }

    pub fn filling_error(&self) -> f64 {
        self.filling_error
    }

    pub fn accepted_moves(&self) -> u32 {
        self.accepted_moves
    }

    pub fn grid(&self) -> &PackingGrid {
        &self.grid
    }

    /// Computes a feature's footprint on the coarse packing grid at its
    /// current centroid, the packing-grid analogue of
    /// [`crate::rasterizer::rasterize_feature`]'s fine-grid sweep.
    pub fn footprint_for(
        &self,
        feature: &Feature,
        shape: &dyn ShapeOps,
        semi_axes: [f64; 3],
        rotation: &Matrix3<f64>,
    ) -> Footprint {
        compute_footprint(self.grid.spacing(), self.grid.extents(), self.grid.periodic(), feature, shape, semi_axes, rotation)
    }

    /// Adds a feature's footprint, updating the running filling error by
    /// the returned delta.
    pub fn insert(&mut self, footprint: &Footprint) {
        let update = self.grid.add_footprint(footprint, 1);
        self.filling_error += update.filling_error_delta / self.grid.total_cells() as f64;
    }

    /// Removes a feature's footprint (the inverse of [`Self::insert`]).
    pub fn remove(&mut self, footprint: &Footprint) {
        let update = self.grid.add_footprint(footprint, -1);
        self.filling_error += update.filling_error_delta / self.grid.total_cells() as f64;
    }

    /// Attempts one jump or nudge move on `feature`, recomputing its
    /// footprint at the candidate centroid via `recompute`, and accepting
    /// only if the filling error does not increase. This is a plain
    /// greedy acceptance rule, not a simulated-annealing temperature
    /// schedule.
    pub fn try_move<F>(&mut self, feature: &mut Feature, candidate_centroid: [f64; 3], mut recompute: F) -> bool
    where
        F: FnMut(&Feature) -> Footprint,
    {
        let old_centroid = feature.centroid;
        let old_footprint = std::mem::take(&mut feature.footprint);
        self.remove(&old_footprint);

        feature.centroid = candidate_centroid;
        let new_footprint = recompute(feature);
        let old_error = self.filling_error;
        self.insert(&new_footprint);

        if self.filling_error <= old_error {
            feature.footprint = new_footprint;
            feature.pack_quality = self.pack_quality_for(&feature.footprint);
            self.accepted_moves += 1;
            true
        } else {
            self.remove(&new_footprint);
            feature.centroid = old_centroid;
            let restored = recompute(feature);
            self.insert(&restored);
            feature.footprint = restored;
            false
        }
    }

    /// Picks a uniformly random point among the packing grid's cells
    /// for a jump move.
    pub fn random_jump_target(&self, rng: &mut PackingRng) -> [f64; 3] {
        let dims = self.grid.extents();
        let spacing = self.grid.spacing();
        let column = rng.gen_index(dims[0].max(1) as usize) as f64;
        let row = rng.gen_index(dims[1].max(1) as usize) as f64;
        let plane = rng.gen_index(dims[2].max(1) as usize) as f64;
        [
            column * spacing[0] + spacing[0] * 0.5,
            row * spacing[1] + spacing[1] * 0.5,
            plane * spacing[2] + spacing[2] * 0.5,
        ]
    }

    /// Picks a point within two packing cells of `origin` for a nudge
    /// move, clamped to the volume bounds.
    pub fn random_nudge_target(&self, origin: [f64; 3], volume_size: [f64; 3], rng: &mut PackingRng) -> [f64; 3] {
        let spacing = self.grid.spacing();
        let mut target = origin;
        for axis in 0..3 {
            let shift = (2.0 * (rng.uniform01() - 0.5)) * (2.0 * spacing[axis]);
            let candidate = origin[axis] + shift;
            if candidate > 0.0 && candidate < volume_size[axis] {
                target[axis] = candidate;
            }
        }
        target
    }

    /// Picks a starting cell adjacent to an already-occupied cell, for
    /// precipitate nucleation near primary-feature surfaces. Falls back to
    /// [`Self::random_jump_target`] after a bounded number of misses, so a
    /// nearly-empty grid (early in packing) doesn't spin forever.
    pub fn random_surface_biased_target(&self, rng: &mut PackingRng) -> [f64; 3] {
        const ATTEMPTS: u32 = 32;
        let dims = self.grid.extents();
        let spacing = self.grid.spacing();

        for _ in 0..ATTEMPTS {
            let i = rng.gen_index(dims[0].max(1) as usize) as i64;
            let j = rng.gen_index(dims[1].max(1) as usize) as i64;
            let k = rng.gen_index(dims[2].max(1) as usize) as i64;
            if self.is_surface_adjacent(i, j, k) {
                return [
                    i as f64 * spacing[0] + spacing[0] * 0.5,
                    j as f64 * spacing[1] + spacing[1] * 0.5,
                    k as f64 * spacing[2] + spacing[2] * 0.5,
                ];
            }
        }
        self.random_jump_target(rng)
    }

    /// True if `(i, j, k)` is itself unoccupied but has an occupied
    /// face-neighbour.
    fn is_surface_adjacent(&self, i: i64, j: i64, k: i64) -> bool {
        if self.grid.owner_count_at(i, j, k).unwrap_or(1) > 0 {
            return false;
        }
        const FACE_OFFSETS: [(i64, i64, i64); 6] =
            [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)];
        FACE_OFFSETS
            .iter()
            .any(|&(di, dj, dk)| self.grid.owner_count_at(i + di, j + dj, k + dk).unwrap_or(0) > 0)
    }

    /// Pack-quality diagnostic for a footprint at its current position:
    /// the mean squared deviation of owner count from 1 over the cells it
    /// covers. Purely informational — not consulted by move acceptance.
    pub fn pack_quality_for(&self, footprint: &Footprint) -> f64 {
        self.grid.mean_squared_owner_deviation(footprint)
    }
}

/// Sweeps a feature's rotated shape over the coarse packing grid and
/// returns the covered cells, independent of any [`PlacementOptimizer`]
/// state so it can be called from inside a closure passed to
/// [`PlacementOptimizer::try_move`] without a borrow conflict on `self`.
#[allow(clippy::too_many_arguments)]
fn compute_footprint(
    spacing: [f64; 3],
    dims: [i64; 3],
    periodic: bool,
    feature: &Feature,
    shape: &dyn ShapeOps,
    semi_axes: [f64; 3],
    rotation: &Matrix3<f64>,
) -> Footprint {
    let centroid = feature.centroid;

    let column_centre = (centroid[0] / spacing[0]).floor() as i64;
    let row_centre = (centroid[1] / spacing[1]).floor() as i64;
    let plane_centre = (centroid[2] / spacing[2]).floor() as i64;
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

    let inv_radius = [1.0 / semi_axes[0], 1.0 / semi_axes[1], 1.0 / semi_axes[2]];
    let mut footprint = Footprint::default();

    for column in x_range {
        for row in y_range.clone() {
            for plane in z_range.clone() {
                let world = Vector3::new(
                    column as f64 * spacing[0] - centroid[0],
                    row as f64 * spacing[1] - centroid[1],
                    plane as f64 * spacing[2] - centroid[2],
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
                footprint.columns.push(column);
                footprint.rows.push(row);
                footprint.planes.push(plane);
                footprint.inside_values.push(inside as f32);
            }
        }
    }

    footprint
}

/// Drives the generation phase for one phase category: repeatedly draws
/// a candidate feature and accepts
/// it unless doing so would worsen the simulated size-distribution fit
/// beyond the iteration-dependent tolerance, continuing until the
/// phase's target volume fraction of `total_volume` is reached. Under
/// non-periodic boundaries the target is inflated by the boundary-excess
/// factor to compensate for truncation losses during rasterisation.
pub fn run_generation_phase(
    phase: &Phase,
    stats: &PhaseStats,
    total_volume: f64,
    periodic: bool,
    packing_extents: [i64; 3],
    next_id: &mut i32,
    rng: &mut PackingRng,
) -> Result<Vec<Feature>> {
    let mut target = total_volume * phase.fraction;
    if !periodic {
        let mean_extent = (packing_extents[0] + packing_extents[1] + packing_extents[2]) as f64 / 3.0;
        let factor = 0.25 * (1.0 - (mean_extent - 2.0).powi(3) / mean_extent.powi(3));
        target *= 1.0 + factor;
    }

    let mut accepted: Vec<Feature> = Vec::new();
    let mut accepted_diameters: Vec<f64> = Vec::new();
    let mut placed_volume = 0.0;
    let mut previous_score = 0.0;
    let mut local_iter: u32 = 0;

    while placed_volume < target {
        let candidate = generate_feature(*next_id, phase, stats, rng)?;
        *next_id += 1;

        let candidate_score = size_distribution_error(&accepted_diameters, candidate.equivalent_diameter, stats);
        let threshold = 1.0 - 0.001 * local_iter as f64;
        let does_not_worsen = candidate_score >= previous_score;
        let below_threshold = (1.0 - candidate_score) < threshold;
        let behind_target = placed_volume < 0.75 * target;

        if does_not_worsen || below_threshold || behind_target {
            placed_volume += candidate.volume;
            accepted_diameters.push(candidate.equivalent_diameter);
            previous_score = candidate_score;
            accepted.push(candidate);
            local_iter = 0;
        } else {
            local_iter += 1;
        }
    }

    Ok(accepted)
}

/// Inserts every generated feature into the coarse packing grid at a
/// random starting voxel: the footprint is built once at the volume
/// centre, then translated by the cell shift to the chosen starting
/// point, exploiting the fact that a footprint's shape relative to its
/// own centroid is invariant under translation.
pub fn initial_placement(
    optimizer: &mut PlacementOptimizer,
    features: &mut [Feature],
    volume_size: [f64; 3],
    strategy: PlacementStrategy,
    rng: &mut PackingRng,
) -> Result<()> {
    for feature in features.iter_mut() {
        let semi_axes = semi_axes_for(feature)?;
        let rotation = feature.axis_euler.to_matrix();
        let mut shape = shape_ops_for(feature.shape_class)?;
        shape.init();
        shape.radius_from(feature.volume, feature.omega3, feature.b_over_a(), feature.c_over_a());

        feature.centroid = [volume_size[0] / 2.0, volume_size[1] / 2.0, volume_size[2] / 2.0];
        feature.footprint = optimizer.footprint_for(feature, shape.as_ref(), semi_axes, &rotation);

        let target = match strategy {
            PlacementStrategy::Uniform => optimizer.random_jump_target(rng),
            PlacementStrategy::SurfaceBiased => optimizer.random_surface_biased_target(rng),
        };
        let grid = optimizer.grid();
        let old_cell = grid.cell_of(feature.centroid[0], feature.centroid[1], feature.centroid[2]);
        let new_cell = grid.cell_of(target[0], target[1], target[2]);
        let shift = (new_cell.0 - old_cell.0, new_cell.1 - old_cell.1, new_cell.2 - old_cell.2);

        feature.footprint.translate(shift);
        feature.centroid = target;
        optimizer.insert(&feature.footprint);
        feature.pack_quality = optimizer.pack_quality_for(&feature.footprint);
    }
    Ok(())
}

/// Drives the jump/nudge Monte-Carlo optimisation phase for
/// `100*(N-1)` iterations, alternating move kind by iteration parity.
pub fn run_optimization_phase(
    optimizer: &mut PlacementOptimizer,
    features: &mut [Feature],
    volume_size: [f64; 3],
    rng: &mut PackingRng,
) -> Result<()> {
    if features.len() < 2 {
        return Ok(());
    }
    let spacing = optimizer.grid().spacing();
    let dims = optimizer.grid().extents();
    let periodic = optimizer.grid().periodic();

    let iterations = 100 * (features.len() - 1);
    for iteration in 0..iterations {
        let move_kind = if iteration % 2 == 0 { MoveKind::Jump } else { MoveKind::Nudge };
        let index = rng.gen_index(features.len());

        let semi_axes = semi_axes_for(&features[index])?;
        let rotation = features[index].axis_euler.to_matrix();
        let mut shape = shape_ops_for(features[index].shape_class)?;
        shape.init();
        shape.radius_from(
            features[index].volume,
            features[index].omega3,
            features[index].b_over_a(),
            features[index].c_over_a(),
        );

        let candidate_centroid = match move_kind {
            MoveKind::Jump => optimizer.random_jump_target(rng),
            MoveKind::Nudge => optimizer.random_nudge_target(features[index].centroid, volume_size, rng),
        };

        optimizer.try_move(&mut features[index], candidate_centroid, |f| {
            compute_footprint(spacing, dims, periodic, f, shape.as_ref(), semi_axes, &rotation)
        });
    }
    Ok(())
}

/// The asymmetric neighbour relation every neighbour-bookkeeping path
/// shares: `a` counts `b` as a neighbour when every axis of their
/// centroid separation is smaller than `a`'s own diameter, independently
/// of whether `b` counts `a` (each feature's own diameter sets its own
/// neighbourhood radius, so the relation is not "fixed" into a symmetric
/// one). Returns `(a_counts_b, b_counts_a)`.
fn neighbor_relation(a: &Feature, b: &Feature) -> (bool, bool) {
    let dx = (a.centroid[0] - b.centroid[0]).abs();
    let dy = (a.centroid[1] - b.centroid[1]).abs();
    let dz = (a.centroid[2] - b.centroid[2]).abs();
    let a_counts_b = dx < a.equivalent_diameter && dy < a.equivalent_diameter && dz < a.equivalent_diameter;
    let b_counts_a = dx < b.equivalent_diameter && dy < b.equivalent_diameter && dz < b.equivalent_diameter;
    (a_counts_b, b_counts_a)
}

/// Incremental neighbour-count update for a single feature move: adds
/// (or, with `add = false`, removes) `gnum`'s contribution to every other
/// feature's neighbourhood count and vice versa. Intended for updating
/// counts around one feature at a time (e.g. before/after a placement
/// move); looping this over every index would double-count each pair,
/// for that use [`recompute_neighborhood_counts`] instead.
pub fn determine_neighbors(features: &mut [Feature], gnum: usize, add: bool) {
    let increment: i32 = if add { 1 } else { -1 };
    for n in 0..features.len() {
        if n == gnum {
            continue;
        }
        let (gnum_counts_n, n_counts_gnum) = neighbor_relation(&features[gnum], &features[n]);
        if gnum_counts_n {
            features[gnum].neighborhood_count += increment;
        }
        if n_counts_gnum {
            features[n].neighborhood_count += increment;
        }
    }
}

/// Whole-population neighbour-count recompute: zeroes every feature's
/// count, then visits each unordered pair exactly once via
/// [`neighbor_relation`], the bulk counterpart to [`determine_neighbors`].
pub fn recompute_neighborhood_counts(features: &mut [Feature]) {
    for feature in features.iter_mut() {
        feature.neighborhood_count = 0;
    }
    let len = features.len();
    for i in 0..len {
        for j in (i + 1)..len {
            let (a, b) = features.split_at_mut(j);
            let (i_counts_j, j_counts_i) = neighbor_relation(&a[i], &b[0]);
            if i_counts_j {
                a[i].neighborhood_count += 1;
            }
            if j_counts_i {
                b[0].neighborhood_count += 1;
            }
        }
    }
}

/// Bhattacharyya-coefficient-based neighbourhood error: builds a
/// simulated per-diameter-bin neighbour-count histogram and compares it
/// against the goal histogram from `stats`.
pub fn neighborhood_error(features: &[Feature], stats: &PhaseStats) -> f64 {
    let num_diameter_bins = stats.feature_size.num_bins();
    let num_count_bins = stats.neighbor.num_count_bins;
    let mut simulated = vec![vec![0.0; num_count_bins]; num_diameter_bins];
    let mut counts = vec![0usize; num_diameter_bins];

    for feature in features {
        let raw_bin = diameter_bin_index(
            feature.equivalent_diameter,
            stats.feature_size.min_diameter,
            stats.feature_size.bin_step,
        );
        let diameter_bin = clamp_bin(raw_bin, num_diameter_bins);
        let count_bin = stats.neighbor.count_bin_index(feature.neighborhood_count.max(0) as u32);
        simulated[diameter_bin][count_bin] += 1.0;
        counts[diameter_bin] += 1;
    }

    // Weight each diameter bin's coefficient by its share of the total
    // population, so a diameter bin few features landed in does not
    // dominate the mean as much as one most features landed in.
    let total_features = features.len().max(1) as f64;
    let mut mean_coefficient = 0.0;
    for (diameter_bin, row) in simulated.iter_mut().enumerate() {
        if counts[diameter_bin] == 0 {
            continue;
        }
        let scale = 1.0 / counts[diameter_bin] as f64;
        for value in row.iter_mut() {
            *value *= scale;
        }
        let goal = stats.neighbor.goal_histogram(diameter_bin);
        let coefficient = bhattacharyya_coefficient(row.iter().copied().zip(goal));
        let weight = counts[diameter_bin] as f64 / total_features;
        mean_coefficient += weight * coefficient;
    }
    1.0 - mean_coefficient
}

/// Size-distribution match score for one phase's already-accepted
/// features plus a pending candidate: a Bhattacharyya coefficient
/// between the simulated diameter histogram and the goal histogram, in
/// `[0, 1]` with 1.0 meaning an exact match. Despite the `*_error` name,
/// larger values are better here: the generation phase's acceptance rule
/// is "accept unless this score would decrease", not "minimise this
/// value".
pub fn size_distribution_error(accepted_diameters: &[f64], candidate_diameter: f64, stats: &PhaseStats) -> f64 {
    let bins = stats.feature_size.num_bins();
    let mut simulated = vec![0.0; bins];
    let half_min = stats.feature_size.min_diameter / 2.0;
    let step = stats.feature_size.bin_step;

    let mut bin_of = |dia: f64| -> usize {
        let raw = ((dia - half_min) / step).floor() as i64;
        clamp_bin(raw, bins)
    };

    for &dia in accepted_diameters {
        simulated[bin_of(dia)] += 1.0;
    }
    simulated[bin_of(candidate_diameter)] += 1.0;

    let total = simulated.iter().sum::<f64>().max(1.0);
    for value in simulated.iter_mut() {
        *value /= total;
    }

    let goal = stats.feature_size.goal_histogram();
    bhattacharyya_coefficient(simulated.into_iter().zip(goal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::EulerAngles;
    use crate::phase::ShapeClass;
    use crate::shape_ops::Ellipsoid;
    use crate::stats::{BetaParams, NeighborDistribution, NeighborLognormal, SizeDistribution};

    fn feature_at(id: i32, centroid: [f64; 3], diameter: f64) -> Feature {
        Feature {
            id,
            phase: 1,
            shape_class: ShapeClass::Ellipsoid,
            volume: std::f64::consts::FRAC_PI_6 * diameter.powi(3),
            equivalent_diameter: diameter,
            axis_lengths: [1.0, 1.0, 1.0],
            axis_euler: EulerAngles::new(0.0, 0.0, 0.0),
            omega3: 0.0,
            centroid,
            footprint: Footprint::default(),
            neighborhood_count: 0,
            pack_quality: 0.0,
        }
    }

    #[test]
    fn determine_neighbors_counts_close_features() {
        let mut features = vec![feature_at(0, [0.0, 0.0, 0.0], 5.0), feature_at(1, [1.0, 1.0, 1.0], 5.0)];
        determine_neighbors(&mut features, 0, true);
        assert_eq!(features[0].neighborhood_count, 1);
        assert_eq!(features[1].neighborhood_count, 1);
    }

    #[test]
    fn determine_neighbors_add_then_remove_is_a_no_op() {
        let mut features = vec![feature_at(0, [0.0, 0.0, 0.0], 5.0), feature_at(1, [1.0, 1.0, 1.0], 5.0)];
        determine_neighbors(&mut features, 0, true);
        determine_neighbors(&mut features, 0, false);
        assert_eq!(features[0].neighborhood_count, 0);
        assert_eq!(features[1].neighborhood_count, 0);
    }

    #[test]
    fn recompute_neighborhood_counts_matches_incremental_bookkeeping() {
        let mut bulk = vec![
            feature_at(0, [0.0, 0.0, 0.0], 5.0),
            feature_at(1, [1.0, 1.0, 1.0], 5.0),
            feature_at(2, [20.0, 20.0, 20.0], 1.0),
        ];
        recompute_neighborhood_counts(&mut bulk);

        let mut incremental = vec![
            feature_at(0, [0.0, 0.0, 0.0], 5.0),
            feature_at(1, [1.0, 1.0, 1.0], 5.0),
            feature_at(2, [20.0, 20.0, 20.0], 1.0),
        ];
        for gnum in 0..incremental.len() {
            determine_neighbors(&mut incremental, gnum, true);
        }
        // Looping `determine_neighbors` over every index double-counts each
        // pair; halving it recovers the single-visit `recompute_neighborhood_counts` result.
        for (bulk_feature, incremental_feature) in bulk.iter().zip(incremental.iter()) {
            assert_eq!(bulk_feature.neighborhood_count, incremental_feature.neighborhood_count / 2);
        }
        assert_eq!(bulk[0].neighborhood_count, 1);
        assert_eq!(bulk[2].neighborhood_count, 0);
    }

    #[test]
    fn insert_then_remove_footprint_restores_filling_error() {
        let grid = PackingGrid::new([16, 16, 16], [0.5, 0.5, 0.5], false);
        let mut optimizer = PlacementOptimizer::new(grid);
        let baseline = optimizer.filling_error();
        let footprint = Footprint {
            columns: vec![1, 2, 3],
            rows: vec![1, 1, 1],
            planes: vec![1, 1, 1],
            inside_values: vec![0.0, 0.0, 0.0],
        };
        optimizer.insert(&footprint);
        optimizer.remove(&footprint);
        assert!((optimizer.filling_error() - baseline).abs() < 1e-9);
    }

    #[test]
    fn surface_biased_target_lands_next_to_an_occupied_cell() {
        let grid = PackingGrid::new([16, 16, 16], [0.5, 0.5, 0.5], false);
        let mut optimizer = PlacementOptimizer::new(grid);
        let footprint = Footprint { columns: vec![4], rows: vec![4], planes: vec![4], inside_values: vec![0.0] };
        optimizer.insert(&footprint);

        let mut rng = PackingRng::from_seed(7);
        let target = optimizer.random_surface_biased_target(&mut rng);
        let cell = optimizer.grid().cell_of(target[0], target[1], target[2]);
        let occupied_neighbour = [
            (cell.0 - 1, cell.1, cell.2),
            (cell.0 + 1, cell.1, cell.2),
            (cell.0, cell.1 - 1, cell.2),
            (cell.0, cell.1 + 1, cell.2),
            (cell.0, cell.1, cell.2 - 1),
            (cell.0, cell.1, cell.2 + 1),
            cell,
        ]
        .iter()
        .any(|&(i, j, k)| optimizer.grid().owner_count_at(i, j, k).unwrap_or(0) > 0);
        assert!(occupied_neighbour);
    }

    #[test]
    fn pack_quality_for_reflects_overlap_after_insert() {
        let grid = PackingGrid::new([16, 16, 16], [0.5, 0.5, 0.5], false);
        let mut optimizer = PlacementOptimizer::new(grid);
        let footprint = Footprint { columns: vec![1, 2], rows: vec![1, 1], planes: vec![1, 1], inside_values: vec![0.0, 0.0] };
        optimizer.insert(&footprint);
        assert!(optimizer.pack_quality_for(&footprint).abs() < 1e-12);
        optimizer.insert(&footprint);
        assert!((optimizer.pack_quality_for(&footprint) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn footprint_for_sphere_covers_cells_near_centroid() {
        let grid = PackingGrid::new([16, 16, 16], [0.5, 0.5, 0.5], false);
        let optimizer = PlacementOptimizer::new(grid);
        let feature = feature_at(0, [2.0, 2.0, 2.0], 2.0);
        let shape = Ellipsoid;
        let footprint = optimizer.footprint_for(&feature, &shape, [1.0, 1.0, 1.0], &Matrix3::identity());
        assert!(!footprint.is_empty());
    }

    #[test]
    fn neighborhood_error_is_zero_when_simulated_matches_goal_exactly() {
        let stats = PhaseStats {
            feature_size: SizeDistribution { mu: 0.0, sigma: 0.1, min_diameter: 1.0, max_diameter: 3.0, bin_step: 1.0 },
            bovera: vec![BetaParams { alpha: 1.0, beta: 1.0 }; 2],
            covera: vec![BetaParams { alpha: 1.0, beta: 1.0 }; 2],
            omega3: vec![BetaParams { alpha: 1.0, beta: 1.0 }; 2],
            neighbor: NeighborDistribution {
                per_diameter_bin: vec![NeighborLognormal { mu: 0.0, sigma: 0.0 }; 2],
                count_bin_step: 1.0,
                num_count_bins: 4,
            },
            axis_odf: crate::orientation::OdfTable::uniform([2, 2, 2]),
            size_correlation: None,
        };
        // Every feature lands in count bin 0, matching the degenerate
        // (sigma == 0) goal histogram which places all mass in bin 0.
        let features = vec![feature_at(0, [0.0, 0.0, 0.0], 1.5), feature_at(1, [10.0, 10.0, 10.0], 1.5)];
        let error = neighborhood_error(&features, &stats);
        assert!(error < 1e-9);
    }

    #[test]
    fn size_distribution_error_is_higher_when_candidate_matches_a_sparse_bin() {
        let stats = PhaseStats {
            feature_size: SizeDistribution { mu: 1.0, sigma: 0.2, min_diameter: 1.0, max_diameter: 5.0, bin_step: 1.0 },
            bovera: vec![BetaParams { alpha: 1.0, beta: 1.0 }; 4],
            covera: vec![BetaParams { alpha: 1.0, beta: 1.0 }; 4],
            omega3: vec![BetaParams { alpha: 1.0, beta: 1.0 }; 4],
            neighbor: NeighborDistribution {
                per_diameter_bin: vec![NeighborLognormal { mu: 0.0, sigma: 0.0 }; 4],
                count_bin_step: 1.0,
                num_count_bins: 4,
            },
            axis_odf: crate::orientation::OdfTable::uniform([2, 2, 2]),
            size_correlation: None,
        };
        let accepted = vec![1.2, 1.3, 1.1];
        let matching_bin_score = size_distribution_error(&accepted, 2.7, &stats);
        let crowded_bin_score = size_distribution_error(&accepted, 1.2, &stats);
        assert!(matching_bin_score >= 0.0 && matching_bin_score <= 1.0);
        assert!(crowded_bin_score >= 0.0 && crowded_bin_score <= 1.0);
    }
}
