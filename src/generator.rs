//! Feature generation: drawing one candidate [`Feature`] from a phase's
//! statistics, independent of placement.

use crate::error::{PackingError, Result};
use crate::feature::{Feature, Footprint};
use crate::numeric::{clamp_bin, diameter_bin_index};
use crate::phase::{Phase, ShapeClass};
use crate::rng::PackingRng;
use crate::shape_ops::shape_ops_for;
use crate::stats::PhaseStats;

/// Draws one feature's intrinsic attributes (size, aspect ratios,
/// irregularity, orientation, target neighbour count) from `stats`,
/// leaving placement (centroid, footprint) for the caller to assign
/// later.
pub fn generate_feature(id: i32, phase: &Phase, stats: &PhaseStats, rng: &mut PackingRng) -> Result<Feature> {
    stats
        .validate()
        .map_err(PackingError::InvalidInput)?;

    let diameter = draw_diameter(stats, rng);
    let num_bins = stats.feature_size.num_bins();
    let raw_bin = diameter_bin_index(diameter, stats.feature_size.min_diameter, stats.feature_size.bin_step);
    let diameter_bin = clamp_bin(raw_bin, num_bins);

    let aspect_bin = stats
        .nearest_nondegenerate_aspect_bin(diameter_bin)
        .ok_or_else(|| PackingError::InvalidInput("no non-degenerate aspect ratio bin is available".to_string()))?;

    let b_over_a = draw_beta_in_unit_interval(rng, stats.bovera[aspect_bin].alpha, stats.bovera[aspect_bin].beta)
        .ok_or_else(|| PackingError::InvalidInput("b/a beta parameters are degenerate".to_string()))?;
    let c_over_a = draw_beta_in_unit_interval(rng, stats.covera[aspect_bin].alpha, stats.covera[aspect_bin].beta)
        .ok_or_else(|| PackingError::InvalidInput("c/a beta parameters are degenerate".to_string()))?
        .min(b_over_a);

    // Ellipsoids have no irregularity of their own; omega3 only shapes
    // super-ellipsoid/cube-octahedron corner sharpness.
    let omega3 = if phase.shape_class == ShapeClass::Ellipsoid {
        1.0
    } else {
        let omega3_params = stats.omega3[diameter_bin];
        draw_beta_in_unit_interval(rng, omega3_params.alpha, omega3_params.beta).unwrap_or(0.0)
    };

    let (axis_euler, _odf_bin) = stats.axis_odf.sample(rng);

    let volume = std::f64::consts::FRAC_PI_6 * diameter.powi(3);
    let mut shape = shape_ops_for(phase.shape_class)?;
    shape.init();
    let _semi_axis_a = shape.radius_from(volume, omega3, b_over_a, c_over_a);

    let neighbor_histogram = stats.neighbor.goal_histogram(diameter_bin);
    let neighborhood_count = sample_from_histogram(&neighbor_histogram, stats.neighbor.count_bin_step, rng);

    Ok(Feature {
        id,
        phase: phase.index,
        shape_class: phase.shape_class,
        volume,
        equivalent_diameter: diameter,
        axis_lengths: [1.0, b_over_a, c_over_a],
        axis_euler,
        omega3,
        centroid: [0.0, 0.0, 0.0],
        footprint: Footprint::default(),
        neighborhood_count,
        pack_quality: 0.0,
    })
}

/// Recomputes a feature's absolute principal semi-axes `(a, b, c)` from
/// its stored volume, irregularity and aspect ratios. The generation
/// step only needs the aspect ratios to draw a feature; the placement
/// and rasterisation steps need the absolute lengths, and
/// re-deriving them from `shape_ops_for` keeps [`Feature`] from having
/// to carry a redundant cached semi-axis that could drift out of sync
/// with `omega3`/`axis_lengths`.
pub fn semi_axes_for(feature: &Feature) -> Result<[f64; 3]> {
    let mut shape = shape_ops_for(feature.shape_class)?;
    shape.init();
    let a = shape.radius_from(feature.volume, feature.omega3, feature.b_over_a(), feature.c_over_a());
    Ok([a, a * feature.b_over_a(), a * feature.c_over_a()])
}

/// Draws a diameter from the clipped lognormal, rejecting draws outside
/// `[min_diameter, max_diameter]` and resampling, matching the original
/// filter's `generate_feature` rejection loop rather than clamping (a
/// clamp would pile mass at the bounds and bias the histogram).
fn draw_diameter(stats: &PhaseStats, rng: &mut PackingRng) -> f64 {
    let dist = &stats.feature_size;
    loop {
        let ln_diameter = rng.sample_normal(dist.mu, dist.sigma);
        let diameter = ln_diameter.exp();
        if diameter >= dist.min_diameter && diameter <= dist.max_diameter {
            return diameter;
        }
    }
}

/// Draws from `Beta(alpha, beta)`, clamping the result into `[0, 1]` to
/// absorb floating-point overshoot at the interval edges.
fn draw_beta_in_unit_interval(rng: &mut PackingRng, alpha: f64, beta: f64) -> Option<f64> {
    rng.sample_beta(alpha, beta).map(|v| v.clamp(0.0, 1.0))
}

/// Picks a neighbour count by inverse-CDF sampling over a discretised
/// histogram, returning the bin's left edge as the representative count.
fn sample_from_histogram(histogram: &[f64], bin_step: f64, rng: &mut PackingRng) -> i32 {
    if histogram.is_empty() {
        return 0;
    }
    let target = rng.uniform01();
    let mut cumulative = 0.0;
    for (bin, mass) in histogram.iter().enumerate() {
        cumulative += mass;
        if target < cumulative {
            return (bin as f64 * bin_step).round() as i32;
        }
    }
    ((histogram.len() - 1) as f64 * bin_step).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::OdfTable;
    use crate::phase::{LaueGroup, PhaseKind, ShapeClass};
    use crate::stats::{BetaParams, NeighborDistribution, NeighborLognormal, SizeDistribution};

    fn sample_phase() -> Phase {
        Phase {
            index: 1,
            kind: PhaseKind::Primary,
            symmetry: LaueGroup::CubicM3m,
            shape_class: ShapeClass::Ellipsoid,
            fraction: 1.0,
            name: "phase-1".to_string(),
        }
    }

    fn sample_stats() -> PhaseStats {
        let bins = 3;
        PhaseStats {
            feature_size: SizeDistribution {
                mu: 0.5,
                sigma: 0.2,
                min_diameter: 1.0,
                max_diameter: 4.0,
                bin_step: 1.0,
            },
            bovera: vec![BetaParams { alpha: 10.0, beta: 8.0 }; bins],
            covera: vec![BetaParams { alpha: 9.0, beta: 9.0 }; bins],
            omega3: vec![BetaParams { alpha: 10.0, beta: 10.0 }; bins],
            neighbor: NeighborDistribution {
                per_diameter_bin: vec![NeighborLognormal { mu: 1.5, sigma: 0.3 }; bins],
                count_bin_step: 2.0,
                num_count_bins: 10,
            },
            axis_odf: OdfTable::uniform([4, 4, 4]),
            size_correlation: None,
        }
    }

    #[test]
    fn generated_diameter_stays_within_bounds() {
        let phase = sample_phase();
        let stats = sample_stats();
        let mut rng = PackingRng::from_seed(11);
        for id in 0..20 {
            let feature = generate_feature(id, &phase, &stats, &mut rng).unwrap();
            assert!(feature.equivalent_diameter >= stats.feature_size.min_diameter);
            assert!(feature.equivalent_diameter <= stats.feature_size.max_diameter);
        }
    }

    #[test]
    fn aspect_ratios_stay_normalised_with_c_not_exceeding_b() {
        let phase = sample_phase();
        let stats = sample_stats();
        let mut rng = PackingRng::from_seed(5);
        let feature = generate_feature(0, &phase, &stats, &mut rng).unwrap();
        assert_eq!(feature.axis_lengths[0], 1.0);
        assert!(feature.c_over_a() <= feature.b_over_a());
    }

    #[test]
    fn same_seed_generates_identical_feature() {
        let phase = sample_phase();
        let stats = sample_stats();
        let mut rng_a = PackingRng::from_seed(99);
        let mut rng_b = PackingRng::from_seed(99);
        let a = generate_feature(0, &phase, &stats, &mut rng_a).unwrap();
        let b = generate_feature(0, &phase, &stats, &mut rng_b).unwrap();
        assert_eq!(a.equivalent_diameter, b.equivalent_diameter);
        assert_eq!(a.axis_lengths, b.axis_lengths);
    }

    #[test]
    fn semi_axes_recover_the_generated_volume() {
        let phase = sample_phase();
        let stats = sample_stats();
        let mut rng = PackingRng::from_seed(42);
        let feature = generate_feature(0, &phase, &stats, &mut rng).unwrap();
        let axes = semi_axes_for(&feature).unwrap();
        let recomputed_volume = (4.0 / 3.0) * std::f64::consts::PI * axes[0] * axes[1] * axes[2];
        assert!((recomputed_volume - feature.volume).abs() / feature.volume < 1e-6);
    }

    #[test]
    fn ellipsoid_features_always_get_omega3_one() {
        let phase = sample_phase();
        let stats = sample_stats();
        let mut rng = PackingRng::from_seed(3);
        for id in 0..10 {
            let feature = generate_feature(id, &phase, &stats, &mut rng).unwrap();
            assert_eq!(feature.omega3, 1.0);
        }
    }

    #[test]
    fn degenerate_aspect_bins_return_an_error_instead_of_panicking() {
        let phase = sample_phase();
        let mut stats = sample_stats();
        for b in stats.bovera.iter_mut() {
            *b = BetaParams::default();
        }
        for c in stats.covera.iter_mut() {
            *c = BetaParams::default();
        }
        let mut rng = PackingRng::from_seed(1);
        assert!(generate_feature(0, &phase, &stats, &mut rng).is_err());
    }
}
