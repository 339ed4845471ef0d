//! Small numeric helpers shared across the packing pipeline: histogram
//! comparison, signed modular arithmetic for periodic wrap, and the
//! half-offset diameter binning used by the size-distribution error.

/// Bhattacharyya coefficient between two normalised histograms, expressed
/// as an iterator of `(simulated, goal)` bin pairs. Returns a value in
/// `[0, 1]`; callers report `1.0 - coefficient` as the distribution error.
///
/// Treats a 1D, 2D or 3D histogram uniformly by having the caller
/// flatten it first; this function just sums `sqrt(p_i * q_i)` over the
/// flattened bin pairs.
pub fn bhattacharyya_coefficient<I>(bins: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    bins.into_iter()
        .map(|(p, q)| (p.max(0.0) * q.max(0.0)).sqrt())
        .sum()
}

/// Diameter histogram bin index using a half-bin offset:
/// `floor((d - min_dia/2) / bin_step)` rather than the more obvious
/// `floor((d - min_dia) / bin_step)`, so bin 0 is centred on `min_dia`.
pub fn diameter_bin_index(diameter: f64, min_diameter: f64, bin_step: f64) -> i64 {
    ((diameter - min_diameter / 2.0) / bin_step).floor() as i64
}

/// Clamps a bin index computed by [`diameter_bin_index`] into `0..num_bins`,
/// folding anything below zero up to zero and anything at or above
/// `num_bins` down to the last bin.
pub fn clamp_bin(index: i64, num_bins: usize) -> usize {
    if num_bins == 0 {
        return 0;
    }
    if index < 0 {
        0
    } else if index as usize >= num_bins {
        num_bins - 1
    } else {
        index as usize
    }
}

/// Abramowitz & Stegun 7.1.26 approximation of the error function,
/// accurate to within `1.5e-7`, used to evaluate the lognormal CDF for
/// the size-distribution goal histogram without pulling in a stats
/// crate for a single special function.
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// True Euclidean modulo (always non-negative for positive `modulus`),
/// used for periodic-boundary wrap rather than a single "if below add
/// extent, if above subtract extent" correction, which only handles a
/// single extent's worth of overshoot.
#[inline]
pub fn signed_rem_euclid(value: i64, modulus: i64) -> i64 {
    debug_assert!(modulus > 0);
    value.rem_euclid(modulus)
}

/// Asserts the incremental filling-error identity used by
/// [`crate::packing_grid::PackingGrid`]: `(o+1-1)^2 - (o-1)^2 == 2o - 1`.
/// Only compiled into debug builds, since checking it on every footprint
/// write would be wasted cost in release.
#[inline]
pub fn debug_assert_filling_identity(owner_count_before: i64) {
    debug_assert_eq!(
        (owner_count_before + 1 - 1).pow(2) - (owner_count_before - 1).pow(2),
        2 * owner_count_before - 1
    );
}
