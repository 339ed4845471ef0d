//! Per-phase statistical distributions consumed by the generator and the
//! placement optimiser's error metrics.

use crate::orientation::OdfTable;

/// Parameters of a Beta(alpha, beta) distribution at one diameter bin.
/// A bin is "degenerate" when either parameter is zero, which the
/// generator resolves by walking outward to the nearest non-degenerate
/// bin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BetaParams {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaParams {
    pub fn is_degenerate(&self) -> bool {
        self.alpha == 0.0 || self.beta == 0.0
    }
}

/// Lognormal feature-size distribution with hard clipping, plus the
/// histogram bin step used for size-distribution error.
#[derive(Clone, Debug)]
pub struct SizeDistribution {
    pub mu: f64,
    pub sigma: f64,
    pub min_diameter: f64,
    pub max_diameter: f64,
    pub bin_step: f64,
}

impl SizeDistribution {
    pub fn num_bins(&self) -> usize {
        let span = self.max_diameter - self.min_diameter;
        ((span / self.bin_step).ceil() as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sigma < 0.0 {
            return Err("size distribution sigma must be non-negative".to_string());
        }
        if self.min_diameter <= 0.0 || self.max_diameter <= self.min_diameter {
            return Err("size distribution diameter bounds are not coherent".to_string());
        }
        if self.bin_step <= 0.0 {
            return Err("size distribution bin step must be positive".to_string());
        }
        Ok(())
    }

    /// Evaluates the lognormal CDF at each bin edge and differences
    /// consecutive values to get the goal mass per bin, using the same
    /// half-offset bin edges as [`crate::numeric::diameter_bin_index`].
    pub fn goal_histogram(&self) -> Vec<f64> {
        let bins = self.num_bins();
        let mut hist = vec![0.0; bins];
        if self.sigma <= 0.0 {
            hist[0] = 1.0;
            return hist;
        }
        let denom = 1.0 / (std::f64::consts::SQRT_2 * self.sigma);
        let mut previous_cdf = 0.0;
        for (bin, value) in hist.iter_mut().enumerate() {
            let edge = self.min_diameter / 2.0 + (bin as f64 + 1.0) * self.bin_step;
            let ln_edge = edge.max(1e-12).ln();
            let cdf = 0.5 * (1.0 + crate::numeric::erf((ln_edge - self.mu) * denom));
            *value = (cdf - previous_cdf).max(0.0);
            previous_cdf = cdf;
        }
        let total: f64 = hist.iter().sum();
        if total > 0.0 {
            for value in hist.iter_mut() {
                *value /= total;
            }
        }
        hist
    }
}

/// Lognormal parameters describing the goal neighbour-count distribution
/// at one diameter bin. Converted into a normalised histogram over
/// fixed-width count bins by [`NeighborDistribution::goal_histogram`]
/// for comparison against simulated counts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NeighborLognormal {
    pub mu: f64,
    pub sigma: f64,
}

/// Goal neighbourhood distribution: one lognormal per diameter bin, plus
/// the fixed count-bin step used to discretise it.
#[derive(Clone, Debug)]
pub struct NeighborDistribution {
    pub per_diameter_bin: Vec<NeighborLognormal>,
    pub count_bin_step: f64,
    pub num_count_bins: usize,
}

impl NeighborDistribution {
    /// Evaluates the lognormal at the centre of each count bin for the
    /// given diameter bin and normalises to unit total, producing the
    /// goal histogram compared against the simulated one.
    pub fn goal_histogram(&self, diameter_bin: usize) -> Vec<f64> {
        let params = self
            .per_diameter_bin
            .get(diameter_bin)
            .copied()
            .unwrap_or_default();
        let mut hist = vec![0.0; self.num_count_bins];
        if params.sigma <= 0.0 {
            if !hist.is_empty() {
                hist[0] = 1.0;
            }
            return hist;
        }
        for (bin, value) in hist.iter_mut().enumerate() {
            let count_centre = (bin as f64 + 0.5) * self.count_bin_step;
            if count_centre <= 0.0 {
                continue;
            }
            let ln_c = count_centre.ln();
            let z = (ln_c - params.mu) / params.sigma;
            *value = (-0.5 * z * z).exp() / (count_centre * params.sigma);
        }
        let total: f64 = hist.iter().sum();
        if total > 0.0 {
            for value in hist.iter_mut() {
                *value /= total;
            }
        }
        hist
    }

    pub fn count_bin_index(&self, count: u32) -> usize {
        let raw = (count as f64 / self.count_bin_step).floor() as i64;
        crate::numeric::clamp_bin(raw, self.num_count_bins)
    }
}

/// Spatial size-correlation bookkeeping: a radial-distance histogram bin
/// count, used by the precipitate seeding strategy to bias precipitate
/// centroids near primary-feature surfaces rather than uniformly at
/// random.
#[derive(Clone, Copy, Debug)]
pub struct SizeCorrelation {
    pub num_bins: usize,
}

/// Per-phase statistics bundle.
#[derive(Clone, Debug)]
pub struct PhaseStats {
    pub feature_size: SizeDistribution,
    pub bovera: Vec<BetaParams>,
    pub covera: Vec<BetaParams>,
    pub omega3: Vec<BetaParams>,
    pub neighbor: NeighborDistribution,
    pub axis_odf: OdfTable,
    pub size_correlation: Option<SizeCorrelation>,
}

impl PhaseStats {
    pub fn validate(&self) -> Result<(), String> {
        self.feature_size.validate()?;
        let bins = self.feature_size.num_bins();
        if self.bovera.len() != bins || self.covera.len() != bins || self.omega3.len() != bins {
            return Err(format!(
                "per-bin aspect ratio/omega3 arrays must have {bins} entries matching the size distribution"
            ));
        }
        if self.bovera.iter().all(BetaParams::is_degenerate)
            && self.covera.iter().all(BetaParams::is_degenerate)
        {
            return Err("no non-degenerate aspect ratio bin is available".to_string());
        }
        Ok(())
    }

    /// Walks outward from `diameter_bin` to find the nearest bin with
    /// non-degenerate b/a and c/a parameters, alternating which direction
    /// is tried first at each offset.
    pub fn nearest_nondegenerate_aspect_bin(&self, diameter_bin: usize) -> Option<usize> {
        let len = self.bovera.len();
        if len == 0 {
            return None;
        }
        let start = diameter_bin.min(len - 1);
        if !self.bovera[start].is_degenerate() && !self.covera[start].is_degenerate() {
            return Some(start);
        }
        for offset in 1..len {
            if let Some(idx) = start.checked_sub(offset) {
                if !self.bovera[idx].is_degenerate() && !self.covera[idx].is_degenerate() {
                    return Some(idx);
                }
            }
            let idx = start + offset;
            if idx < len && !self.bovera[idx].is_degenerate() && !self.covera[idx].is_degenerate() {
                return Some(idx);
            }
        }
        None
    }
}
