//!
//! Statistics-driven packing of ellipsoid-like particles ("features") into a
//! voxel grid so that the placed population matches a set of target size,
//! shape, orientation and neighbourhood distributions. Entry point is
//! [pack_microstructure].
//!

/// Re-export of the nalgebra version used by this crate's public API
/// (rotation matrices returned by [`orientation::EulerAngles::to_matrix`]).
pub use nalgebra;

pub mod cleanup;
pub mod error;
pub mod feature;
pub mod gap_filler;
pub mod generator;
pub mod io;
pub mod numeric;
pub mod optimizer;
pub mod orientation;
pub mod packing_grid;
pub mod phase;
pub mod rasterizer;
pub mod rng;
pub mod shape_ops;
pub mod stats;
pub mod volume;
pub mod workspace;

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

pub use error::{PackingError, Result};
pub use feature::{Feature, Footprint};
pub use orientation::EulerAngles;
pub use phase::{normalize_fractions, LaueGroup, Phase, PhaseKind, ShapeClass};
pub use rng::PackingRng;
pub use stats::PhaseStats;
pub use volume::OutputVolume;
pub use workspace::PackingWorkspace;

use cleanup::{cleanup_islands, MinIslandSize};
use gap_filler::{fill_gaps, GapFillGrid};
use generator::semi_axes_for;
use io::FeatureRecord;
use optimizer::{
    initial_placement, recompute_neighborhood_counts, run_generation_phase, run_optimization_phase,
    PlacementOptimizer, PlacementStrategy,
};
use packing_grid::PackingGrid;
use rasterizer::rasterize_feature;
use shape_ops::shape_ops_for;

pub(crate) type HashState = fxhash::FxBuildHasher;
pub(crate) type MapType<K, V> = std::collections::HashMap<K, V, HashState>;
pub(crate) fn new_map<K, V>() -> MapType<K, V> {
    MapType::with_hasher(HashState::default())
}

/// Where a phase category's features come from.
#[derive(Clone, Debug)]
pub enum FeatureGenerationMode {
    /// Draw features from each phase's statistics and place them with the
    /// Monte-Carlo optimiser.
    Generate,
    /// Skip generation and placement entirely; read already-placed
    /// features from a feature-description file.
    Load(PathBuf),
}

/// Whether (and how) a caller wants a geometric description of the packed
/// features retained for a downstream stage outside this crate. This crate
/// does not itself persist a geometric description; the mode and target
/// identifier are carried through [`PackingParameters`] unused so that an
/// embedding pipeline can thread its own bookkeeping through the same
/// configuration surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GeometricDescriptionMode {
    #[default]
    None,
    New(String),
    Append(String),
}

/// Recognised configuration for one packing run.
#[derive(Clone, Debug)]
pub struct PackingParameters {
    /// Output grid extents in voxels (column, row, plane counts).
    pub extents: [i64; 3],
    /// Output grid voxel size.
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub unit: Option<String>,
    /// Whether the packing and output volumes wrap at their boundaries.
    pub periodic_boundaries: bool,
    /// Whether voxels outside `mask` are excluded from placement and
    /// rasterisation.
    pub use_mask: bool,
    /// One boolean per voxel in `(column, row, plane)` raster order,
    /// required when `use_mask` is set.
    pub mask: Option<Vec<bool>>,
    pub feature_generation: FeatureGenerationMode,
    /// Destination for the goal-attribute CSV; skipped when `None`.
    pub write_goal_attributes: Option<PathBuf>,
    pub save_geometric_descriptions: GeometricDescriptionMode,
    /// Overrides the run's random seed; falls back to a clock-derived seed
    /// so repeat invocations without an explicit seed still diverge.
    pub seed: Option<u64>,
}

impl PackingParameters {
    /// Checks internal coherence of the configuration, independent of any
    /// phase table or statistics supplied to [`pack_microstructure`].
    pub fn validate(&self) -> Result<()> {
        if self.extents.iter().any(|&e| e <= 0) {
            return Err(PackingError::GeometryMismatch(
                "output volume extents must be positive".to_string(),
            ));
        }
        if self.spacing.iter().any(|&s| s <= 0.0) {
            return Err(PackingError::GeometryMismatch(
                "output volume spacing must be positive".to_string(),
            ));
        }
        if self.use_mask {
            match &self.mask {
                Some(mask) => {
                    let total = (self.extents[0] * self.extents[1] * self.extents[2]) as usize;
                    if mask.len() != total {
                        return Err(PackingError::GeometryMismatch(format!(
                            "mask length {} does not match voxel count {total}",
                            mask.len()
                        )));
                    }
                }
                None => {
                    return Err(PackingError::InvalidInput(
                        "use_mask is set but no mask array was supplied".to_string(),
                    ))
                }
            }
        }
        if let FeatureGenerationMode::Load(path) = &self.feature_generation {
            if path.as_os_str().is_empty() {
                return Err(PackingError::InvalidInput(
                    "load mode requires a non-empty feature file path".to_string(),
                ));
            }
        }
        let target_identifier = match &self.save_geometric_descriptions {
            GeometricDescriptionMode::New(id) | GeometricDescriptionMode::Append(id) => Some(id),
            GeometricDescriptionMode::None => None,
        };
        if let Some(id) = target_identifier {
            if id.trim().is_empty() {
                return Err(PackingError::InvalidInput(
                    "geometric description target identifier must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        })
    }
}

/// Packs `phases` into a fresh [`OutputVolume`] according to `params`,
/// using one fresh [`PackingWorkspace`] for the run. Prefer
/// [`pack_microstructure_with_workspace`] when packing repeatedly against
/// the same output extents, to reuse the workspace's allocations.
pub fn pack_microstructure(
    phases: &[Phase],
    stats_by_phase: &MapType<u32, PhaseStats>,
    params: &PackingParameters,
) -> Result<(OutputVolume, Vec<Feature>)> {
    let mut workspace = PackingWorkspace::default();
    pack_microstructure_with_workspace(phases, stats_by_phase, params, &mut workspace)
}

/// Runs the full packing pipeline: feature generation or loading, Monte
/// Carlo placement, rasterisation, gap filling, island cleanup, and a
/// second gap-fill pass, returning the populated [`OutputVolume`] and the
/// final feature table.
pub fn pack_microstructure_with_workspace(
    phases: &[Phase],
    stats_by_phase: &MapType<u32, PhaseStats>,
    params: &PackingParameters,
    workspace: &mut PackingWorkspace,
) -> Result<(OutputVolume, Vec<Feature>)> {
    params.validate()?;

    let extents = params.extents;
    let spacing = params.spacing;
    let periodic = params.periodic_boundaries;

    let mut volume = OutputVolume::new(extents, spacing, params.origin, params.unit.clone())?;
    if params.use_mask {
        volume.set_mask(params.mask.clone().unwrap_or_default())?;
    }

    let voxel_volume = spacing[0] * spacing[1] * spacing[2];
    let total_voxels = extents[0] * extents[1] * extents[2];
    let usable_voxels = if params.use_mask {
        params
            .mask
            .as_ref()
            .map(|mask| mask.iter().filter(|&&m| m).count() as i64)
            .unwrap_or(total_voxels)
    } else {
        total_voxels
    };
    let total_volume = usable_voxels as f64 * voxel_volume;

    info!(
        "Packing {} voxels ({:?} extents, {:?} spacing) with {} phases",
        total_voxels,
        extents,
        spacing,
        phases.iter().filter(|p| p.is_packed()).count()
    );

    let mut features = match &params.feature_generation {
        FeatureGenerationMode::Generate => {
            generate_and_place(phases, stats_by_phase, total_volume, extents, spacing, periodic, params.resolved_seed())?
        }
        FeatureGenerationMode::Load(path) => load_features(phases, path)?,
    };

    recompute_neighborhood_counts(&mut features);

    rasterize_all(&mut volume, &features, spacing, periodic, workspace, params.use_mask)?;

    fill_gaps(&mut GapFillGrid {
        dims: extents,
        periodic,
        feature_ids: volume.feature_ids_mut(),
    });

    volume.recompute_phase_ids(&features);
    let min_size = build_min_island_size(phases, stats_by_phase, voxel_volume);
    let cell_phases: Vec<u32> = volume.phase_ids().iter().map(|&p| p.max(0) as u32).collect();
    cleanup_islands(extents, volume.feature_ids_mut(), &cell_phases, &min_size, periodic);

    fill_gaps(&mut GapFillGrid {
        dims: extents,
        periodic,
        feature_ids: volume.feature_ids_mut(),
    });
    volume.recompute_phase_ids(&features);

    if let Some(path) = &params.write_goal_attributes {
        io::write_goal_attributes(&features, path)?;
    }

    Ok((volume, features))
}

/// Runs generation and Monte-Carlo placement for every packed phase,
/// primary phases first so precipitate placement (when it depends on
/// already-placed primary surfaces) sees a populated packing grid.
fn generate_and_place(
    phases: &[Phase],
    stats_by_phase: &MapType<u32, PhaseStats>,
    total_volume: f64,
    extents: [i64; 3],
    spacing: [f64; 3],
    periodic: bool,
    seed: u64,
) -> Result<Vec<Feature>> {
    let mut rng = PackingRng::from_seed(seed);
    let grid = PackingGrid::new(extents, spacing, periodic);
    let packing_extents = grid.extents();
    let mut optimizer = PlacementOptimizer::new(grid);
    let volume_size = [
        extents[0] as f64 * spacing[0],
        extents[1] as f64 * spacing[1],
        extents[2] as f64 * spacing[2],
    ];

    let mut next_id: i32 = 1;
    let mut features: Vec<Feature> = Vec::new();

    let primary_then_precipitate = phases
        .iter()
        .filter(|p| p.kind == PhaseKind::Primary)
        .chain(phases.iter().filter(|p| p.kind == PhaseKind::Precipitate));

    for phase in primary_then_precipitate {
        let stats = stats_by_phase.get(&phase.index).ok_or_else(|| {
            PackingError::InvalidInput(format!("no statistics supplied for phase {}", phase.index))
        })?;
        let strategy = match phase.kind {
            PhaseKind::Precipitate => PlacementStrategy::SurfaceBiased,
            _ => PlacementStrategy::Uniform,
        };
        let mut generated = run_generation_phase(phase, stats, total_volume, periodic, packing_extents, &mut next_id, &mut rng)?;
        initial_placement(&mut optimizer, &mut generated, volume_size, strategy, &mut rng)?;
        features.extend(generated);
    }

    run_optimization_phase(&mut optimizer, &mut features, volume_size, &mut rng)?;
    Ok(features)
}

/// Reads a feature-description file and converts each record into a
/// [`Feature`] using the shape class of the phase it declares.
fn load_features(phases: &[Phase], path: &PathBuf) -> Result<Vec<Feature>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| PackingError::IoFailure(format!("reading '{}': {e}", path.display())))?;
    let records: Vec<FeatureRecord> = io::parse_feature_file(&contents)?;

    let mut features = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let phase = phases
            .iter()
            .find(|p| p.index == record.phase)
            .ok_or_else(|| PackingError::InvalidInput(format!("feature file references unknown phase {}", record.phase)))?;
        features.push(io::record_to_feature((index + 1) as i32, record, phase.shape_class));
    }
    Ok(features)
}

/// Rasterises every feature into `volume`'s feature-id array, reusing one
/// claim-buffer allocation from `workspace` across the whole pass.
fn rasterize_all(
    volume: &mut OutputVolume,
    features: &[Feature],
    spacing: [f64; 3],
    periodic: bool,
    workspace: &mut PackingWorkspace,
    use_mask: bool,
) -> Result<()> {
    let buffers = workspace.raster_buffers(volume.extents());
    for feature in features {
        let semi_axes = semi_axes_for(feature)?;
        let rotation = feature.axis_euler.to_matrix();
        let mut shape = shape_ops_for(feature.shape_class)?;
        shape.init();
        shape.radius_from(feature.volume, feature.omega3, feature.b_over_a(), feature.c_over_a());
        rasterize_feature(buffers, feature, shape.as_ref(), semi_axes, &rotation, spacing, periodic);
    }
    volume.apply_rasterization(buffers, use_mask);
    Ok(())
}

/// Converts each packed phase's minimum feature diameter into a minimum
/// retained island volume in voxels, indexed by phase.
fn build_min_island_size(phases: &[Phase], stats_by_phase: &MapType<u32, PhaseStats>, voxel_volume: f64) -> MinIslandSize {
    let max_index = phases.iter().map(|p| p.index).max().unwrap_or(0) as usize;
    let mut by_phase = vec![0i64; max_index + 1];
    for phase in phases {
        if let Some(stats) = stats_by_phase.get(&phase.index) {
            let min_volume = std::f64::consts::FRAC_PI_6 * stats.feature_size.min_diameter.powi(3);
            by_phase[phase.index as usize] = (min_volume / voxel_volume).round().max(0.0) as i64;
        }
    }
    MinIslandSize { by_phase }
}
