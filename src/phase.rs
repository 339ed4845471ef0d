//! Phase identity: the small closed enumerations and the [`Phase`] record
//! that statistics, shape operators and the packing pipeline all key off.

/// Broad category a phase belongs to. Only [`PhaseKind::Primary`] and
/// [`PhaseKind::Precipitate`] are driven through the packing pipeline in
/// this crate; the remaining variants round out the closed set a
/// caller's phase table may contain so that a `Phase` built elsewhere
/// round-trips without a lossy cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Primary,
    Precipitate,
    Matrix,
    Boundary,
    Transformation,
    Unknown,
}

/// Crystallographic Laue group of a phase, used by
/// [`crate::orientation`] to fold orientations into the fundamental zone
/// for ODF bin indexing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LaueGroup {
    /// Cubic m-3m (order 48 including inversion; 24 proper rotations).
    CubicM3m,
    /// Hexagonal 6/mmm (order 24 including inversion; 12 proper rotations).
    HexagonalMmm,
}

/// Shape class driving [`crate::shape_ops::ShapeOps`] dispatch. The set is
/// closed and dispatch is O(1) on the tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeClass {
    Ellipsoid,
    SuperEllipsoid,
    CubeOctahedron,
    Cylinder,
    Unknown,
}

/// A phase's essential, immutable attributes.
#[derive(Clone, Debug)]
pub struct Phase {
    /// Dense index, 1-based; index 0 is reserved for background/matrix.
    pub index: u32,
    pub kind: PhaseKind,
    pub symmetry: LaueGroup,
    pub shape_class: ShapeClass,
    /// Volume fraction in `[0, 1]`, normalised against sibling phases of
    /// the same [`PhaseKind`] category before packing starts.
    pub fraction: f64,
    pub name: String,
}

impl Phase {
    pub fn is_packed(&self) -> bool {
        matches!(self.kind, PhaseKind::Primary | PhaseKind::Precipitate)
    }
}

/// Normalises the fractions of a set of phases belonging to the same
/// packed category so they sum to 1. Returns an error if the sum is
/// zero (nothing to normalise against).
pub fn normalize_fractions(phases: &mut [Phase]) -> Result<(), String> {
    let total: f64 = phases.iter().map(|p| p.fraction).sum();
    if total <= 0.0 {
        return Err("sum of phase fractions is zero".to_string());
    }
    for phase in phases.iter_mut() {
        phase.fraction /= total;
    }
    Ok(())
}
