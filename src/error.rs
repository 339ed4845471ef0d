//! Error taxonomy for the packing core: a closed set of explicit variants
//! for conditions the design anticipates, plus an `Other` catch-all for
//! anything unexpected, with a `From<anyhow::Error>` impl so internal
//! helpers can keep using `?` with `anyhow::Error`.

use thiserror::Error as ThisError;

/// Errors returned by the packing pipeline.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum PackingError {
    /// Incoherent statistics: phase fractions summing to zero, a
    /// distribution parameter that stayed degenerate after the nearest-bin
    /// walk, or a phase referenced by index but missing from the supplied
    /// statistics.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A shape-class tag outside the enumerated set in
    /// [`crate::phase::ShapeClass`].
    #[error("invalid shape class: {0}")]
    InvalidShapeClass(String),

    /// Grid dimensions or spacing are non-positive, or a mask array's size
    /// does not match the voxel count.
    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// A feature file could not be found or parsed, or a CSV output path
    /// could not be created or opened.
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// The caller's cancellation flag was observed between suspension
    /// points. Output arrays held by the caller remain in a valid, if
    /// incomplete, state.
    #[error("cancelled by caller")]
    Cancelled,

    /// A design-guaranteed invariant failed to hold; treated as fatal and
    /// reported with as much context as is available.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Any error not represented by one of the explicit variants above.
    #[error("unknown error")]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PackingError>;
