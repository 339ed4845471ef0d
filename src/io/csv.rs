//! Goal-attribute CSV writer: first line is the feature count excluding
//! background, second line is a header naming `FeatureID` plus one
//! column per exported attribute (multi-component attributes expanded
//! as `name_k`), then one comma-separated line per feature. Written
//! directly against `std::io::Write` rather than a CSV crate — the
//! format here is simple enough not to need one.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PackingError, Result};
use crate::feature::Feature;

const COLUMNS: &[&str] = &[
    "Phase",
    "EquivalentDiameter",
    "Volume",
    "AxisLengths_0",
    "AxisLengths_1",
    "AxisLengths_2",
    "AxisEuler_0",
    "AxisEuler_1",
    "AxisEuler_2",
    "Omega3",
    "Centroid_0",
    "Centroid_1",
    "Centroid_2",
    "NeighborhoodCount",
    "PackQuality",
];

/// Writes `features` (already excluding background) to `path` as a
/// goal-attribute CSV, creating any missing parent directory first.
pub fn write_goal_attributes(features: &[Feature], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PackingError::IoFailure(format!("creating '{}': {e}", parent.display())))?;
        }
    }

    let file = File::create(path)
        .map_err(|e| PackingError::IoFailure(format!("opening '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{}", features.len())
        .map_err(|e| PackingError::IoFailure(e.to_string()))?;

    write!(out, "FeatureID").map_err(|e| PackingError::IoFailure(e.to_string()))?;
    for column in COLUMNS {
        write!(out, ",{column}").map_err(|e| PackingError::IoFailure(e.to_string()))?;
    }
    writeln!(out).map_err(|e| PackingError::IoFailure(e.to_string()))?;

    for feature in features {
        write_row(&mut out, feature)?;
    }
    out.flush().map_err(|e| PackingError::IoFailure(e.to_string()))
}

fn write_row(out: &mut impl Write, feature: &Feature) -> Result<()> {
    write!(out, "{}", feature.id).map_err(|e| PackingError::IoFailure(e.to_string()))?;
    let values = [
        feature.phase as f64,
        feature.equivalent_diameter,
        feature.volume,
        feature.axis_lengths[0],
        feature.axis_lengths[1],
        feature.axis_lengths[2],
        feature.axis_euler.phi1,
        feature.axis_euler.phi_cap,
        feature.axis_euler.phi2,
        feature.omega3,
        feature.centroid[0],
        feature.centroid[1],
        feature.centroid[2],
        feature.neighborhood_count as f64,
        feature.pack_quality,
    ];
    for value in values {
        write!(out, ",{value}").map_err(|e| PackingError::IoFailure(e.to_string()))?;
    }
    writeln!(out).map_err(|e| PackingError::IoFailure(e.to_string()))
}
