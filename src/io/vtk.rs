//! Optional debug VTK export, gated behind the `vtk_extras` feature.
//! Writes the output volume's voxel centres as a VTK unstructured grid
//! of vertex cells (one vertex cell per point, `VertexNumbers::Legacy`)
//! carrying `FeatureId` and `PhaseId` point attributes. A debug aid, not
//! the CSV/feature-id-array surface the pipeline contracts on.

use std::fs::create_dir_all;
use std::path::Path;

use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataSet, UnstructuredGridPiece, Version,
    VertexNumbers, Vtk,
};

use crate::error::{PackingError, Result};
use crate::volume::OutputVolume;

/// Writes `volume`'s feature-id and phase-id fields to a legacy VTK
/// unstructured-grid file at `path`, one point per voxel centre.
pub fn write_debug_volume(volume: &OutputVolume, path: &Path) -> Result<()> {
    let [nx, ny, nz] = volume.extents();
    let spacing = volume.spacing();
    let origin = volume.origin();

    let total = volume.feature_ids().len();
    let mut points = Vec::with_capacity(total * 3);
    for plane in 0..nz {
        for row in 0..ny {
            for column in 0..nx {
                points.push(origin[0] + column as f64 * spacing[0]);
                points.push(origin[1] + row as f64 * spacing[1]);
                points.push(origin[2] + plane as f64 * spacing[2]);
            }
        }
    }

    let cell_types = vec![CellType::Vertex; total];
    let mut vertex_indices = Vec::with_capacity(total * 2);
    for i in 0..total {
        vertex_indices.push(1u32);
        vertex_indices.push(i as u32);
    }

    let mut attributes = Attributes::new();
    attributes.point.push(Attribute::scalars("FeatureId", 1).with_data(
        volume.feature_ids().iter().map(|&id| id as f32).collect::<Vec<_>>(),
    ));
    attributes.point.push(Attribute::scalars("PhaseId", 1).with_data(
        volume.phase_ids().iter().map(|&id| id as f32).collect::<Vec<_>>(),
    ));

    let piece = UnstructuredGridPiece {
        points: points.into(),
        cells: Cells {
            cell_verts: VertexNumbers::Legacy {
                num_cells: total as u32,
                vertices: vertex_indices,
            },
            types: cell_types,
        },
        data: attributes,
    };

    let vtk_file = Vtk {
        version: Version::new((4, 1)),
        title: "microgen debug volume".to_string(),
        file_path: None,
        byte_order: ByteOrder::BigEndian,
        data: DataSet::inline(piece),
    };

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            create_dir_all(dir)
                .map_err(|e| PackingError::IoFailure(format!("creating '{}': {e}", dir.display())))?;
        }
    }
    vtk_file
        .export_be(path)
        .map_err(|e| PackingError::IoFailure(format!("writing '{}': {e}", path.display())))
}
