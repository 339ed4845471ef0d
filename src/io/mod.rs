//! Input/output surfaces: the feature-description file parser, the
//! goal-attribute CSV writer, and the optional debug VTK exporter.

pub mod csv;
pub mod feature_file;

#[cfg(feature = "vtk_extras")]
pub mod vtk;

pub use csv::write_goal_attributes;
pub use feature_file::{parse_feature_file, record_to_feature, FeatureRecord};

#[cfg(feature = "vtk_extras")]
pub use vtk::write_debug_volume;
