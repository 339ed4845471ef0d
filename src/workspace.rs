//! Workspace for reusing allocated memory between multiple packing runs.

use std::fmt;
use std::fmt::Debug;

use crate::rasterizer::RasterBuffers;

/// Reusable scratch memory for one packing run, returned to the caller
/// embedded in the run result so a subsequent run on the same output
/// extents can reuse its allocations instead of starting from scratch.
///
/// Carries no `ThreadLocal`: the only rayon use in this crate (the
/// gap-filler tally phase) is a stateless `par_iter().map(...)` with no
/// per-thread scratch to cache, so a single shared buffer set is
/// sufficient.
#[derive(Default)]
pub struct PackingWorkspace {
    raster_buffers: Option<RasterBuffers>,
}

impl PackingWorkspace {
    /// Returns the rasterisation claim buffers sized to `dims`, reusing
    /// and clearing the existing allocation when the dims match, or
    /// allocating fresh ones otherwise.
    pub(crate) fn raster_buffers(&mut self, dims: [i64; 3]) -> &mut RasterBuffers {
        match &self.raster_buffers {
            Some(existing) if existing.dims() == dims => {
                self.raster_buffers.as_mut().unwrap().reset();
            }
            _ => {
                self.raster_buffers = Some(RasterBuffers::new(dims));
            }
        }
        self.raster_buffers.as_mut().unwrap()
    }
}

impl Clone for PackingWorkspace {
    /// Returns a new default workspace without any allocated memory.
    fn clone(&self) -> Self {
        PackingWorkspace::default()
    }
}

impl Debug for PackingWorkspace {
    /// Only prints the name of the type to the formatter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackingWorkspace").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_buffers_are_reallocated_on_dims_change() {
        let mut workspace = PackingWorkspace::default();
        workspace.raster_buffers([2, 2, 2]);
        assert_eq!(workspace.raster_buffers([2, 2, 2]).dims(), [2, 2, 2]);
        assert_eq!(workspace.raster_buffers([4, 4, 4]).dims(), [4, 4, 4]);
    }

    #[test]
    fn clone_returns_an_empty_workspace() {
        let mut workspace = PackingWorkspace::default();
        workspace.raster_buffers([2, 2, 2]);
        let cloned = workspace.clone();
        assert!(cloned.raster_buffers.is_none());
    }
}
