//! Island cleanup: flood-fills each feature's voxels via 26-connectivity,
//! keeps only the largest connected component per feature id, and drops
//! any component smaller than its phase's minimum-feature-volume
//! threshold unless it touches the volume's outer surface. Dropped voxels
//! are marked as gaps (`-1`) for a subsequent
//! [`crate::gap_filler::fill_gaps`] pass.
//!
//! Connectivity uses the full 26-neighbour (corner- and edge-connected)
//! stencil rather than only the 6 face neighbours, so components that
//! only touch diagonally still count as one island.

/// Per-phase minimum retained island size, already converted from a
/// minimum diameter into a voxel count (`pi/6 * min_diameter^3 /
/// voxel_volume`).
pub struct MinIslandSize {
    pub by_phase: Vec<i64>,
}

impl MinIslandSize {
    pub fn for_phase(&self, phase: usize) -> i64 {
        self.by_phase.get(phase).copied().unwrap_or(0)
    }
}

/// Flood-fills 26-connected components sharing a feature id, retaining
/// only the largest component encountered so far for that id (earlier,
/// smaller components already found for the same id are demoted to
/// gaps), and demotes any component below the phase's minimum size that
/// does not touch the outer surface. `cell_phases[v]` gives the phase
/// index backing voxel `v`'s current feature id, needed to look up the
/// size threshold.
pub fn cleanup_islands(
    dims: [i64; 3],
    feature_ids: &mut [i32],
    cell_phases: &[u32],
    min_size: &MinIslandSize,
    periodic: bool,
) {
    let total = feature_ids.len();
    let mut checked = vec![false; total];
    // Largest surviving component found so far, per feature id.
    let mut best_component: crate::MapType<i32, Vec<usize>> = crate::new_map();

    for start in 0..total {
        if checked[start] || feature_ids[start] <= 0 {
            continue;
        }
        let id = feature_ids[start];
        let (component, touches_surface) = flood_fill(start, id, dims, feature_ids, &mut checked, periodic);

        match best_component.get(&id) {
            Some(existing) if existing.len() >= component.len() => {
                for &voxel in &component {
                    feature_ids[voxel] = -1;
                }
            }
            Some(existing) => {
                for &voxel in existing {
                    feature_ids[voxel] = -1;
                }
                best_component.insert(id, component);
            }
            None => {
                let phase = cell_phases[start] as usize;
                let threshold = min_size.for_phase(phase);
                if (component.len() as i64) < threshold && !touches_surface {
                    for &voxel in &component {
                        feature_ids[voxel] = -1;
                    }
                } else {
                    best_component.insert(id, component);
                }
            }
        }
    }
}

fn flood_fill(
    start: usize,
    id: i32,
    dims: [i64; 3],
    feature_ids: &[i32],
    checked: &mut [bool],
    periodic: bool,
) -> (Vec<usize>, bool) {
    let mut stack = vec![start];
    let mut component = Vec::new();
    let mut touches_surface = false;
    checked[start] = true;

    while let Some(index) = stack.pop() {
        component.push(index);
        let (column, row, plane) = coords_of(index, dims);
        if column == 0 || column == dims[0] - 1 || row == 0 || row == dims[1] - 1 || plane == 0 || plane == dims[2] - 1 {
            touches_surface = true;
        }

        for neighbor in neighbors_26(column, row, plane, dims, periodic) {
            let Some((ni, nj, nk)) = neighbor else { continue };
            let neighbor_index = flat_index(ni, nj, nk, dims);
            if !checked[neighbor_index] && feature_ids[neighbor_index] == id {
                checked[neighbor_index] = true;
                stack.push(neighbor_index);
            }
        }
    }

    (component, touches_surface)
}

fn flat_index(i: i64, j: i64, k: i64, dims: [i64; 3]) -> usize {
    (k * dims[0] * dims[1] + j * dims[0] + i) as usize
}

fn coords_of(flat: usize, dims: [i64; 3]) -> (i64, i64, i64) {
    let plane_size = (dims[0] * dims[1]) as usize;
    let k = (flat / plane_size) as i64;
    let rem = flat % plane_size;
    let j = (rem / dims[0] as usize) as i64;
    let i = (rem % dims[0] as usize) as i64;
    (i, j, k)
}

/// All 26 neighbours of `(i,j,k)` (every combination of `{-1,0,1}` per
/// axis except `(0,0,0)`), wrapped (periodic) or bounds-checked
/// (non-periodic) independently per axis.
fn neighbors_26(i: i64, j: i64, k: i64, dims: [i64; 3], periodic: bool) -> [Option<(i64, i64, i64)>; 26] {
    let wrap = |v: i64, extent: i64| if periodic { v.rem_euclid(extent) } else { v };
    let bounded = |v: i64, extent: i64| periodic || (0..extent).contains(&v);

    let mut out = [None; 26];
    let mut slot = 0;
    for di in -1..=1 {
        for dj in -1..=1 {
            for dk in -1..=1 {
                if di == 0 && dj == 0 && dk == 0 {
                    continue;
                }
                let (ci, cj, ck) = (i + di, j + dj, k + dk);
                if bounded(ci, dims[0]) && bounded(cj, dims[1]) && bounded(ck, dims[2]) {
                    out[slot] = Some((wrap(ci, dims[0]), wrap(cj, dims[1]), wrap(ck, dims[2])));
                }
                slot += 1;
            }
        }
    }
    out
}
