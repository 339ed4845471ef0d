//! Fills unassigned ("gap") voxels left behind after rasterisation by
//! majority vote over the 6-connected (face) neighbourhood, with wrap
//! under periodic boundaries, iterating until no further voxel changes,
//! then zeroing whatever remains.
//!
//! The tally phase (read-only: every voxel's winner depends only on its
//! own neighbours, never on another gap voxel's outcome this pass) runs
//! over `rayon`'s data-parallel iterator; the commit phase that follows
//! writes each voxel independently.

use rayon::prelude::*;
use smallvec::SmallVec;

/// A dense voxel volume's feature-id buffer plus the dims needed to
/// index it; gap filling operates directly on this buffer in place.
pub struct GapFillGrid<'a> {
    pub dims: [i64; 3],
    pub periodic: bool,
    pub feature_ids: &'a mut [i32],
}

impl<'a> GapFillGrid<'a> {
    fn flat_index(&self, i: i64, j: i64, k: i64) -> usize {
        (k * self.dims[0] * self.dims[1] + j * self.dims[0] + i) as usize
    }

    fn coords_of(&self, flat: usize) -> (i64, i64, i64) {
        let plane_size = (self.dims[0] * self.dims[1]) as usize;
        let k = flat / plane_size;
        let rem = flat % plane_size;
        let j = rem / self.dims[0] as usize;
        let i = rem % self.dims[0] as usize;
        (i as i64, j as i64, k as i64)
    }
}

/// Repeatedly assigns every voxel with a negative feature id to the
/// 6-neighbour feature that appears most often among its still-valid
/// neighbours (ties broken by the lowest feature id), stopping when a
/// pass makes no further assignment. Any voxel that
/// stays unassigned (fully isolated, or only ever adjacent to other
/// gaps) is finally zeroed to background.
///
/// Returns the number of passes performed.
pub fn fill_gaps(grid: &mut GapFillGrid) -> u32 {
    let total = grid.feature_ids.len();
    let mut passes = 0u32;
    let mut previous_gap_count = -1i64;

    loop {
        passes += 1;

        let winning_id: Vec<i32> = (0..total)
            .into_par_iter()
            .map(|flat| {
                if grid.feature_ids[flat] >= 0 {
                    return -1;
                }
                let (i, j, k) = grid.coords_of(flat);
                let neighbors = face_neighbors(i, j, k, grid.dims, grid.periodic);

                let mut votes: SmallVec<[i32; 6]> = SmallVec::new();
                for neighbor in neighbors.iter().flatten() {
                    let neighbor_flat = grid.flat_index(neighbor.0, neighbor.1, neighbor.2);
                    let candidate = grid.feature_ids[neighbor_flat];
                    if candidate > 0 {
                        votes.push(candidate);
                    }
                }
                winning_neighbor(&votes)
            })
            .collect();

        let true_gap_count = (0..total).filter(|&flat| grid.feature_ids[flat] < 0).count() as i64;

        if true_gap_count == 0 || true_gap_count == previous_gap_count {
            if true_gap_count != 0 {
                for id in grid.feature_ids.iter_mut() {
                    if *id < 0 {
                        *id = 0;
                    }
                }
            }
            return passes;
        }
        previous_gap_count = true_gap_count;

        for flat in 0..total {
            if grid.feature_ids[flat] >= 0 {
                continue;
            }
            if winning_id[flat] > 0 {
                grid.feature_ids[flat] = winning_id[flat];
            }
        }
    }
}

/// Picks the most frequent id among `votes`, ties broken by the lowest
/// id. `votes` holds at most 6 entries (one per face neighbour) so a
/// linear scan is cheaper than maintaining a shared counting buffer,
/// and keeps each voxel's computation independent for the parallel
/// tally phase above.
fn winning_neighbor(votes: &[i32]) -> i32 {
    let mut best_id = -1i32;
    let mut best_count = 0i32;
    for &id in votes {
        let count = votes.iter().filter(|&&v| v == id).count() as i32;
        if count > best_count || (count == best_count && (best_id < 0 || id < best_id)) {
            best_count = count;
            best_id = id;
        }
    }
    best_id
}

/// The 6 face-adjacent neighbour coordinates, wrapped under periodic
/// boundaries or `None` where the neighbour would fall outside a
/// clipped grid.
fn face_neighbors(i: i64, j: i64, k: i64, dims: [i64; 3], periodic: bool) -> [Option<(i64, i64, i64)>; 6] {
    let wrap = |v: i64, extent: i64| if periodic { v.rem_euclid(extent) } else { v };
    let bounded = |v: i64, extent: i64| periodic || (0..extent).contains(&v);

    let candidates = [
        (i, j, k - 1),
        (i, j - 1, k),
        (i - 1, j, k),
        (i + 1, j, k),
        (i, j + 1, k),
        (i, j, k + 1),
    ];
    let mut out = [None; 6];
    for (slot, &(ci, cj, ck)) in out.iter_mut().zip(candidates.iter()) {
        if bounded(ci, dims[0]) && bounded(cj, dims[1]) && bounded(ck, dims[2]) {
            *slot = Some((wrap(ci, dims[0]), wrap(cj, dims[1]), wrap(ck, dims[2])));
        }
    }
    out
}
