// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to find air voxels next to the body surface that are worth
//! considering as focus points.

#[cfg(test)]
mod tests;

use log::{debug, info};
use ndarray::prelude::*;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::{
    grid::{Cube, GridGeometry},
    types::VoxelIndex,
    voxel::OccupancyMasks,
};

#[derive(Error, Debug)]
pub enum CandidateError {
    #[error("None of the {air_voxels} air voxels has at least {min_fraction} of a {half_width_mm} mm cube around it on the body surface")]
    NoValidFocusPoints {
        air_voxels: usize,
        half_width_mm: f64,
        min_fraction: f64,
    },

    #[error("Masks have shape {masks:?}, but the grid has {grid:?} voxels")]
    MaskShape { masks: [usize; 3], grid: [usize; 3] },
}

/// An air voxel that may be used as a focus point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FocusCandidate {
    pub voxel: VoxelIndex,
    /// The number of surface voxels within the validity cube.
    pub surface_count: usize,
    /// Position in the validated set (raster order); used to break ties.
    pub order: usize,
}

/// A summed-area table over a boolean mask, giving the number of set voxels
/// in any box in constant time.
#[derive(Debug, Clone)]
pub struct SurfaceCountTable {
    /// `table[[i, j, k]]` is the count over `[0, i) x [0, j) x [0, k)`.
    table: Array3<u64>,
}

impl SurfaceCountTable {
    pub fn new(mask: ArrayView3<bool>) -> Self {
        let (sx, sy, sz) = mask.dim();
        let mut table = Array3::zeros((sx + 1, sy + 1, sz + 1));
        table
            .slice_mut(s![1.., 1.., 1..])
            .zip_mut_with(&mask, |t, &m| *t = u64::from(m));
        for axis in 0..3 {
            table.accumulate_axis_inplace(Axis(axis), |&prev, cur| *cur += prev);
        }
        Self { table }
    }

    /// The number of set voxels in `cube`.
    pub fn count(&self, cube: &Cube) -> usize {
        let t = |i: usize, j: usize, k: usize| self.table[[i, j, k]];
        let [x0, y0, z0] = cube.lo;
        let [x1, y1, z1] = cube.hi;
        // Grouped so that no intermediate goes negative.
        let added = t(x1, y1, z1) + t(x0, y0, z1) + t(x0, y1, z0) + t(x1, y0, z0);
        let removed = t(x0, y1, z1) + t(x1, y0, z1) + t(x1, y1, z0) + t(x0, y0, z0);
        (added - removed) as usize
    }
}

/// Finds and samples focus candidates.
pub struct CandidateLocator<'a> {
    geometry: &'a GridGeometry,
    masks: &'a OccupancyMasks,
    surface_counts: SurfaceCountTable,
}

impl<'a> CandidateLocator<'a> {
    pub fn new(
        geometry: &'a GridGeometry,
        masks: &'a OccupancyMasks,
    ) -> Result<Self, CandidateError> {
        if masks.shape() != geometry.shape() {
            return Err(CandidateError::MaskShape {
                masks: masks.shape(),
                grid: geometry.shape(),
            });
        }
        Ok(Self {
            geometry,
            masks,
            surface_counts: SurfaceCountTable::new(masks.surface.view()),
        })
    }

    /// The number of surface voxels in the cube of half-width
    /// `half_width_mm` around `voxel`, and that cube.
    pub fn surface_count(&self, voxel: VoxelIndex, half_width_mm: f64) -> (usize, Cube) {
        let cube = self.geometry.cube_around(voxel, half_width_mm * 1e-3);
        (self.surface_counts.count(&cube), cube)
    }

    /// Every air voxel whose cube holds at least `min_fraction` of the cube's
    /// nominal volume in surface voxels. Cubes are clamped at the grid edges,
    /// so only in-bounds voxels are counted.
    pub fn locate(
        &self,
        half_width_mm: f64,
        min_fraction: f64,
    ) -> Result<Vec<FocusCandidate>, CandidateError> {
        let mut validated = vec![];
        let mut air_voxels = 0;
        for ((i, j, k), &air) in self.masks.air.indexed_iter() {
            if !air {
                continue;
            }
            air_voxels += 1;
            let (count, cube) = self.surface_count([i, j, k], half_width_mm);
            if count as f64 >= cube.nominal_volume as f64 * min_fraction {
                validated.push(FocusCandidate {
                    voxel: [i, j, k],
                    surface_count: count,
                    order: validated.len(),
                });
            }
        }
        info!(
            "{} of {} air voxels are valid focus candidates ({} mm cube, fraction {})",
            validated.len(),
            air_voxels,
            half_width_mm,
            min_fraction
        );

        if validated.is_empty() {
            return Err(CandidateError::NoValidFocusPoints {
                air_voxels,
                half_width_mm,
                min_fraction,
            });
        }
        Ok(validated)
    }
}

/// Draw `n` candidates uniformly without replacement. The result keeps the
/// order of `validated`. If there are no more than `n` candidates, all of
/// them are returned.
pub fn sample<R: Rng + ?Sized>(
    validated: &[FocusCandidate],
    n: usize,
    rng: &mut R,
) -> Vec<FocusCandidate> {
    if validated.len() <= n {
        debug!(
            "Using all {} validated candidates ({} requested)",
            validated.len(),
            n
        );
        return validated.to_vec();
    }
    let mut picked = rand::seq::index::sample(rng, validated.len(), n).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| validated[i]).collect()
}
