// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to score focus candidates and pick the best of them.
//!
//! Scoring is direction-major. Each direction's field is acquired once and
//! every candidate takes that direction's weighted contribution before the
//! field is released, so streaming access reads every direction from disk
//! exactly once regardless of the number of candidates.

mod error;
mod weights;

pub use error::SearchError;
pub use weights::{mrt_weight, WeightVector};

use log::{debug, info, warn};
use ndarray::prelude::*;
use ndarray::Zip;
use rand::Rng;
use rayon::prelude::*;

use crate::{
    c64,
    candidates::FocusCandidate,
    config::FocusConfig,
    constants::FOCUS_COMPONENT,
    field::{FieldAccessor, FieldError},
    types::{widen, FieldKind, VoxelIndex},
    voxel::OccupancyMasks,
};

/// A candidate with its hotspot score.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: FocusCandidate,
    /// Mean over the scored surface voxels of `sum_c |E_combined,c|^2`.
    pub score: f64,
    /// The number of surface voxels the mean was taken over.
    pub surface_voxels: usize,
    pub weights: WeightVector,
}

/// One of the selected focus points.
#[derive(Clone, Debug, PartialEq)]
pub struct FocusPoint {
    /// 0 is best.
    pub rank: usize,
    pub voxel: VoxelIndex,
    /// Physical centre of the focus voxel [metres].
    pub centre: [f64; 3],
    pub score: f64,
    pub surface_voxels: usize,
    pub weights: WeightVector,
}

#[derive(Clone, Debug)]
pub struct SearchOutcome {
    /// Best first.
    pub points: Vec<FocusPoint>,
    /// The number of candidates that were scored.
    pub num_scored: usize,
    /// Set when fewer than the requested number of points were found.
    pub short_ranking: bool,
}

/// Per-candidate running state while directions are accumulated.
struct Accumulator {
    voxel: VoxelIndex,
    surface: Vec<VoxelIndex>,
    /// `(surface.len(), 3)`
    combined: Array2<c64>,
    focus_values: Vec<c64>,
}

impl Accumulator {
    fn score(&self) -> f64 {
        if self.surface.is_empty() {
            return 0.0;
        }
        let total: f64 = self.combined.iter().map(|v| v.norm_sqr()).sum();
        total / self.surface.len() as f64
    }
}

pub struct FocusSearchEngine<'a> {
    accessor: &'a dyn FieldAccessor,
    masks: &'a OccupancyMasks,
}

impl<'a> FocusSearchEngine<'a> {
    pub fn new(
        accessor: &'a dyn FieldAccessor,
        masks: &'a OccupancyMasks,
    ) -> Result<Self, SearchError> {
        let got = accessor.num_directions();
        if got < 2 {
            return Err(SearchError::InsufficientDirections { got });
        }
        let grid = accessor.geometry().shape();
        if masks.shape() != grid {
            return Err(SearchError::MaskShape {
                masks: masks.shape(),
                grid,
            });
        }
        Ok(Self { accessor, masks })
    }

    fn field_error(&self, direction: usize) -> impl FnOnce(FieldError) -> SearchError + '_ {
        move |source| SearchError::Field {
            direction,
            label: self.accessor.label(direction),
            source,
        }
    }

    /// The surface voxels in the scoring cube around `voxel`, in raster
    /// order. With `stride > 1`, `ceil(n / stride)` of the `n` surface voxels
    /// are drawn at random without replacement.
    pub fn surface_voxels<R: Rng + ?Sized>(
        &self,
        voxel: VoxelIndex,
        half_width_mm: f64,
        stride: usize,
        rng: &mut R,
    ) -> Vec<VoxelIndex> {
        let cube = self
            .accessor
            .geometry()
            .cube_around(voxel, half_width_mm * 1e-3);
        let all: Vec<VoxelIndex> = cube.voxels().filter(|&v| self.masks.surface[v]).collect();
        if stride <= 1 || all.is_empty() {
            return all;
        }
        let keep = all.len().div_ceil(stride);
        let mut picked = rand::seq::index::sample(rng, all.len(), keep).into_vec();
        picked.sort_unstable();
        picked.into_iter().map(|i| all[i]).collect()
    }

    /// Compute the hotspot score of every candidate. Results are in the
    /// order of `candidates`.
    pub fn score_candidates<R: Rng + ?Sized>(
        &self,
        candidates: &[FocusCandidate],
        half_width_mm: f64,
        stride: usize,
        rng: &mut R,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        let num_directions = self.accessor.num_directions();
        let mut accumulators: Vec<Accumulator> = candidates
            .iter()
            .map(|c| {
                let surface = self.surface_voxels(c.voxel, half_width_mm, stride, rng);
                Accumulator {
                    voxel: c.voxel,
                    combined: Array2::zeros((surface.len(), 3)),
                    surface,
                    focus_values: Vec::with_capacity(num_directions),
                }
            })
            .collect();
        debug!(
            "Scoring {} candidates over {} surface voxels in total",
            accumulators.len(),
            accumulators.iter().map(|a| a.surface.len()).sum::<usize>()
        );

        for d in 0..num_directions {
            let field = self
                .accessor
                .read_full(d, FieldKind::E)
                .map_err(self.field_error(d))?;
            accumulators.par_iter_mut().for_each(|acc| {
                let focus_value = widen(field.at(FOCUS_COMPONENT, acc.voxel));
                let w = mrt_weight(focus_value, num_directions);
                acc.focus_values.push(focus_value);
                for (mut row, &v) in acc.combined.outer_iter_mut().zip(acc.surface.iter()) {
                    for (c, sum) in row.iter_mut().enumerate() {
                        *sum += w * widen(field.at(c, v));
                    }
                }
            });
            debug!("Accumulated direction {}/{}", d + 1, num_directions);
        }

        Ok(candidates
            .iter()
            .zip(accumulators)
            .map(|(&candidate, acc)| ScoredCandidate {
                candidate,
                score: acc.score(),
                surface_voxels: acc.surface.len(),
                weights: WeightVector::from_focus_values(&acc.focus_values),
            })
            .collect())
    }

    /// Score `candidates` and keep the best `config.top_n` of them.
    pub fn search<R: Rng + ?Sized>(
        &self,
        candidates: &[FocusCandidate],
        config: &FocusConfig,
        rng: &mut R,
    ) -> Result<SearchOutcome, SearchError> {
        if candidates.is_empty() {
            return Err(SearchError::NoValidFocusPoints);
        }
        let scored = self.score_candidates(
            candidates,
            config.cube_half_width_mm,
            config.surface_stride,
            rng,
        )?;
        let num_scored = scored.len();
        let short_ranking = num_scored < config.top_n;
        if short_ranking && !config.allow_short_ranking {
            return Err(SearchError::ShortRanking {
                requested: config.top_n,
                got: num_scored,
            });
        }
        if short_ranking {
            warn!(
                "Only {} candidates were scored; returning fewer than the {} requested focus points",
                num_scored, config.top_n
            );
        }

        let geometry = self.accessor.geometry();
        let points: Vec<FocusPoint> = select_top(scored, config.top_n)
            .into_iter()
            .enumerate()
            .map(|(rank, s)| FocusPoint {
                rank,
                voxel: s.candidate.voxel,
                centre: geometry.centre(s.candidate.voxel),
                score: s.score,
                surface_voxels: s.surface_voxels,
                weights: s.weights,
            })
            .collect();
        if let Some(best) = points.first() {
            info!(
                "Best focus point {:?} scores {:.6e} over {} surface voxels",
                best.voxel, best.score, best.surface_voxels
            );
        }
        Ok(SearchOutcome {
            points,
            num_scored,
            short_ranking,
        })
    }

    /// `E_z` of every direction at `voxel`.
    fn focus_values_at(&self, voxel: VoxelIndex) -> Result<Vec<c64>, SearchError> {
        (0..self.accessor.num_directions())
            .map(|d| {
                self.accessor
                    .read_component_at(d, FieldKind::E, FOCUS_COMPONENT, &[voxel])
                    .map(|v| widen(v[0]))
                    .map_err(self.field_error(d))
            })
            .collect()
    }

    /// The MRT weights for focusing on `voxel`.
    pub fn weights_at(&self, voxel: VoxelIndex) -> Result<WeightVector, SearchError> {
        Ok(WeightVector::from_focus_values(&self.focus_values_at(voxel)?))
    }

    /// `|sum_i w_i(r) E_z,i(r)|` at `voxel`, with the weights phase-aligned
    /// at that same voxel.
    pub fn combined_magnitude_at(&self, voxel: VoxelIndex) -> Result<f64, SearchError> {
        let focus_values = self.focus_values_at(voxel)?;
        let weights = WeightVector::from_focus_values(&focus_values);
        Ok(weights
            .weights()
            .iter()
            .zip(&focus_values)
            .map(|(&w, &e)| w * e)
            .sum::<c64>()
            .norm())
    }

    /// The voxel maximising `sum_i |E_z,i(r)|`, which under optimal phasing
    /// is where the combined `E_z` is largest. Needs one full pass per
    /// direction. With `air_only`, only air voxels are considered.
    pub fn worst_case_magnitude_location(
        &self,
        air_only: bool,
    ) -> Result<(VoxelIndex, f64), SearchError> {
        let [sx, sy, sz] = self.accessor.geometry().shape();
        let mut magnitude_sum = Array3::<f64>::zeros((sx, sy, sz));
        for d in 0..self.accessor.num_directions() {
            let field = self
                .accessor
                .read_full(d, FieldKind::E)
                .map_err(self.field_error(d))?;
            Zip::indexed(&mut magnitude_sum)
                .par_for_each(|(i, j, k), s| *s += field.focus_magnitude_at([i, j, k]));
        }

        let mut best: Option<(VoxelIndex, f64)> = None;
        for ((i, j, k), &s) in magnitude_sum.indexed_iter() {
            if air_only && !self.masks.air[[i, j, k]] {
                continue;
            }
            if best.map_or(true, |(_, b)| s > b) {
                best = Some(([i, j, k], s));
            }
        }
        best.ok_or(SearchError::NoValidFocusPoints)
    }
}

/// The best `n` candidates, best first. Equal scores keep insertion order.
/// Only the winners are sorted.
pub fn select_top(mut scored: Vec<ScoredCandidate>, n: usize) -> Vec<ScoredCandidate> {
    let rank = |a: &ScoredCandidate, b: &ScoredCandidate| {
        b.score
            .total_cmp(&a.score)
            .then(a.candidate.order.cmp(&b.candidate.order))
    };
    if n == 0 {
        return vec![];
    }
    if n < scored.len() {
        scored.select_nth_unstable_by(n - 1, rank);
        scored.truncate(n);
    }
    scored.sort_unstable_by(rank);
    scored
}
