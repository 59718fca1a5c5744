// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Worst-case focus-point search for massive-MIMO exposure assessment.

Given one FDTD field solution per incident direction over a voxelised body
model, find the air voxels near the skin where a beamforming base station
would produce the largest surface exposure, compute the phase weights that
focus the beam there and write out the superposed field.
 */

pub mod candidates;
pub mod combine;
pub mod config;
mod constants;
pub mod errors;
pub mod field;
pub mod grid;
pub(crate) mod read_hdf5;
pub mod run;
pub mod search;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod types;
pub mod voxel;

pub use candidates::{CandidateError, CandidateLocator, FocusCandidate, SurfaceCountTable};
pub use combine::{CombineError, CombineMode, CombinedField, FieldCombiner, Region};
pub use config::{ConfigError, FocusConfig, ResourceMode};
pub use constants::DEFAULT_SURFACE_KEYWORD;
pub use errors::FocusError;
pub use field::{
    open_accessor, DirectionalField, FieldAccessor, FieldError, FieldFile, InMemoryAccessor,
    ResidentField, StreamingAccessor,
};
pub use grid::{Cube, GridError, GridGeometry, VoxelGrid};
pub use run::{run, run_with_rng, FocusPointSummary, RunInputs, RunSummary};
pub use search::{
    mrt_weight, select_top, FocusPoint, FocusSearchEngine, ScoredCandidate, SearchError,
    SearchOutcome, WeightVector,
};
pub use types::{FieldKind, VoxelIndex};
pub use voxel::{ClassificationError, OccupancyMasks, TissueModel};

// Re-exports.
pub use num_complex::{Complex32 as c32, Complex64 as c64};
