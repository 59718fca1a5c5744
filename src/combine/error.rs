// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with combining directional fields.

use thiserror::Error;

use crate::{field::FieldError, types::VoxelIndex};

#[derive(Error, Debug)]
pub enum CombineError {
    #[error("Got {weights} weights for {directions} directions")]
    WeightCount { weights: usize, directions: usize },

    #[error("There are no directions to combine")]
    NoDirections,

    #[error("Couldn't assemble the combined field: {0}")]
    Assemble(#[source] FieldError),

    #[error("Focus voxel {voxel:?} is outside the grid of {shape:?} voxels")]
    VoxelOutOfBounds {
        voxel: VoxelIndex,
        shape: [usize; 3],
    },

    #[error("While reading direction {direction} ('{label}'): {source}")]
    Field {
        direction: usize,
        label: String,
        #[source]
        source: FieldError,
    },

    #[error("Template '{file}' doesn't share the fields' grid")]
    TemplateGrid { file: String },

    #[error("Template '{file}' has no {what}")]
    TemplateLayout { file: String, what: String },

    #[error("Couldn't copy template to '{file}': {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't write combined field to '{file}': {source}")]
    Write {
        file: String,
        #[source]
        source: hdf5::Error,
    },
}
