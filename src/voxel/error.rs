// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading and classifying the tissue model.

use thiserror::Error;

use crate::grid::GridError;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Specified tissue file '{0}' doesn't exist")]
    FileDoesntExist(String),

    #[error("No mesh with a voxel array was found in '{0}'; is this a voxelised tissue file?")]
    NoMesh(String),

    #[error("The tissue-id mapping in '{0}' is empty")]
    EmptyTissueMap(String),

    #[error("'{file}' has {ids} entries in its id map but {materials} material identifiers")]
    MapLengthMismatch {
        file: String,
        ids: usize,
        materials: usize,
    },

    #[error("Tissue id {id} in '{file}' refers to material {material}, which has no name")]
    UnnamedMaterial { file: String, id: u16, material: u32 },

    #[error("Bad voxel grid in '{file}': {source}")]
    Grid {
        file: String,
        #[source]
        source: GridError,
    },

    /// An error associated with the hdf5 crate.
    #[error("HDF5 error while reading '{file}': {source}")]
    Hdf5 {
        file: String,
        #[source]
        source: hdf5::Error,
    },
}
