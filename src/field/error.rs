// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading directional fields.

use thiserror::Error;

use crate::{grid::GridError, types::FieldKind};

#[derive(Error, Debug)]
pub enum FieldError {
    #[error("Specified field file '{0}' doesn't exist")]
    FileDoesntExist(String),

    /// Reading a field container failed.
    #[error("Couldn't read field data from '{file}': {source}")]
    DataAccess {
        file: String,
        #[source]
        source: hdf5::Error,
    },

    #[error("'{file}' has no mesh with axis arrays")]
    NoMesh { file: String },

    #[error("Bad grid in '{file}': {source}")]
    Grid {
        file: String,
        #[source]
        source: GridError,
    },

    /// Combining fields over different grids is meaningless.
    #[error("Grid of '{file}' doesn't match '{reference}' along axis {axis}: {detail}")]
    GridMismatch {
        file: String,
        reference: String,
        axis: usize,
        detail: String,
    },

    #[error("'{file}' has no {kind} field snapshot")]
    MissingField { file: String, kind: FieldKind },

    #[error("Component {component} of the {kind} field in '{file}' has shape {shape:?}; expected 3 non-empty spatial dimensions followed by (re, im)")]
    ComponentShape {
        file: String,
        kind: FieldKind,
        component: usize,
        shape: Vec<usize>,
    },

    #[error("Component {component} of the {kind} field for direction {direction} has shape {got:?}, but direction 0 has {expected:?}")]
    InconsistentComponents {
        direction: usize,
        kind: FieldKind,
        component: usize,
        expected: [usize; 3],
        got: [usize; 3],
    },

    #[error("Component {component} of a field has no samples")]
    EmptyComponent { component: usize },

    #[error("Window {lo:?}..{hi:?} is empty or outside a component of shape {shape:?}")]
    BadWindow {
        lo: [usize; 3],
        hi: [usize; 3],
        shape: [usize; 3],
    },

    #[error("No directional fields were supplied")]
    NoDirections,

    #[error("Direction {direction} was requested, but only {num_directions} directions are available")]
    DirectionOutOfRange {
        direction: usize,
        num_directions: usize,
    },

    #[error("Direction {requested} was requested while direction {resident} is still resident; only one field may be loaded at a time")]
    AlreadyResident { resident: usize, requested: usize },
}
