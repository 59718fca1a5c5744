// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with searching for focus points.

use thiserror::Error;

use crate::field::FieldError;

#[derive(Error, Debug)]
pub enum SearchError {
    /// Superposition needs at least two sources.
    #[error("Got {got} directional field(s), but at least 2 are needed to combine them")]
    InsufficientDirections { got: usize },

    #[error("There are no focus candidates to score")]
    NoValidFocusPoints,

    #[error("Asked for the best {requested} focus points, but only {got} candidates were scored")]
    ShortRanking { requested: usize, got: usize },

    #[error("Masks have shape {masks:?}, but the fields' grid has {grid:?} voxels")]
    MaskShape { masks: [usize; 3], grid: [usize; 3] },

    #[error("While reading direction {direction} ('{label}'): {source}")]
    Field {
        direction: usize,
        label: String,
        #[source]
        source: FieldError,
    },
}
