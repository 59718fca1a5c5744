// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Errors associated with all aspects of a focus-point search.
 */

use thiserror::Error;

use crate::{
    candidates::CandidateError, combine::CombineError, config::ConfigError, field::FieldError,
    search::SearchError, voxel::ClassificationError,
};

#[derive(Error, Debug)]
pub enum FocusError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Candidates(#[from] CandidateError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Combine(#[from] CombineError),

    #[error("Couldn't write '{file}': {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}
