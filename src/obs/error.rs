// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObsError {
    #[error("Observation '{obs}' has no timestream buffer named '{key}'")]
    MissingDetData { obs: String, key: String },

    #[error("Timestream buffer '{key}' in observation '{obs}' has shape {got:?}; the observation geometry requires {expected:?}")]
    ShapeMismatch {
        obs: String,
        key: String,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("No sky map named '{key}' in the dataset")]
    MissingMap { key: String },

    #[error("No hit map named '{key}' in the dataset")]
    MissingHits { key: String },

    #[error("No pixel covariance named '{key}' in the dataset")]
    MissingCov { key: String },
}
