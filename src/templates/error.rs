// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template '{name}' was used before being bound to a dataset")]
    Unbound { name: String },

    #[error("Amplitude vector for template '{name}' has length {got}; the template declares {expected}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("The amplitude collection has no entry for template '{name}'")]
    MissingAmplitudes { name: String },

    #[error("{0}")]
    Obs(#[from] crate::obs::ObsError),
}
