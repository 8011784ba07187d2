// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all destripe-related errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DestripeError {
    #[error("{0}")]
    Obs(#[from] crate::obs::ObsError),

    #[error("{0}")]
    Pointing(#[from] crate::pointing::PointingError),

    #[error("{0}")]
    Noise(#[from] crate::noise::NoiseError),

    #[error("{0}")]
    Cov(#[from] crate::cov::CovError),

    #[error("{0}")]
    Bin(#[from] crate::binning::BinError),

    #[error("{0}")]
    Template(#[from] crate::templates::TemplateError),

    #[error("{0}")]
    Solve(#[from] crate::solve::SolveError),
}
