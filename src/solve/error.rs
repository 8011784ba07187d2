// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolveError {
    #[error("The pointing produces pixel indices up to {pointing} but the pixel distribution covers only {dist}")]
    PixelSpaceMismatch { pointing: usize, dist: usize },

    #[error("{0}")]
    Bin(#[from] crate::binning::BinError),

    #[error("{0}")]
    Template(#[from] crate::templates::TemplateError),

    #[error("{0}")]
    Noise(#[from] crate::noise::NoiseError),

    #[error("{0}")]
    Obs(#[from] crate::obs::ObsError),
}
