// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovError {
    #[error("Local pixel {pixel} has zero hits but a nonzero covariance; accumulation and hit counting have diverged")]
    SingularPixel { pixel: usize },

    #[error("The pixel covariance has already been inverted")]
    AlreadyInverted,

    #[error("{0}")]
    Pointing(#[from] crate::pointing::PointingError),

    #[error("{0}")]
    Noise(#[from] crate::noise::NoiseError),

    #[error("{0}")]
    Obs(#[from] crate::obs::ObsError),
}
