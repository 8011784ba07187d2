// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PointingError {
    #[error("Pointing buffers disagree with the observation: {expected} samples expected, got {pixels} pixel slots and {weights} weight rows")]
    BufferShape {
        expected: usize,
        pixels: usize,
        weights: usize,
    },

    #[error("Weight buffer carries {got} Stokes components; the pointing produces {expected}")]
    WeightDims { expected: usize, got: usize },
}
