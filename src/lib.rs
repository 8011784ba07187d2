// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Generalized least-squares destriping map-maker core for time-ordered
detector data.

This crate provides the matrix-free building blocks of the destriping
normal equations: the right-hand-side builder and left-hand-side operator
that an outer conjugate-gradient loop calls repeatedly to solve for
template amplitudes. Pointing, noise modelling and inter-worker reduction
are injected through narrow traits so that the numerical core stays
independent of any particular pixelization scheme or transport.
 */

pub mod binning;
pub mod comm;
pub mod cov;
mod error;
pub mod noise;
pub mod obs;
pub mod pixels;
pub mod pointing;
pub mod solve;
pub mod templates;

#[cfg(test)]
pub(crate) mod tests;

// Re-exports.
pub use binning::{scan_map, BinMap};
pub use comm::{Communicator, SerialComm};
pub use cov::CovAndHits;
pub use error::DestripeError;
pub use noise::{DiagonalNoise, NoiseModel, NoiseWeight};
pub use obs::{Dataset, Observation, DEFAULT_FLAG_MASK};
pub use pixels::{HitMap, PixelCov, PixelDist, SkyMap};
pub use pointing::{GridPointing, Pointing, StokesMode};
pub use solve::{SolverLhs, SolverRhs};
pub use templates::{Amplitudes, AmplitudesMap, Offset, Template, TemplateMatrix};
