// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The pointing seam: mapping a detector sample to a sky pixel index and a
//! Stokes-weight vector.
//!
//! How sky pixels are numbered or projected is not this crate's business;
//! any pixelization scheme can sit behind the [`Pointing`] trait. A small
//! deterministic implementation, [`GridPointing`], is provided for tests
//! and demonstrations.

mod error;

pub use error::PointingError;

use ndarray::prelude::*;

use crate::obs::Observation;

/// The Stokes components carried per sky pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StokesMode {
    /// Intensity only.
    I,
    /// Intensity and linear polarization.
    Iqu,
}

impl StokesMode {
    /// The number of map values per pixel.
    pub fn nnz(self) -> usize {
        match self {
            StokesMode::I => 1,
            StokesMode::Iqu => 3,
        }
    }

    /// The number of packed elements in a per-pixel symmetric covariance.
    pub fn n_cov(self) -> usize {
        let nnz = self.nnz();
        nnz * (nnz + 1) / 2
    }
}

/// Maps detector samples to sky pixels and Stokes weights.
///
/// Implementations must be pure given fixed state: calling
/// [`Pointing::expand`] twice with identical input must populate identical
/// output. A negative pixel index marks a sample the pointing itself
/// excludes (e.g. off-sky); such samples are skipped by every accumulation
/// pass in this crate.
pub trait Pointing: Send + Sync {
    fn mode(&self) -> StokesMode;

    /// The number of pixels this pointing can produce indices for.
    fn n_pix(&self) -> usize;

    /// Populate `pixels` (length `n_samples`) and `weights` (shape
    /// `(n_samples, nnz)`) for one detector of an observation.
    fn expand(
        &self,
        obs: &Observation,
        i_det: usize,
        pixels: &mut [i64],
        weights: &mut ArrayViewMut2<f64>,
    ) -> Result<(), PointingError>;
}

/// A deterministic boresight-scan pixelizer.
///
/// Sweeps the pixel space at one pixel per sample with a fixed per-detector
/// phase offset, and rotates the polarization angle sample-to-sample so
/// that revisited pixels see distinct angles. Not a physical projection;
/// it exists to give the solver a pointing with full, well-conditioned
/// pixel coverage.
#[derive(Debug, Clone)]
pub struct GridPointing {
    n_pix: usize,
    mode: StokesMode,
    /// Pixel offset between consecutive detectors.
    det_phase: usize,
    /// Number of distinct polarization angles in a rotation period.
    n_psi: usize,
}

impl GridPointing {
    pub fn new(n_pix: usize, mode: StokesMode) -> GridPointing {
        GridPointing {
            n_pix,
            mode,
            det_phase: 17,
            n_psi: 16,
        }
    }

    fn psi(&self, i_det: usize, i_samp: usize) -> f64 {
        let step = (i_samp + i_det * 3) % self.n_psi;
        std::f64::consts::PI * step as f64 / self.n_psi as f64
    }
}

impl Pointing for GridPointing {
    fn mode(&self) -> StokesMode {
        self.mode
    }

    fn n_pix(&self) -> usize {
        self.n_pix
    }

    fn expand(
        &self,
        obs: &Observation,
        i_det: usize,
        pixels: &mut [i64],
        weights: &mut ArrayViewMut2<f64>,
    ) -> Result<(), PointingError> {
        let n_samples = obs.n_samples();
        if pixels.len() != n_samples || weights.nrows() != n_samples {
            return Err(PointingError::BufferShape {
                expected: n_samples,
                pixels: pixels.len(),
                weights: weights.nrows(),
            });
        }
        if weights.ncols() != self.mode.nnz() {
            return Err(PointingError::WeightDims {
                expected: self.mode.nnz(),
                got: weights.ncols(),
            });
        }

        for (i_samp, (pixel, mut weight)) in
            pixels.iter_mut().zip(weights.outer_iter_mut()).enumerate()
        {
            *pixel = ((i_det * self.det_phase + i_samp) % self.n_pix) as i64;
            match self.mode {
                StokesMode::I => {
                    weight[0] = 1.0;
                }
                StokesMode::Iqu => {
                    let two_psi = 2.0 * self.psi(i_det, i_samp);
                    weight[0] = 1.0;
                    weight[1] = two_psi.cos();
                    weight[2] = two_psi.sin();
                }
            }
        }
        Ok(())
    }
}
