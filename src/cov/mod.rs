// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The covariance-and-hits builder.
//!
//! One pass over the unflagged samples accumulates, per sky pixel, the
//! noise-weighted pointing outer product and a hit count. After the
//! collective reduction every nonzero-hit pixel's matrix is inverted in
//! place; zero-hit pixels stay all-zero and are never inverted. The
//! products land at caller-named keys in the dataset so later binning
//! calls (and diagnostics) can read them back.

mod error;

pub use error::CovError;

use log::debug;
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::{
    comm::Communicator,
    noise::NoiseModel,
    obs::{Dataset, DEFAULT_FLAG_MASK},
    pixels::{sym_accumulate_outer, sym_invert, HitMap, PixelCov, PixelDist},
    pointing::Pointing,
};

/// Builds the hit map and inverted pixel covariance for a pointing and
/// noise configuration.
///
/// Runs once per configuration; the outputs are then shared read-only by
/// all subsequent binning calls.
pub struct CovAndHits<'a, P: Pointing, N: NoiseModel, C: Communicator> {
    pub pointing: &'a P,
    pub noise: &'a N,
    pub dist: &'a PixelDist,
    pub comm: &'a C,
    pub flag_mask: u8,

    /// Output key for the hit map.
    pub hits: String,

    /// Output key for the (inverted) pixel covariance.
    pub covariance: String,
}

impl<'a, P: Pointing, N: NoiseModel, C: Communicator> CovAndHits<'a, P, N, C> {
    pub fn new(
        pointing: &'a P,
        noise: &'a N,
        dist: &'a PixelDist,
        comm: &'a C,
    ) -> CovAndHits<'a, P, N, C> {
        CovAndHits {
            pointing,
            noise,
            dist,
            comm,
            flag_mask: DEFAULT_FLAG_MASK,
            hits: "hits".to_string(),
            covariance: "covariance".to_string(),
        }
    }

    /// Accumulate, reduce and invert, leaving the products at
    /// [`CovAndHits::hits`] and [`CovAndHits::covariance`].
    pub fn apply(&self, data: &mut Dataset) -> Result<(), CovError> {
        let mut hits = HitMap::zeros(self.dist);
        let mut cov = PixelCov::zeros(self.dist);
        let nnz = self.dist.mode().nnz();

        // Fixed accumulation order: observations in dataset order,
        // detectors row-ascending, samples ascending. Reductions assume
        // every worker used this order.
        for obs in &data.obs {
            let n_samples = obs.n_samples();
            let mut pixels = vec![0_i64; n_samples];
            let mut weights = Array2::zeros((n_samples, nnz));
            for i_det in 0..obs.n_dets() {
                let w = self.noise.detector_weight(&obs.detectors[i_det])?;
                self.pointing
                    .expand(obs, i_det, &mut pixels, &mut weights.view_mut())?;
                for (i_samp, &pixel) in pixels.iter().enumerate() {
                    if !obs.sample_ok(i_det, i_samp, self.flag_mask) {
                        continue;
                    }
                    if let Some(local) = self.dist.local_index(pixel) {
                        hits.data[local] += 1;
                        sym_accumulate_outer(
                            cov.data.row_mut(local).as_slice_mut().unwrap(),
                            weights.row(i_samp).as_slice().unwrap(),
                            w,
                        );
                    }
                }
            }
        }

        self.comm.allreduce_sum_i64(hits.data.as_slice_mut().unwrap());
        self.comm.allreduce_sum_f64(cov.data.as_slice_mut().unwrap());

        invert_covariance(&mut cov, &hits)?;

        let hit_pixels = hits.data.iter().filter(|&&h| h > 0).count();
        debug!(
            "covariance built: {hit_pixels}/{} local pixels hit",
            self.dist.n_local()
        );

        data.hits.insert(self.hits.clone(), hits);
        data.covs.insert(self.covariance.clone(), cov);
        Ok(())
    }
}

/// Invert every nonzero-hit pixel's covariance matrix in place.
///
/// Zero-hit pixels must be all-zero and are skipped; a zero-hit pixel with
/// accumulated data means the builder's single-pass invariant was broken
/// and is reported as [`CovError::SingularPixel`]. Nonzero-hit pixels whose
/// matrix is too ill-conditioned to invert (e.g. a single polarization
/// angle in IQU mode) are dropped: their rows are zeroed, excluding them
/// from every later binning exactly like unhit pixels.
pub fn invert_covariance(cov: &mut PixelCov, hits: &HitMap) -> Result<(), CovError> {
    if cov.is_inverted() {
        return Err(CovError::AlreadyInverted);
    }

    #[derive(PartialEq)]
    enum Pix {
        Ok,
        Empty,
        Singular,
        Degenerate,
    }

    let statuses: Vec<Pix> = cov
        .data
        .outer_iter_mut()
        .into_par_iter()
        .zip(hits.data.as_slice().unwrap().par_iter())
        .map(|(mut row, &h)| {
            let packed = row.as_slice_mut().unwrap();
            if h == 0 {
                if packed.iter().any(|&v| v != 0.0) {
                    Pix::Singular
                } else {
                    Pix::Empty
                }
            } else if sym_invert(packed) {
                Pix::Ok
            } else {
                packed.fill(0.0);
                Pix::Degenerate
            }
        })
        .collect();

    if let Some(pixel) = statuses.iter().position(|s| *s == Pix::Singular) {
        return Err(CovError::SingularPixel { pixel });
    }
    let degenerate = statuses.iter().filter(|s| **s == Pix::Degenerate).count();
    if degenerate > 0 {
        debug!("dropped {degenerate} ill-conditioned nonzero-hit pixels");
    }

    cov.set_inverted();
    Ok(())
}
