// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Map binning: the least-squares projection of a noise-weighted timestream
//! onto sky pixels, and its forward counterpart, scanning a sky map back
//! into a timestream.
//!
//! The binned estimate is `map[p] = invcov[p] · acc[p]` per pixel, where
//! `acc` accumulates `weight · pointing · sample`. The operator is
//! block-diagonal by pixel by construction: each pixel is a small packed
//! symmetric mat-vec, never a global solve.

mod error;
#[cfg(test)]
mod tests;

pub use error::BinError;

use itertools::izip;
use log::debug;
use ndarray::prelude::*;
use ndarray::Zip;

use crate::{
    comm::Communicator,
    noise::NoiseModel,
    obs::{Dataset, Observation, DEFAULT_FLAG_MASK},
    pixels::{sym_mult_vec, PixelDist, SkyMap},
    pointing::Pointing,
};

/// Bins a timestream into a sky map through a precomputed inverted pixel
/// covariance.
///
/// The diagonal noise weighting is applied internally during accumulation;
/// feed this operator the *unweighted* timestream. The covariance is read
/// by key and shared read-only: binning through a cached covariance is
/// bit-for-bit identical to binning through a freshly rebuilt one, because
/// this operator keeps no state of its own between calls.
pub struct BinMap<'a, P: Pointing, N: NoiseModel, C: Communicator> {
    pub pointing: &'a P,
    pub noise: &'a N,
    pub dist: &'a PixelDist,
    pub comm: &'a C,
    pub flag_mask: u8,

    /// Key of the inverted pixel covariance to apply.
    pub covariance: String,

    /// Output key for the binned map.
    pub binned: String,
}

impl<'a, P: Pointing, N: NoiseModel, C: Communicator> BinMap<'a, P, N, C> {
    pub fn new(
        pointing: &'a P,
        noise: &'a N,
        dist: &'a PixelDist,
        comm: &'a C,
        covariance: impl Into<String>,
    ) -> BinMap<'a, P, N, C> {
        BinMap {
            pointing,
            noise,
            dist,
            comm,
            flag_mask: DEFAULT_FLAG_MASK,
            covariance: covariance.into(),
            binned: "binned".to_string(),
        }
    }

    /// Bin the buffer at `det_data`, leaving the map at
    /// [`BinMap::binned`].
    pub fn apply(&self, data: &mut Dataset, det_data: &str) -> Result<(), BinError> {
        if !data.cov(&self.covariance)?.is_inverted() {
            return Err(BinError::NotInverted {
                key: self.covariance.clone(),
            });
        }

        let nnz = self.dist.mode().nnz();
        let mut acc = SkyMap::zeros(self.dist);

        // Same fixed accumulation order as the covariance builder.
        for obs in &data.obs {
            let n_samples = obs.n_samples();
            let mut pixels = vec![0_i64; n_samples];
            let mut weights = Array2::zeros((n_samples, nnz));
            for i_det in 0..obs.n_dets() {
                let w = self.noise.detector_weight(&obs.detectors[i_det])?;
                self.pointing
                    .expand(obs, i_det, &mut pixels, &mut weights.view_mut())?;
                let det = obs.detdata(det_data)?.row(i_det);
                for (i_samp, (&pixel, weight, &d)) in
                    izip!(&pixels, weights.outer_iter(), det).enumerate()
                {
                    if !obs.sample_ok(i_det, i_samp, self.flag_mask) {
                        continue;
                    }
                    if let Some(local) = self.dist.local_index(pixel) {
                        let wd = w * d;
                        let mut acc_pix = acc.data.row_mut(local);
                        for (a, &p) in acc_pix.iter_mut().zip(weight) {
                            *a += wd * p;
                        }
                    }
                }
            }
        }

        self.comm.allreduce_sum_f64(acc.data.as_slice_mut().unwrap());

        // The per-pixel small dense solve.
        let invcov = data.cov(&self.covariance)?;
        let mut map = SkyMap::zeros(self.dist);
        Zip::from(map.data.outer_iter_mut())
            .and(invcov.data.outer_iter())
            .and(acc.data.outer_iter())
            .par_for_each(|mut out, inv, acc| {
                sym_mult_vec(
                    inv.as_slice().unwrap(),
                    acc.as_slice().unwrap(),
                    out.as_slice_mut().unwrap(),
                );
            });

        debug!("binned '{det_data}' into '{}'", self.binned);
        data.maps.insert(self.binned.clone(), map);
        Ok(())
    }
}

/// Project a sky map through the pointing into a timestream.
///
/// With `subtract` set, the projection is subtracted from the named buffer
/// instead of added; this is the sky-subtraction step of the solver's Z
/// filter. Samples whose pixel is outside the local distribution are left
/// untouched.
pub fn scan_map<P: Pointing>(
    pointing: &P,
    dist: &PixelDist,
    map: &SkyMap,
    obs_list: &mut [Observation],
    det_data: &str,
    subtract: bool,
) -> Result<(), BinError> {
    let nnz = dist.mode().nnz();
    for obs in obs_list {
        let n_samples = obs.n_samples();
        let mut pixels = vec![0_i64; n_samples];
        let mut weights = Array2::zeros((n_samples, nnz));
        for i_det in 0..obs.n_dets() {
            pointing.expand(obs, i_det, &mut pixels, &mut weights.view_mut())?;
            let mut det = obs.detdata_mut(det_data)?.row_mut(i_det);
            for (i_samp, &pixel) in pixels.iter().enumerate() {
                if let Some(local) = dist.local_index(pixel) {
                    let val: f64 = map
                        .data
                        .row(local)
                        .iter()
                        .zip(weights.row(i_samp))
                        .map(|(m, p)| m * p)
                        .sum();
                    if subtract {
                        det[i_samp] -= val;
                    } else {
                        det[i_samp] += val;
                    }
                }
            }
        }
    }
    Ok(())
}
