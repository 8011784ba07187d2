// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Noise models and diagonal noise weighting.
//!
//! The noise model is an injected collaborator: given a detector name it
//! yields an inverse-variance weight. [`NoiseWeight`] applies those weights
//! to every sample of a named timestream. Flagged samples are weighted like
//! any other; every downstream accumulation honors flags independently, so
//! their weighted values never reach a map or an amplitude.

mod error;
#[cfg(test)]
mod tests;

pub use error::NoiseError;

use indexmap::IndexMap;
use log::trace;

use crate::obs::{Dataset, Observation};

/// Per-detector noise description, reduced to the inverse-variance weight
/// the map-maker needs.
pub trait NoiseModel: Send + Sync {
    /// The inverse-variance weight for a detector.
    fn detector_weight(&self, det: &str) -> Result<f64, NoiseError>;
}

/// An uncorrelated noise model: one scalar weight per detector.
#[derive(Debug, Clone)]
pub struct DiagonalNoise {
    weights: IndexMap<String, f64>,
}

impl DiagonalNoise {
    pub fn new(weights: IndexMap<String, f64>) -> DiagonalNoise {
        DiagonalNoise { weights }
    }

    /// The same weight for every named detector.
    pub fn uniform<'a, I: IntoIterator<Item = &'a str>>(dets: I, weight: f64) -> DiagonalNoise {
        DiagonalNoise {
            weights: dets
                .into_iter()
                .map(|d| (d.to_string(), weight))
                .collect(),
        }
    }
}

impl NoiseModel for DiagonalNoise {
    fn detector_weight(&self, det: &str) -> Result<f64, NoiseError> {
        self.weights
            .get(det)
            .copied()
            .ok_or_else(|| NoiseError::UnknownDetector {
                det: det.to_string(),
            })
    }
}

/// Applies diagonal noise-inverse-variance weighting to a named timestream,
/// in place.
pub struct NoiseWeight<'a, N: NoiseModel> {
    pub noise: &'a N,
}

impl<N: NoiseModel> NoiseWeight<'_, N> {
    /// Weight one observation's buffer at `det_data`.
    pub fn apply_obs(&self, obs: &mut Observation, det_data: &str) -> Result<(), NoiseError> {
        let weights = obs
            .detectors
            .iter()
            .map(|d| self.noise.detector_weight(d))
            .collect::<Result<Vec<_>, _>>()?;
        let data = obs.detdata_mut(det_data)?;
        for (mut row, w) in data.outer_iter_mut().zip(weights) {
            row.mapv_inplace(|v| v * w);
        }
        trace!("noise-weighted '{det_data}'");
        Ok(())
    }

    /// Weight the buffer at `det_data` in every observation.
    pub fn apply(&self, data: &mut Dataset, det_data: &str) -> Result<(), NoiseError> {
        for obs in &mut data.obs {
            self.apply_obs(obs, det_data)?;
        }
        Ok(())
    }
}
