// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The detector-data container.
//!
//! An [`Observation`] is a contiguous block of samples for a set of
//! detectors sharing a timebase, with named per-detector timestream buffers
//! and a per-detector/per-sample flag byte. A [`Dataset`] owns an ordered
//! list of observations plus the string-keyed stores that binning and
//! covariance products land in.

mod error;
#[cfg(test)]
mod tests;

pub use error::ObsError;

use hifitime::Epoch;
use indexmap::IndexMap;
use ndarray::prelude::*;
use vec1::Vec1;

use crate::pixels::{HitMap, PixelCov, SkyMap};

/// The flag mask accumulation passes use unless configured otherwise: any
/// set flag bit excludes the sample.
pub const DEFAULT_FLAG_MASK: u8 = 255;

/// A block of samples for a set of detectors with a shared timebase.
///
/// Every named timestream buffer has shape `(n_dets, n_samples)`; the flag
/// buffer matches. Buffer shapes are enforced on insertion, so shapes can
/// be trusted everywhere downstream.
pub struct Observation {
    pub name: String,

    /// Detector names, in the order of the buffer rows.
    pub detectors: Vec1<String>,

    /// The shared timestamps of all samples.
    pub times: Vec1<Epoch>,

    /// Per-detector/per-sample flag bytes. A sample is excluded from an
    /// accumulation when `flags & mask != 0` for the operator's mask.
    pub flags: Array2<u8>,

    detdata: IndexMap<String, Array2<f64>>,
}

impl Observation {
    pub fn new(name: impl Into<String>, detectors: Vec1<String>, times: Vec1<Epoch>) -> Observation {
        let shape = (detectors.len(), times.len());
        Observation {
            name: name.into(),
            detectors,
            times,
            flags: Array2::zeros(shape),
            detdata: IndexMap::new(),
        }
    }

    pub fn n_dets(&self) -> usize {
        self.detectors.len()
    }

    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    /// Create a zero-filled timestream buffer at `key` if absent.
    pub fn ensure_detdata(&mut self, key: &str) {
        if !self.detdata.contains_key(key) {
            self.detdata.insert(
                key.to_string(),
                Array2::zeros((self.n_dets(), self.n_samples())),
            );
        }
    }

    /// Insert a timestream buffer at `key`, replacing any existing one.
    pub fn insert_detdata(&mut self, key: &str, data: Array2<f64>) -> Result<(), ObsError> {
        let expected = (self.n_dets(), self.n_samples());
        if data.dim() != expected {
            return Err(ObsError::ShapeMismatch {
                obs: self.name.clone(),
                key: key.to_string(),
                expected,
                got: data.dim(),
            });
        }
        self.detdata.insert(key.to_string(), data);
        Ok(())
    }

    pub fn detdata(&self, key: &str) -> Result<&Array2<f64>, ObsError> {
        self.detdata.get(key).ok_or_else(|| ObsError::MissingDetData {
            obs: self.name.clone(),
            key: key.to_string(),
        })
    }

    pub fn detdata_mut(&mut self, key: &str) -> Result<&mut Array2<f64>, ObsError> {
        // Borrowck-friendly double lookup; the error path needs `self.name`.
        if !self.detdata.contains_key(key) {
            return Err(ObsError::MissingDetData {
                obs: self.name.clone(),
                key: key.to_string(),
            });
        }
        Ok(self.detdata.get_mut(key).unwrap())
    }

    /// Mutable access to a timestream buffer alongside read access to the
    /// flags, for passes that write samples while honoring flags.
    pub fn detdata_and_flags_mut(
        &mut self,
        key: &str,
    ) -> Result<(&mut Array2<f64>, &Array2<u8>), ObsError> {
        if !self.detdata.contains_key(key) {
            return Err(ObsError::MissingDetData {
                obs: self.name.clone(),
                key: key.to_string(),
            });
        }
        Ok((self.detdata.get_mut(key).unwrap(), &self.flags))
    }

    /// Copy the buffer at `src` into `dst`, creating `dst` if absent.
    pub fn copy_detdata(&mut self, src: &str, dst: &str) -> Result<(), ObsError> {
        let copied = self.detdata(src)?.clone();
        self.detdata.insert(dst.to_string(), copied);
        Ok(())
    }

    /// Drop the buffer at `key` if present.
    pub fn remove_detdata(&mut self, key: &str) {
        self.detdata.shift_remove(key);
    }

    /// Whether a sample participates in accumulations under `mask`.
    #[inline]
    pub fn sample_ok(&self, i_det: usize, i_samp: usize, mask: u8) -> bool {
        self.flags[(i_det, i_samp)] & mask == 0
    }
}

/// An ordered collection of observations plus the named product stores.
///
/// The product stores are the caller-visible named outputs of the
/// covariance builder and map binner; the solver operators read and write
/// them by key and never retain references across calls.
#[derive(Default)]
pub struct Dataset {
    pub obs: Vec<Observation>,

    /// Binned sky maps, keyed by the binner's output name.
    pub maps: IndexMap<String, SkyMap>,

    /// Hit maps, keyed by the covariance builder's output name.
    pub hits: IndexMap<String, HitMap>,

    /// Pixel covariances (accumulated or inverted), keyed by the
    /// covariance builder's output name.
    pub covs: IndexMap<String, PixelCov>,
}

impl Dataset {
    pub fn new(obs: Vec<Observation>) -> Dataset {
        Dataset {
            obs,
            maps: IndexMap::new(),
            hits: IndexMap::new(),
            covs: IndexMap::new(),
        }
    }

    pub fn map(&self, key: &str) -> Result<&SkyMap, ObsError> {
        self.maps.get(key).ok_or_else(|| ObsError::MissingMap {
            key: key.to_string(),
        })
    }

    pub fn hitmap(&self, key: &str) -> Result<&HitMap, ObsError> {
        self.hits.get(key).ok_or_else(|| ObsError::MissingHits {
            key: key.to_string(),
        })
    }

    pub fn cov(&self, key: &str) -> Result<&PixelCov, ObsError> {
        self.covs.get(key).ok_or_else(|| ObsError::MissingCov {
            key: key.to_string(),
        })
    }
}
