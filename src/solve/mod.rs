// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The solver operators: the right-hand side and left-hand side of the
//! destriping normal equations.
//!
//! With `M` the template matrix, `N` the diagonal noise weighting, `P` the
//! template prior and `Z` the sky-subtraction filter (bin, scan back,
//! subtract), the system solved by the outer conjugate-gradient loop is
//!
//! ```text
//! (Mᵀ N Z M + P) a = Mᵀ N Z d
//! ```
//!
//! [`SolverRhs`] builds the right-hand side once per solve; [`SolverLhs`]
//! applies the bracketed operator to a trial amplitude vector, matrix-free,
//! on every iteration. Both share one internal pipeline (bin, subtract the
//! scanned map, noise-weight, adjoint-project); they differ only in what
//! feeds the pipeline and in the prior added afterwards. The left-hand
//! side is symmetric positive semi-definite under the template adjoint
//! inner product, which is what makes the system conjugate-gradient
//! solvable.

mod error;

pub use error::SolveError;

use log::debug;

use crate::{
    binning::{scan_map, BinMap},
    comm::Communicator,
    noise::{NoiseModel, NoiseWeight},
    obs::Dataset,
    pointing::Pointing,
    templates::{AmplitudesMap, TemplateMatrix},
};

/// The shared solver pipeline: bin the named timestream, subtract the
/// scanned binned map from it, noise-weight the residual, then
/// adjoint-project into amplitudes. The binned map is left at the binner's
/// named output for diagnostics and cross-checks.
///
/// The timestream at `det_data` is consumed as scratch: on return it holds
/// the noise-weighted, sky-subtracted residual.
fn filter_and_project<P: Pointing, N: NoiseModel, C: Communicator>(
    binning: &BinMap<P, N, C>,
    template_matrix: &TemplateMatrix,
    data: &mut Dataset,
    det_data: &str,
) -> Result<AmplitudesMap, SolveError> {
    if binning.pointing.n_pix() > binning.dist.n_pix() {
        return Err(SolveError::PixelSpaceMismatch {
            pointing: binning.pointing.n_pix(),
            dist: binning.dist.n_pix(),
        });
    }

    binning.apply(data, det_data)?;

    {
        // Split borrow: the scanned map is read from the product store
        // while the observation buffers are written.
        let Dataset { obs, maps, .. } = data;
        let map = maps.get(&binning.binned).ok_or_else(|| {
            crate::obs::ObsError::MissingMap {
                key: binning.binned.clone(),
            }
        })?;
        scan_map(binning.pointing, binning.dist, map, obs, det_data, true)?;
    }

    NoiseWeight {
        noise: binning.noise,
    }
    .apply(data, det_data)?;

    Ok(template_matrix.adjoint(data, det_data)?)
}

/// Builds the right-hand side `b = Mᵀ N Z d` of the normal equations.
pub struct SolverRhs<'a, P: Pointing, N: NoiseModel, C: Communicator> {
    /// The detector signal to build the right-hand side from.
    pub det_data: String,

    /// With `overwrite` unset, the signal is copied and the caller's
    /// buffer is preserved; otherwise it is consumed in place.
    pub overwrite: bool,

    pub binning: &'a BinMap<'a, P, N, C>,
    pub template_matrix: &'a TemplateMatrix,
}

impl<P: Pointing, N: NoiseModel, C: Communicator> SolverRhs<'_, P, N, C> {
    /// Run the pipeline, returning the right-hand-side amplitudes. The
    /// intermediate binned map is left at the binner's named output.
    pub fn apply(&self, data: &mut Dataset) -> Result<AmplitudesMap, SolveError> {
        debug!("solver RHS from '{}'", self.det_data);
        let work_key = if self.overwrite {
            self.det_data.clone()
        } else {
            let scratch = format!("{}_rhs_work", self.det_data);
            for obs in &mut data.obs {
                obs.copy_detdata(&self.det_data, &scratch)?;
            }
            scratch
        };

        let result = filter_and_project(self.binning, self.template_matrix, data, &work_key);

        if !self.overwrite {
            for obs in &mut data.obs {
                obs.remove_detdata(&work_key);
            }
        }
        result
    }
}

/// Applies the left-hand-side operator `A·a = Mᵀ N Z M a + P a`,
/// matrix-free.
pub struct SolverLhs<'a, P: Pointing, N: NoiseModel, C: Communicator> {
    /// Caller-provided scratch timestream, reused across iterations to
    /// avoid reallocation. Created (zeroed) if absent.
    pub det_temp: String,

    pub binning: &'a BinMap<'a, P, N, C>,
    pub template_matrix: &'a TemplateMatrix,
}

impl<P: Pointing, N: NoiseModel, C: Communicator> SolverLhs<'_, P, N, C> {
    /// Apply the operator to `amplitudes`, returning `A·amplitudes`. The
    /// input is never retained; each call is independent.
    pub fn apply(
        &self,
        data: &mut Dataset,
        amplitudes: &AmplitudesMap,
    ) -> Result<AmplitudesMap, SolveError> {
        debug!("solver LHS through '{}'", self.det_temp);
        for obs in &mut data.obs {
            obs.ensure_detdata(&self.det_temp);
            obs.detdata_mut(&self.det_temp)?.fill(0.0);
        }

        self.template_matrix
            .forward(data, &self.det_temp, amplitudes)?;

        let mut out =
            filter_and_project(self.binning, self.template_matrix, data, &self.det_temp)?;

        self.template_matrix.apply_priors(amplitudes, &mut out)?;
        Ok(out)
    }
}
