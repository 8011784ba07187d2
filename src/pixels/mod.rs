// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pixel-space containers: the pixel distribution, sky maps, hit maps and
//! per-pixel covariance matrices.
//!
//! A pixel's covariance is a small symmetric dense matrix (1x1 for
//! intensity-only pointing, 3x3 for IQU) stored packed as its upper
//! triangle in row-major order. All per-pixel algebra in this crate works
//! directly on the packed representation; nothing here is ever a global
//! matrix operation.


use std::ops::Range;

use ndarray::prelude::*;

use crate::pointing::StokesMode;

/// Reciprocal-condition threshold below which a nonzero-hit pixel's
/// covariance is treated as degenerate and dropped from the solve.
pub(crate) const COND_THRESHOLD: f64 = 1e-12;

/// A partition of the sky pixel index space across participating workers.
///
/// Built once per pointing configuration and shared by reference; nothing
/// in this crate mutates an existing distribution. Each worker accumulates
/// only into its owned range, and reductions reconcile pixels whose data is
/// split across workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelDist {
    n_pix: usize,
    mode: StokesMode,
    local: Range<usize>,
}

impl PixelDist {
    /// A distribution owning the entire pixel space, as used by a single
    /// worker.
    pub fn full(n_pix: usize, mode: StokesMode) -> PixelDist {
        PixelDist {
            n_pix,
            mode,
            local: 0..n_pix,
        }
    }

    /// A distribution owning only `local` out of `n_pix` pixels.
    pub fn new(n_pix: usize, mode: StokesMode, local: Range<usize>) -> PixelDist {
        assert!(local.end <= n_pix);
        PixelDist { n_pix, mode, local }
    }

    /// The global number of sky pixels.
    pub fn n_pix(&self) -> usize {
        self.n_pix
    }

    pub fn mode(&self) -> StokesMode {
        self.mode
    }

    /// The number of locally-owned pixels.
    pub fn n_local(&self) -> usize {
        self.local.len()
    }

    pub fn local(&self) -> Range<usize> {
        self.local.clone()
    }

    /// Map a global pixel index to a local one. Returns `None` for pixels
    /// outside the owned range and for negative (pointing-flagged) indices.
    #[inline]
    pub fn local_index(&self, pixel: i64) -> Option<usize> {
        if pixel < 0 {
            return None;
        }
        let pixel = pixel as usize;
        if self.local.contains(&pixel) {
            Some(pixel - self.local.start)
        } else {
            None
        }
    }
}

/// A per-pixel vector of Stokes amplitudes, shape `(n_local_pix, nnz)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyMap {
    pub data: Array2<f64>,
}

impl SkyMap {
    pub fn zeros(dist: &PixelDist) -> SkyMap {
        SkyMap {
            data: Array2::zeros((dist.n_local(), dist.mode().nnz())),
        }
    }

    pub fn n_local(&self) -> usize {
        self.data.nrows()
    }

    pub fn nnz(&self) -> usize {
        self.data.ncols()
    }
}

/// Per-pixel integer hit counts, produced in the same accumulation pass as
/// the pixel covariance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitMap {
    pub data: Array1<i64>,
}

impl HitMap {
    pub fn zeros(dist: &PixelDist) -> HitMap {
        HitMap {
            data: Array1::zeros(dist.n_local()),
        }
    }

    pub fn n_local(&self) -> usize {
        self.data.len()
    }
}

/// Per-pixel symmetric covariance matrices, packed, shape
/// `(n_local_pix, nnz * (nnz + 1) / 2)`.
///
/// Invariant: a pixel with zero hits has an all-zero row and is never
/// inverted. `inverted` records whether the rows currently hold the
/// accumulated covariance or its precomputed inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelCov {
    pub data: Array2<f64>,
    inverted: bool,
}

impl PixelCov {
    pub fn zeros(dist: &PixelDist) -> PixelCov {
        PixelCov {
            data: Array2::zeros((dist.n_local(), dist.mode().n_cov())),
            inverted: false,
        }
    }

    pub fn n_local(&self) -> usize {
        self.data.nrows()
    }

    /// Whether the rows hold inverted matrices.
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub(crate) fn set_inverted(&mut self) {
        self.inverted = true;
    }
}

/// `out = A v` for a packed symmetric matrix `A`.
///
/// The packed layout is the upper triangle in row-major order, e.g. for a
/// 3x3 matrix: `[a00, a01, a02, a11, a12, a22]`.
#[inline]
pub(crate) fn sym_mult_vec(packed: &[f64], v: &[f64], out: &mut [f64]) {
    match v.len() {
        1 => {
            out[0] = packed[0] * v[0];
        }
        3 => {
            out[0] = packed[0] * v[0] + packed[1] * v[1] + packed[2] * v[2];
            out[1] = packed[1] * v[0] + packed[3] * v[1] + packed[4] * v[2];
            out[2] = packed[2] * v[0] + packed[4] * v[1] + packed[5] * v[2];
        }
        n => unreachable!("unsupported Stokes dimension {n}"),
    }
}

/// Accumulate `w * p ⊗ p` into a packed symmetric matrix.
#[inline]
pub(crate) fn sym_accumulate_outer(packed: &mut [f64], p: &[f64], w: f64) {
    match p.len() {
        1 => {
            packed[0] += w * p[0] * p[0];
        }
        3 => {
            packed[0] += w * p[0] * p[0];
            packed[1] += w * p[0] * p[1];
            packed[2] += w * p[0] * p[2];
            packed[3] += w * p[1] * p[1];
            packed[4] += w * p[1] * p[2];
            packed[5] += w * p[2] * p[2];
        }
        n => unreachable!("unsupported Stokes dimension {n}"),
    }
}

/// Invert a packed symmetric matrix in place.
///
/// Returns `false` without modifying the input when the matrix is
/// degenerate: its determinant, relative to the cube of its largest
/// diagonal element, falls below [`COND_THRESHOLD`]. A pixel hit at only a
/// single polarization angle lands here in IQU mode.
#[inline]
pub(crate) fn sym_invert(packed: &mut [f64]) -> bool {
    match packed.len() {
        1 => {
            if packed[0] > 0.0 {
                packed[0] = 1.0 / packed[0];
                true
            } else {
                false
            }
        }
        6 => {
            let [a00, a01, a02, a11, a12, a22] =
                [packed[0], packed[1], packed[2], packed[3], packed[4], packed[5]];
            let det = a00 * (a11 * a22 - a12 * a12) - a01 * (a01 * a22 - a12 * a02)
                + a02 * (a01 * a12 - a11 * a02);
            let scale = a00.abs().max(a11.abs()).max(a22.abs());
            if scale <= 0.0 || det.abs() <= COND_THRESHOLD * scale.powi(3) {
                return false;
            }
            let inv_det = 1.0 / det;
            packed[0] = (a11 * a22 - a12 * a12) * inv_det;
            packed[1] = (a02 * a12 - a01 * a22) * inv_det;
            packed[2] = (a01 * a12 - a02 * a11) * inv_det;
            packed[3] = (a00 * a22 - a02 * a02) * inv_det;
            packed[4] = (a01 * a02 - a00 * a12) * inv_det;
            packed[5] = (a00 * a11 - a01 * a01) * inv_det;
            true
        }
        n => unreachable!("unsupported packed covariance length {n}"),
    }
}
