// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The collective-reduction seam between workers.
//!
//! Pixel-covariance accumulation and map binning both end in a sum over
//! every worker that touched a pixel. All such sums go through a
//! [`Communicator`] so the numerical core never assumes a transport. Every
//! worker in a group must call the same reduction at the same logical step;
//! no operator proceeds past a reduction with partial data.

/// A synchronous collective-reduction group.
///
/// Reductions are element-wise sums over equal-length buffers held by every
/// worker. Floating-point summation order across workers is fixed by the
/// implementation (ranks ascending); together with the fixed detector-major,
/// sample-ascending accumulation order used by all operators in this crate,
/// this makes results bit-reproducible run-to-run for a given worker count.
pub trait Communicator: Send + Sync {
    /// This worker's rank within the group.
    fn rank(&self) -> usize;

    /// The number of workers in the group.
    fn size(&self) -> usize;

    /// Element-wise sum of `buf` across all workers; every worker receives
    /// the full result.
    fn allreduce_sum_f64(&self, buf: &mut [f64]);

    /// As [`Communicator::allreduce_sum_f64`], for integer hit counts.
    fn allreduce_sum_i64(&self, buf: &mut [i64]);
}

/// The single-worker group: every reduction is the identity.
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn allreduce_sum_f64(&self, _buf: &mut [f64]) {}

    fn allreduce_sum_i64(&self, _buf: &mut [i64]) {}
}
