// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The offset (baseline) template: one amplitude per detector per fixed
//! time interval.

use std::ops::Range;

use hifitime::Duration;
use log::debug;

use crate::{
    obs::{Dataset, DEFAULT_FLAG_MASK},
    templates::{Amplitudes, Template, TemplateError},
};

/// Destriping baseline offsets.
///
/// Binding splits every observation's timebase into contiguous intervals
/// of `step_time`, the last interval absorbing any remainder, and assigns
/// one amplitude per detector per interval. Forward projection adds the
/// interval's amplitude to its unflagged samples; the adjoint sums the
/// unflagged samples back into the amplitude. Intervals containing no
/// unflagged samples for a detector get their amplitude flagged and pinned
/// to zero in both directions.
pub struct Offset {
    name: String,
    step_time: Duration,
    flag_mask: u8,
    prior_precision: Option<f64>,
    layout: Option<OffsetLayout>,
}

struct OffsetLayout {
    blocks: Vec<ObsBlock>,
    n_local: usize,
}

/// Amplitude layout for one observation: detectors are laid out
/// block-contiguously, `amp_start + i_det * n_intervals + i_interval`.
struct ObsBlock {
    amp_start: usize,
    n_dets: usize,
    /// Sample ranges of the baseline intervals. Contiguous and covering;
    /// a timebase gap leaves an empty range so interval indices stay
    /// aligned with the time axis.
    intervals: Vec<Range<usize>>,
    /// Per `(detector, interval)`: no unflagged samples.
    flagged: Vec<bool>,
}

impl Offset {
    pub fn new(step_time: Duration) -> Offset {
        assert!(step_time.to_seconds() > 0.0);
        Offset {
            name: "offset".to_string(),
            step_time,
            flag_mask: DEFAULT_FLAG_MASK,
            prior_precision: None,
            layout: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Offset {
        self.name = name.into();
        self
    }

    pub fn with_flag_mask(mut self, mask: u8) -> Offset {
        self.flag_mask = mask;
        self
    }

    /// Enable a uniform diagonal prior: the left-hand-side operator adds
    /// `precision * a` for every unflagged baseline amplitude.
    pub fn with_prior(mut self, precision: f64) -> Offset {
        self.prior_precision = Some(precision);
        self
    }

    fn layout(&self) -> Result<&OffsetLayout, TemplateError> {
        self.layout.as_ref().ok_or_else(|| TemplateError::Unbound {
            name: self.name.clone(),
        })
    }
}

impl Template for Offset {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&mut self, data: &Dataset) -> Result<(), TemplateError> {
        let step_s = self.step_time.to_seconds();
        let mut blocks = Vec::with_capacity(data.obs.len());
        let mut amp_start = 0;
        for obs in &data.obs {
            let t0 = *obs.times.first();
            // Interval index per sample; nondecreasing because the
            // timestamps are.
            let idx: Vec<usize> = obs
                .times
                .iter()
                .map(|t| ((*t - t0).to_seconds() / step_s).floor() as usize)
                .collect();
            let n_intervals = idx.last().unwrap() + 1;

            let mut intervals = Vec::with_capacity(n_intervals);
            let mut start = 0;
            for k in 0..n_intervals {
                let mut end = start;
                while end < idx.len() && idx[end] == k {
                    end += 1;
                }
                intervals.push(start..end);
                start = end;
            }

            let n_dets = obs.n_dets();
            let mut flagged = vec![false; n_dets * n_intervals];
            for i_det in 0..n_dets {
                for (k, range) in intervals.iter().enumerate() {
                    let any_ok = range
                        .clone()
                        .any(|s| obs.sample_ok(i_det, s, self.flag_mask));
                    if !any_ok {
                        flagged[i_det * n_intervals + k] = true;
                    }
                }
            }

            blocks.push(ObsBlock {
                amp_start,
                n_dets,
                intervals,
                flagged,
            });
            amp_start += n_dets * n_intervals;
        }

        debug!(
            "offset template '{}' bound: {amp_start} amplitudes over {} observations",
            self.name,
            blocks.len()
        );
        self.layout = Some(OffsetLayout {
            blocks,
            n_local: amp_start,
        });
        Ok(())
    }

    fn n_local(&self) -> Result<usize, TemplateError> {
        Ok(self.layout()?.n_local)
    }

    fn zeros(&self) -> Result<Amplitudes, TemplateError> {
        let layout = self.layout()?;
        let mut amps = Amplitudes::zeros(layout.n_local);
        for block in &layout.blocks {
            for (i, &f) in block.flagged.iter().enumerate() {
                if f {
                    amps.set_flagged(block.amp_start + i);
                }
            }
        }
        Ok(amps)
    }

    fn forward(
        &self,
        data: &mut Dataset,
        det_data: &str,
        amps: &Amplitudes,
    ) -> Result<(), TemplateError> {
        let layout = self.layout()?;
        debug_assert_eq!(layout.blocks.len(), data.obs.len());
        for (block, obs) in layout.blocks.iter().zip(&mut data.obs) {
            let n_intervals = block.intervals.len();
            let mask = self.flag_mask;
            let (det_arr, flags) = obs.detdata_and_flags_mut(det_data)?;
            for i_det in 0..block.n_dets {
                let mut row = det_arr.row_mut(i_det);
                for (k, range) in block.intervals.iter().enumerate() {
                    if block.flagged[i_det * n_intervals + k] {
                        continue;
                    }
                    let a = amps.values()[block.amp_start + i_det * n_intervals + k];
                    for s in range.clone() {
                        if flags[(i_det, s)] & mask == 0 {
                            row[s] += a;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn adjoint(
        &self,
        data: &Dataset,
        det_data: &str,
        amps: &mut Amplitudes,
    ) -> Result<(), TemplateError> {
        let layout = self.layout()?;
        debug_assert_eq!(layout.blocks.len(), data.obs.len());
        for (block, obs) in layout.blocks.iter().zip(&data.obs) {
            let n_intervals = block.intervals.len();
            let det_arr = obs.detdata(det_data)?;
            for i_det in 0..block.n_dets {
                let row = det_arr.row(i_det);
                for (k, range) in block.intervals.iter().enumerate() {
                    if block.flagged[i_det * n_intervals + k] {
                        continue;
                    }
                    let mut sum = 0.0;
                    for s in range.clone() {
                        if obs.sample_ok(i_det, s, self.flag_mask) {
                            sum += row[s];
                        }
                    }
                    amps.values_mut()[block.amp_start + i_det * n_intervals + k] += sum;
                }
            }
        }
        amps.enforce_flags();
        Ok(())
    }

    fn apply_prior(&self, amps: &Amplitudes, out: &mut Amplitudes) -> Result<(), TemplateError> {
        if let Some(precision) = self.prior_precision {
            for i in 0..amps.n_local() {
                if !amps.is_flagged(i) {
                    out.values_mut()[i] += precision * amps.values()[i];
                }
            }
        }
        Ok(())
    }
}
