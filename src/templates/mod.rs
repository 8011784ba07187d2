// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Templates and the template matrix.
//!
//! A template is a named basis that absorbs correlated noise and
//! systematics: it projects an amplitude vector forward into detector
//! timestreams and adjoint-projects timestreams back into amplitude space.
//! The [`TemplateMatrix`] is a flat, ordered collection over the template
//! capability set; each template owns a disjoint amplitude sub-vector, so
//! adjoint results are stored per template, never summed across templates.
//!
//! The forward/adjoint pair must be a true adjoint under the sample-wise
//! inner product: `⟨forward(a), t⟩ == ⟨a, adjoint(t)⟩`. Everything the
//! solver guarantees rests on that identity.

mod error;
mod offset;

pub use error::TemplateError;
pub use offset::Offset;

use indexmap::IndexMap;
use ndarray::prelude::*;
use vec1::Vec1;

use crate::obs::Dataset;

/// One template's local amplitude vector, with a parallel validity flag.
///
/// A flagged amplitude (e.g. a baseline interval containing no unflagged
/// samples) is pinned to zero by both projection directions so degenerate
/// basis elements cannot leak into the solve.
#[derive(Debug, Clone)]
pub struct Amplitudes {
    values: Array1<f64>,
    flagged: Array1<bool>,
}

impl Amplitudes {
    pub fn zeros(n: usize) -> Amplitudes {
        Amplitudes {
            values: Array1::zeros(n),
            flagged: Array1::from_elem(n, false),
        }
    }

    pub fn n_local(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Array1<f64> {
        &mut self.values
    }

    pub fn is_flagged(&self, i: usize) -> bool {
        self.flagged[i]
    }

    pub fn set_flagged(&mut self, i: usize) {
        self.flagged[i] = true;
        self.values[i] = 0.0;
    }

    /// Zero every flagged entry.
    pub(crate) fn enforce_flags(&mut self) {
        for (v, &f) in self.values.iter_mut().zip(self.flagged.iter()) {
            if f {
                *v = 0.0;
            }
        }
    }

    pub fn dot(&self, other: &Amplitudes) -> f64 {
        self.values.dot(&other.values)
    }
}

/// The amplitude state passed between the solver operators and the outer
/// iterative loop: one entry per template, keyed by template name.
#[derive(Debug, Clone, Default)]
pub struct AmplitudesMap {
    inner: IndexMap<String, Amplitudes>,
}

impl AmplitudesMap {
    pub fn new() -> AmplitudesMap {
        AmplitudesMap::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, amps: Amplitudes) {
        self.inner.insert(name.into(), amps);
    }

    pub fn get(&self, name: &str) -> Result<&Amplitudes, TemplateError> {
        self.inner
            .get(name)
            .ok_or_else(|| TemplateError::MissingAmplitudes {
                name: name.to_string(),
            })
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Amplitudes, TemplateError> {
        self.inner
            .get_mut(name)
            .ok_or_else(|| TemplateError::MissingAmplitudes {
                name: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Amplitudes)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The inner product over the whole collection, summed across
    /// templates. This is what an outer conjugate-gradient loop uses for
    /// its update rules.
    pub fn dot(&self, other: &AmplitudesMap) -> Result<f64, TemplateError> {
        let mut sum = 0.0;
        for (name, amps) in &self.inner {
            sum += amps.dot(other.get(name)?);
        }
        Ok(sum)
    }
}

/// The template capability set.
///
/// A template must be bound to its dataset before any projection; binding
/// fixes the amplitude layout against the observation geometry. Projection
/// through an unbound template fails with [`TemplateError::Unbound`].
pub trait Template: Send + Sync {
    fn name(&self) -> &str;

    /// Attach to a dataset, fixing the local amplitude layout.
    fn bind(&mut self, data: &Dataset) -> Result<(), TemplateError>;

    /// The local amplitude-vector length.
    fn n_local(&self) -> Result<usize, TemplateError>;

    /// A correctly shaped zero amplitude vector, with degenerate entries
    /// pre-flagged.
    fn zeros(&self) -> Result<Amplitudes, TemplateError>;

    /// Accumulate the forward projection of `amps` into the timestream at
    /// `det_data`.
    fn forward(
        &self,
        data: &mut Dataset,
        det_data: &str,
        amps: &Amplitudes,
    ) -> Result<(), TemplateError>;

    /// Accumulate the adjoint projection of the timestream at `det_data`
    /// into `amps`.
    fn adjoint(
        &self,
        data: &Dataset,
        det_data: &str,
        amps: &mut Amplitudes,
    ) -> Result<(), TemplateError>;

    /// Accumulate this template's prior (regularization) contribution,
    /// `out += P · amps`, directly in amplitude space. The default is no
    /// prior.
    fn apply_prior(
        &self,
        amps: &Amplitudes,
        out: &mut Amplitudes,
    ) -> Result<(), TemplateError> {
        let _ = (amps, out);
        Ok(())
    }
}

/// An ordered collection of templates acting as one linear operator
/// between amplitude space and timestream space.
pub struct TemplateMatrix {
    templates: Vec1<Box<dyn Template>>,
}

impl TemplateMatrix {
    pub fn new(templates: Vec1<Box<dyn Template>>) -> TemplateMatrix {
        TemplateMatrix { templates }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Template> {
        self.templates.iter().map(|t| t.as_ref())
    }

    /// Bind every template to the dataset.
    pub fn bind(&mut self, data: &Dataset) -> Result<(), TemplateError> {
        for tmpl in &mut self.templates {
            tmpl.bind(data)?;
        }
        Ok(())
    }

    /// Allocate a zero [`AmplitudesMap`] with one correctly sized entry per
    /// template.
    pub fn zero_amplitudes(&self) -> Result<AmplitudesMap, TemplateError> {
        let mut amps = AmplitudesMap::new();
        for tmpl in &self.templates {
            amps.insert(tmpl.name().to_string(), tmpl.zeros()?);
        }
        Ok(amps)
    }

    /// Forward mode: accumulate every template's projection into the
    /// timestream at `det_data`. The caller zeroes the buffer first when
    /// overwrite semantics are wanted.
    pub fn forward(
        &self,
        data: &mut Dataset,
        det_data: &str,
        amps: &AmplitudesMap,
    ) -> Result<(), TemplateError> {
        for tmpl in &self.templates {
            let entry = amps.get(tmpl.name())?;
            let expected = tmpl.n_local()?;
            if entry.n_local() != expected {
                return Err(TemplateError::ShapeMismatch {
                    name: tmpl.name().to_string(),
                    expected,
                    got: entry.n_local(),
                });
            }
            tmpl.forward(data, det_data, entry)?;
        }
        Ok(())
    }

    /// Adjoint mode: project the timestream at `det_data` into a fresh
    /// [`AmplitudesMap`], each template filling its own entry.
    pub fn adjoint(&self, data: &Dataset, det_data: &str) -> Result<AmplitudesMap, TemplateError> {
        let mut amps = self.zero_amplitudes()?;
        for tmpl in &self.templates {
            tmpl.adjoint(data, det_data, amps.get_mut(tmpl.name())?)?;
        }
        Ok(amps)
    }

    /// Accumulate every template's prior contribution: `out += P · amps`.
    pub fn apply_priors(
        &self,
        amps: &AmplitudesMap,
        out: &mut AmplitudesMap,
    ) -> Result<(), TemplateError> {
        for tmpl in &self.templates {
            tmpl.apply_prior(amps.get(tmpl.name())?, out.get_mut(tmpl.name())?)?;
        }
        Ok(())
    }
}
