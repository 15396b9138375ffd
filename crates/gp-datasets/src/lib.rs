//! # gp-datasets
//!
//! Trial generator for goodness-of-fit power studies.
//!
//! A [`Dataset`] holds `num_trials` paired sample sets: null samples drawn
//! from a fixed distribution and alternative samples drawn from a per-trial
//! perturbation of it. Datasets are generated once per configuration,
//! identified by a SHA-256 fingerprint of the configuration, and cached on
//! disk so repeated runs reuse identical data.
//!
//! Generators:
//! - [`gmm`]: Gaussian mixture null, perturbed log-weights / means / log-variances
//! - [`mvn`]: single Gaussian null, perturbed mean / log-variances

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Binary artifact persistence with checksums and atomic publish.
pub mod artifact;
/// Generation configurations and their canonical form.
pub mod config;
/// Cached, indexable datasets.
pub mod dataset;
/// Configuration fingerprints.
pub mod fingerprint;
/// Gaussian-mixture trial generation.
pub mod gmm;
/// Single-Gaussian trial generation.
pub mod mvn;
/// Parameter perturbation helpers.
pub mod perturb;
/// Dense `(trials, samples, dim)` sample storage.
pub mod samples;

pub use config::{DatasetConfig, GmmConfig, MvnConfig};
pub use dataset::{CachePolicy, Dataset, Provenance, Trial};
pub use samples::SampleArray;

use gp_prob::DistributionParams;

/// Output of a generator: null samples, alternative samples and the
/// per-trial alternative parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedData {
    /// Null samples, shape `(num_trials, num_samples, dim)`.
    pub null: SampleArray,
    /// Alternative samples, shape `(num_trials, num_samples, dim)`.
    pub alter: SampleArray,
    /// Alternative parameters, one entry per trial.
    pub alter_params: Vec<DistributionParams>,
}
