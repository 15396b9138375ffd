use gp_core::{Error, Result};
use gp_prob::{DistributionParams, MixtureParams, NormalParams};
use serde::{Deserialize, Serialize};

use crate::fingerprint::{entry, fingerprint};
use crate::GeneratedData;

fn check_counts(num_trials: usize, num_samples: usize) -> Result<()> {
    if num_trials == 0 {
        return Err(Error::Validation("num_trials must be > 0".to_string()));
    }
    if num_samples == 0 {
        return Err(Error::Validation("num_samples must be > 0".to_string()));
    }
    Ok(())
}

fn check_scale(name: &str, v: f64) -> Result<()> {
    if !(v.is_finite() && v >= 0.0) {
        return Err(Error::Validation(format!("{name} must be finite and >= 0, got {v}")));
    }
    Ok(())
}

/// Gaussian-mixture generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmmConfig {
    /// Number of trials.
    pub num_trials: usize,
    /// Samples per trial and side.
    pub num_samples: usize,
    /// Null log-weights (`k`).
    pub logweight: Vec<f64>,
    /// Null component means (`k × d`).
    pub mean: Vec<Vec<f64>>,
    /// Null component covariances (`k × d × d`).
    pub cov: Vec<Vec<Vec<f64>>>,
    /// Scale of the Gaussian noise added to each log-weight.
    #[serde(default)]
    pub ptb_logweight: f64,
    /// Scale of the Gaussian noise added to each mean coordinate.
    #[serde(default)]
    pub ptb_mean: f64,
    /// Scale of the Gaussian noise added to each log-variance.
    #[serde(default)]
    pub ptb_logvar: f64,
    /// Generation seed.
    #[serde(default)]
    pub seed: u64,
}

impl GmmConfig {
    /// Dataset name used in artifact keys.
    pub const DATA_NAME: &'static str = "GMM";

    /// Null mixture parameters.
    pub fn null_params(&self) -> MixtureParams {
        MixtureParams::new(self.logweight.clone(), self.mean.clone(), self.cov.clone())
    }

    /// Dimensionality.
    pub fn dim(&self) -> usize {
        self.mean.first().map_or(0, Vec::len)
    }

    /// Check counts, perturbation scales and null parameters.
    pub fn validate(&self) -> Result<()> {
        check_counts(self.num_trials, self.num_samples)?;
        check_scale("ptb_logweight", self.ptb_logweight)?;
        check_scale("ptb_mean", self.ptb_mean)?;
        check_scale("ptb_logvar", self.ptb_logvar)?;
        self.null_params().to_distribution().map(|_| ())
    }

    /// Canonical entries in fixed field order.
    pub fn canonical_parts(&self) -> Vec<String> {
        vec![
            entry("num_trials", &self.num_trials),
            entry("num_samples", &self.num_samples),
            entry("logweight", &self.logweight),
            entry("mean", &self.mean),
            entry("cov", &self.cov),
            entry("ptb_logweight", &self.ptb_logweight),
            entry("ptb_mean", &self.ptb_mean),
            entry("ptb_logvar", &self.ptb_logvar),
            entry("seed", &self.seed),
        ]
    }
}

/// Single-Gaussian generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvnConfig {
    /// Number of trials.
    pub num_trials: usize,
    /// Samples per trial and side.
    pub num_samples: usize,
    /// Null mean (`d`).
    pub mean: Vec<f64>,
    /// Null covariance (`d × d`).
    pub cov: Vec<Vec<f64>>,
    /// Scale of the Gaussian noise added to each mean coordinate.
    #[serde(default)]
    pub ptb_mean: f64,
    /// Scale of the Gaussian noise added to each log-variance.
    #[serde(default)]
    pub ptb_logvar: f64,
    /// Generation seed.
    #[serde(default)]
    pub seed: u64,
}

impl MvnConfig {
    /// Dataset name used in artifact keys.
    pub const DATA_NAME: &'static str = "MVN";

    /// Null parameters.
    pub fn null_params(&self) -> NormalParams {
        NormalParams::new(self.mean.clone(), self.cov.clone())
    }

    /// Check counts, perturbation scales and null parameters.
    pub fn validate(&self) -> Result<()> {
        check_counts(self.num_trials, self.num_samples)?;
        check_scale("ptb_mean", self.ptb_mean)?;
        check_scale("ptb_logvar", self.ptb_logvar)?;
        self.null_params().to_distribution().map(|_| ())
    }

    /// Canonical entries in fixed field order.
    pub fn canonical_parts(&self) -> Vec<String> {
        vec![
            entry("num_trials", &self.num_trials),
            entry("num_samples", &self.num_samples),
            entry("mean", &self.mean),
            entry("cov", &self.cov),
            entry("ptb_mean", &self.ptb_mean),
            entry("ptb_logvar", &self.ptb_logvar),
            entry("seed", &self.seed),
        ]
    }
}

/// Any supported generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    /// Gaussian-mixture trials.
    Gmm(GmmConfig),
    /// Single-Gaussian trials.
    Mvn(MvnConfig),
}

impl DatasetConfig {
    /// Dataset name (`GMM` / `MVN`).
    pub fn data_name(&self) -> &'static str {
        match self {
            DatasetConfig::Gmm(_) => GmmConfig::DATA_NAME,
            DatasetConfig::Mvn(_) => MvnConfig::DATA_NAME,
        }
    }

    /// Number of trials.
    pub fn num_trials(&self) -> usize {
        match self {
            DatasetConfig::Gmm(c) => c.num_trials,
            DatasetConfig::Mvn(c) => c.num_trials,
        }
    }

    /// Samples per trial and side.
    pub fn num_samples(&self) -> usize {
        match self {
            DatasetConfig::Gmm(c) => c.num_samples,
            DatasetConfig::Mvn(c) => c.num_samples,
        }
    }

    /// Dimensionality.
    pub fn dim(&self) -> usize {
        match self {
            DatasetConfig::Gmm(c) => c.dim(),
            DatasetConfig::Mvn(c) => c.mean.len(),
        }
    }

    /// Fixed null parameters.
    pub fn null_params(&self) -> DistributionParams {
        match self {
            DatasetConfig::Gmm(c) => DistributionParams::Mixture(c.null_params()),
            DatasetConfig::Mvn(c) => DistributionParams::Normal(c.null_params()),
        }
    }

    /// Validate before any sampling.
    pub fn validate(&self) -> Result<()> {
        match self {
            DatasetConfig::Gmm(c) => c.validate(),
            DatasetConfig::Mvn(c) => c.validate(),
        }
    }

    /// Canonical entries in fixed field order.
    pub fn canonical_parts(&self) -> Vec<String> {
        match self {
            DatasetConfig::Gmm(c) => c.canonical_parts(),
            DatasetConfig::Mvn(c) => c.canonical_parts(),
        }
    }

    /// SHA-256 fingerprint of the canonical configuration.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.canonical_parts())
    }

    /// Run the matching generator.
    pub fn generate(&self) -> Result<GeneratedData> {
        match self {
            DatasetConfig::Gmm(c) => crate::gmm::generate(c),
            DatasetConfig::Mvn(c) => crate::mvn::generate(c),
        }
    }
}
