//! Serializable distribution parameters.
//!
//! Parameters travel between the trial generator (which perturbs them and
//! persists them per trial), the dispatcher (which hands them to a model
//! factory) and fitted models (which report them back). They are plain nested
//! vectors so they serialize without `nalgebra`'s serde support; conversion to
//! a validated distribution is explicit.

use gp_core::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::mixture::GaussianMixture;
use crate::mvn::MultivariateNormal;

/// Parameters of a multivariate Normal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalParams {
    /// Mean vector (`d`).
    pub mean: Vec<f64>,
    /// Covariance matrix rows (`d × d`).
    pub cov: Vec<Vec<f64>>,
}

impl NormalParams {
    /// Create parameters from a mean and covariance rows.
    pub fn new(mean: Vec<f64>, cov: Vec<Vec<f64>>) -> Self {
        Self { mean, cov }
    }

    /// Diagonal covariance `diag(exp(logvar))`.
    pub fn from_logvar(mean: Vec<f64>, logvar: &[f64]) -> Self {
        let d = logvar.len();
        let cov = (0..d)
            .map(|i| (0..d).map(|j| if i == j { logvar[i].exp() } else { 0.0 }).collect())
            .collect();
        Self { mean, cov }
    }

    /// Dimensionality.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Validate and build the distribution.
    pub fn to_distribution(&self) -> Result<MultivariateNormal> {
        MultivariateNormal::new(DVector::from_column_slice(&self.mean), rows_to_matrix(&self.cov)?)
    }

    /// Parameters of an existing distribution.
    pub fn from_distribution(mvn: &MultivariateNormal) -> Self {
        Self { mean: mvn.mean().iter().copied().collect(), cov: matrix_to_rows(mvn.cov()) }
    }
}

/// Parameters of a Gaussian mixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    /// Unnormalised log-weights (`k`).
    pub logweight: Vec<f64>,
    /// Component means (`k × d`).
    pub mean: Vec<Vec<f64>>,
    /// Component covariances (`k × d × d`).
    pub cov: Vec<Vec<Vec<f64>>>,
}

impl MixtureParams {
    /// Create mixture parameters.
    pub fn new(logweight: Vec<f64>, mean: Vec<Vec<f64>>, cov: Vec<Vec<Vec<f64>>>) -> Self {
        Self { logweight, mean, cov }
    }

    /// Number of components.
    pub fn n_components(&self) -> usize {
        self.logweight.len()
    }

    /// Dimensionality (0 when there are no components).
    pub fn dim(&self) -> usize {
        self.mean.first().map_or(0, Vec::len)
    }

    /// Component `k` as Normal parameters.
    pub fn component(&self, k: usize) -> Option<NormalParams> {
        Some(NormalParams::new(self.mean.get(k)?.clone(), self.cov.get(k)?.clone()))
    }

    /// Validate and build the distribution.
    pub fn to_distribution(&self) -> Result<GaussianMixture> {
        let k = self.logweight.len();
        if self.mean.len() != k || self.cov.len() != k {
            return Err(Error::Validation(format!(
                "mixture parameter lengths disagree: logweight={k}, mean={}, cov={}",
                self.mean.len(),
                self.cov.len()
            )));
        }
        let components = self
            .mean
            .iter()
            .zip(&self.cov)
            .enumerate()
            .map(|(i, (m, c))| {
                let c = rows_to_matrix(c)?;
                MultivariateNormal::new(DVector::from_column_slice(m), c).map_err(|e| match e {
                    Error::Validation(msg) => Error::Validation(format!("component {i}: {msg}")),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        GaussianMixture::new(self.logweight.clone(), components)
    }

    /// Parameters of an existing mixture.
    pub fn from_distribution(gm: &GaussianMixture) -> Self {
        Self {
            logweight: gm.logweight().to_vec(),
            mean: gm.components().iter().map(|c| c.mean().iter().copied().collect()).collect(),
            cov: gm.components().iter().map(|c| matrix_to_rows(c.cov())).collect(),
        }
    }
}

/// Parameters of one of the supported distribution families.
///
/// Externally tagged so the same encoding works for JSON and for the binary
/// dataset artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionParams {
    /// Multivariate Normal.
    Normal(NormalParams),
    /// Gaussian mixture.
    Mixture(MixtureParams),
}

impl DistributionParams {
    /// Dimensionality of the described distribution.
    pub fn dim(&self) -> usize {
        match self {
            DistributionParams::Normal(p) => p.dim(),
            DistributionParams::Mixture(p) => p.dim(),
        }
    }

    /// Family label.
    pub fn family(&self) -> &'static str {
        match self {
            DistributionParams::Normal(_) => "normal",
            DistributionParams::Mixture(_) => "mixture",
        }
    }

    /// Validate the parameters by building the distribution.
    pub fn validate(&self) -> Result<()> {
        match self {
            DistributionParams::Normal(p) => p.to_distribution().map(|_| ()),
            DistributionParams::Mixture(p) => p.to_distribution().map(|_| ()),
        }
    }
}

/// Convert square matrix rows into a `DMatrix`.
pub fn rows_to_matrix(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let n = rows.len();
    if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
        return Err(Error::Validation(format!(
            "covariance row {i} has {} entries, expected {n}",
            r.len()
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DMatrix::from_row_slice(n, n, &flat))
}

/// Convert a `DMatrix` into nested rows.
pub fn matrix_to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}
