//! Fitted-model adapters.
//!
//! The testing engines only need three things from a model: densities for a
//! batch of samples, the current parameters, and a way to refit on new
//! samples. [`FittedModel`] captures exactly that; [`ModelFactory`] turns
//! parameter sets into models so the dispatcher never looks models up by name.

use std::fmt::Debug;

use gp_core::{Error, Result};
use gp_prob::math::log_sum_exp;
use gp_prob::{
    DistributionParams, GaussianMixture, MixtureParams, MultivariateNormal, NormalParams,
};
use nalgebra::{DMatrix, DVector};

/// Diagonal ridge added to fitted covariances.
pub const COV_RIDGE: f64 = 1e-6;

/// Responsibility mass below which a mixture component keeps its parameters.
const MIN_COMPONENT_MASS: f64 = 1e-10;

/// A parametric density that can be evaluated and refitted.
pub trait FittedModel: Send + Sync + Debug {
    /// Log-density of every row of `samples` (`n × d`).
    fn log_pdf(&self, samples: &DMatrix<f64>) -> Result<DVector<f64>>;

    /// Density of every row of `samples`.
    fn pdf(&self, samples: &DMatrix<f64>) -> Result<DVector<f64>> {
        Ok(self.log_pdf(samples)?.map(f64::exp))
    }

    /// Current parameters.
    fn params(&self) -> DistributionParams;

    /// Fit a model of the same family to `samples`, starting from `self`.
    fn fit(&self, samples: &DMatrix<f64>) -> Result<Box<dyn FittedModel>>;
}

/// Builds models from parameter sets.
pub trait ModelFactory: Send + Sync {
    /// Build a model described by `params`.
    fn build(&self, params: &DistributionParams) -> Result<Box<dyn FittedModel>>;
}

/// Maps `Normal` to [`GaussianModel`] and `Mixture` to [`MixtureModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParametricModelFactory;

impl ModelFactory for ParametricModelFactory {
    fn build(&self, params: &DistributionParams) -> Result<Box<dyn FittedModel>> {
        match params {
            DistributionParams::Normal(p) => Ok(Box::new(GaussianModel::new(p)?)),
            DistributionParams::Mixture(p) => Ok(Box::new(MixtureModel::new(p)?)),
        }
    }
}

fn check_samples(samples: &DMatrix<f64>, dim: usize) -> Result<()> {
    if samples.nrows() == 0 {
        return Err(Error::Validation("cannot fit a model to zero samples".to_string()));
    }
    if samples.ncols() != dim {
        return Err(Error::Validation(format!(
            "samples have {} columns, model has dimension {dim}",
            samples.ncols()
        )));
    }
    Ok(())
}

fn fitting_error(e: Error) -> Error {
    match e {
        Error::Validation(msg) => Error::Computation(format!("fitted covariance rejected: {msg}")),
        other => other,
    }
}

/// Multivariate Gaussian fitted by closed-form maximum likelihood.
#[derive(Debug, Clone)]
pub struct GaussianModel {
    dist: MultivariateNormal,
}

impl GaussianModel {
    /// Model with the given parameters.
    pub fn new(params: &NormalParams) -> Result<Self> {
        Ok(Self { dist: params.to_distribution()? })
    }

    /// Underlying distribution.
    pub fn distribution(&self) -> &MultivariateNormal {
        &self.dist
    }

    /// Sample mean and biased covariance (plus ridge) of `samples`.
    pub fn mle(samples: &DMatrix<f64>) -> Result<MultivariateNormal> {
        let n = samples.nrows() as f64;
        let d = samples.ncols();
        let mean: DVector<f64> = samples.row_mean().transpose();
        let mut cov = DMatrix::<f64>::zeros(d, d);
        for row in samples.row_iter() {
            let c = row.transpose() - &mean;
            cov += &c * c.transpose();
        }
        cov /= n;
        for i in 0..d {
            cov[(i, i)] += COV_RIDGE;
        }
        MultivariateNormal::new(mean, cov).map_err(fitting_error)
    }
}

impl FittedModel for GaussianModel {
    fn log_pdf(&self, samples: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.dist.logpdf_rows(samples)
    }

    fn params(&self) -> DistributionParams {
        DistributionParams::Normal(NormalParams::from_distribution(&self.dist))
    }

    fn fit(&self, samples: &DMatrix<f64>) -> Result<Box<dyn FittedModel>> {
        check_samples(samples, self.dist.dim())?;
        Ok(Box::new(Self { dist: Self::mle(samples)? }))
    }
}

/// EM settings for [`MixtureModel`].
#[derive(Debug, Clone, Copy)]
pub struct EmConfig {
    /// Maximum EM iterations.
    pub max_iter: usize,
    /// Stop when the mean log-likelihood improves by less than this.
    pub tol: f64,
    /// Diagonal ridge added to every component covariance.
    pub ridge: f64,
}

impl Default for EmConfig {
    fn default() -> Self {
        Self { max_iter: 100, tol: 1e-6, ridge: COV_RIDGE }
    }
}

/// Gaussian mixture fitted by EM, warm-started from its current parameters.
#[derive(Debug, Clone)]
pub struct MixtureModel {
    dist: GaussianMixture,
    em: EmConfig,
}

impl MixtureModel {
    /// Model with the given parameters and default EM settings.
    pub fn new(params: &MixtureParams) -> Result<Self> {
        Ok(Self { dist: params.to_distribution()?, em: EmConfig::default() })
    }

    /// Override the EM settings.
    pub fn with_em(mut self, em: EmConfig) -> Self {
        self.em = em;
        self
    }

    /// Underlying distribution.
    pub fn distribution(&self) -> &GaussianMixture {
        &self.dist
    }

    /// Run EM on `samples` from the current parameters.
    ///
    /// Returns the fitted mixture and the number of completed iterations.
    pub fn em(&self, samples: &DMatrix<f64>) -> Result<(GaussianMixture, usize)> {
        check_samples(samples, self.dist.dim())?;
        let n = samples.nrows();
        let d = samples.ncols();
        let k = self.dist.n_components();

        let mut current = self.dist.clone();
        let mut prev_ll = f64::NEG_INFINITY;
        let mut resp = DMatrix::<f64>::zeros(n, k);
        let mut buf = vec![0.0; k];

        for iter in 0..self.em.max_iter {
            // E-step.
            let joint = current.component_log_joint(samples)?;
            let mut ll = 0.0;
            for i in 0..n {
                for (c, b) in buf.iter_mut().enumerate() {
                    *b = joint[(i, c)];
                }
                let lse = log_sum_exp(&buf);
                if !lse.is_finite() {
                    return Err(Error::Computation(format!(
                        "EM: sample {i} has zero density under every component"
                    )));
                }
                ll += lse;
                for c in 0..k {
                    resp[(i, c)] = (joint[(i, c)] - lse).exp();
                }
            }
            let ll = ll / n as f64;
            if ll - prev_ll < self.em.tol {
                return Ok((current, iter));
            }
            prev_ll = ll;

            // M-step.
            let mut logweight = Vec::with_capacity(k);
            let mut components = Vec::with_capacity(k);
            for (c, old) in current.components().iter().enumerate() {
                let nk: f64 = resp.column(c).sum();
                logweight.push((nk.max(MIN_COMPONENT_MASS) / n as f64).ln());
                if nk < MIN_COMPONENT_MASS {
                    components.push(old.clone());
                    continue;
                }
                let mut mean = DVector::<f64>::zeros(d);
                for i in 0..n {
                    mean += samples.row(i).transpose() * resp[(i, c)];
                }
                mean /= nk;
                let mut cov = DMatrix::<f64>::zeros(d, d);
                for i in 0..n {
                    let x = samples.row(i).transpose() - &mean;
                    cov += (&x * x.transpose()) * resp[(i, c)];
                }
                cov /= nk;
                for j in 0..d {
                    cov[(j, j)] += self.em.ridge;
                }
                let cov = 0.5 * (&cov + cov.transpose());
                components.push(MultivariateNormal::new(mean, cov).map_err(|e| match fitting_error(e) {
                    Error::Computation(msg) => Error::Computation(format!("component {c}: {msg}")),
                    other => other,
                })?);
            }
            current = GaussianMixture::new(logweight, components).map_err(fitting_error)?;
        }
        log::debug!("EM stopped after {} iterations without converging", self.em.max_iter);
        Ok((current, self.em.max_iter))
    }
}

impl FittedModel for MixtureModel {
    fn log_pdf(&self, samples: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.dist.logpdf_rows(samples)
    }

    fn params(&self) -> DistributionParams {
        DistributionParams::Mixture(MixtureParams::from_distribution(&self.dist))
    }

    fn fit(&self, samples: &DMatrix<f64>) -> Result<Box<dyn FittedModel>> {
        let (dist, _) = self.em(samples)?;
        Ok(Box::new(Self { dist, em: self.em }))
    }
}
