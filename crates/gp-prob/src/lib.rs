//! Probability building blocks for gofpower.
//!
//! This crate hosts the distributions the trial generator samples from and the
//! fitted models evaluate:
//! - multivariate Normal with Cholesky-validated covariance
//! - Gaussian mixtures parameterised by log-weights
//! - serializable parameter sets shared by datasets and models
//! - the chi-squared tail used by asymptotic p-values

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chi_squared;
pub mod math;
pub mod mixture;
pub mod mvn;
pub mod params;

pub use mixture::GaussianMixture;
pub use mvn::MultivariateNormal;
pub use params::{DistributionParams, MixtureParams, NormalParams};
