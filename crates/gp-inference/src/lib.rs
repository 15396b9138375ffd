//! # gp-inference
//!
//! Goodness-of-fit testing for gofpower.
//!
//! This crate provides:
//! - fitted-model adapters (closed-form Gaussian, EM Gaussian mixture)
//! - the likelihood-ratio test with multinomial and m-out-of-n bootstraps
//! - a kernel MMD two-sample engine
//! - the dispatcher that batches alternative samples and selects an engine
//! - a parallel experiment runner over cached datasets
//!
//! ## Architecture
//!
//! Engines depend on the [`models::FittedModel`] trait, never on concrete
//! model types. Models reach the dispatcher through an injected
//! [`models::ModelFactory`].

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Engine contract and closed engine enum.
pub mod engine;
/// Whole-dataset experiment runner.
pub mod experiment;
/// Goodness-of-fit dispatcher and test modes.
pub mod gof;
/// Likelihood-ratio test and bootstrap procedures.
pub mod lrt;
/// Maximum mean discrepancy test.
pub mod mmd;
/// Fitted-model adapters and factory.
pub mod models;

pub use engine::{AlternativeSource, Engine, EngineInputs, GofStatistic, ModelRequirement};
pub use experiment::{ExperimentResult, run_experiment};
pub use gof::{GofConfig, GoodnessOfFit, TestMode};
pub use lrt::{BootstrapScheme, LrtConfig, LrtEngine};
pub use mmd::MmdEngine;
pub use models::{FittedModel, GaussianModel, MixtureModel, ModelFactory, ParametricModelFactory};
