//! Shared contract for goodness-of-fit statistics.

use std::fmt;

use gp_core::{Error, Result, TestOutput};
use nalgebra::DMatrix;
use rand::rngs::StdRng;

use crate::lrt::LrtEngine;
use crate::mmd::MmdEngine;
use crate::models::FittedModel;

/// Models an engine needs from the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRequirement {
    /// Only the null samples and the alternative batches.
    SamplesOnly,
    /// A model built from the null parameters.
    NullModel,
    /// Models for both the null and the given alternative parameters.
    NullAndAlternative,
}

/// Everything an engine may consume for one trial.
#[derive(Debug, Clone, Copy)]
pub struct EngineInputs<'a> {
    /// Null samples of the trial (`n × d`).
    pub null_samples: &'a DMatrix<f64>,
    /// Noisy alternative batches (`m × d` each).
    pub alter_batches: &'a [DMatrix<f64>],
    /// Present when the engine requires it.
    pub null_model: Option<&'a dyn FittedModel>,
    /// Present when the engine requires it.
    pub alter_model: Option<&'a dyn FittedModel>,
}

impl<'a> EngineInputs<'a> {
    /// Null model, or a validation error naming the engine.
    pub fn require_null_model(&self, engine: &str) -> Result<&'a dyn FittedModel> {
        self.null_model
            .ok_or_else(|| Error::Validation(format!("{engine} needs a null model")))
    }

    /// Alternative model, or a validation error naming the engine.
    pub fn require_alter_model(&self, engine: &str) -> Result<&'a dyn FittedModel> {
        self.alter_model
            .ok_or_else(|| Error::Validation(format!("{engine} needs an alternative model")))
    }
}

/// A test statistic producing one `(statistic, pvalue)` per batch.
pub trait GofStatistic: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Models the dispatcher must build.
    fn requirements(&self) -> ModelRequirement;

    /// Test every batch in `inputs`.
    fn test(&self, inputs: &EngineInputs<'_>, rng: &mut StdRng) -> Result<TestOutput>;
}

/// Where the LRT alternative comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlternativeSource {
    /// Built from the trial's alternative parameters.
    Given,
    /// Fitted to each batch, starting from the null parameters.
    Estimated,
}

/// Engine selected by the dispatcher.
pub enum Engine {
    /// Likelihood-ratio test.
    Lrt {
        /// Configured engine.
        engine: LrtEngine,
        /// Given or estimated alternative.
        alternative: AlternativeSource,
    },
    /// Kernel two-sample test.
    Mmd(MmdEngine),
    /// Caller-supplied statistic.
    External(Box<dyn GofStatistic>),
}

impl Engine {
    /// Short identifier used in logs.
    pub fn name(&self) -> &str {
        match self {
            Engine::Lrt { alternative: AlternativeSource::Given, .. } => "lrt-given",
            Engine::Lrt { alternative: AlternativeSource::Estimated, .. } => "lrt-estimated",
            Engine::Mmd(e) => e.name(),
            Engine::External(e) => e.name(),
        }
    }

    /// Models the dispatcher must build.
    pub fn requirements(&self) -> ModelRequirement {
        match self {
            Engine::Lrt { alternative: AlternativeSource::Given, .. } => {
                ModelRequirement::NullAndAlternative
            }
            Engine::Lrt { alternative: AlternativeSource::Estimated, .. } => {
                ModelRequirement::NullModel
            }
            Engine::Mmd(e) => e.requirements(),
            Engine::External(e) => e.requirements(),
        }
    }

    /// Run the engine.
    pub fn test(&self, inputs: &EngineInputs<'_>, rng: &mut StdRng) -> Result<TestOutput> {
        match self {
            Engine::Lrt { engine, alternative } => {
                let null_model = inputs.require_null_model("lrt")?;
                let alter_model = match alternative {
                    AlternativeSource::Given => Some(inputs.require_alter_model("lrt")?),
                    AlternativeSource::Estimated => None,
                };
                engine.test(inputs.null_samples, inputs.alter_batches, null_model, alter_model, rng)
            }
            Engine::Mmd(e) => e.test(inputs, rng),
            Engine::External(e) => e.test(inputs, rng),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Lrt { engine, alternative } => f
                .debug_struct("Lrt")
                .field("config", engine.config())
                .field("alternative", alternative)
                .finish(),
            Engine::Mmd(e) => f.debug_tuple("Mmd").field(e).finish(),
            Engine::External(e) => f.debug_tuple("External").field(&e.name()).finish(),
        }
    }
}
