//! Goodness-of-fit dispatcher.
//!
//! [`GoodnessOfFit`] owns one engine chosen by [`TestMode`]. For every trial it
//! adds observation noise to the alternative samples, cuts them into batches,
//! builds whichever models the engine asks for and records the engine output.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use gp_core::{Error, Result, TestOutput, TrialRecord};
use gp_datasets::Trial;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::engine::{AlternativeSource, Engine, EngineInputs, GofStatistic, ModelRequirement};
use crate::lrt::{BootstrapScheme, LrtConfig, LrtEngine};
use crate::mmd::MmdEngine;
use crate::models::ModelFactory;

/// Test mode identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestMode {
    /// LRT, bootstrap p-value, given alternative.
    #[serde(rename = "lrt-b-g")]
    LrtBootstrapGiven,
    /// LRT, bootstrap p-value, estimated alternative.
    #[serde(rename = "lrt-b-e")]
    LrtBootstrapEstimated,
    /// LRT, χ² p-value, given alternative.
    #[serde(rename = "lrt-chi2-g")]
    LrtChi2Given,
    /// LRT, χ² p-value, estimated alternative.
    #[serde(rename = "lrt-chi2-e")]
    LrtChi2Estimated,
    /// Maximum mean discrepancy.
    #[serde(rename = "mmd")]
    Mmd,
    /// Kernel Stein discrepancy, U-statistic.
    #[serde(rename = "ksd-u")]
    KsdU,
    /// Kernel Stein discrepancy, V-statistic.
    #[serde(rename = "ksd-v")]
    KsdV,
    /// Hyvärinen score test, bootstrap, given alternative.
    #[serde(rename = "hst-b-g")]
    HstBootstrapGiven,
    /// Hyvärinen score test, bootstrap, estimated alternative.
    #[serde(rename = "hst-b-e")]
    HstBootstrapEstimated,
    /// Hyvärinen score test, χ², given alternative.
    #[serde(rename = "hst-chi2-g")]
    HstChi2Given,
    /// Hyvärinen score test, χ², estimated alternative.
    #[serde(rename = "hst-chi2-e")]
    HstChi2Estimated,
    /// Cramér–von Mises.
    #[serde(rename = "cvm")]
    Cvm,
    /// Kolmogorov–Smirnov.
    #[serde(rename = "ks")]
    Ks,
}

impl TestMode {
    /// Every recognised mode.
    pub const ALL: [TestMode; 13] = [
        TestMode::LrtBootstrapGiven,
        TestMode::LrtBootstrapEstimated,
        TestMode::LrtChi2Given,
        TestMode::LrtChi2Estimated,
        TestMode::Mmd,
        TestMode::KsdU,
        TestMode::KsdV,
        TestMode::HstBootstrapGiven,
        TestMode::HstBootstrapEstimated,
        TestMode::HstChi2Given,
        TestMode::HstChi2Estimated,
        TestMode::Cvm,
        TestMode::Ks,
    ];

    /// Mode identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::LrtBootstrapGiven => "lrt-b-g",
            TestMode::LrtBootstrapEstimated => "lrt-b-e",
            TestMode::LrtChi2Given => "lrt-chi2-g",
            TestMode::LrtChi2Estimated => "lrt-chi2-e",
            TestMode::Mmd => "mmd",
            TestMode::KsdU => "ksd-u",
            TestMode::KsdV => "ksd-v",
            TestMode::HstBootstrapGiven => "hst-b-g",
            TestMode::HstBootstrapEstimated => "hst-b-e",
            TestMode::HstChi2Given => "hst-chi2-g",
            TestMode::HstChi2Estimated => "hst-chi2-e",
            TestMode::Cvm => "cvm",
            TestMode::Ks => "ks",
        }
    }

    /// `true` if [`GoodnessOfFit::new`] can build the engine itself.
    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            TestMode::LrtBootstrapGiven
                | TestMode::LrtBootstrapEstimated
                | TestMode::LrtChi2Given
                | TestMode::LrtChi2Estimated
                | TestMode::Mmd
        )
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TestMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Not valid test mode: {s:?}")))
    }
}

fn default_num_bootstrap() -> usize {
    1000
}

fn default_alpha() -> f64 {
    0.05
}

fn default_device() -> String {
    "cpu".to_string()
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GofConfig {
    /// Selected test.
    pub test_mode: TestMode,
    /// Bootstrap draws (LRT) or permutations (MMD) per batch.
    #[serde(default = "default_num_bootstrap")]
    pub num_bootstrap: usize,
    /// Scale of the Gaussian noise added to alternative samples.
    #[serde(default)]
    pub alter_noise: f64,
    /// Rows per alternative batch.
    pub alter_num_samples: usize,
    /// Significance level for rejection counts.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Base seed; trial `i` uses `seed + i`.
    #[serde(default)]
    pub seed: u64,
    /// Compute device label. Only `cpu` is executed; other values are logged.
    #[serde(default = "default_device")]
    pub device: String,
    /// LRT bootstrap procedure.
    #[serde(default)]
    pub bootstrap_scheme: BootstrapScheme,
}

impl GofConfig {
    /// Configuration with defaults for everything but mode and batch size.
    pub fn new(test_mode: TestMode, alter_num_samples: usize) -> Self {
        Self {
            test_mode,
            num_bootstrap: default_num_bootstrap(),
            alter_noise: 0.0,
            alter_num_samples,
            alpha: default_alpha(),
            seed: 0,
            device: default_device(),
            bootstrap_scheme: BootstrapScheme::default(),
        }
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.alter_num_samples == 0 {
            return Err(Error::Validation("alter_num_samples must be > 0".to_string()));
        }
        if !(self.alter_noise.is_finite() && self.alter_noise >= 0.0) {
            return Err(Error::Validation(format!(
                "alter_noise must be finite and >= 0, got {}",
                self.alter_noise
            )));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::Validation(format!("alpha must be in (0, 1), got {}", self.alpha)));
        }
        Ok(())
    }

    fn build_engine(&self) -> Result<Engine> {
        let lrt = |bootstrap_approx: bool, alternative: AlternativeSource| -> Result<Engine> {
            let engine = LrtEngine::new(LrtConfig {
                num_bootstrap: self.num_bootstrap,
                bootstrap_approx,
                scheme: self.bootstrap_scheme,
            })?;
            Ok(Engine::Lrt { engine, alternative })
        };
        match self.test_mode {
            TestMode::LrtBootstrapGiven => lrt(true, AlternativeSource::Given),
            TestMode::LrtBootstrapEstimated => lrt(true, AlternativeSource::Estimated),
            TestMode::LrtChi2Given => lrt(false, AlternativeSource::Given),
            TestMode::LrtChi2Estimated => lrt(false, AlternativeSource::Estimated),
            TestMode::Mmd => Ok(Engine::Mmd(MmdEngine::new(self.num_bootstrap)?)),
            other => Err(Error::Validation(format!(
                "test mode {other} has no built-in engine; supply one with GoodnessOfFit::with_engine"
            ))),
        }
    }
}

/// Dispatcher owning one engine and the run history.
pub struct GoodnessOfFit {
    config: GofConfig,
    engine: Engine,
    factory: Box<dyn ModelFactory>,
    history: Mutex<Vec<TrialRecord>>,
}

impl GoodnessOfFit {
    /// Build the engine for `config.test_mode`.
    pub fn new(config: GofConfig, factory: Box<dyn ModelFactory>) -> Result<Self> {
        config.validate()?;
        let engine = config.build_engine()?;
        Ok(Self::assemble(config, engine, factory))
    }

    /// Use a caller-supplied engine for `config.test_mode`.
    pub fn with_engine(
        config: GofConfig,
        factory: Box<dyn ModelFactory>,
        engine: Box<dyn GofStatistic>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, Engine::External(engine), factory))
    }

    fn assemble(config: GofConfig, engine: Engine, factory: Box<dyn ModelFactory>) -> Self {
        if config.device != "cpu" {
            log::warn!("device {:?} requested; running on cpu", config.device);
        }
        log::debug!("goodness-of-fit mode {} using engine {}", config.test_mode, engine.name());
        Self { config, engine, factory, history: Mutex::new(Vec::new()) }
    }

    /// Configuration.
    pub fn config(&self) -> &GofConfig {
        &self.config
    }

    /// Selected engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Add noise to `alter` and split it into full batches of
    /// `alter_num_samples` rows; a trailing partial batch is dropped.
    pub fn prepare_batches(
        &self,
        alter: &DMatrix<f64>,
        rng: &mut StdRng,
    ) -> Result<Vec<DMatrix<f64>>> {
        let m = self.config.alter_num_samples;
        let n_batches = alter.nrows() / m;
        if n_batches == 0 {
            return Err(Error::Validation(format!(
                "alter_num_samples {m} exceeds the {} alternative samples of a trial",
                alter.nrows()
            )));
        }
        let noise = self.config.alter_noise;
        let noisy = alter.map(|v| v + noise * rng.sample::<f64, _>(StandardNormal));
        Ok((0..n_batches).map(|b| noisy.rows(b * m, m).into_owned()).collect())
    }

    /// Test one trial.
    pub fn test(&self, trial: &Trial) -> Result<TestOutput> {
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(trial.index as u64));
        let batches = self.prepare_batches(&trial.alter, &mut rng)?;

        let requirement = self.engine.requirements();
        let null_model = match requirement {
            ModelRequirement::SamplesOnly => None,
            _ => Some(self.factory.build(&trial.null_params)?),
        };
        let alter_model = match requirement {
            ModelRequirement::NullAndAlternative => Some(self.factory.build(&trial.alter_params)?),
            _ => None,
        };

        let inputs = EngineInputs {
            null_samples: &trial.null,
            alter_batches: &batches,
            null_model: null_model.as_deref(),
            alter_model: alter_model.as_deref(),
        };
        let output = self.engine.test(&inputs, &mut rng)?;

        if output.statistic.len() != batches.len() || output.pvalue.len() != batches.len() {
            return Err(Error::Computation(format!(
                "engine {} returned {} results for {} batches",
                self.engine.name(),
                output.len(),
                batches.len()
            )));
        }
        if let Some(p) = output.pvalue.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(Error::Computation(format!(
                "engine {} produced p-value {p} outside [0, 1]",
                self.engine.name()
            )));
        }
        Ok(output)
    }

    /// Append one trial's output to the history.
    pub fn update(&self, trial_index: usize, output: TestOutput) -> Result<()> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| Error::Computation("history lock poisoned".to_string()))?;
        history.push(TrialRecord { trial: trial_index, output });
        Ok(())
    }

    /// Recorded trials in trial order.
    pub fn history(&self) -> Vec<TrialRecord> {
        let mut records = match self.history.lock() {
            Ok(h) => h.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        records.sort_by_key(|r| r.trial);
        records
    }

    /// All recorded statistics, trial-major.
    pub fn statistics(&self) -> Vec<f64> {
        self.history().into_iter().flat_map(|r| r.output.statistic).collect()
    }

    /// All recorded p-values, trial-major.
    pub fn pvalues(&self) -> Vec<f64> {
        self.history().into_iter().flat_map(|r| r.output.pvalue).collect()
    }
}

impl fmt::Debug for GoodnessOfFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoodnessOfFit")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParametricModelFactory;
    use gp_prob::{DistributionParams, NormalParams};

    fn factory() -> Box<dyn ModelFactory> {
        Box::new(ParametricModelFactory)
    }

    fn trial(index: usize, n: usize, alter_mean: f64) -> Trial {
        let null_p = NormalParams::from_logvar(vec![0.0], &[0.0]);
        let alter_p = NormalParams::from_logvar(vec![alter_mean], &[0.0]);
        let mut rng = StdRng::seed_from_u64(index as u64);
        Trial {
            index,
            null: null_p.to_distribution().unwrap().sample_n(&mut rng, n),
            alter: alter_p.to_distribution().unwrap().sample_n(&mut rng, n),
            null_params: DistributionParams::Normal(null_p),
            alter_params: DistributionParams::Normal(alter_p),
        }
    }

    #[test]
    fn test_mode_parse_roundtrip() {
        for mode in TestMode::ALL {
            assert_eq!(mode.as_str().parse::<TestMode>().unwrap(), mode);
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
        assert!("lrt".parse::<TestMode>().unwrap_err().is_validation());
    }

    #[test]
    fn test_injected_only_mode_needs_engine() {
        let err = GoodnessOfFit::new(GofConfig::new(TestMode::KsdU, 10), factory()).unwrap_err();
        assert!(err.is_validation(), "{err}");
    }

    #[test]
    fn test_batches_drop_partial_tail() {
        let gof = GoodnessOfFit::new(GofConfig::new(TestMode::LrtChi2Given, 3), factory()).unwrap();
        let alter = DMatrix::from_fn(10, 2, |i, j| (i * 2 + j) as f64);
        let mut rng = StdRng::seed_from_u64(0);
        let batches = gof.prepare_batches(&alter, &mut rng).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].shape(), (3, 2));
        // Zero noise keeps values.
        assert_eq!(batches[1][(0, 0)], 6.0);
    }

    #[test]
    fn test_no_full_batch_is_validation() {
        let gof = GoodnessOfFit::new(GofConfig::new(TestMode::LrtChi2Given, 11), factory()).unwrap();
        let err = gof.test(&trial(0, 10, 0.0)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_one_result_per_batch_and_seeded() {
        let mut cfg = GofConfig::new(TestMode::LrtBootstrapGiven, 10);
        cfg.num_bootstrap = 50;
        cfg.alter_noise = 0.1;
        cfg.seed = 7;
        let gof = GoodnessOfFit::new(cfg, factory()).unwrap();
        let t = trial(3, 45, 1.0);
        let a = gof.test(&t).unwrap();
        let b = gof.test(&t).unwrap();
        assert_eq!(a.len(), 4);
        assert_eq!(a, b);
        assert!(a.pvalue.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_history_sorted_by_trial() {
        let gof = GoodnessOfFit::new(GofConfig::new(TestMode::Mmd, 5), factory()).unwrap();
        gof.update(2, TestOutput { statistic: vec![2.0], pvalue: vec![0.2] }).unwrap();
        gof.update(0, TestOutput { statistic: vec![0.0], pvalue: vec![0.9] }).unwrap();
        gof.update(1, TestOutput { statistic: vec![1.0], pvalue: vec![0.5] }).unwrap();
        let trials: Vec<usize> = gof.history().iter().map(|r| r.trial).collect();
        assert_eq!(trials, vec![0, 1, 2]);
        assert_eq!(gof.statistics(), vec![0.0, 1.0, 2.0]);
        assert_eq!(gof.pvalues(), vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn test_config_json_defaults() {
        let cfg: GofConfig =
            serde_json::from_str(r#"{"test_mode": "lrt-b-e", "alter_num_samples": 20}"#).unwrap();
        assert_eq!(cfg.num_bootstrap, 1000);
        assert_eq!(cfg.alpha, 0.05);
        assert_eq!(cfg.device, "cpu");
        assert_eq!(cfg.bootstrap_scheme, BootstrapScheme::Multinomial);

        let bad = serde_json::from_str::<GofConfig>(r#"{"test_mode": "nope", "alter_num_samples": 1}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut cfg = GofConfig::new(TestMode::Mmd, 0);
        assert!(cfg.validate().unwrap_err().is_validation());
        cfg.alter_num_samples = 5;
        cfg.alpha = 1.5;
        assert!(cfg.validate().unwrap_err().is_validation());
        cfg.alpha = 0.05;
        cfg.alter_noise = -1.0;
        assert!(cfg.validate().unwrap_err().is_validation());
    }
}
