//! Power / size experiments over a whole dataset.

use gp_core::{Error, Result, TrialRecord};
use gp_datasets::Dataset;
use rayon::prelude::*;
use serde::Serialize;

use crate::gof::{GoodnessOfFit, TestMode};

/// Outcome of testing every trial of a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResult {
    /// Dataset name.
    pub data_name: String,
    /// Dataset fingerprint.
    pub fingerprint: String,
    /// Test mode.
    pub test_mode: TestMode,
    /// Number of trials tested.
    pub num_trials: usize,
    /// Significance level.
    pub alpha: f64,
    /// Fraction of batches with p-value below `alpha`.
    pub rejection_rate: f64,
    /// Per-trial outputs in trial order.
    pub records: Vec<TrialRecord>,
    /// Wall-clock time in seconds.
    pub wall_s: f64,
}

/// Test all trials of `dataset` with `gof`.
///
/// Trials run in parallel; `n_threads > 0` uses a dedicated pool of that
/// size. The first failing trial aborts the run.
pub fn run_experiment(
    dataset: &Dataset,
    gof: &GoodnessOfFit,
    n_threads: usize,
) -> Result<ExperimentResult> {
    let start = std::time::Instant::now();
    let indices: Vec<usize> = (0..dataset.len()).collect();

    let run_trials = |indices: &[usize]| -> Result<Vec<TrialRecord>> {
        indices
            .par_iter()
            .map(|&i| -> Result<TrialRecord> {
                let trial = dataset.trial(i)?;
                let output = gof.test(&trial)?;
                gof.update(i, output.clone())?;
                Ok(TrialRecord { trial: i, output })
            })
            .collect()
    };

    let records = if n_threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| Error::Computation(format!("failed to create thread pool: {e}")))?;
        pool.install(|| run_trials(&indices))?
    } else {
        run_trials(&indices)?
    };

    let alpha = gof.config().alpha;
    let (rejected, total) = records.iter().fold((0usize, 0usize), |(r, t), rec| {
        (r + rec.output.rejections(alpha), t + rec.output.len())
    });
    let rejection_rate = if total == 0 { 0.0 } else { rejected as f64 / total as f64 };
    let wall_s = start.elapsed().as_secs_f64();

    log::info!(
        "{} on {}: {} trials, rejection rate {:.4} at alpha={} ({:.2}s)",
        gof.config().test_mode,
        dataset.data_name(),
        records.len(),
        rejection_rate,
        alpha,
        wall_s
    );

    Ok(ExperimentResult {
        data_name: dataset.data_name().to_string(),
        fingerprint: dataset.fingerprint().to_string(),
        test_mode: gof.config().test_mode,
        num_trials: records.len(),
        alpha,
        rejection_rate,
        records,
        wall_s,
    })
}
