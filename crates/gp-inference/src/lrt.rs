//! Likelihood-ratio goodness-of-fit test.
//!
//! For each batch of alternative samples the statistic is
//! `Σ 2·(ln p_alt(x) − ln p_null(x))`. Its reference distribution comes from
//! one of two bootstrap procedures over the null samples, or from the
//! asymptotic χ²(1) law.
//!
//! Bootstrap references:
//! - Hušková & Janssen (1993), "Consistency of the generalized bootstrap for
//!   degenerate U-statistics"
//! - Bickel & Ren (2001), "The bootstrap in hypothesis testing"

use gp_core::{Error, Result, TestOutput};
use gp_prob::chi_squared;
use nalgebra::DMatrix;
use rand::distr::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::FittedModel;

/// Bootstrap procedure used to build the reference distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapScheme {
    /// Multinomial-weight bootstrap for degenerate U-statistics.
    #[default]
    Multinomial,
    /// m-out-of-n resampling of per-sample terms.
    MOutOfN,
}

/// LRT settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrtConfig {
    /// Bootstrap draws per batch.
    pub num_bootstrap: usize,
    /// Bootstrap p-values when `true`, χ²(1) p-values otherwise.
    pub bootstrap_approx: bool,
    /// Bootstrap procedure.
    pub scheme: BootstrapScheme,
}

/// Likelihood-ratio test engine.
#[derive(Debug, Clone)]
pub struct LrtEngine {
    config: LrtConfig,
}

impl LrtEngine {
    /// Create an engine.
    pub fn new(config: LrtConfig) -> Result<Self> {
        if config.bootstrap_approx && config.num_bootstrap == 0 {
            return Err(Error::Validation(
                "bootstrap p-values need num_bootstrap > 0".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Engine settings.
    pub fn config(&self) -> &LrtConfig {
        &self.config
    }

    /// Test every batch of `alter_batches`.
    ///
    /// Without `alter_model` the alternative is fitted per batch, starting
    /// from the null model's parameters.
    pub fn test(
        &self,
        null_samples: &DMatrix<f64>,
        alter_batches: &[DMatrix<f64>],
        null_model: &dyn FittedModel,
        alter_model: Option<&dyn FittedModel>,
        rng: &mut StdRng,
    ) -> Result<TestOutput> {
        let mut out = TestOutput::with_capacity(alter_batches.len());
        for (b, batch) in alter_batches.iter().enumerate() {
            let fitted;
            let alter: &dyn FittedModel = match alter_model {
                Some(m) => m,
                None => {
                    fitted = null_model.fit(batch)?;
                    fitted.as_ref()
                }
            };

            let (statistic, _) = lrt(batch, null_model, alter)?;
            let pvalue = if self.config.bootstrap_approx {
                let reference = self.bootstrap(null_samples, batch.nrows(), null_model, alter, rng)?;
                bootstrap_pvalue(&reference, statistic)
            } else {
                chi_squared::sf(statistic, 1.0)?
            };
            log::trace!("lrt batch {b}: statistic={statistic:.6} pvalue={pvalue:.6}");
            out.push(statistic, pvalue);
        }
        Ok(out)
    }

    /// Bootstrap reference values for a batch of `m` samples.
    pub fn bootstrap(
        &self,
        null_samples: &DMatrix<f64>,
        m: usize,
        null_model: &dyn FittedModel,
        alter_model: &dyn FittedModel,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>> {
        let n = null_samples.nrows();
        match self.config.scheme {
            BootstrapScheme::Multinomial => {
                if m > n {
                    return Err(Error::Validation(format!(
                        "multinomial bootstrap needs batch size <= null samples ({m} > {n})"
                    )));
                }
                let head = null_samples.rows(0, m).into_owned();
                let (_, terms) = lrt(&head, null_model, alter_model)?;
                multinomial_bootstrap(&terms, self.config.num_bootstrap, rng)
            }
            BootstrapScheme::MOutOfN => {
                let (_, terms) = lrt(null_samples, null_model, alter_model)?;
                m_out_of_n_bootstrap(&terms, m, self.config.num_bootstrap, rng)
            }
        }
    }
}

/// Per-sample terms `2·(ln p_alt(x) − ln p_null(x))` and their sum.
///
/// A zero or non-finite density under either model is a computation error.
pub fn lrt(
    samples: &DMatrix<f64>,
    null_model: &dyn FittedModel,
    alter_model: &dyn FittedModel,
) -> Result<(f64, Vec<f64>)> {
    let null_lp = null_model.log_pdf(samples)?;
    let alter_lp = alter_model.log_pdf(samples)?;
    let mut terms = Vec::with_capacity(samples.nrows());
    for (i, (&a, &o)) in alter_lp.iter().zip(null_lp.iter()).enumerate() {
        if !a.is_finite() || !o.is_finite() {
            return Err(Error::Computation(format!(
                "sample {i} has zero or non-finite density (ln p_alt={a}, ln p_null={o})"
            )));
        }
        terms.push(2.0 * (a - o));
    }
    let statistic: f64 = terms.iter().sum();
    Ok((statistic, terms))
}

fn draw_seeds(rng: &mut StdRng, n: usize) -> Vec<u64> {
    (0..n).map(|_| rng.random::<u64>()).collect()
}

/// Multinomial-weight bootstrap of `Σ_i Σ_j (w_i − 1/m)(w_j − 1/m)·l_i·l_j`.
///
/// `w = W/m` where `W ~ Multinomial(m, 1/m, …, 1/m)` and `m = terms.len()`.
/// The counts come from `m` equiprobable cell draws.
pub fn multinomial_bootstrap(
    terms: &[f64],
    num_bootstrap: usize,
    rng: &mut StdRng,
) -> Result<Vec<f64>> {
    let m = terms.len();
    if m == 0 {
        return Ok(vec![0.0; num_bootstrap]);
    }
    let cell = Uniform::new(0, m)
        .map_err(|e| Error::Validation(format!("multinomial cells: {e}")))?;
    let inv_m = 1.0 / m as f64;
    Ok(draw_seeds(rng, num_bootstrap)
        .into_par_iter()
        .map(|seed| {
            let r = StdRng::seed_from_u64(seed);
            let mut counts = vec![0u32; m];
            for c in r.sample_iter(cell).take(m) {
                counts[c] += 1;
            }
            // The double sum factorises into the square of one centred sum.
            let s: f64 = counts
                .iter()
                .zip(terms)
                .map(|(&c, &l)| (c as f64 * inv_m - inv_m) * l)
                .sum();
            s * s
        })
        .collect())
}

/// m-out-of-n bootstrap: sums of `m` terms drawn with replacement.
pub fn m_out_of_n_bootstrap(
    terms: &[f64],
    m: usize,
    num_bootstrap: usize,
    rng: &mut StdRng,
) -> Result<Vec<f64>> {
    let n = terms.len();
    if n == 0 {
        return Err(Error::Validation("m-out-of-n bootstrap needs null samples".to_string()));
    }
    let pick = Uniform::new(0, n)
        .map_err(|e| Error::Validation(format!("m-out-of-n indices: {e}")))?;
    Ok(draw_seeds(rng, num_bootstrap)
        .into_par_iter()
        .map(|seed| {
            let r = StdRng::seed_from_u64(seed);
            r.sample_iter(pick).take(m).map(|i| terms[i]).sum::<f64>()
        })
        .collect())
}

/// Fraction of `reference` strictly greater than `observed`.
pub fn bootstrap_pvalue(reference: &[f64], observed: f64) -> f64 {
    if reference.is_empty() {
        return 1.0;
    }
    reference.iter().filter(|&&v| v > observed).count() as f64 / reference.len() as f64
}
