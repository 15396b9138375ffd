//! Maximum Mean Discrepancy two-sample test.
//!
//! Unbiased MMD² between the null pool and each alternative batch with a
//! Gaussian kernel `k(a, b) = exp(−|a − b|² / h)`, where `h` is the median
//! pairwise squared distance of the pooled sample. The p-value comes from
//! random relabelings of the pooled sample.

use gp_core::{Error, Result, TestOutput};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::engine::{EngineInputs, GofStatistic, ModelRequirement};

/// Kernel two-sample engine.
#[derive(Debug, Clone)]
pub struct MmdEngine {
    num_permutations: usize,
}

impl MmdEngine {
    /// Create an engine drawing `num_permutations` relabelings per batch.
    pub fn new(num_permutations: usize) -> Result<Self> {
        if num_permutations == 0 {
            return Err(Error::Validation("MMD needs num_bootstrap > 0 permutations".to_string()));
        }
        Ok(Self { num_permutations })
    }

    /// Permutations per batch.
    pub fn num_permutations(&self) -> usize {
        self.num_permutations
    }

    /// Statistic and permutation p-value for one pair of samples.
    pub fn test_pair(
        &self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        rng: &mut StdRng,
    ) -> Result<(f64, f64)> {
        if x.nrows() < 2 || y.nrows() < 2 {
            return Err(Error::Validation(format!(
                "MMD needs at least 2 samples per side, got {} and {}",
                x.nrows(),
                y.nrows()
            )));
        }
        if x.ncols() != y.ncols() {
            return Err(Error::Validation(format!(
                "MMD samples disagree on dimension: {} vs {}",
                x.ncols(),
                y.ncols()
            )));
        }
        let (n, m) = (x.nrows(), y.nrows());
        let sq = pooled_sq_dists(x, y);
        let h = median_heuristic(&sq);
        let gram = sq.map(|v| (-v / h).exp());

        let labels: Vec<usize> = (0..n + m).collect();
        let observed = mmd2_unbiased(&gram, &labels[..n], &labels[n..]);
        if !observed.is_finite() {
            return Err(Error::Computation("MMD statistic is not finite".to_string()));
        }

        let seeds: Vec<u64> = (0..self.num_permutations).map(|_| rng.random::<u64>()).collect();
        let exceed = seeds
            .into_par_iter()
            .filter(|&seed| {
                let mut r = StdRng::seed_from_u64(seed);
                let mut perm = labels.clone();
                perm.shuffle(&mut r);
                mmd2_unbiased(&gram, &perm[..n], &perm[n..]) >= observed
            })
            .count();
        let pvalue = (1 + exceed) as f64 / (1 + self.num_permutations) as f64;
        Ok((observed, pvalue))
    }
}

impl GofStatistic for MmdEngine {
    fn name(&self) -> &str {
        "mmd"
    }

    fn requirements(&self) -> ModelRequirement {
        ModelRequirement::SamplesOnly
    }

    fn test(&self, inputs: &EngineInputs<'_>, rng: &mut StdRng) -> Result<TestOutput> {
        let mut out = TestOutput::with_capacity(inputs.alter_batches.len());
        for batch in inputs.alter_batches {
            let (stat, p) = self.test_pair(inputs.null_samples, batch, rng)?;
            out.push(stat, p);
        }
        Ok(out)
    }
}

/// Squared distances between all rows of `[x; y]`.
fn pooled_sq_dists(x: &DMatrix<f64>, y: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let total = n + y.nrows();
    let row = |i: usize| if i < n { x.row(i) } else { y.row(i - n) };
    let mut sq = DMatrix::<f64>::zeros(total, total);
    for i in 0..total {
        for j in 0..i {
            let d = (&row(i) - &row(j)).norm_squared();
            sq[(i, j)] = d;
            sq[(j, i)] = d;
        }
    }
    sq
}

/// Median of the off-diagonal squared distances; `1.0` if it is zero.
pub fn median_heuristic(sq: &DMatrix<f64>) -> f64 {
    let t = sq.nrows();
    let mut vals: Vec<f64> = (0..t).flat_map(|i| (0..i).map(move |j| (i, j))).map(|ij| sq[ij]).collect();
    if vals.is_empty() {
        return 1.0;
    }
    let mid = vals.len() / 2;
    let (_, median, _) = vals.select_nth_unstable_by(mid, f64::total_cmp);
    if *median > 0.0 && median.is_finite() { *median } else { 1.0 }
}

/// Unbiased MMD² between index sets `xs` and `ys` of a Gram matrix.
pub fn mmd2_unbiased(gram: &DMatrix<f64>, xs: &[usize], ys: &[usize]) -> f64 {
    let within = |idx: &[usize]| {
        let mut s = 0.0;
        for (a, &i) in idx.iter().enumerate() {
            for &j in &idx[..a] {
                s += gram[(i, j)];
            }
        }
        let k = idx.len() as f64;
        2.0 * s / (k * (k - 1.0))
    };
    let mut cross = 0.0;
    for &i in xs {
        for &j in ys {
            cross += gram[(i, j)];
        }
    }
    within(xs) + within(ys) - 2.0 * cross / (xs.len() * ys.len()) as f64
}
