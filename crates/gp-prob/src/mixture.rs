//! Gaussian mixture distribution parameterised by log-weights.

use gp_core::{Error, Result};
use nalgebra::{DMatrix, DVector};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::math::{log_sum_exp, softmax};
use crate::mvn::MultivariateNormal;

/// Mixture `Σ_k softmax(logweight)_k · N(mean_k, cov_k)`.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    logweight: Vec<f64>,
    weights: Vec<f64>,
    picker: WeightedIndex<f64>,
    components: Vec<MultivariateNormal>,
}

impl GaussianMixture {
    /// Create a mixture. Log-weights are normalised through softmax.
    pub fn new(logweight: Vec<f64>, components: Vec<MultivariateNormal>) -> Result<Self> {
        if components.is_empty() {
            return Err(Error::Validation("mixture needs at least one component".to_string()));
        }
        if logweight.len() != components.len() {
            return Err(Error::Validation(format!(
                "logweight has {} entries but mixture has {} components",
                logweight.len(),
                components.len()
            )));
        }
        if logweight.iter().any(|w| !w.is_finite()) {
            return Err(Error::Validation("logweight must be finite".to_string()));
        }
        let d = components[0].dim();
        if let Some(k) = components.iter().position(|c| c.dim() != d) {
            return Err(Error::Validation(format!(
                "component {k} has dimension {}, component 0 has {d}",
                components[k].dim()
            )));
        }
        let weights = softmax(&logweight);
        let picker = WeightedIndex::new(&weights)
            .map_err(|e| Error::Validation(format!("invalid mixture weights: {e}")))?;
        Ok(Self { logweight, weights, picker, components })
    }

    /// Number of components `k`.
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Dimensionality `d`.
    pub fn dim(&self) -> usize {
        self.components[0].dim()
    }

    /// Unnormalised log-weights as supplied.
    pub fn logweight(&self) -> &[f64] {
        &self.logweight
    }

    /// Normalised mixture weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Mixture components.
    pub fn components(&self) -> &[MultivariateNormal] {
        &self.components
    }

    /// Per-component joint log-densities `ln w_k + ln N_k(x_i)` (`n × k`).
    pub fn component_log_joint(&self, samples: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let n = samples.nrows();
        let mut out = DMatrix::<f64>::zeros(n, self.n_components());
        for (k, comp) in self.components.iter().enumerate() {
            let lw = self.weights[k].ln();
            let lp = comp.logpdf_rows(samples)?;
            for i in 0..n {
                out[(i, k)] = lw + lp[i];
            }
        }
        Ok(out)
    }

    /// Log-density of every row of `samples`.
    pub fn logpdf_rows(&self, samples: &DMatrix<f64>) -> Result<DVector<f64>> {
        let joint = self.component_log_joint(samples)?;
        let mut buf = vec![0.0; self.n_components()];
        let out: Vec<f64> = (0..joint.nrows())
            .map(|i| {
                for (k, b) in buf.iter_mut().enumerate() {
                    *b = joint[(i, k)];
                }
                log_sum_exp(&buf)
            })
            .collect();
        Ok(DVector::from_vec(out))
    }

    /// Draw `n` vectors as rows of an `n × d` matrix.
    ///
    /// Every draw first samples one vector from each component and then keeps
    /// the one picked by a categorical draw over the mixture weights.
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> DMatrix<f64> {
        let d = self.dim();
        let k = self.n_components();
        let mut out = DMatrix::<f64>::zeros(n, d);
        let mut candidates = vec![0.0; k * d];
        for i in 0..n {
            for (c, comp) in self.components.iter().enumerate() {
                comp.sample_into(rng, &mut candidates[c * d..(c + 1) * d]);
            }
            let pick = self.picker.sample(rng);
            for j in 0..d {
                out[(i, j)] = candidates[pick * d + j];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn two_component_1d(sep: f64) -> GaussianMixture {
        let c0 = MultivariateNormal::new(DVector::from_vec(vec![-sep]), DMatrix::identity(1, 1)).unwrap();
        let c1 = MultivariateNormal::new(DVector::from_vec(vec![sep]), DMatrix::identity(1, 1)).unwrap();
        GaussianMixture::new(vec![0.0, (3.0f64).ln()], vec![c0, c1]).unwrap()
    }

    #[test]
    fn test_weights_from_logweights() {
        let gm = two_component_1d(3.0);
        assert_relative_eq!(gm.weights()[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(gm.weights()[1], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_single_component_matches_mvn() {
        let c = MultivariateNormal::new(DVector::from_vec(vec![0.5, 1.0]), DMatrix::identity(2, 2)).unwrap();
        let gm = GaussianMixture::new(vec![0.0], vec![c.clone()]).unwrap();
        let xs = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 2.0]);
        let a = gm.logpdf_rows(&xs).unwrap();
        let b = c.logpdf_rows(&xs).unwrap();
        assert_relative_eq!(a[0], b[0], epsilon = 1e-12);
        assert_relative_eq!(a[1], b[1], epsilon = 1e-12);
    }

    #[test]
    fn test_sample_component_proportions() {
        let gm = two_component_1d(10.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let xs = gm.sample_n(&mut rng, 10_000);
        let right = xs.column(0).iter().filter(|&&x| x > 0.0).count() as f64 / 10_000.0;
        assert!((right - 0.75).abs() < 0.02, "fraction in right component {right}");
    }

    #[test]
    fn test_component_frequencies_follow_weights() {
        let comps: Vec<_> = [-20.0, 0.0, 20.0]
            .iter()
            .map(|&m| MultivariateNormal::new(DVector::from_vec(vec![m]), DMatrix::identity(1, 1)).unwrap())
            .collect();
        let probs = [0.2, 0.5, 0.3];
        let gm = GaussianMixture::new(probs.iter().map(|p: &f64| p.ln()).collect(), comps).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let n = 20_000;
        let xs = gm.sample_n(&mut rng, n);
        let mut counts = [0usize; 3];
        for &x in xs.column(0).iter() {
            counts[if x < -10.0 { 0 } else if x < 10.0 { 1 } else { 2 }] += 1;
        }
        for (c, p) in counts.iter().zip(probs) {
            let freq = *c as f64 / n as f64;
            assert!((freq - p).abs() < 0.02, "freq {freq} vs p {p}");
        }
    }

    #[test]
    fn test_negligible_component_is_never_drawn() {
        let c0 = MultivariateNormal::new(DVector::from_vec(vec![0.0]), DMatrix::identity(1, 1)).unwrap();
        let c1 = MultivariateNormal::new(DVector::from_vec(vec![100.0]), DMatrix::identity(1, 1)).unwrap();
        let gm = GaussianMixture::new(vec![0.0, -800.0], vec![c0, c1]).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let xs = gm.sample_n(&mut rng, 2_000);
        assert!(xs.column(0).iter().all(|&x| x < 50.0));
    }

    #[test]
    fn test_rejects_mismatched_components() {
        let c1 = MultivariateNormal::new(DVector::from_vec(vec![0.0]), DMatrix::identity(1, 1)).unwrap();
        let c2 = MultivariateNormal::new(DVector::from_vec(vec![0.0, 0.0]), DMatrix::identity(2, 2)).unwrap();
        assert!(GaussianMixture::new(vec![0.0, 0.0], vec![c1.clone(), c2]).unwrap_err().is_validation());
        assert!(GaussianMixture::new(vec![0.0], vec![c1.clone(), c1]).unwrap_err().is_validation());
        assert!(GaussianMixture::new(vec![], vec![]).unwrap_err().is_validation());
    }
}
