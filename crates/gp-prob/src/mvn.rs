//! Multivariate Normal distribution.
//!
//! The covariance is validated once at construction (shape, finiteness,
//! symmetry, Cholesky factorisation); evaluation and sampling reuse the
//! lower-triangular factor `L` with `Σ = L Lᵀ`.

use gp_core::{Error, Result};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::math::LN_2PI;

const SYMMETRY_TOL: f64 = 1e-9;

/// Multivariate Normal `N(mean, cov)`.
#[derive(Debug, Clone)]
pub struct MultivariateNormal {
    mean: DVector<f64>,
    cov: DMatrix<f64>,
    chol_l: DMatrix<f64>,
    /// `-0.5 * (d ln(2π) + ln|Σ|)`
    log_norm: f64,
}

impl MultivariateNormal {
    /// Create a distribution, failing fast on malformed parameters.
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self> {
        let d = mean.len();
        if d == 0 {
            return Err(Error::Validation("mean must be non-empty".to_string()));
        }
        if cov.nrows() != d || cov.ncols() != d {
            return Err(Error::Validation(format!(
                "covariance must be {d}x{d} to match mean, got {}x{}",
                cov.nrows(),
                cov.ncols()
            )));
        }
        if mean.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("mean must be finite".to_string()));
        }
        if cov.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("covariance must be finite".to_string()));
        }
        for i in 0..d {
            for j in 0..i {
                let (a, b) = (cov[(i, j)], cov[(j, i)]);
                if (a - b).abs() > SYMMETRY_TOL * a.abs().max(b.abs()).max(1.0) {
                    return Err(Error::Validation(format!(
                        "covariance must be symmetric: cov[{i},{j}]={a} != cov[{j},{i}]={b}"
                    )));
                }
            }
        }

        let chol = cov.clone().cholesky().ok_or_else(|| {
            Error::Validation("covariance is not positive definite (Cholesky failed)".to_string())
        })?;
        let chol_l = chol.l();

        let mut logdet = 0.0;
        for i in 0..d {
            let l = chol_l[(i, i)];
            if !(l.is_finite() && l > 0.0) {
                return Err(Error::Validation(
                    "covariance is not positive definite (invalid Cholesky diagonal)".to_string(),
                ));
            }
            logdet += 2.0 * l.ln();
        }
        let log_norm = -0.5 * (d as f64 * LN_2PI + logdet);

        Ok(Self { mean, cov, chol_l, log_norm })
    }

    /// Dimensionality `d`.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Mean vector.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Covariance matrix.
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Lower Cholesky factor of the covariance.
    pub fn chol_l(&self) -> &DMatrix<f64> {
        &self.chol_l
    }

    /// Log-density of a single point.
    pub fn logpdf(&self, x: &[f64]) -> Result<f64> {
        if x.len() != self.dim() {
            return Err(Error::Validation(format!(
                "point has dimension {}, distribution has {}",
                x.len(),
                self.dim()
            )));
        }
        let centered =
            DMatrix::from_iterator(x.len(), 1, x.iter().zip(self.mean.iter()).map(|(a, m)| a - m));
        Ok(self.logpdf_columns(centered)?[0])
    }

    /// Log-density of every row of `samples` (`n × d`).
    pub fn logpdf_rows(&self, samples: &DMatrix<f64>) -> Result<DVector<f64>> {
        let d = self.dim();
        if samples.ncols() != d {
            return Err(Error::Validation(format!(
                "samples have {} columns, distribution has dimension {d}",
                samples.ncols()
            )));
        }
        let mut centered = samples.transpose();
        for mut col in centered.column_iter_mut() {
            col -= &self.mean;
        }
        self.logpdf_columns(centered)
    }

    /// `log_norm − ½|L⁻¹ c|²` for every centred column `c` (`d × n`).
    fn logpdf_columns(&self, centered: DMatrix<f64>) -> Result<DVector<f64>> {
        let z = self.chol_l.solve_lower_triangular(&centered).ok_or_else(|| {
            Error::Computation("singular Cholesky factor in triangular solve".to_string())
        })?;
        Ok(DVector::from_iterator(
            z.ncols(),
            z.column_iter().map(|c| self.log_norm - 0.5 * c.norm_squared()),
        ))
    }

    /// Draw one vector into `out` (`mean + L z`, `z ~ N(0, I)`).
    pub fn sample_into<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f64]) {
        let d = self.dim();
        let z: Vec<f64> = (0..d).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
        for i in 0..d {
            let mut s = self.mean[i];
            for j in 0..=i {
                s += self.chol_l[(i, j)] * z[j];
            }
            out[i] = s;
        }
    }

    /// Draw one vector.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        let mut out = vec![0.0; self.dim()];
        self.sample_into(rng, &mut out);
        DVector::from_vec(out)
    }

    /// Draw `n` vectors as the rows of an `n × d` matrix.
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> DMatrix<f64> {
        let d = self.dim();
        let mut out = DMatrix::<f64>::zeros(n, d);
        let mut row = vec![0.0; d];
        for i in 0..n {
            self.sample_into(rng, &mut row);
            for k in 0..d {
                out[(i, k)] = row[k];
            }
        }
        out
    }
}
