use gp_prob::{MixtureParams, NormalParams};
use rand::Rng;
use rand_distr::StandardNormal;

/// `v + scale * N(0, 1)` element-wise.
pub fn jitter<R: Rng + ?Sized>(v: &[f64], scale: f64, rng: &mut R) -> Vec<f64> {
    v.iter().map(|&x| x + scale * rng.sample::<f64, _>(StandardNormal)).collect()
}

/// Shift the log-variances of `cov` by `eps`.
///
/// `Σ' = D Σ D` with `D = diag(exp(eps / 2))`: diagonal entries become
/// `Σ_ii · exp(eps_i)`, correlations are unchanged and positive-definiteness
/// is preserved.
pub fn shift_log_variance(cov: &[Vec<f64>], eps: &[f64]) -> Vec<Vec<f64>> {
    let scale: Vec<f64> = eps.iter().map(|e| (0.5 * e).exp()).collect();
    cov.iter()
        .enumerate()
        .map(|(i, row)| row.iter().enumerate().map(|(j, &c)| c * scale[i] * scale[j]).collect())
        .collect()
}

/// Perturb a Normal's mean and log-variances.
pub fn perturb_normal<R: Rng + ?Sized>(
    p: &NormalParams,
    ptb_mean: f64,
    ptb_logvar: f64,
    rng: &mut R,
) -> NormalParams {
    let mean = jitter(&p.mean, ptb_mean, rng);
    let eps = jitter(&vec![0.0; p.dim()], ptb_logvar, rng);
    NormalParams::new(mean, shift_log_variance(&p.cov, &eps))
}

/// Perturb a mixture's log-weights, means and log-variances independently.
pub fn perturb_mixture<R: Rng + ?Sized>(
    p: &MixtureParams,
    ptb_logweight: f64,
    ptb_mean: f64,
    ptb_logvar: f64,
    rng: &mut R,
) -> MixtureParams {
    let logweight = jitter(&p.logweight, ptb_logweight, rng);
    let mean = p.mean.iter().map(|m| jitter(m, ptb_mean, rng)).collect();
    let cov = p
        .cov
        .iter()
        .map(|c| {
            let eps = jitter(&vec![0.0; c.len()], ptb_logvar, rng);
            shift_log_variance(c, &eps)
        })
        .collect();
    MixtureParams::new(logweight, mean, cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn test_shift_log_variance_scales_diagonal_keeps_correlation() {
        let cov = vec![vec![2.0, 0.6], vec![0.6, 1.0]];
        let out = shift_log_variance(&cov, &[1.0, -0.5]);
        assert_relative_eq!(out[0][0], 2.0 * 1f64.exp(), epsilon = 1e-12);
        assert_relative_eq!(out[1][1], (-0.5f64).exp(), epsilon = 1e-12);
        let corr = |m: &Vec<Vec<f64>>| m[0][1] / (m[0][0] * m[1][1]).sqrt();
        assert_relative_eq!(corr(&out), corr(&cov), epsilon = 1e-12);
        assert_eq!(out[0][1], out[1][0]);
    }

    #[test]
    fn test_zero_scale_is_identity() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let p = MixtureParams::new(
            vec![0.1, -0.2],
            vec![vec![1.0, 2.0], vec![-1.0, 0.5]],
            vec![vec![vec![1.0, 0.2], vec![0.2, 1.0]]; 2],
        );
        assert_eq!(perturb_mixture(&p, 0.0, 0.0, 0.0, &mut rng), p);
    }

    #[test]
    fn test_perturbed_normal_stays_valid() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(9);
        let p = NormalParams::new(vec![0.0, 0.0], vec![vec![1.0, 0.9], vec![0.9, 1.0]]);
        for _ in 0..50 {
            let q = perturb_normal(&p, 2.0, 1.5, &mut rng);
            assert!(q.to_distribution().is_ok());
            assert_ne!(q.mean, p.mean);
        }
    }
}
