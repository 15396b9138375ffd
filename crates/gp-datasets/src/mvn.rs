use gp_core::Result;
use gp_prob::DistributionParams;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::MvnConfig;
use crate::perturb::perturb_normal;
use crate::samples::SampleArray;
use crate::GeneratedData;

/// Generate single-Gaussian trials.
///
/// Same structure as the mixture generator without component selection; the
/// alternative samples use the perturbed mean and the perturbed covariance.
pub fn generate(config: &MvnConfig) -> Result<GeneratedData> {
    config.validate()?;
    let null_params = config.null_params();
    let null_dist = null_params.to_distribution()?;
    let (t, n) = (config.num_trials, config.num_samples);

    let mut rng = StdRng::seed_from_u64(config.seed);

    let null_rows = null_dist.sample_n(&mut rng, t * n);
    let null = SampleArray::from_stacked(t, n, &null_rows)?;

    let alter_params: Vec<_> = (0..t)
        .map(|_| perturb_normal(&null_params, config.ptb_mean, config.ptb_logvar, &mut rng))
        .collect();

    let mut alter = SampleArray::zeros(t, n, null_dist.dim());
    for (i, p) in alter_params.iter().enumerate() {
        let dist = p.to_distribution()?;
        alter.set_trial(i, &dist.sample_n(&mut rng, n))?;
    }

    Ok(GeneratedData {
        null,
        alter,
        alter_params: alter_params.into_iter().map(DistributionParams::Normal).collect(),
    })
}
