use gp_core::Result;
use gp_prob::DistributionParams;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::GmmConfig;
use crate::perturb::perturb_mixture;
use crate::samples::SampleArray;
use crate::GeneratedData;

/// Generate Gaussian-mixture trials.
///
/// 1. `num_trials * num_samples` null draws, reshaped to trials.
/// 2. One perturbed parameter set per trial (log-weights, means,
///    log-variances, each with independent Gaussian noise).
/// 3. `num_samples` draws per trial from that trial's alternative mixture.
///
/// Parameters are validated before the first draw.
pub fn generate(config: &GmmConfig) -> Result<GeneratedData> {
    config.validate()?;
    let null_params = config.null_params();
    let null_dist = null_params.to_distribution()?;
    let (t, n) = (config.num_trials, config.num_samples);

    let mut rng = StdRng::seed_from_u64(config.seed);

    let null_rows = null_dist.sample_n(&mut rng, t * n);
    let null = SampleArray::from_stacked(t, n, &null_rows)?;

    let alter_params: Vec<_> = (0..t)
        .map(|_| {
            perturb_mixture(
                &null_params,
                config.ptb_logweight,
                config.ptb_mean,
                config.ptb_logvar,
                &mut rng,
            )
        })
        .collect();

    let mut alter = SampleArray::zeros(t, n, null_dist.dim());
    for (i, p) in alter_params.iter().enumerate() {
        let dist = p.to_distribution()?;
        alter.set_trial(i, &dist.sample_n(&mut rng, n))?;
    }

    Ok(GeneratedData {
        null,
        alter,
        alter_params: alter_params.into_iter().map(DistributionParams::Mixture).collect(),
    })
}
