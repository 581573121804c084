//! Independent chains and their aggregation into one trace.

use alloc::vec;
use alloc::vec::Vec;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use super::{
    parameter_names, ChainOutput, GibbsSampler, ModelData, ModelError, ModelSpec, SamplerConfig,
};
use crate::trace::PosteriorTrace;

/// Everything the sampler produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerOutput {
    /// Draws from all chains.
    pub trace: PosteriorTrace,
    /// Posterior mean of the linear predictor per area, averaged over
    /// chains (standardized units).
    pub fitted: Vec<f64>,
}

/// RNG for chain `chain`: the base stream jumped `chain` times, so streams
/// never overlap.
pub fn chain_rng(seed: u64, chain: usize) -> Xoshiro256PlusPlus {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    for _ in 0..chain {
        rng.jump();
    }
    rng
}

/// Run `config.chains` independent chains and collect their draws.
///
/// With the `parallel` feature the chains run on the rayon pool; the result
/// is identical either way.
pub fn run_chains(
    data: &ModelData,
    spec: &ModelSpec,
    config: &SamplerConfig,
) -> Result<SamplerOutput, ModelError> {
    config.validate()?;
    spec.priors.validate()?;
    if spec.has_spatial() && data.spatial.is_none() {
        return Err(ModelError::MissingWeights);
    }

    let run_one = |chain: usize| -> ChainOutput {
        GibbsSampler::new(data, *spec, chain_rng(config.seed, chain)).run(config)
    };

    #[cfg(feature = "parallel")]
    let outputs: Vec<ChainOutput> = {
        use rayon::prelude::*;
        (0..config.chains).into_par_iter().map(run_one).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let outputs: Vec<ChainOutput> = (0..config.chains).map(run_one).collect();

    let names = parameter_names(data, spec, config.store_area_effects);
    let mut values = Vec::with_capacity(config.chains * config.draws * names.len());
    let mut divergences = Vec::with_capacity(config.chains);
    let mut fitted = vec![0.0; data.n()];
    for output in outputs {
        values.extend_from_slice(&output.draws);
        divergences.push(output.divergences);
        for (f, m) in fitted.iter_mut().zip(&output.fitted_mean) {
            *f += m / config.chains as f64;
        }
    }

    let trace = PosteriorTrace::new(names, config.chains, config.draws, values, divergences)?;
    Ok(SamplerOutput { trace, fitted })
}
