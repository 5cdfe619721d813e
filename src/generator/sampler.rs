use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma, Normal};

use crate::config::DistributionSpec;
use crate::error::{Error, Result};

/// A source of real-valued variates. Each call draws a fresh value; the only
/// state carried between calls is the sampler's own RNG stream.
pub trait VariateSampler: Send {
    fn sample(&mut self) -> f64;

    /// Distribution family, for logs.
    fn family(&self) -> &'static str;
}

// ─── Gamma ───────────────────────────────────────────────────────

/// Gamma(shape, scale), the skewed low-latency mode.
pub struct GammaSampler {
    rng: StdRng,
    dist: Gamma<f64>,
}

impl GammaSampler {
    pub fn new(shape: f64, scale: f64, rng: StdRng) -> Result<Self> {
        DistributionSpec::Gamma { shape, scale }.validate()?;
        let dist = Gamma::new(shape, scale).map_err(|e| Error::Distribution {
            family: "gamma",
            reason: e.to_string(),
        })?;
        Ok(Self { rng, dist })
    }
}

impl VariateSampler for GammaSampler {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    fn family(&self) -> &'static str {
        "gamma"
    }
}

// ─── Normal ──────────────────────────────────────────────────────

/// Normal(mean, std_dev), used for the mid and high latency modes.
pub struct NormalSampler {
    rng: StdRng,
    dist: Normal<f64>,
}

impl NormalSampler {
    /// `rand_distr` accepts a negative or NaN std_dev and a NaN mean, so
    /// those are checked here first.
    pub fn new(mean: f64, std_dev: f64, rng: StdRng) -> Result<Self> {
        DistributionSpec::Normal { mean, std_dev }.validate()?;
        let dist = Normal::new(mean, std_dev).map_err(|e| Error::Distribution {
            family: "normal",
            reason: e.to_string(),
        })?;
        Ok(Self { rng, dist })
    }
}

impl VariateSampler for NormalSampler {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    fn family(&self) -> &'static str {
        "normal"
    }
}

// ─── Scaling wrapper ─────────────────────────────────────────────

/// Multiplies every variate of the wrapped sampler by a constant.
pub struct Scaled<S> {
    inner: S,
    factor: f64,
}

impl<S: VariateSampler> VariateSampler for Scaled<S> {
    fn sample(&mut self) -> f64 {
        self.inner.sample() * self.factor
    }

    fn family(&self) -> &'static str {
        self.inner.family()
    }
}

// ─── Construction from config ────────────────────────────────────

/// Seeded stream `stream` of the master seed, or OS entropy when unseeded.
pub fn rng_for(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

pub fn build_sampler(
    spec: &DistributionSpec,
    multiplier: f64,
    rng: StdRng,
) -> Result<Box<dyn VariateSampler>> {
    fn boxed<S: VariateSampler + 'static>(s: S, factor: f64) -> Box<dyn VariateSampler> {
        if factor == 1.0 {
            Box::new(s)
        } else {
            Box::new(Scaled { inner: s, factor })
        }
    }

    Ok(match *spec {
        DistributionSpec::Gamma { shape, scale } => {
            boxed(GammaSampler::new(shape, scale, rng)?, multiplier)
        }
        DistributionSpec::Normal { mean, std_dev } => {
            boxed(NormalSampler::new(mean, std_dev, rng)?, multiplier)
        }
    })
}
