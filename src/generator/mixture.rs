use rand::rngs::StdRng;
use rand::Rng;

use super::sampler::{build_sampler, rng_for, VariateSampler};
use crate::config::WorkloadConfig;
use crate::error::{Error, Result};

/// Smallest value the generator ever emits.
pub const MIN_MEASUREMENT: i64 = 1;

// ─── Schedule ────────────────────────────────────────────────────

/// Ordered slots, each naming a component. Weights 2/6/2 expand to
/// `[0,0,1,1,1,1,1,1,2,2]`; picking a slot uniformly gives 20/60/20.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixtureSchedule {
    slots: Vec<usize>,
}

impl MixtureSchedule {
    pub fn from_weights(weights: &[u32]) -> Self {
        let slots = weights
            .iter()
            .enumerate()
            .flat_map(|(component, &w)| std::iter::repeat(component).take(w as usize))
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn component_at(&self, slot: usize) -> usize {
        self.slots[slot]
    }

    /// Fraction of slots that map to `component`.
    pub fn share(&self, component: usize) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        let n = self.slots.iter().filter(|&&c| c == component).count();
        n as f64 / self.slots.len() as f64
    }
}

// ─── Generator ───────────────────────────────────────────────────

/// A named, weighted sampler handed to the generator.
pub struct Component {
    pub name: String,
    pub weight: u32,
    pub sampler: Box<dyn VariateSampler>,
}

/// One generated measurement plus which slot and component produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub slot: usize,
    pub component: usize,
    pub ms: i64,
}

pub struct MixtureGenerator<R = StdRng> {
    schedule: MixtureSchedule,
    components: Vec<Component>,
    rng: R,
}

impl MixtureGenerator<StdRng> {
    /// Build samplers for every configured component. Stream 0 of the seed
    /// drives slot selection; component `i` gets stream `i + 1`.
    pub fn from_config(config: &WorkloadConfig) -> Result<Self> {
        let components = config
            .mixture
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let rng = rng_for(config.seed, i as u64 + 1);
                Ok(Component {
                    name: c.name.clone(),
                    weight: c.weight,
                    sampler: build_sampler(&c.distribution, c.multiplier, rng)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_parts(components, rng_for(config.seed, 0))
    }
}

impl<R: Rng> MixtureGenerator<R> {
    pub fn from_parts(components: Vec<Component>, rng: R) -> Result<Self> {
        let weights: Vec<u32> = components.iter().map(|c| c.weight).collect();
        let schedule = MixtureSchedule::from_weights(&weights);
        if schedule.is_empty() {
            return Err(Error::config("mixture schedule has no slots"));
        }
        if schedule.len() > u32::MAX as usize {
            return Err(Error::config("mixture schedule is too large"));
        }

        for c in &components {
            tracing::debug!(
                component = %c.name,
                family = c.sampler.family(),
                weight = c.weight,
                "mixture component ready"
            );
        }

        Ok(Self {
            schedule,
            components,
            rng,
        })
    }

    pub fn schedule(&self) -> &MixtureSchedule {
        &self.schedule
    }

    pub fn component_name(&self, component: usize) -> &str {
        &self.components[component].name
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Pick a slot, sample its component, floor, then clamp.
    pub fn draw(&mut self) -> Draw {
        let slot = self.rng.gen_range(0..self.schedule.len() as u32) as usize;
        let component = self.schedule.component_at(slot);
        let variate = self.components[component].sampler.sample();
        Draw {
            slot,
            component,
            ms: to_measurement(variate),
        }
    }

    pub fn next_measurement_ms(&mut self) -> i64 {
        self.draw().ms
    }
}

/// Floor first, clamp last: -0.5 floors to -1 and still ends up at 1.
/// NaN casts to 0 and is clamped like any other non-positive value.
pub fn to_measurement(variate: f64) -> i64 {
    (variate.floor() as i64).max(MIN_MEASUREMENT)
}
