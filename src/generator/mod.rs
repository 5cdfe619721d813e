//! Synthetic latency source: three variate samplers behind a weighted
//! slot schedule, plus the ms → ns conversion.

pub mod mixture;
pub mod sampler;
pub mod scale;

pub use mixture::{Component, Draw, MixtureGenerator, MixtureSchedule};
pub use sampler::VariateSampler;
pub use scale::to_nanoseconds;
