use opentelemetry_sdk::metrics::{Aggregation, Instrument, Stream};
use serde::Serialize;

use crate::config::WorkloadConfig;
use crate::generator::scale::NANOS_PER_MILLI;

/// Substring that selects base-2 exponential buckets.
pub const EXPONENTIAL_MARKER: &str = "exponential";

/// Scale every exponential window starts at before any downscaling.
pub const MAX_EXPONENTIAL_SCALE: i8 = 20;

/// The four instruments, one per (strategy × scale).
pub const INSTRUMENTS: [(&str, Unit); 4] = [
    ("exponential-ms", Unit::Milliseconds),
    ("explicit-ms", Unit::Milliseconds),
    ("exponential-ns", Unit::Nanoseconds),
    ("explicit-ns", Unit::Nanoseconds),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "ns")]
    Nanoseconds,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Milliseconds => "ms",
            Self::Nanoseconds => "ns",
        }
    }

    /// How many of this unit make one millisecond.
    pub fn per_millisecond(self) -> f64 {
        match self {
            Self::Milliseconds => 1.0,
            Self::Nanoseconds => NANOS_PER_MILLI as f64,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "ms" => Some(Self::Milliseconds),
            "ns" => Some(Self::Nanoseconds),
            _ => None,
        }
    }

    /// Unit encoded in an instrument name's `-ms` / `-ns` suffix.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with("-ms") {
            Some(Self::Milliseconds)
        } else if name.ends_with("-ns") {
            Some(Self::Nanoseconds)
        } else {
            None
        }
    }
}

/// Bucketing chosen for an instrument at registration; fixed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketStrategy {
    Explicit { boundaries: Vec<f64> },
    Exponential { max_size: u32 },
}

impl BucketStrategy {
    pub fn is_exponential(&self) -> bool {
        matches!(self, Self::Exponential { .. })
    }

    /// The SDK aggregation implementing this strategy.
    pub fn aggregation(&self) -> Aggregation {
        match self {
            Self::Explicit { boundaries } => Aggregation::ExplicitBucketHistogram {
                boundaries: boundaries.clone(),
                record_min_max: true,
            },
            Self::Exponential { max_size } => Aggregation::Base2ExponentialHistogram {
                max_size: *max_size,
                max_scale: MAX_EXPONENTIAL_SCALE,
                record_min_max: true,
            },
        }
    }
}

/// Pick the strategy for `name`. Explicit boundaries are expressed in
/// milliseconds and are reused as-is for every unit unless
/// `scale_explicit_boundaries` is set, in which case the nanosecond
/// instrument's boundaries are multiplied by 1e6. Left unscaled, every
/// nanosecond value lands in the overflow bucket.
pub fn select_strategy(name: &str, unit: Unit, config: &WorkloadConfig) -> BucketStrategy {
    if name.contains(EXPONENTIAL_MARKER) {
        return BucketStrategy::Exponential {
            max_size: config.exponential_max_size,
        };
    }

    let factor = if config.scale_explicit_boundaries {
        unit.per_millisecond()
    } else {
        1.0
    };
    BucketStrategy::Explicit {
        boundaries: config
            .explicit_boundaries
            .iter()
            .map(|b| b * factor)
            .collect(),
    }
}

/// Meter provider view that runs every instrument through `select_strategy`.
/// The unit comes from the name suffix, else from the declared unit;
/// instruments with neither keep the SDK default aggregation.
pub fn strategy_view(
    config: &WorkloadConfig,
) -> impl Fn(&Instrument) -> Option<Stream> + Send + Sync + 'static {
    let config = config.clone();
    move |inst: &Instrument| {
        let unit = Unit::from_name(&inst.name).or_else(|| Unit::from_symbol(&inst.unit))?;
        let strategy = select_strategy(&inst.name, unit, &config);
        Some(Stream::new().aggregation(strategy.aggregation()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: [f64; 10] = [0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 1000.0];

    #[test]
    fn marker_selects_exponential() {
        let config = WorkloadConfig::default();
        for name in ["exponential-ms", "exponential-ns", "my-exponential-thing"] {
            let unit = Unit::from_name(name).unwrap_or(Unit::Milliseconds);
            assert_eq!(
                select_strategy(name, unit, &config),
                BucketStrategy::Exponential { max_size: 160 }
            );
        }
    }

    #[test]
    fn everything_else_is_explicit_with_ms_boundaries() {
        let config = WorkloadConfig::default();
        for (name, unit) in [
            ("explicit-ms", Unit::Milliseconds),
            ("explicit-ns", Unit::Nanoseconds),
            ("latency", Unit::Milliseconds),
            ("Exponential-ms", Unit::Milliseconds),
        ] {
            assert_eq!(
                select_strategy(name, unit, &config),
                BucketStrategy::Explicit {
                    boundaries: REFERENCE.to_vec()
                },
                "{name}"
            );
        }
    }

    #[test]
    fn optional_per_unit_scaling() {
        let config = WorkloadConfig {
            scale_explicit_boundaries: true,
            ..Default::default()
        };
        let BucketStrategy::Explicit { boundaries } =
            select_strategy("explicit-ns", Unit::Nanoseconds, &config)
        else {
            panic!("expected explicit");
        };
        assert_eq!(boundaries[1], 5_000_000.0);
        assert_eq!(boundaries[9], 1_000_000_000.0);

        let ms = select_strategy("explicit-ms", Unit::Milliseconds, &config);
        assert_eq!(
            ms,
            BucketStrategy::Explicit {
                boundaries: REFERENCE.to_vec()
            }
        );
    }

    #[test]
    fn unit_from_suffix() {
        assert_eq!(Unit::from_name("explicit-ms"), Some(Unit::Milliseconds));
        assert_eq!(Unit::from_name("exponential-ns"), Some(Unit::Nanoseconds));
        assert_eq!(Unit::from_name("explicit"), None);
    }

    #[test]
    fn strategies_map_onto_sdk_aggregations() {
        let config = WorkloadConfig::default();
        match select_strategy("exponential-ms", Unit::Milliseconds, &config).aggregation() {
            Aggregation::Base2ExponentialHistogram {
                max_size,
                max_scale,
                record_min_max,
            } => {
                assert_eq!(max_size, 160);
                assert_eq!(max_scale, 20);
                assert!(record_min_max);
            }
            other => panic!("unexpected {other:?}"),
        }
        match select_strategy("explicit-ns", Unit::Nanoseconds, &config).aggregation() {
            Aggregation::ExplicitBucketHistogram { boundaries, .. } => {
                assert_eq!(boundaries, REFERENCE.to_vec());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unit_from_symbol() {
        assert_eq!(Unit::from_symbol("ns"), Some(Unit::Nanoseconds));
        assert_eq!(Unit::from_symbol("s"), None);
    }

    #[test]
    fn four_distinct_combinations() {
        let config = WorkloadConfig::default();
        let combos: std::collections::HashSet<(bool, Unit)> = INSTRUMENTS
            .iter()
            .map(|&(name, unit)| (select_strategy(name, unit, &config).is_exponential(), unit))
            .collect();
        assert_eq!(combos.len(), 4);
    }
}
