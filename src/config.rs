use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─── Workload descriptor ─────────────────────────────────────────

/// Everything the run needs to know up front. Every field has a default,
/// so an empty JSON object `{}` reproduces the reference workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadConfig {
    /// How many millisecond samples to generate
    #[serde(default = "default_iterations")]
    pub iterations: u64,

    /// Master seed; `None` draws from OS entropy
    #[serde(default)]
    pub seed: Option<u64>,

    /// Period of the delta export (milliseconds)
    #[serde(default = "default_export_interval_ms")]
    pub export_interval_ms: u64,

    /// Bucket cap for the base-2 exponential instruments
    #[serde(default = "default_exponential_max_size")]
    pub exponential_max_size: u32,

    /// Upper-inclusive boundaries for the explicit instruments, in ms
    #[serde(default = "default_explicit_boundaries")]
    pub explicit_boundaries: Vec<f64>,

    /// When set, the ns explicit instrument gets the boundaries × 1e6
    /// instead of reusing the millisecond values verbatim.
    #[serde(default)]
    pub scale_explicit_boundaries: bool,

    /// Weighted mixture the generator draws from
    #[serde(default = "default_mixture")]
    pub mixture: Vec<MixtureComponent>,

    /// Reported in every export batch's resource block
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// One slot group of the mixture schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixtureComponent {
    pub name: String,
    /// Number of schedule slots this component occupies
    pub weight: u32,
    pub distribution: DistributionSpec,
    /// Applied to each variate before flooring
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum DistributionSpec {
    Gamma { shape: f64, scale: f64 },
    Normal { mean: f64, std_dev: f64 },
}

impl DistributionSpec {
    pub fn family(&self) -> &'static str {
        match self {
            Self::Gamma { .. } => "gamma",
            Self::Normal { .. } => "normal",
        }
    }

    /// Every parameter finite; shape, scale and std_dev strictly positive.
    pub fn validate(&self) -> Result<()> {
        let family = self.family();
        let reject = |reason: String| Err(Error::Distribution { family, reason });
        match *self {
            Self::Gamma { shape, scale } => {
                if !(shape.is_finite() && shape > 0.0) {
                    return reject(format!("shape must be a positive number, got {shape}"));
                }
                if !(scale.is_finite() && scale > 0.0) {
                    return reject(format!("scale must be a positive number, got {scale}"));
                }
            }
            Self::Normal { mean, std_dev } => {
                if !mean.is_finite() {
                    return reject(format!("mean must be finite, got {mean}"));
                }
                if !(std_dev.is_finite() && std_dev > 0.0) {
                    return reject(format!("std_dev must be a positive number, got {std_dev}"));
                }
            }
        }
        Ok(())
    }

    /// Expected variate before any multiplier.
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Gamma { shape, scale } => shape * scale,
            Self::Normal { mean, .. } => mean,
        }
    }
}

impl fmt::Display for DistributionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gamma { shape, scale } => write!(f, "gamma(shape={shape}, scale={scale})"),
            Self::Normal { mean, std_dev } => write!(f, "normal(mean={mean}, std_dev={std_dev})"),
        }
    }
}

impl fmt::Display for MixtureComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} w{} {}", self.name, self.weight, self.distribution)?;
        if self.multiplier != 1.0 {
            write!(f, " x{}", self.multiplier)?;
        }
        write!(f, " mean {:.1}ms", self.distribution.mean() * self.multiplier)
    }
}

// ─── Defaults ────────────────────────────────────────────────────

pub const DEFAULT_ITERATIONS: u64 = 1_000_000;
pub const DEFAULT_EXPORT_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_EXPONENTIAL_MAX_SIZE: u32 = 160;
pub const DEFAULT_EXPLICIT_BOUNDARIES: [f64; 10] =
    [0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 1000.0];

fn default_iterations() -> u64 {
    DEFAULT_ITERATIONS
}
fn default_export_interval_ms() -> u64 {
    DEFAULT_EXPORT_INTERVAL_MS
}
fn default_exponential_max_size() -> u32 {
    DEFAULT_EXPONENTIAL_MAX_SIZE
}
fn default_explicit_boundaries() -> Vec<f64> {
    DEFAULT_EXPLICIT_BOUNDARIES.to_vec()
}
fn default_multiplier() -> f64 {
    1.0
}
fn default_service_name() -> String {
    "HistogramComparison".into()
}

fn default_mixture() -> Vec<MixtureComponent> {
    vec![
        MixtureComponent {
            name: "low".into(),
            weight: 2,
            distribution: DistributionSpec::Gamma {
                shape: 1.0,
                scale: 2.0,
            },
            multiplier: 1.0,
        },
        MixtureComponent {
            name: "mid".into(),
            weight: 6,
            distribution: DistributionSpec::Normal {
                mean: 250.0,
                std_dev: 75.0,
            },
            multiplier: 1.0,
        },
        MixtureComponent {
            name: "high".into(),
            weight: 2,
            distribution: DistributionSpec::Normal {
                mean: 800.0,
                std_dev: 30.0,
            },
            multiplier: 1.0,
        },
    ]
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            seed: None,
            export_interval_ms: default_export_interval_ms(),
            exponential_max_size: default_exponential_max_size(),
            explicit_boundaries: default_explicit_boundaries(),
            scale_explicit_boundaries: false,
            mixture: default_mixture(),
            service_name: default_service_name(),
        }
    }
}

// ─── Loading & validation ────────────────────────────────────────

impl WorkloadConfig {
    /// Read a JSON workload descriptor and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn export_interval(&self) -> Duration {
        Duration::from_millis(self.export_interval_ms)
    }

    /// One line naming every component's distribution, for report headers.
    pub fn describe_mixture(&self) -> String {
        self.mixture
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Structural checks plus distribution parameters, so a bad workload
    /// fails before anything is registered or spawned.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::config("iterations must be at least 1"));
        }
        if self.export_interval_ms == 0 {
            return Err(Error::config("export_interval_ms must be > 0"));
        }
        if self.exponential_max_size < 2 {
            return Err(Error::config("exponential_max_size must be at least 2"));
        }
        if self.explicit_boundaries.iter().any(|b| !b.is_finite()) {
            return Err(Error::config("explicit_boundaries must be finite"));
        }
        if self.explicit_boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::config(
                "explicit_boundaries must be strictly ascending",
            ));
        }

        if self.mixture.is_empty() {
            return Err(Error::config("mixture needs at least one component"));
        }
        let mut names = HashSet::new();
        for c in &self.mixture {
            if !names.insert(c.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate mixture component \"{}\"",
                    c.name
                )));
            }
            if !c.multiplier.is_finite() || c.multiplier <= 0.0 {
                return Err(Error::config(format!(
                    "component \"{}\": multiplier must be a positive number",
                    c.name
                )));
            }
            c.distribution.validate()?;
        }
        if self.mixture.iter().all(|c| c.weight == 0) {
            return Err(Error::config("mixture weights sum to zero"));
        }
        Ok(())
    }
}
