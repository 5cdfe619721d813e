use serde::Serialize;

use super::data::{Buckets, HistogramPoint};

/// The quantiles compared across strategies.
pub const QUANTILES: [(&str, f64); 4] = [("p50", 0.50), ("p95", 0.95), ("p99", 0.99), ("p999", 0.999)];

/// Quantiles reconstructed from bucket counts alone, interpolating
/// linearly inside the bucket that holds each rank. Bucket edges are
/// clamped to the window's observed min and max.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileEstimate {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
}

impl PercentileEstimate {
    pub fn from_point(point: &HistogramPoint) -> Self {
        let (Some(min), Some(max)) = (point.min, point.max) else {
            return Self::empty();
        };
        let ranges = bucket_ranges(&point.buckets, min as f64, max as f64);
        let [p50, p95, p99, p999] = QUANTILES.map(|(_, q)| quantile(&ranges, point.count, q, max as f64));
        Self { p50, p95, p99, p999 }
    }

    pub fn empty() -> Self {
        Self {
            p50: 0.0,
            p95: 0.0,
            p99: 0.0,
            p999: 0.0,
        }
    }

    pub fn quantiles(&self) -> [f64; 4] {
        [self.p50, self.p95, self.p99, self.p999]
    }
}

/// Lower (exclusive) edge of exponential bucket `index` at `scale`:
/// `2^(index / 2^scale)`.
pub fn lower_boundary(index: i32, scale: i32) -> f64 {
    (f64::from(index) * (-f64::from(scale)).exp2()).exp2()
}

/// `(low, high, count)` per bucket, in ascending order.
fn bucket_ranges(buckets: &Buckets, min: f64, max: f64) -> Vec<(f64, f64, u64)> {
    let clamp = |v: f64| v.clamp(min, max);
    match buckets {
        Buckets::Explicit { bounds, counts } => counts
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let lo = if i == 0 { min } else { bounds[i - 1] };
                let hi = bounds.get(i).copied().unwrap_or(max);
                (clamp(lo), clamp(hi), c)
            })
            .collect(),
        Buckets::Exponential {
            scale,
            zero_count,
            offset,
            counts,
        } => std::iter::once((clamp(0.0), clamp(0.0), *zero_count))
            .chain(counts.iter().enumerate().map(|(i, &c)| {
                let index = offset + i as i32;
                (
                    clamp(lower_boundary(index, *scale)),
                    clamp(lower_boundary(index + 1, *scale)),
                    c,
                )
            }))
            .collect(),
    }
}

fn quantile(ranges: &[(f64, f64, u64)], total: u64, q: f64, max: f64) -> f64 {
    let rank = q * total as f64;
    let mut seen = 0.0;
    for &(lo, hi, c) in ranges {
        if c == 0 {
            continue;
        }
        let c = c as f64;
        if seen + c >= rank {
            let frac = ((rank - seen) / c).clamp(0.0, 1.0);
            return lo + (hi - lo) * frac;
        }
        seen += c;
    }
    max
}

/// `|estimate - exact| / exact`, or 0 when both are zero.
pub fn relative_error(estimate: f64, exact: f64) -> f64 {
    if exact == 0.0 {
        return if estimate == 0.0 { 0.0 } else { 1.0 };
    }
    (estimate - exact).abs() / exact
}
