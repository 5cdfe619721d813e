//! Statistical and scenario checks for the measurement generator and the
//! ms → ns encoding, driven through the public API.

use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::SeedableRng;

use histogram_bench::generator::{to_nanoseconds, Component, MixtureGenerator, VariateSampler};
use histogram_bench::WorkloadConfig;

struct FixedSampler(f64);

impl VariateSampler for FixedSampler {
    fn sample(&mut self) -> f64 {
        self.0
    }

    fn family(&self) -> &'static str {
        "fixed"
    }
}

fn seeded(seed: u64) -> MixtureGenerator<StdRng> {
    let config = WorkloadConfig {
        seed: Some(seed),
        ..Default::default()
    };
    MixtureGenerator::from_config(&config).unwrap()
}

#[test]
fn component_frequencies_converge_to_weights() {
    const N: u64 = 100_000;
    let mut gen = seeded(2024);
    let mut counts = [0u64; 3];
    for _ in 0..N {
        counts[gen.draw().component] += 1;
    }

    let expected = [0.2, 0.6, 0.2];
    for (i, &c) in counts.iter().enumerate() {
        let share = c as f64 / N as f64;
        assert!(
            (share - expected[i]).abs() < 0.03,
            "{} share {share:.4} vs {}",
            gen.component_name(i),
            expected[i]
        );
    }
}

#[test]
fn every_measurement_is_at_least_one() {
    let mut gen = seeded(77);
    for _ in 0..200_000 {
        assert!(gen.next_measurement_ms() >= 1);
    }
}

#[test]
fn wide_normal_still_respects_minimum() {
    // Most draws of N(0, 1000) are negative or tiny
    let components = vec![Component {
        name: "wide".into(),
        weight: 1,
        sampler: Box::new(
            histogram_bench::generator::sampler::NormalSampler::new(0.0, 1_000.0, StdRng::seed_from_u64(5))
                .unwrap(),
        ),
    }];
    let mut gen = MixtureGenerator::from_parts(components, StdRng::seed_from_u64(6)).unwrap();
    let draws: Vec<i64> = (0..10_000).map(|_| gen.next_measurement_ms()).collect();
    assert!(draws.iter().all(|&ms| ms >= 1));
    assert!(draws.iter().filter(|&&ms| ms == 1).count() > 4_000);
}

#[test]
fn pairs_keep_exact_scale_ratio() {
    let mut gen = seeded(99);
    for _ in 0..50_000 {
        let ms = gen.next_measurement_ms();
        let ns = to_nanoseconds(ms);
        assert_eq!(ns, ms * 1_000_000);
        assert_eq!(ns / 1_000_000, ms);
    }
}

#[test]
fn forced_low_slot_with_gamma_mock() {
    let components = vec![
        Component {
            name: "low".into(),
            weight: 2,
            sampler: Box::new(FixedSampler(3.7)),
        },
        Component {
            name: "mid".into(),
            weight: 6,
            sampler: Box::new(FixedSampler(250.0)),
        },
        Component {
            name: "high".into(),
            weight: 2,
            sampler: Box::new(FixedSampler(800.0)),
        },
    ];
    let mut gen = MixtureGenerator::from_parts(components, StepRng::new(0, 0)).unwrap();
    let ms = gen.next_measurement_ms();
    assert_eq!(ms, 3);
    assert_eq!(to_nanoseconds(ms), 3_000_000);
}

#[test]
fn default_workload_lands_in_expected_range() {
    let mut gen = seeded(1);
    let draws: Vec<i64> = (0..100_000).map(|_| gen.next_measurement_ms()).collect();
    let max = *draws.iter().max().unwrap();
    assert!(max > 800 && max < 1_000, "max {max}");
    let mean = draws.iter().sum::<i64>() as f64 / draws.len() as f64;
    // 0.2 * ~1.5 + 0.6 * ~250 + 0.2 * ~800
    assert!((mean - 310.0).abs() < 10.0, "mean {mean}");
}

#[test]
fn negative_mid_draw_clamps_before_scaling() {
    let components = vec![
        Component {
            name: "low".into(),
            weight: 2,
            sampler: Box::new(FixedSampler(3.7)),
        },
        Component {
            name: "mid".into(),
            weight: 6,
            sampler: Box::new(FixedSampler(-5.0)),
        },
        Component {
            name: "high".into(),
            weight: 2,
            sampler: Box::new(FixedSampler(800.0)),
        },
    ];
    // Selects slot 5, inside the mid range 2..8
    let mut gen = MixtureGenerator::from_parts(components, StepRng::new(0x8000_0000, 0)).unwrap();
    let ms = gen.next_measurement_ms();
    assert_eq!(ms, 1);
    assert_eq!(to_nanoseconds(ms), 1_000_000);
}
