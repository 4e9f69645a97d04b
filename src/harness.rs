//! Empirical distribution-bias testing.
//!
//! Maps a batch of mock samples onto a range under either policy, tallies the
//! results and compares them against the theoretical [`BiasReport`]. The suite
//! runner reproduces the classic comparison table (dice, coin, d20, percent,
//! perfect division) with both modulo mapping and rejection sampling.

use crate::analysis::BiasReport;
use crate::error::{MapperError, Result};
use crate::mapper::map_sample;
use crate::retry::map_batch;
use crate::rng::{LcgSource, SampleRng, SampleSource};
use crate::types::{Range, SamplingPolicy, SAMPLE_SPACE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Widest range the harness will tally value by value.
pub const MAX_HARNESS_WIDTH: u128 = SAMPLE_SPACE as u128;

// ─── Configuration ──────────────────────────────────────────────────────────

/// One range to test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasCase {
    pub name: String,
    pub min: i64,
    pub max: i64,
    /// Number of mapped values to produce.
    pub samples: usize,
}

impl BiasCase {
    pub fn new(name: &str, min: i64, max: i64, samples: usize) -> Self {
        Self { name: name.to_string(), min, max, samples }
    }
}

/// Which mock entropy feeds the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockSource {
    /// [`LcgSource`], identical output on every run.
    #[default]
    Deterministic,
    /// Seeded [`SampleRng`].
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub seed: u64,
    pub source: MockSource,
    pub cases: Vec<BiasCase>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            source: MockSource::Deterministic,
            cases: vec![
                BiasCase::new("Dice Roll (1-6)", 1, 6, 10_000),
                BiasCase::new("Coin Flip (0-1)", 0, 1, 10_000),
                BiasCase::new("D20 Roll (1-20)", 1, 20, 20_000),
                BiasCase::new("Percent (0-99)", 0, 99, 50_000),
                BiasCase::new("Perfect Division (0-255)", 0, 255, 10_000),
            ],
        }
    }
}

impl HarnessConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for case in &self.cases {
            let range = Range::new(case.min, case.max)
                .map_err(|e| MapperError::InvalidConfig(format!("case '{}': {}", case.name, e)))?;
            check_case(&range, case.samples)
                .map_err(|e| MapperError::InvalidConfig(format!("case '{}': {}", case.name, e)))?;
        }
        Ok(())
    }

    fn source(&self) -> Box<dyn SampleSource> {
        match self.source {
            MockSource::Deterministic => Box::new(LcgSource::new(self.seed)),
            MockSource::Random => Box::new(SampleRng::from_seed(self.seed)),
        }
    }
}

fn check_case(range: &Range, sample_size: usize) -> std::result::Result<(), String> {
    if sample_size == 0 {
        return Err("sample size must be positive".into());
    }
    if sample_size.checked_mul(2).is_none() {
        return Err(format!("sample size {sample_size} is too large"));
    }
    if range.width() > MAX_HARNESS_WIDTH {
        return Err(format!("range width {} exceeds {}", range.width(), MAX_HARNESS_WIDTH));
    }
    Ok(())
}

// ─── Assessment ─────────────────────────────────────────────────────────────

/// Bias graded by the largest deviation relative to the mean frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl BiasLevel {
    pub fn assess(max_deviation: f64, expected_frequency: f64) -> Self {
        let relative = max_deviation / expected_frequency;
        if relative < 0.01 {
            BiasLevel::Excellent
        } else if relative < 0.05 {
            BiasLevel::Good
        } else if relative < 0.1 {
            BiasLevel::Fair
        } else if relative < 0.2 {
            BiasLevel::Poor
        } else {
            BiasLevel::VeryPoor
        }
    }
}

impl fmt::Display for BiasLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BiasLevel::Excellent => "Excellent (< 1%)",
            BiasLevel::Good => "Good (< 5%)",
            BiasLevel::Fair => "Fair (< 10%)",
            BiasLevel::Poor => "Poor (< 20%)",
            BiasLevel::VeryPoor => "Very Poor (>= 20%)",
        })
    }
}

/// Overall quality from the coefficient of variation and the frequency spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl DistributionQuality {
    /// Spread is normalised by `sqrt(n / 6)`, the rough spread of fair dice.
    pub fn assess(coefficient_of_variation: f64, spread: u64, sample_size: usize) -> Self {
        let expected_spread = (sample_size as f64 / 6.0).sqrt();
        let normalized = spread as f64 / expected_spread;
        let cv = coefficient_of_variation;

        if cv < 0.02 && normalized < 1.5 {
            DistributionQuality::Excellent
        } else if cv < 0.05 && normalized < 2.0 {
            DistributionQuality::Good
        } else if cv < 0.1 && normalized < 3.0 {
            DistributionQuality::Fair
        } else {
            DistributionQuality::Poor
        }
    }
}

impl fmt::Display for DistributionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Population coefficient of variation (`stddev / mean`).
pub fn coefficient_of_variation(frequencies: &[u64]) -> f64 {
    if frequencies.is_empty() {
        return 0.0;
    }
    let n = frequencies.len() as f64;
    let mean = frequencies.iter().sum::<u64>() as f64 / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = frequencies
        .iter()
        .map(|&f| (f as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt() / mean
}

// ─── Distribution test ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueTally {
    pub value: i64,
    pub frequency: u64,
    pub expected: f64,
    pub deviation: f64,
    /// Share of all mapped values, in percent.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionStats {
    pub actual_samples: usize,
    pub min_freq: u64,
    pub max_freq: u64,
    pub spread: u64,
    pub coefficient_of_variation: f64,
    pub chi_squared: f64,
    pub max_deviation: f64,
    pub bias_level: BiasLevel,
    pub quality: DistributionQuality,
    /// Rejected samples per consumed sample, in percent. Zero under modulo mapping.
    pub actual_rejection_rate: f64,
    pub rejected_count: usize,
}

#[derive(Debug, Clone)]
pub struct DistributionReport {
    pub policy: SamplingPolicy,
    pub tallies: Vec<ValueTally>,
    pub stats: DistributionStats,
    pub bias: BiasReport,
}

/// Map `2 * sample_size` samples from `source` onto `[min, max]` and measure
/// how far the result is from uniform.
pub fn test_distribution_bias(
    min: i64,
    max: i64,
    sample_size: usize,
    policy: SamplingPolicy,
    source: &mut dyn SampleSource,
) -> Result<DistributionReport> {
    let range = Range::new(min, max)?;
    check_case(&range, sample_size).map_err(MapperError::InvalidConfig)?;

    let bias = BiasReport::for_range(range);
    // Twice the target leaves room for rejected samples.
    let draw = sample_size
        .checked_mul(2)
        .ok_or_else(|| MapperError::InvalidConfig(format!("sample size {sample_size} is too large")))?;
    let data = source.take_samples(draw);
    let mut frequencies: BTreeMap<i64, u64> = bias.expected_frequencies().map(|(v, _)| (v, 0)).collect();

    let (actual_samples, consumed, rejected_count) = match policy {
        SamplingPolicy::RejectionSampling => {
            let batch = map_batch(&data, min, max, sample_size)?;
            for v in &batch.values {
                *frequencies.entry(*v).or_insert(0) += 1;
            }
            (batch.values.len(), batch.samples_consumed, batch.rejected_values.len())
        }
        SamplingPolicy::Modulo => {
            let mut produced = 0;
            for &sample in data.iter().take(sample_size) {
                if let Some(v) = map_sample(sample, &range, SamplingPolicy::Modulo).value() {
                    *frequencies.entry(v).or_insert(0) += 1;
                    produced += 1;
                }
            }
            (produced, produced, 0)
        }
    };

    let width = bias.width as f64;
    let mean_frequency = actual_samples as f64 / width;
    let mut tallies = Vec::with_capacity(frequencies.len());
    let mut chi_squared = 0.0;

    for (&value, &frequency) in &frequencies {
        let expected = match policy {
            SamplingPolicy::RejectionSampling => mean_frequency,
            SamplingPolicy::Modulo => {
                let theoretical = bias.expected_frequency(value).unwrap_or(0);
                f64::from(theoretical) * actual_samples as f64 / f64::from(SAMPLE_SPACE)
            }
        };
        let deviation = frequency as f64 - expected;
        if expected > 0.0 {
            chi_squared += deviation * deviation / expected;
        }
        tallies.push(ValueTally {
            value,
            frequency,
            expected,
            deviation,
            percentage: frequency as f64 / actual_samples as f64 * 100.0,
        });
    }

    let counts: Vec<u64> = frequencies.values().copied().collect();
    let min_freq = counts.iter().copied().min().unwrap_or(0);
    let max_freq = counts.iter().copied().max().unwrap_or(0);
    let spread = max_freq - min_freq;
    let cv = coefficient_of_variation(&counts);
    let max_deviation = tallies.iter().map(|t| t.deviation.abs()).fold(0.0, f64::max);
    let actual_rejection_rate = if consumed > 0 {
        rejected_count as f64 / consumed as f64 * 100.0
    } else {
        0.0
    };

    let stats = DistributionStats {
        actual_samples,
        min_freq,
        max_freq,
        spread,
        coefficient_of_variation: cv,
        chi_squared,
        max_deviation,
        bias_level: BiasLevel::assess(max_deviation, mean_frequency),
        quality: DistributionQuality::assess(cv, spread, actual_samples),
        actual_rejection_rate,
        rejected_count,
    };

    tracing::debug!(
        min,
        max,
        ?policy,
        actual_samples,
        chi_squared = stats.chi_squared,
        bias_level = %stats.bias_level,
        "distribution test finished"
    );

    Ok(DistributionReport { policy, tallies, stats, bias })
}

// ─── Suite ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SuiteEntry {
    pub case: BiasCase,
    pub modulo: DistributionReport,
    pub rejection: DistributionReport,
}

/// Run every configured case under both policies, each from a fresh source.
pub fn run_bias_suite(config: &HarnessConfig) -> Result<Vec<SuiteEntry>> {
    config.validate()?;
    let mut entries = Vec::with_capacity(config.cases.len());

    for case in &config.cases {
        let modulo = test_distribution_bias(
            case.min,
            case.max,
            case.samples,
            SamplingPolicy::Modulo,
            config.source().as_mut(),
        )?;
        let rejection = test_distribution_bias(
            case.min,
            case.max,
            case.samples,
            SamplingPolicy::RejectionSampling,
            config.source().as_mut(),
        )?;

        tracing::info!(
            case = %case.name,
            rejection_rate = %rejection.bias.rejection_rate,
            modulo_max_dev = modulo.stats.max_deviation,
            modulo_bias = %modulo.stats.bias_level,
            modulo_quality = %modulo.stats.quality,
            rejection_max_dev = rejection.stats.max_deviation,
            rejection_bias = %rejection.stats.bias_level,
            rejection_quality = %rejection.stats.quality,
            "bias case complete"
        );

        entries.push(SuiteEntry { case: case.clone(), modulo, rejection });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    /// Walks the whole sample space in order, repeatedly.
    struct FullCycle(u32);

    impl SampleSource for FullCycle {
        fn next_sample(&mut self) -> Sample {
            let s = Sample::new((self.0 % SAMPLE_SPACE) as u16);
            self.0 += 1;
            s
        }
    }

    #[test]
    fn test_full_pass_modulo_matches_theory_exactly() {
        let report =
            test_distribution_bias(1, 6, 65536, SamplingPolicy::Modulo, &mut FullCycle(0)).unwrap();
        assert_eq!(report.stats.actual_samples, 65536);
        assert_eq!(report.stats.rejected_count, 0);
        assert_eq!(report.stats.actual_rejection_rate, 0.0);
        assert_eq!(report.stats.min_freq, 10922);
        assert_eq!(report.stats.max_freq, 10923);
        assert_eq!(report.stats.spread, 1);
        assert!(report.stats.chi_squared.abs() < 1e-9);
        for tally in &report.tallies {
            assert_eq!(tally.expected, f64::from(report.bias.expected_frequency(tally.value).unwrap()));
        }
    }

    #[test]
    fn test_full_pass_rejection_is_uniform() {
        let report = test_distribution_bias(
            1,
            6,
            65532,
            SamplingPolicy::RejectionSampling,
            &mut FullCycle(0),
        )
        .unwrap();
        assert_eq!(report.stats.actual_samples, 65532);
        assert_eq!(report.stats.spread, 0);
        assert_eq!(report.stats.max_deviation, 0.0);
        assert_eq!(report.stats.bias_level, BiasLevel::Excellent);
        assert_eq!(report.stats.coefficient_of_variation, 0.0);
    }

    #[test]
    fn test_rejections_are_counted() {
        // 65532 accepted, then 65532..=65535 rejected before sample 0 maps to 1.
        let report = test_distribution_bias(
            1,
            6,
            65533,
            SamplingPolicy::RejectionSampling,
            &mut FullCycle(0),
        )
        .unwrap();
        assert_eq!(report.stats.rejected_count, 4);
        assert!((report.stats.actual_rejection_rate - 4.0 / 65537.0 * 100.0).abs() < 1e-9);
        assert_eq!(report.tallies[0].frequency, 10923);
    }

    #[test]
    fn test_tallies_cover_range() {
        let mut lcg = LcgSource::new(42);
        let report = test_distribution_bias(-3, 3, 1000, SamplingPolicy::Modulo, &mut lcg).unwrap();
        let values: Vec<i64> = report.tallies.iter().map(|t| t.value).collect();
        assert_eq!(values, (-3..=3).collect::<Vec<_>>());
        let total: u64 = report.tallies.iter().map(|t| t.frequency).sum();
        assert_eq!(total, 1000);
        let pct: f64 = report.tallies.iter().map(|t| t.percentage).sum();
        assert!((pct - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_cases() {
        let mut lcg = LcgSource::new(1);
        let p = SamplingPolicy::Modulo;
        assert!(matches!(
            test_distribution_bias(1, 6, 0, p, &mut lcg),
            Err(MapperError::InvalidConfig(_))
        ));
        assert!(matches!(
            test_distribution_bias(0, 70_000, 10, p, &mut lcg),
            Err(MapperError::InvalidConfig(_))
        ));
        assert!(matches!(
            test_distribution_bias(6, 1, 10, p, &mut lcg),
            Err(MapperError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_oversized_sample_count_is_rejected() {
        let mut lcg = LcgSource::new(1);
        let err = test_distribution_bias(1, 6, usize::MAX, SamplingPolicy::Modulo, &mut lcg);
        assert!(matches!(err, Err(MapperError::InvalidConfig(msg)) if msg.contains("too large")));

        let config = HarnessConfig {
            cases: vec![BiasCase::new("huge", 1, 6, usize::MAX / 2 + 1)],
            ..HarnessConfig::default()
        };
        assert!(matches!(config.validate(), Err(MapperError::InvalidConfig(msg)) if msg.contains("huge")));
        assert!(run_bias_suite(&config).is_err());
    }

    #[test]
    fn test_bias_level_thresholds() {
        assert_eq!(BiasLevel::assess(0.5, 100.0), BiasLevel::Excellent);
        assert_eq!(BiasLevel::assess(4.0, 100.0), BiasLevel::Good);
        assert_eq!(BiasLevel::assess(9.0, 100.0), BiasLevel::Fair);
        assert_eq!(BiasLevel::assess(19.0, 100.0), BiasLevel::Poor);
        assert_eq!(BiasLevel::assess(20.0, 100.0), BiasLevel::VeryPoor);
        assert_eq!(BiasLevel::Excellent.to_string(), "Excellent (< 1%)");
    }

    #[test]
    fn test_quality_thresholds() {
        // sqrt(600 / 6) = 10
        assert_eq!(DistributionQuality::assess(0.01, 14, 600), DistributionQuality::Excellent);
        assert_eq!(DistributionQuality::assess(0.01, 15, 600), DistributionQuality::Good);
        assert_eq!(DistributionQuality::assess(0.08, 25, 600), DistributionQuality::Fair);
        assert_eq!(DistributionQuality::assess(0.2, 1, 600), DistributionQuality::Poor);
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[5, 5, 5]), 0.0);
        // mean 2, population stddev 1
        assert!((coefficient_of_variation(&[1, 3]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_config_defaults_and_json() {
        let config = HarnessConfig::default();
        assert_eq!(config.cases.len(), 5);
        assert_eq!(config.cases[0], BiasCase::new("Dice Roll (1-6)", 1, 6, 10_000));

        let parsed = HarnessConfig::from_json(r#"{"seed": 7, "source": "random"}"#).unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.source, MockSource::Random);
        assert_eq!(parsed.cases, config.cases);

        let err = HarnessConfig::from_json(r#"{"cases": [{"name": "bad", "min": 6, "max": 1, "samples": 10}]}"#);
        assert!(matches!(err, Err(MapperError::InvalidConfig(msg)) if msg.contains("bad")));
        assert!(HarnessConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_suite_runs_both_policies() {
        let config = HarnessConfig {
            seed: 42,
            source: MockSource::Deterministic,
            cases: vec![BiasCase::new("dice", 1, 6, 2000), BiasCase::new("byte", 0, 255, 1000)],
        };
        let entries = run_bias_suite(&config).unwrap();
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(entry.modulo.policy, SamplingPolicy::Modulo);
            assert_eq!(entry.rejection.policy, SamplingPolicy::RejectionSampling);
            assert_eq!(entry.modulo.stats.actual_samples, entry.case.samples);
            assert_eq!(entry.rejection.stats.actual_samples, entry.case.samples);
        }
        assert_eq!(entries[1].rejection.stats.rejected_count, 0);
    }

    #[test]
    fn test_suite_is_reproducible_with_random_source() {
        let config = HarnessConfig {
            seed: 9,
            source: MockSource::Random,
            cases: vec![BiasCase::new("d20", 1, 20, 500)],
        };
        let a = run_bias_suite(&config).unwrap();
        let b = run_bias_suite(&config).unwrap();
        assert_eq!(a[0].rejection.tallies, b[0].rejection.tallies);
    }
}
