//! Single-sample range mapping.
//!
//! Maps one 16-bit sample onto `[min, max]`. When the range width does not
//! divide 2^16, plain `min + sample % width` over-represents the first
//! `remainder` values; rejection sampling discards samples at or above the
//! bias threshold so every surviving value is equally likely.

use crate::analysis::RangeMetrics;
use crate::error::{MapperError, Result};
use crate::types::{
    BiasInfo, BiasMetrics, Mapped, MappingMethod, MappingResult, Range, RejectionDetail, Sample,
    SamplingPolicy,
};

/// Map one sample onto `[min, max]` under `policy`.
///
/// Accepts anything convertible to a [`Sample`]: `u16` infallibly, `i64`,
/// `i32`, `u32` and `f64` with validation.
pub fn map_one<S>(sample: S, min: i64, max: i64, policy: SamplingPolicy) -> Result<MappingResult>
where
    S: TryInto<Sample>,
    MapperError: From<S::Error>,
{
    let sample = sample.try_into()?;
    let range = Range::new(min, max)?;
    Ok(map_sample(sample, &range, policy))
}

/// Biased modulo mapping that returns only the value.
pub fn map_one_simple<S>(sample: S, min: i64, max: i64) -> Result<i64>
where
    S: TryInto<Sample>,
    MapperError: From<S::Error>,
{
    let result = map_one(sample, min, max, SamplingPolicy::Modulo)?;
    // The modulo policy never rejects.
    Ok(result.value().unwrap_or(min))
}

/// Infallible core once the sample and range are validated.
pub(crate) fn map_sample(sample: Sample, range: &Range, policy: SamplingPolicy) -> MappingResult {
    if range.min() == range.max() {
        return MappingResult {
            outcome: Mapped::Accepted(range.min()),
            method: MappingMethod::SingleValue,
            bias_info: None,
        };
    }

    let m = RangeMetrics::of(range);
    let mapped = range.reduce(sample);

    if m.perfectly_divisible() {
        return MappingResult {
            outcome: Mapped::Accepted(mapped),
            method: MappingMethod::ModuloMapping,
            bias_info: None,
        };
    }

    let method = match policy {
        SamplingPolicy::RejectionSampling => {
            if u32::from(sample.get()) >= m.bias_threshold {
                tracing::trace!(
                    sample = sample.get(),
                    threshold = m.bias_threshold,
                    would_have_been = mapped,
                    "sample rejected"
                );
                return MappingResult {
                    outcome: Mapped::Rejected,
                    method: MappingMethod::RejectionSampling,
                    bias_info: Some(BiasInfo::Rejected(RejectionDetail {
                        threshold: m.bias_threshold,
                        would_have_been: mapped,
                    })),
                };
            }
            MappingMethod::RejectionSampling
        }
        SamplingPolicy::Modulo => MappingMethod::ModuloMapping,
    };

    MappingResult {
        outcome: Mapped::Accepted(mapped),
        method,
        bias_info: Some(BiasInfo::Metrics(BiasMetrics {
            remainder: m.remainder,
            quotient: m.quotient,
            bias_threshold: m.bias_threshold,
            perfectly_divisible: false,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_bias;
    use proptest::prelude::*;
    use std::collections::HashMap;

    const DICE_THRESHOLD: i64 = 65532;

    #[test]
    fn test_basic_range_mapping() {
        let result = map_one(32768i64, 1, 6, SamplingPolicy::RejectionSampling).unwrap();
        let v = result.value().unwrap();
        assert!((1..=6).contains(&v));
        assert_eq!(v, 1 + 32768 % 6);
        assert_eq!(result.method, MappingMethod::RejectionSampling);
        assert_eq!(
            result.bias_info,
            Some(BiasInfo::Metrics(BiasMetrics {
                remainder: 4,
                quotient: 10922,
                bias_threshold: 65532,
                perfectly_divisible: false,
            }))
        );
    }

    #[test]
    fn test_single_value_range_ignores_policy() {
        for policy in [SamplingPolicy::RejectionSampling, SamplingPolicy::Modulo] {
            for raw in [0u16, 12345, 65532, u16::MAX] {
                let result = map_one(raw, 5, 5, policy).unwrap();
                assert_eq!(result.value(), Some(5));
                assert!(!result.is_rejected());
                assert_eq!(result.method, MappingMethod::SingleValue);
                assert_eq!(result.bias_info, None);
            }
        }
    }

    #[test]
    fn test_single_value_range_for_every_sample() {
        for raw in 0..=u16::MAX {
            let result = map_one(raw, 5, 5, SamplingPolicy::RejectionSampling).unwrap();
            assert_eq!(result.outcome, Mapped::Accepted(5));
        }
    }

    #[test]
    fn test_input_validation() {
        let p = SamplingPolicy::RejectionSampling;
        assert_eq!(map_one(-1i64, 1, 6, p), Err(MapperError::SampleOutOfRange(-1)));
        assert_eq!(map_one(65536i64, 1, 6, p), Err(MapperError::SampleOutOfRange(65536)));
        assert_eq!(map_one(100i64, 6, 1, p), Err(MapperError::InvertedRange { min: 6, max: 1 }));
        assert!(matches!(map_one(100.5f64, 1, 6, p), Err(MapperError::NonIntegerSample(_))));
        assert!(map_one_simple(-1i64, 1, 6).is_err());
    }

    #[test]
    fn test_rejection_boundary() {
        let p = SamplingPolicy::RejectionSampling;
        let rejected = map_one(DICE_THRESHOLD, 1, 6, p).unwrap();
        assert!(rejected.is_rejected());
        assert_eq!(rejected.value(), None);
        assert_eq!(rejected.method, MappingMethod::RejectionSampling);
        assert_eq!(
            rejected.bias_info,
            Some(BiasInfo::Rejected(RejectionDetail { threshold: 65532, would_have_been: 1 }))
        );

        let accepted = map_one(DICE_THRESHOLD - 1, 1, 6, p).unwrap();
        assert!(!accepted.is_rejected());
        assert_eq!(accepted.value(), Some(6));
    }

    #[test]
    fn test_modulo_policy_never_rejects() {
        let result = map_one(DICE_THRESHOLD + 1, 1, 6, SamplingPolicy::Modulo).unwrap();
        assert!(!result.is_rejected());
        assert_eq!(result.value(), Some(2));
        assert_eq!(result.method, MappingMethod::ModuloMapping);
        assert!(matches!(result.bias_info, Some(BiasInfo::Metrics(_))));
    }

    #[test]
    fn test_perfectly_divisible_range_has_no_bias_info() {
        for policy in [SamplingPolicy::RejectionSampling, SamplingPolicy::Modulo] {
            let result = map_one(12345u16, 0, 255, policy).unwrap();
            assert!(!result.is_rejected());
            assert_eq!(result.value(), Some(12345 % 256));
            assert_eq!(result.method, MappingMethod::ModuloMapping);
            assert_eq!(result.bias_info, None);
        }
    }

    #[test]
    fn test_edge_ranges() {
        let p = SamplingPolicy::RejectionSampling;
        assert!(matches!(map_one(32768u16, 0, 1, p).unwrap().value(), Some(0) | Some(1)));
        let v = map_one(32768u16, 1, 1000, p).unwrap().value().unwrap();
        assert!((1..=1000).contains(&v));
        let v = map_one(32768u16, -10, 10, p).unwrap().value().unwrap();
        assert!((-10..=10).contains(&v));
        assert_eq!(map_one_simple(0u16, 1, 6).unwrap(), 1);
        assert_eq!(map_one_simple(u16::MAX, 1, 6).unwrap(), 1 + 65535 % 6);
    }

    #[test]
    fn test_range_wider_than_sample_space_rejects_everything() {
        let result = map_one(0u16, 0, 99_999, SamplingPolicy::RejectionSampling).unwrap();
        assert!(result.is_rejected());
        assert_eq!(map_one_simple(u16::MAX, 0, 99_999).unwrap(), 65535);
    }

    #[test]
    fn test_serialized_shape() {
        let rejected = map_one(65533u16, 1, 6, SamplingPolicy::RejectionSampling).unwrap();
        let json = serde_json::to_value(rejected).unwrap();
        assert_eq!(json["value"], serde_json::Value::Null);
        assert_eq!(json["rejected"], true);
        assert_eq!(json["method"], "rejection_sampling");
        assert_eq!(json["biasInfo"]["threshold"], 65532);
        assert_eq!(json["biasInfo"]["wouldHaveBeen"], 2);

        let divisible = map_one(7u16, 0, 255, SamplingPolicy::RejectionSampling).unwrap();
        let json = serde_json::to_value(divisible).unwrap();
        assert_eq!(json["value"], 7);
        assert_eq!(json["method"], "modulo_mapping");
        assert_eq!(json["biasInfo"], serde_json::Value::Null);
    }

    /// Tally accepted values over one full pass of the sample space.
    fn full_pass(min: i64, max: i64, policy: SamplingPolicy) -> HashMap<i64, u32> {
        let range = Range::new(min, max).unwrap();
        let mut counts = HashMap::new();
        for raw in 0..=u16::MAX {
            if let Some(v) = map_sample(Sample::new(raw), &range, policy).value() {
                *counts.entry(v).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn test_dice_rejection_is_exactly_uniform() {
        let counts = full_pass(1, 6, SamplingPolicy::RejectionSampling);
        assert_eq!(counts.len(), 6);
        assert!(counts.values().all(|&c| c == 10922));
    }

    #[test]
    fn test_dice_modulo_matches_expected_frequencies() {
        let counts = full_pass(1, 6, SamplingPolicy::Modulo);
        let report = analyze_bias(1, 6).unwrap();
        for (value, expected) in report.expected_frequencies() {
            assert_eq!(counts[&value], expected, "value {}", value);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_rejection_sampling_is_uniform(min in -1000i64..1000, span in 1i64..700) {
            let max = min + span;
            let report = analyze_bias(min, max).unwrap();
            prop_assume!(report.remainder != 0);
            let counts = full_pass(min, max, SamplingPolicy::RejectionSampling);
            prop_assert_eq!(counts.len() as u128, report.width);
            for v in min..=max {
                prop_assert_eq!(counts.get(&v).copied(), Some(report.quotient));
            }
        }

        #[test]
        fn prop_accepted_values_stay_in_range(raw in any::<u16>(), min in any::<i32>(), span in 0u32..100_000) {
            let min = i64::from(min);
            let max = min + i64::from(span);
            for policy in [SamplingPolicy::RejectionSampling, SamplingPolicy::Modulo] {
                if let Some(v) = map_one(raw, min, max, policy).unwrap().value() {
                    prop_assert!((min..=max).contains(&v));
                }
            }
        }
    }
}
