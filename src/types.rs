//! Core value types for the range mapper.
//!
//! Everything here is a transient value object: built once by a mapping or
//! analysis call and never mutated afterwards. Serialised shapes use camelCase
//! to match the JS objects the host page consumes.

use crate::error::{MapperError, Result};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Size of the 16-bit sample space (2^16).
pub const SAMPLE_SPACE: u32 = 1 << 16;

/// Largest integer a JS number represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// One 16-bit entropy sample, assumed uniform over [0, 65535].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Sample(u16);

impl Sample {
    pub const MIN: Sample = Sample(0);
    pub const MAX: Sample = Sample(u16::MAX);

    #[inline(always)]
    pub const fn new(raw: u16) -> Self {
        Sample(raw)
    }

    #[inline(always)]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u16> for Sample {
    fn from(raw: u16) -> Self {
        Sample(raw)
    }
}

impl TryFrom<i64> for Sample {
    type Error = MapperError;

    fn try_from(raw: i64) -> Result<Self> {
        u16::try_from(raw)
            .map(Sample)
            .map_err(|_| MapperError::SampleOutOfRange(raw))
    }
}

impl TryFrom<i32> for Sample {
    type Error = MapperError;

    fn try_from(raw: i32) -> Result<Self> {
        Sample::try_from(i64::from(raw))
    }
}

impl TryFrom<u32> for Sample {
    type Error = MapperError;

    fn try_from(raw: u32) -> Result<Self> {
        Sample::try_from(i64::from(raw))
    }
}

/// JS numbers arrive as `f64`: they must be integral before the range check.
impl TryFrom<f64> for Sample {
    type Error = MapperError;

    fn try_from(raw: f64) -> Result<Self> {
        if !raw.is_finite() || raw.fract() != 0.0 {
            return Err(MapperError::NonIntegerSample(raw));
        }
        if !(0.0..=f64::from(u16::MAX)).contains(&raw) {
            // Out-of-range integers keep their own error; clamp only for the message.
            return Err(MapperError::SampleOutOfRange(raw.clamp(i64::MIN as f64, i64::MAX as f64) as i64));
        }
        Ok(Sample(raw as u16))
    }
}

/// Convert a JS number into an integer range bound.
pub fn bound_from_f64(raw: f64) -> Result<i64> {
    if !raw.is_finite() || raw.fract() != 0.0 || raw.abs() > MAX_SAFE_INTEGER {
        return Err(MapperError::NonIntegerBound(raw));
    }
    Ok(raw as i64)
}

/// Inclusive integer range `[min, max]` with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    min: i64,
    max: i64,
}

impl Range {
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min > max {
            return Err(MapperError::InvertedRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn from_f64(min: f64, max: f64) -> Result<Self> {
        Range::new(bound_from_f64(min)?, bound_from_f64(max)?)
    }

    #[inline(always)]
    pub fn min(&self) -> i64 {
        self.min
    }

    #[inline(always)]
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Number of integers in the range. `u128` holds the full `i64` span.
    #[inline(always)]
    pub fn width(&self) -> u128 {
        (i128::from(self.max) - i128::from(self.min) + 1) as u128
    }

    #[inline(always)]
    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    /// The value `offset` steps above `min`. Callers keep `offset < width()`.
    #[inline(always)]
    pub(crate) fn value_at(&self, offset: u128) -> i64 {
        (i128::from(self.min) + offset as i128) as i64
    }

    /// Plain modulo reduction of a sample onto the range.
    #[inline(always)]
    pub(crate) fn reduce(&self, sample: Sample) -> i64 {
        self.value_at(u128::from(sample.get()) % self.width())
    }
}

/// How a single sample is mapped when the range does not divide 2^16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingPolicy {
    /// Discard samples in the overflow bucket. Bias free.
    #[default]
    RejectionSampling,
    /// Always accept `min + sample % width`. Biased towards the low end.
    Modulo,
}

impl SamplingPolicy {
    pub fn from_flag(use_rejection_sampling: bool) -> Self {
        if use_rejection_sampling {
            SamplingPolicy::RejectionSampling
        } else {
            SamplingPolicy::Modulo
        }
    }
}

/// Tag describing which mapping path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    SingleValue,
    ModuloMapping,
    RejectionSampling,
}

impl MappingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingMethod::SingleValue => "single_value",
            MappingMethod::ModuloMapping => "modulo_mapping",
            MappingMethod::RejectionSampling => "rejection_sampling",
        }
    }
}

impl fmt::Display for MappingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of mapping one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapped {
    Accepted(i64),
    Rejected,
}

/// Audit detail for a rejected sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionDetail {
    pub threshold: u32,
    pub would_have_been: i64,
}

/// Bias metrics attached to an accepted sample from a non-divisible range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasMetrics {
    pub remainder: u32,
    pub quotient: u32,
    pub bias_threshold: u32,
    pub perfectly_divisible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BiasInfo {
    Rejected(RejectionDetail),
    Metrics(BiasMetrics),
}

/// Result of [`crate::mapper::map_one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingResult {
    pub outcome: Mapped,
    pub method: MappingMethod,
    pub bias_info: Option<BiasInfo>,
}

impl MappingResult {
    #[inline(always)]
    pub fn value(&self) -> Option<i64> {
        match self.outcome {
            Mapped::Accepted(v) => Some(v),
            Mapped::Rejected => None,
        }
    }

    #[inline(always)]
    pub fn is_rejected(&self) -> bool {
        self.outcome == Mapped::Rejected
    }
}

/// Flattens to `{ value, rejected, method, biasInfo }` with `value: null` on rejection.
impl Serialize for MappingResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MappingResult", 4)?;
        state.serialize_field("value", &self.value())?;
        state.serialize_field("rejected", &self.is_rejected())?;
        state.serialize_field("method", &self.method)?;
        state.serialize_field("biasInfo", &self.bias_info)?;
        state.end()
    }
}

/// A percentage rendered as a string: the literal `"0%"` or a fixed-decimal value.
///
/// `Fixed` holds the percentage scaled by `10^decimals`, already rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Percent {
    Zero,
    Fixed { scaled: u64, decimals: u32 },
}

impl Percent {
    /// `numerator / denominator` as a percentage, rounded half up at `decimals`
    /// places like JS `toFixed`. A zero denominator yields [`Percent::Zero`].
    pub fn of_ratio(numerator: u64, denominator: u64, decimals: u32) -> Self {
        if denominator == 0 {
            return Percent::Zero;
        }
        let scale = 100 * 10u128.pow(decimals);
        let num = u128::from(numerator) * scale;
        let den = u128::from(denominator);
        let scaled = (2 * num + den) / (2 * den);
        Percent::Fixed { scaled: scaled as u64, decimals }
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Percent::Zero => f.write_str("0%"),
            Percent::Fixed { scaled, decimals: 0 } => write!(f, "{scaled}%"),
            Percent::Fixed { scaled, decimals } => {
                let unit = 10u64.pow(decimals);
                let width = decimals as usize;
                write!(f, "{}.{:0width$}%", scaled / unit, scaled % unit)
            }
        }
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of [`crate::retry::map_with_retry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryResult {
    pub value: i64,
    /// Samples examined, including the accepted (or fallback) one.
    pub attempts_used: usize,
    /// Rejected samples in the order they were seen.
    pub rejected_values: Vec<Sample>,
    /// True when every sample was rejected and the last one was mapped with bias.
    pub fallback_used: bool,
    /// `1 / attempts_used` as a percentage, or `"0%"` after a fallback.
    pub efficiency: Percent,
}
