//! Theoretical bias analysis for modulo-mapping 16-bit samples onto a range.
//!
//! Everything here is derived from `(min, max)` alone. Under plain modulo
//! mapping of all 65536 samples the first `remainder` values of the range get
//! `quotient + 1` representatives and the rest get `quotient`; samples at or
//! above `bias_threshold` form the overflow bucket that rejection sampling
//! discards.

use crate::error::Result;
use crate::types::{Percent, Range, SAMPLE_SPACE};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Decimal places of the rejection-rate percentage.
const RATE_DECIMALS: u32 = 4;

/// Division of the sample space by the range width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeMetrics {
    pub width: u128,
    pub quotient: u32,
    pub remainder: u32,
    /// `quotient * width`: samples at or above it over-represent the low end.
    pub bias_threshold: u32,
}

impl RangeMetrics {
    pub fn of(range: &Range) -> Self {
        let width = range.width();
        let space = u128::from(SAMPLE_SPACE);
        let quotient = (space / width) as u32;
        let remainder = (space % width) as u32;
        // quotient * width <= 2^16
        let bias_threshold = (u128::from(quotient) * width) as u32;
        Self { width, quotient, remainder, bias_threshold }
    }

    #[inline(always)]
    pub fn perfectly_divisible(&self) -> bool {
        self.remainder == 0
    }
}

/// Distribution-quality metrics for one range.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasReport {
    pub range: Range,
    pub width: u128,
    pub perfectly_divisible: bool,
    pub remainder: u32,
    pub quotient: u32,
    pub bias_threshold: u32,
    /// Values (from `min` upwards) that get one extra occurrence under modulo mapping.
    pub biased_values: u32,
    pub unbiased_values: u128,
    pub base_frequency: u32,
    pub max_frequency: u32,
    pub rejection_rate: Percent,
}

/// Analyze the bias of mapping 16-bit samples onto `[min, max]`.
pub fn analyze_bias(min: i64, max: i64) -> Result<BiasReport> {
    let range = Range::new(min, max)?;
    Ok(BiasReport::for_range(range))
}

impl BiasReport {
    pub fn for_range(range: Range) -> Self {
        let m = RangeMetrics::of(&range);
        let rejection_rate = if m.remainder > 0 {
            Percent::of_ratio(u64::from(m.remainder), u64::from(SAMPLE_SPACE), RATE_DECIMALS)
        } else {
            Percent::Zero
        };

        Self {
            range,
            width: m.width,
            perfectly_divisible: m.perfectly_divisible(),
            remainder: m.remainder,
            quotient: m.quotient,
            bias_threshold: m.bias_threshold,
            biased_values: m.remainder,
            unbiased_values: m.width - u128::from(m.remainder),
            base_frequency: m.quotient,
            max_frequency: m.quotient + u32::from(m.remainder > 0),
            rejection_rate,
        }
    }

    /// Expected occurrences of `value` over one pass of all 65536 samples.
    pub fn expected_frequency(&self, value: i64) -> Option<u32> {
        if !self.range.contains(value) {
            return None;
        }
        let offset = (i128::from(value) - i128::from(self.range.min())) as u128;
        Some(self.frequency_at(offset))
    }

    /// Lazily walk `(value, expected_frequency)` for every value in the range.
    ///
    /// The walk covers the whole range, so callers with very wide ranges should
    /// prefer [`BiasReport::expected_frequency`].
    pub fn expected_frequencies(&self) -> ExpectedFrequencies<'_> {
        ExpectedFrequencies { report: self, offset: 0 }
    }

    pub fn expected_frequency_map(&self) -> BTreeMap<i64, u32> {
        self.expected_frequencies().collect()
    }

    #[inline(always)]
    fn frequency_at(&self, offset: u128) -> u32 {
        self.quotient + u32::from(offset < u128::from(self.remainder))
    }
}

/// Iterator returned by [`BiasReport::expected_frequencies`].
pub struct ExpectedFrequencies<'a> {
    report: &'a BiasReport,
    offset: u128,
}

impl Iterator for ExpectedFrequencies<'_> {
    type Item = (i64, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.report.width {
            return None;
        }
        let item = (
            self.report.range.value_at(self.offset),
            self.report.frequency_at(self.offset),
        );
        self.offset += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.report.width - self.offset;
        match usize::try_from(left) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Emit a width-like count as an integer when it fits, else as a float.
fn serialize_count<S: Serializer>(count: u128, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match u64::try_from(count) {
        Ok(n) => serializer.serialize_u64(n),
        Err(_) => serializer.serialize_f64(count as f64),
    }
}

struct Count(u128);

impl Serialize for Count {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize_count(self.0, serializer)
    }
}

/// Frequencies keyed by the value's decimal string, like a JS object.
struct FrequencyObject<'a>(&'a BiasReport);

impl Serialize for FrequencyObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (value, freq) in self.0.expected_frequencies() {
            map.serialize_entry(&value.to_string(), &freq)?;
        }
        map.end()
    }
}

impl Serialize for BiasReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BiasReport", 11)?;
        state.serialize_field("range", &Count(self.width))?;
        state.serialize_field("perfectlyDivisible", &self.perfectly_divisible)?;
        state.serialize_field("remainder", &self.remainder)?;
        state.serialize_field("quotient", &self.quotient)?;
        state.serialize_field("biasThreshold", &self.bias_threshold)?;
        state.serialize_field("biasedValues", &self.biased_values)?;
        state.serialize_field("unbiasedValues", &Count(self.unbiased_values))?;
        state.serialize_field("baseFrequency", &self.base_frequency)?;
        state.serialize_field("maxFrequency", &self.max_frequency)?;
        state.serialize_field("rejectionRate", &self.rejection_rate)?;
        state.serialize_field("expectedFrequencies", &FrequencyObject(self))?;
        state.end()
    }
}
