//! Rejection sampling over a finite batch of samples.
//!
//! Callers usually hold a prefetched batch of entropy and cannot wait for more,
//! so exhausting the batch is not an error: the last sample is mapped with
//! plain modulo reduction and the result is flagged with `fallback_used`.

use crate::error::{MapperError, Result};
use crate::mapper::map_sample;
use crate::types::{Mapped, Percent, Range, RetryResult, Sample, SamplingPolicy};
use serde::Serialize;

/// Decimal places of the efficiency percentage.
const EFFICIENCY_DECIMALS: u32 = 2;

/// Map the first sample that survives rejection onto `[min, max]`.
///
/// Samples are consumed in order and validated as they are reached. An empty
/// batch is an error since there is no sample to fall back on.
pub fn map_with_retry<I>(samples: I, min: i64, max: i64) -> Result<RetryResult>
where
    I: IntoIterator,
    I::Item: TryInto<Sample>,
    MapperError: From<<I::Item as TryInto<Sample>>::Error>,
{
    let range = Range::new(min, max)?;
    let mut rejected_values = Vec::new();
    let mut last = None;

    for (i, raw) in samples.into_iter().enumerate() {
        let sample: Sample = raw.try_into()?;
        match map_sample(sample, &range, SamplingPolicy::RejectionSampling).outcome {
            Mapped::Accepted(value) => {
                let attempts_used = i + 1;
                tracing::debug!(min, max, value, attempts_used, "retry mapping accepted");
                return Ok(RetryResult {
                    value,
                    attempts_used,
                    rejected_values,
                    fallback_used: false,
                    // Only the final attempt is ever accepted, so this is 1 / attempts.
                    efficiency: Percent::of_ratio(1, attempts_used as u64, EFFICIENCY_DECIMALS),
                });
            }
            Mapped::Rejected => rejected_values.push(sample),
        }
        last = Some(sample);
    }

    let last = last.ok_or(MapperError::EmptySampleBatch)?;
    let value = range.reduce(last);
    let attempts_used = rejected_values.len();
    tracing::warn!(
        min,
        max,
        value,
        attempts_used,
        fallback_sample = last.get(),
        "every sample rejected, using biased modulo fallback"
    );

    Ok(RetryResult {
        value,
        attempts_used,
        rejected_values,
        fallback_used: true,
        efficiency: Percent::Zero,
    })
}

/// Values drawn from one batch by [`map_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub values: Vec<i64>,
    pub samples_consumed: usize,
    pub rejected_values: Vec<Sample>,
    /// Number of values that came from the biased fallback.
    pub fallbacks: usize,
}

/// Draw up to `count` values from one batch, retrying each on the unconsumed tail.
///
/// Stops early once the batch is used up; `values.len()` tells how many were
/// produced.
pub fn map_batch(samples: &[Sample], min: i64, max: i64, count: usize) -> Result<BatchResult> {
    Range::new(min, max)?;
    let mut batch = BatchResult {
        values: Vec::with_capacity(count.min(samples.len())),
        samples_consumed: 0,
        rejected_values: Vec::new(),
        fallbacks: 0,
    };

    while batch.values.len() < count && batch.samples_consumed < samples.len() {
        let tail = &samples[batch.samples_consumed..];
        let result = map_with_retry(tail.iter().copied(), min, max)?;
        batch.samples_consumed += result.attempts_used;
        batch.rejected_values.extend(result.rejected_values);
        if result.fallback_used {
            batch.fallbacks += 1;
        }
        batch.values.push(result.value);
    }

    Ok(batch)
}
