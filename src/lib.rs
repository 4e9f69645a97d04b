//! Unbiased range mapping for 16-bit quantum random samples.
//!
//! Converts raw samples in `[0, 65535]` into uniform integers over any
//! inclusive range `[min, max]`. Plain modulo reduction is biased whenever the
//! range width does not divide 2^16; rejection sampling discards the overflow
//! bucket so every value is equally likely.
//!
//! Exports the same functions to JavaScript via wasm-bindgen under the names
//! the host page already uses (`mapQuantumToRange`, `analyzeBias`, ...).

pub mod analysis;
pub mod error;
pub mod harness;
pub mod mapper;
pub mod retry;
pub mod rng;
pub mod types;

pub use analysis::{analyze_bias, BiasReport};
pub use error::{ErrorKind, MapperError, Result};
pub use mapper::{map_one, map_one_simple};
pub use retry::{map_batch, map_with_retry, BatchResult};
pub use types::{MappingMethod, MappingResult, Range, RetryResult, Sample, SamplingPolicy};

// ─── WASM Exports (only compiled for wasm32 target) ─────────────────────────

#[cfg(target_arch = "wasm32")]
mod wasm_exports {
    use wasm_bindgen::prelude::*;
    use serde::Serialize;
    use crate::rng::{LcgSource, SampleSource};
    use crate::types::{Range, Sample, SamplingPolicy};
    use crate::{analysis, mapper, retry};

    /// Maps become plain objects, 64-bit integers become numbers.
    fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
        value
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Map one sample. Returns `{ value, rejected, method, biasInfo }`.
    #[wasm_bindgen(js_name = "mapQuantumToRange")]
    pub fn wasm_map_quantum_to_range(
        raw_int: f64,
        min: f64,
        max: f64,
        use_rejection_sampling: Option<bool>,
    ) -> Result<JsValue, JsError> {
        let range = Range::from_f64(min, max)?;
        let policy = SamplingPolicy::from_flag(use_rejection_sampling.unwrap_or(true));
        let result = mapper::map_one(raw_int, range.min(), range.max(), policy)?;
        to_js(&result)
    }

    /// Biased modulo mapping, value only.
    #[wasm_bindgen(js_name = "mapQuantumToRangeSimple")]
    pub fn wasm_map_quantum_to_range_simple(raw_int: f64, min: f64, max: f64) -> Result<f64, JsError> {
        let range = Range::from_f64(min, max)?;
        Ok(mapper::map_one_simple(raw_int, range.min(), range.max())? as f64)
    }

    /// Rejection sampling across a batch.
    /// Returns `{ value, attemptsUsed, rejectedValues, fallbackUsed, efficiency }`.
    #[wasm_bindgen(js_name = "mapQuantumToRangeWithRetry")]
    pub fn wasm_map_quantum_to_range_with_retry(
        quantum_ints: Vec<f64>,
        min: f64,
        max: f64,
    ) -> Result<JsValue, JsError> {
        let range = Range::from_f64(min, max)?;
        let result = retry::map_with_retry(quantum_ints, range.min(), range.max())?;
        to_js(&result)
    }

    /// Draw up to `count` values from one batch.
    /// Returns `{ values, samplesConsumed, rejectedValues, fallbacks }`.
    #[wasm_bindgen(js_name = "mapQuantumBatch")]
    pub fn wasm_map_quantum_batch(
        quantum_ints: Vec<f64>,
        min: f64,
        max: f64,
        count: usize,
    ) -> Result<JsValue, JsError> {
        let range = Range::from_f64(min, max)?;
        let samples = quantum_ints
            .into_iter()
            .map(Sample::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let result = retry::map_batch(&samples, range.min(), range.max(), count)?;
        to_js(&result)
    }

    /// Theoretical bias metrics, including `expectedFrequencies`.
    #[wasm_bindgen(js_name = "analyzeBias")]
    pub fn wasm_analyze_bias(min: f64, max: f64) -> Result<JsValue, JsError> {
        let range = Range::from_f64(min, max)?;
        to_js(&analysis::BiasReport::for_range(range))
    }

    /// Deterministic mock samples for demos and offline testing.
    #[wasm_bindgen(js_name = "generateMockSamples")]
    pub fn wasm_generate_mock_samples(count: usize, seed: u32) -> js_sys::Uint16Array {
        let samples: Vec<u16> = LcgSource::new(u64::from(seed))
            .take_samples(count)
            .into_iter()
            .map(Sample::get)
            .collect();

        let arr = js_sys::Uint16Array::new_with_length(samples.len() as u32);
        arr.copy_from(&samples);
        arr
    }

    /// Ping function to verify WASM is loaded.
    #[wasm_bindgen(js_name = "ping")]
    pub fn wasm_ping() -> String {
        "WASM range mapper ready".to_string()
    }
}
