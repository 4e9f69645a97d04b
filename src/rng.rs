//! Sample sources.
//!
//! The real entropy supplier (the QRNG HTTP proxy) lives outside this crate;
//! [`SampleSource`] is the seam it plugs into. Two local sources are provided
//! for testing and demos: a `rand`-backed generator and the deterministic LCG
//! used by the bias harness.

use crate::types::{Sample, SAMPLE_SPACE};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Supplier of uniformly distributed 16-bit samples.
pub trait SampleSource {
    fn next_sample(&mut self) -> Sample;

    /// Draw a batch of `count` samples in order.
    fn take_samples(&mut self, count: usize) -> Vec<Sample> {
        (0..count).map(|_| self.next_sample()).collect()
    }
}

/// `SmallRng` (xoshiro256++) producing 16-bit samples.
///
/// Can be seeded for deterministic replay, or created from system entropy
/// (browser `crypto.getRandomValues` on wasm32).
pub struct SampleRng {
    inner: SmallRng,
}

impl SampleRng {
    pub fn new() -> Self {
        Self {
            inner: SmallRng::from_os_rng(),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for SampleRng {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SampleRng {
    #[inline(always)]
    fn next_sample(&mut self) -> Sample {
        Sample::new(self.inner.random::<u16>())
    }
}

const LCG_MULTIPLIER: u64 = 1_103_515_245;
const LCG_INCREMENT: u64 = 12_345;

/// Reproducible mock entropy: `x = (x * 1103515245 + 12345) mod 65536`.
///
/// Statistically weak (the low bits cycle quickly) but stable across runs,
/// which is all the harness needs.
#[derive(Debug, Clone)]
pub struct LcgSource {
    state: u64,
}

impl LcgSource {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed % u64::from(SAMPLE_SPACE),
        }
    }
}

impl SampleSource for LcgSource {
    fn next_sample(&mut self) -> Sample {
        self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT) % u64::from(SAMPLE_SPACE);
        Sample::new(self.state as u16)
    }
}
