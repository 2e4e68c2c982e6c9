//! CPU entropy key source.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::{KeyBatch, KeySource, SourceError};

/// Draws candidates from a CSPRNG seeded from the operating system.
///
/// Every instance owns its own stream, so workers never share state.
pub struct CpuSource {
    rng: StdRng,
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSource {
    /// Creates a source with a fresh OS-seeded stream.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl KeySource for CpuSource {
    fn next_batch(&mut self, size: usize) -> Result<KeyBatch, SourceError> {
        let mut batch = KeyBatch::zeroed(size);
        self.rng.fill_bytes(batch.bytes_mut());
        Ok(batch)
    }

    fn name(&self) -> &str {
        "cpu"
    }
}
