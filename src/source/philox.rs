//! Philox4x32-10 counter-based generator.
//!
//! Host-side twin of `kernels/keygen.cl`. Candidate `i` of batch `b` is
//!
//! ```text
//! philox(seed, [i, b_lo, b_hi, 0]) || philox(seed, [i, b_lo, b_hi, 1])
//! ```
//!
//! with every 32-bit word written big-endian. Work items need no per-thread
//! state and batches never overlap within one seed.

use rand::rngs::OsRng;
use rand::RngCore;
use rayon::prelude::*;

use super::Candidate;

const PHILOX_M0: u32 = 0xD251_1F53;
const PHILOX_M1: u32 = 0xCD9E_8D57;
const PHILOX_W0: u32 = 0x9E37_79B9;
const PHILOX_W1: u32 = 0xBB67_AE85;

/// A keyed Philox4x32-10 instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Philox {
    key: [u32; 2],
}

impl Philox {
    pub fn new(seed: u64) -> Self {
        Self {
            key: [seed as u32, (seed >> 32) as u32],
        }
    }

    /// Runs ten rounds over one 128-bit counter block.
    #[inline]
    pub fn block(&self, mut ctr: [u32; 4]) -> [u32; 4] {
        let mut key = self.key;
        for _ in 0..10 {
            let prod0 = u64::from(ctr[0]) * u64::from(PHILOX_M0);
            let prod1 = u64::from(ctr[2]) * u64::from(PHILOX_M1);
            ctr = [
                (prod1 >> 32) as u32 ^ ctr[1] ^ key[0],
                prod1 as u32,
                (prod0 >> 32) as u32 ^ ctr[3] ^ key[1],
                prod0 as u32,
            ];
            key[0] = key[0].wrapping_add(PHILOX_W0);
            key[1] = key[1].wrapping_add(PHILOX_W1);
        }
        ctr
    }

    /// Returns candidate `index` of batch `batch`.
    pub fn candidate(&self, index: u32, batch: u64) -> Candidate {
        let (lo, hi) = (batch as u32, (batch >> 32) as u32);
        let first = self.block([index, lo, hi, 0]);
        let second = self.block([index, lo, hi, 1]);

        let mut out = [0u8; 32];
        for (chunk, word) in out.chunks_exact_mut(4).zip(first.iter().chain(&second)) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    /// Fills `out` with batch `batch`, spreading the work over the rayon pool.
    pub fn fill(&self, batch: u64, out: &mut [Candidate]) {
        out.par_iter_mut()
            .enumerate()
            .for_each(|(index, slot)| *slot = self.candidate(index as u32, batch));
    }
}

/// Seed for the accelerator stream, drawn from the operating system.
///
/// The 64-bit Philox key bounds the entropy of every key generated on the
/// device, unlike [`CpuSource`](super::CpuSource) which draws 256 bits per key.
pub fn random_seed() -> u64 {
    OsRng.next_u64()
}
