//! Deterministic seed hierarchy for Monte Carlo streams.
//!
//! A master seed expands into one sub-seed per `(pattern hash, stop)` through
//! BLAKE3, so every permutation gets its own stream no matter which rayon
//! worker runs it or in what order.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for one permutation. Stops compare by value, so `2.0` and
    /// `2.0000000` share a seed.
    pub fn sub_seed(&self, pattern_hash: u64, stop: Decimal) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(&pattern_hash.to_le_bytes());
        hasher.update(stop.normalize().to_string().as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, pattern_hash: u64, stop: Decimal) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(pattern_hash, stop))
    }
}
