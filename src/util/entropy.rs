//! Entropy source abstraction for masking keys.
//!
//! Client-role connections mask every outbound frame with a fresh 4-byte
//! key. This module provides an OS-backed source for production and a
//! deterministic one so tests can assert exact wire bytes.

use crate::util::DetRng;
use parking_lot::Mutex;
use std::io;

/// Core trait for entropy providers.
pub trait EntropySource: Send + Sync + 'static {
    /// Fill a buffer with entropy bytes.
    fn fill_bytes(&self, dest: &mut [u8]) -> io::Result<()>;

    /// Produce a fresh masking key.
    fn mask_key(&self) -> io::Result<[u8; 4]> {
        let mut key = [0u8; 4];
        self.fill_bytes(&mut key)?;
        Ok(key)
    }

    /// Stable identifier for tracing and diagnostics.
    fn source_id(&self) -> &'static str;
}

/// OS-backed entropy source for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> io::Result<()> {
        getrandom::fill(dest).map_err(|err| io::Error::other(format!("OS entropy failed: {err}")))
    }

    fn source_id(&self) -> &'static str {
        "os"
    }
}

/// Deterministic entropy source for reproducible tests.
#[derive(Debug)]
pub struct DetEntropy {
    rng: Mutex<DetRng>,
    seed: u64,
}

impl DetEntropy {
    /// Create a deterministic entropy source from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(DetRng::new(seed)),
            seed,
        }
    }

    /// The seed this source was created from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent source, e.g. one per simulated connection.
    #[must_use]
    pub fn fork(&self, index: u64) -> Self {
        Self::new(Self::mix_seed(self.seed.wrapping_add(index).wrapping_add(0x9e37_79b9_7f4a_7c15)))
    }

    fn mix_seed(mut seed: u64) -> u64 {
        seed ^= seed >> 30;
        seed = seed.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        seed ^= seed >> 27;
        seed = seed.wrapping_mul(0x94d0_49bb_1331_11eb);
        seed ^= seed >> 31;
        seed
    }
}

impl EntropySource for DetEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> io::Result<()> {
        self.rng.lock().fill_bytes(dest);
        Ok(())
    }

    fn source_id(&self) -> &'static str {
        "deterministic"
    }
}
