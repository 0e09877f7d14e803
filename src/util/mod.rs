//! Internal utilities.
//!
//! These utilities are intentionally minimal and dependency-light so that
//! masking keys can be made deterministic in tests.

pub mod det_rng;
pub mod entropy;

pub use det_rng::DetRng;
pub use entropy::{DetEntropy, EntropySource, OsEntropy};
