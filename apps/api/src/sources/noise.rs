//! Privacy noise for small-sample internal data.
//!
//! Percentiles computed from fewer than `SMALL_SAMPLE_THRESHOLD` records are
//! perturbed with zero-mean Gaussian noise before leaving the connector.
//! Production runs entropy-seeded; tests pin `Identity` or `Seeded`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use sha2::{Digest, Sha256};

use crate::sources::ObservedPercentiles;

/// Samples at or above this size are returned untouched.
pub const SMALL_SAMPLE_THRESHOLD: u32 = 30;

/// Noise std-dev as a fraction of the value, before the 1/√n shrink.
const NOISE_RELATIVE_SCALE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyNoise {
    Identity,
    /// Deterministic: the RNG is derived from this seed and the query key.
    Seeded(u64),
    Entropy,
}

impl PrivacyNoise {
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => PrivacyNoise::Seeded(s),
            None => PrivacyNoise::Entropy,
        }
    }

    /// Perturbs `percentiles` in place when `sample_size` is small, then
    /// restores ascending order across the present points.
    pub fn apply(&self, percentiles: &mut ObservedPercentiles, sample_size: u32, key: &str) {
        if sample_size >= SMALL_SAMPLE_THRESHOLD || sample_size == 0 {
            return;
        }
        let mut rng = match self {
            PrivacyNoise::Identity => return,
            PrivacyNoise::Seeded(seed) => StdRng::from_seed(rng_seed(*seed, key)),
            PrivacyNoise::Entropy => StdRng::from_entropy(),
        };

        let shrink = (sample_size as f64).sqrt();
        let mut points = percentiles.points();
        for point in points.iter_mut() {
            let Some(value) = *point else { continue };
            let std_dev = NOISE_RELATIVE_SCALE * value / shrink;
            if let Ok(normal) = Normal::new(0.0, std_dev) {
                *point = Some((value + normal.sample(&mut rng)).max(0.0));
            }
        }

        let mut present: Vec<f64> = points.iter().flatten().copied().collect();
        present.sort_by(f64::total_cmp);
        let mut sorted = present.into_iter();
        for point in points.iter_mut().filter(|p| p.is_some()) {
            *point = sorted.next();
        }

        *percentiles = ObservedPercentiles::from_points(points);
    }
}

/// RNG seed from the configured seed and the query key. Stable across builds.
fn rng_seed(seed: u64, key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}
