//! Deterministic seeds for fallback engines.
//!
//! Fallback results that need ids or sampled numbers derive them from a
//! SHA-256 digest of the operation name and request, so the same request
//! always produces the same synthetic response.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Prefix of every identifier minted by a fallback.
pub const FALLBACK_ID_PREFIX: &str = "fb-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSeed {
    digest: [u8; 32],
}

impl RequestSeed {
    pub fn of<T: Serialize>(operation: &str, request: &T) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_vec(request).unwrap_or_default());
        Self {
            digest: hasher.finalize().into(),
        }
    }

    /// `fb-` followed by the first 16 hex digits of the digest.
    pub fn fallback_id(&self) -> String {
        format!("{}{}", FALLBACK_ID_PREFIX, hex::encode(&self.digest[..8]))
    }

    pub fn hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// RNG seeded from the digest.
    pub fn rng(&self) -> StdRng {
        StdRng::from_seed(self.digest)
    }
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
