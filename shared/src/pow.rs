use std::fmt::{Display, Formatter};

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Leading hex substring every qualifying hash starts with.
pub const MAGIC: &str = "21e8";

/// Point value of a bare `21e8` hash; each extra zero multiplies by 4.
pub const BASE_POINTS: u64 = 15;

/// Random search anchor, 32 bytes hex-encoded to 64 lowercase characters.
/// Immutable once created; a restarted search replaces it, never mutates it.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge(pub String);

impl Challenge {
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Challenge(hex::encode(seed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Challenge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `sha256(challenge ++ nonce)` as lowercase hex. Both the miner and the
/// verifier derive hashes through this one function.
pub fn pow_hash(challenge: &str, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.update(nonce.as_bytes());
    hex::encode(hasher.finalize())
}

/// Count of `0` hex digits immediately after the magic prefix, or `None`
/// when the hash does not start with the magic at all.
pub fn zeros_after_magic(hash: &str) -> Option<u32> {
    let rest = hash.strip_prefix(MAGIC)?;
    Some(rest.bytes().take_while(|b| *b == b'0').count() as u32)
}

/// Point score a hash earns: `15 * 4^zeros`, or 0 for a non-qualifying hash.
pub fn score_for_hash(hash: &str) -> u64 {
    match zeros_after_magic(hash) {
        Some(zeros) => BASE_POINTS.saturating_mul(4u64.saturating_pow(zeros)),
        None => 0,
    }
}

/// The engine's claim that `sha256(challenge ++ nonce)` meets a requirement.
/// Produced once per successful search and consumed by exactly one
/// validation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningResult {
    pub hash: String,
    pub nonce: String,
    pub points: u64,
    pub trailing_zeros: u32,
    pub attempts: u64,
    pub hash_rate: f64,
}
