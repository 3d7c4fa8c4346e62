//! State Hashing
//!
//! SHA-256 over a fixed field order. Two uses, kept apart by a domain tag:
//!
//! ```text
//! HashDomain::MatchState     iteration + simulation fields  -> replay check
//! HashDomain::ExportPayload  encoded ExportedState bytes     -> blob checksum
//! ```
//!
//! Optional values hash as a sentinel (`u8::MAX`, `u32::MAX`, `u64::MAX`)
//! so that `None` and every real value stay distinct.

use sha2::{Digest, Sha256};

use super::fixed::Fixed;
use super::vec3::FixedVec3;

/// 32-byte SHA-256 digest.
pub type StateHash = [u8; 32];

/// What a digest is computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashDomain {
    /// Live simulation state
    MatchState,
    /// Serialized state export
    ExportPayload,
}

impl HashDomain {
    const fn tag(self) -> &'static [u8] {
        match self {
            HashDomain::MatchState => b"PITCH_MATCH_STATE_V1",
            HashDomain::ExportPayload => b"PITCH_MATCH_EXPORT_V1",
        }
    }
}

/// Incremental hasher for match fields. Update order is part of the hash.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Hasher seeded with the domain tag.
    pub fn new(domain: HashDomain) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain.tag());
        Self { hasher }
    }

    /// Small enum discriminant (phase, team, touch type).
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Optional discriminant.
    #[inline]
    pub fn update_opt_u8(&mut self, value: Option<u8>) {
        self.update_u8(value.unwrap_or(u8::MAX));
    }

    /// Counters and ids.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Optional packed player key.
    #[inline]
    pub fn update_opt_key(&mut self, key: Option<u32>) {
        self.update_u32(key.unwrap_or(u32::MAX));
    }

    /// Clock values in milliseconds.
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Optional timestamp in milliseconds.
    #[inline]
    pub fn update_opt_ms(&mut self, ms: Option<u64>) {
        self.update_u64(ms.unwrap_or(u64::MAX));
    }

    /// Q16.16 scalar.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Vector, x then y then z.
    #[inline]
    pub fn update_vec3(&mut self, value: FixedVec3) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
        self.update_fixed(value.z);
    }

    /// Flag as one byte.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finish the digest.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// One-shot digest of an encoded blob.
pub fn checksum(domain: HashDomain, bytes: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(domain.tag());
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hash of the match at `iteration`; `add_state` appends the match fields.
pub fn hash_match_state<F>(iteration: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::new(HashDomain::MatchState);
    hasher.update_u64(iteration);
    add_state(&mut hasher);
    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================
