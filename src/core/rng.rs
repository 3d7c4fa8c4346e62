//! Match Random Stream
//!
//! One seeded stream per match. It only feeds presentation choices (sun,
//! advertising boards) and test scenarios, never the physics, so the stream
//! position is exported with the state but kept out of the state hash.
//!
//! The generator is SplitMix64: a single 64-bit counter advanced by a fixed
//! odd increment and scrambled on output. Any seed, zero included, is valid.

use serde::{Deserialize, Serialize};

use super::fixed::{Fixed, PITCH_HALF_LENGTH, PITCH_HALF_WIDTH};
use super::vec3::FixedVec3;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seeded random stream owned by a match.
///
/// ```
/// use pitch_match::core::rng::MatchRng;
///
/// let mut a = MatchRng::new(12345);
/// let mut b = MatchRng::new(12345);
/// assert_eq!(a.below(100), b.below(100));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRng {
    counter: u64,
}

impl MatchRng {
    /// Stream starting at `seed`.
    pub fn new(seed: u64) -> Self {
        Self { counter: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.counter;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform pick in `0..count`; 0 when `count` is 0.
    pub fn below(&mut self, count: u32) -> u32 {
        if count == 0 {
            return 0;
        }
        // Multiply-shift keeps the pick unbiased enough for small counts
        (((self.next_u64() >> 32) * count as u64) >> 32) as u32
    }

    /// Uniform Q16.16 value in `[min, max)`. Returns `min` for an empty range.
    pub fn between(&mut self, min: Fixed, max: Fixed) -> Fixed {
        if min >= max {
            return min;
        }
        let span = (max as i64 - min as i64) as u64;
        let offset = ((self.next_u64() >> 32) * span) >> 32;
        (min as i64 + offset as i64) as Fixed
    }

    /// Ground position inside the touch and goal lines.
    pub fn pitch_position(&mut self) -> FixedVec3 {
        let x = self.between(-PITCH_HALF_LENGTH, PITCH_HALF_LENGTH);
        let y = self.between(-PITCH_HALF_WIDTH, PITCH_HALF_WIDTH);
        FixedVec3::ground(x, y)
    }

    /// Stream position, for export.
    pub fn state(&self) -> u64 {
        self.counter
    }

    /// Continue from an exported stream position.
    pub fn set_state(&mut self, counter: u64) {
        self.counter = counter;
    }
}
