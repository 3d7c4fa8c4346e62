//! Core deterministic primitives.
//!
//! Everything the match simulation computes goes through these types so that
//! a recorded match replays bit-for-bit on any platform.

pub mod fixed;
pub mod vec3;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE, TICK_MS};
pub use vec3::FixedVec3;
pub use rng::MatchRng;
pub use hash::{hash_match_state, StateHash};
