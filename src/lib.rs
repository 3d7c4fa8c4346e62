//! # Pitch Match
//!
//! Per-tick football match state machine: who is where, who touched the
//! ball last, who has it, whether it went in, and what the camera looks at.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PITCH MATCH                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Deterministic primitives                 │
//! │  ├── fixed.rs     - Q16.16 arithmetic, pitch constants       │
//! │  ├── vec3.rs      - 3D vector with fixed-point               │
//! │  ├── rng.rs       - Seeded SplitMix64 match stream           │
//! │  └── hash.rs      - State hashing                            │
//! │                                                              │
//! │  game/            - Match simulation (deterministic)         │
//! │  ├── entity.rs    - Teams, players, ball, officials          │
//! │  ├── input.rs     - Controller frames and bindings           │
//! │  ├── physics.rs   - Ball and player integration              │
//! │  ├── collision.rs - Player and ball contacts                 │
//! │  ├── possession.rs- Touch attribution, possession            │
//! │  ├── goal.rs      - Goal detection, scoreboard               │
//! │  ├── history.rs   - Mental images                            │
//! │  ├── camera.rs    - Camera follower                          │
//! │  ├── tick.rs      - Authoritative simulation loop            │
//! │  ├── export.rs    - get_state / process_state                │
//! │  └── coordinator.rs - Match: commands, host, lifecycle       │
//! │                                                              │
//! │  config.rs        - MatchConfig (JSON, env override)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tick Order
//!
//! controls, physics, collisions, possession, goals, mental image, camera,
//! clocks. While paused only the actual clock moves.
//!
//! ## Determinism
//!
//! - No floating-point arithmetic in the simulation
//! - No HashMap (BTreeMap for sorted iteration)
//! - No system time
//! - All randomness from the seeded match stream
//!
//! Same setup, same config and same controller frames give the same state
//! hash on every platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;

// Re-export commonly used types
pub use config::{ConfigError, MatchConfig};
pub use core::fixed::{Fixed, FIXED_HALF, FIXED_ONE, FIXED_SCALE, TICK_MS};
pub use core::rng::MatchRng;
pub use core::vec3::FixedVec3;
pub use game::{Match, MatchError, MatchEvent, MatchPhase, MatchSetup, MatchState, StateError, TeamId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
