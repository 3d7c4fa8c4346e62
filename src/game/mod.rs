//! Match Simulation
//!
//! Everything that runs inside a tick, plus the coordinator around it.
//! Deterministic throughout.
//!
//! ## Module Structure
//!
//! - `entity`: Teams, players, ball, officials
//! - `input`: Controller frames, bindings, recordings
//! - `physics`: Ball and player integration
//! - `collision`: Player-player bounces, player-ball touches
//! - `possession`: Touch attribution and possession
//! - `goal`: Goal-line detection and scoreboard
//! - `history`: Mental images for replay and lagged queries
//! - `camera`: Broadcast camera follower
//! - `state`: Match state, queries and commands
//! - `tick`: Authoritative simulation loop
//! - `export`: Save/load of match state
//! - `host`: Calls out to the presentation layer
//! - `coordinator`: `Match`, the owner of all of the above
//! - `events`: Notifications for the caller

pub mod camera;
pub mod collision;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod events;
pub mod export;
pub mod goal;
pub mod history;
pub mod host;
pub mod input;
pub mod physics;
pub mod possession;
pub mod state;
pub mod tick;

// Re-export key types
pub use coordinator::Match;
pub use entity::{BallState, PlayerHandle, PlayerId, PlayerState, Registry, TeamId, TeamState};
pub use error::MatchError;
pub use events::{MatchEvent, MatchEventData};
pub use export::{ExportedState, StateError};
pub use host::{MatchHost, NullHost};
pub use input::{ControllerFrame, ControllerId, ControllerInputs, ControllerRecording};
pub use possession::TouchType;
pub use state::{MatchPhase, MatchSetup, MatchState};
pub use tick::{replay_match, tick, TickResult};
