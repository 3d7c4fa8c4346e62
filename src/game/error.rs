//! Command and lookup errors raised by the match coordinator.

use crate::game::entity::PlayerHandle;
use crate::game::input::ControllerId;
use crate::game::state::MatchPhase;

/// Errors returned by registry lookups and coordinator commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// Team ids are only ever 0 or 1.
    #[error("invalid team id {0}, expected 0 or 1")]
    InvalidTeamId(i32),

    /// Phases only move forward.
    #[error("cannot change match phase from {from:?} to {to:?}")]
    InvalidPhaseTransition {
        /// Phase the match is in.
        from: MatchPhase,
        /// Phase that was requested.
        to: MatchPhase,
    },

    /// Handle does not point into a roster.
    #[error("no player at {0:?}")]
    UnknownPlayer(PlayerHandle),

    /// Controller is not bound to any player.
    #[error("controller {0:?} is not bound")]
    UnknownController(ControllerId),

    /// Config failed validation.
    #[error("invalid match config: {0}")]
    InvalidConfig(String),

    /// A roster was empty or larger than a handle can address.
    #[error("invalid roster for team {team}: {reason}")]
    InvalidRoster {
        /// Team index.
        team: u8,
        /// What was wrong.
        reason: &'static str,
    },
}
