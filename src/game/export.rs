//! State Export
//!
//! `get_state` / `process_state`: a compact, checksummed snapshot of the
//! match for save games, replays and network sync.
//!
//! Wire format:
//!
//! ```text
//! ┌───────────────────────────── bincode ─────────────────────────────┐
//! │ payload: Vec<u8>  (bincode(ExportedState))                         │
//! │ checksum: [u8; 32] (SHA-256 over domain || payload)                │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Loading is all or nothing: the blob is decoded and checked against the
//! live match first, and only a fully valid state is written back.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::fixed::{
    FIXED_ONE, GOAL_DEPTH, PITCH_HALF_LENGTH, PITCH_HALF_WIDTH, PITCH_RUN_OFF,
};
use crate::core::hash::{checksum, HashDomain, StateHash};
use crate::core::vec3::FixedVec3;
use crate::game::entity::{BallState, PlayerHandle, TeamId};
use crate::game::possession::TouchMap;
use crate::game::state::{MatchPhase, MatchState};

/// Current export format version.
pub const STATE_VERSION: u16 = 2;

/// Why a state blob was rejected.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The live state could not be encoded.
    #[error("failed to encode match state: {0}")]
    Encode(#[source] bincode::Error),

    /// Bytes are not a valid export.
    #[error("failed to decode match state: {0}")]
    Decode(#[source] bincode::Error),

    /// Payload does not match its checksum.
    #[error("match state checksum mismatch")]
    ChecksumMismatch,

    /// Exported by an incompatible version.
    #[error("unsupported match state version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the blob
        found: u16,
        /// Version this build writes
        expected: u16,
    },

    /// Roster size differs from the live match.
    #[error("roster size mismatch for team {team:?}: expected {expected}, found {found}")]
    RosterMismatch {
        /// Team concerned
        team: TeamId,
        /// Players in the live match
        expected: usize,
        /// Players in the blob
        found: usize,
    },

    /// Values that contradict each other.
    #[error("inconsistent match state: {0}")]
    Invariant(&'static str),

    /// A value outside the pitch or clock limits.
    #[error("match state value out of range: {0}")]
    OutOfRange(&'static str),
}

// =============================================================================
// EXPORTED FORM
// =============================================================================

/// Exported player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedPlayer {
    /// Ground position
    pub position: FixedVec3,
    /// Velocity
    pub velocity: FixedVec3,
    /// Facing direction
    pub facing: FixedVec3,
    /// On the pitch
    pub active: bool,
    /// Actual time of this player's last touch
    pub last_touch_ms: Option<u64>,
}

/// Exported team.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedTeam {
    /// Mirrored to the other half
    pub mirrored: bool,
    /// Roster index of the team's last toucher
    pub last_touch_index: Option<u16>,
    /// Actual time of that touch
    pub last_touch_ms: Option<u64>,
    /// Players in roster order
    pub players: Vec<ExportedPlayer>,
}

/// Everything `process_state` restores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedState {
    /// Format version
    pub version: u16,
    /// Match identifier
    pub match_id: [u8; 16],
    /// Simulated ticks
    pub iteration: u64,
    /// Match clock
    pub match_time_ms: u64,
    /// Pacing clock
    pub actual_time_ms: u64,
    /// Match clock remainder (Q16.16 ms)
    pub match_time_carry: u64,
    /// Phase
    pub phase: MatchPhase,
    /// Paused flag
    pub paused: bool,
    /// Ball in play
    pub in_play: bool,
    /// Set piece being taken
    pub in_set_piece: bool,
    /// Goals per team
    pub scores: [u32; 2],
    /// Goal pending
    pub goal_scored: bool,
    /// Ball in a goal
    pub ball_in_goal: bool,
    /// Team of the last goal's final touch
    pub last_goal_team: Option<TeamId>,
    /// Player of the last goal's final touch
    pub last_goal_scorer: Option<PlayerHandle>,
    /// Most recent touch of any type
    pub last_touch_team: Option<TeamId>,
    /// Most recent touch per type
    pub touch_map: TouchMap,
    /// Most recent touching player
    pub last_touch_player: Option<PlayerHandle>,
    /// Time of that touch
    pub last_touch_ms: Option<u64>,
    /// Player holding the ball outside physics
    pub ball_retainer: Option<PlayerHandle>,
    /// Ball mirrored
    pub ball_mirrored: bool,
    /// Ball
    pub ball: BallState,
    /// Both teams
    pub teams: [ExportedTeam; 2],
    /// RNG state
    pub rng_state: u64,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    payload: Vec<u8>,
    checksum: StateHash,
}

impl ExportedState {
    /// Capture the exportable part of a live match.
    pub fn capture(state: &MatchState) -> Self {
        let teams = TeamId::ALL.map(|id| {
            let team = state.registry.team(id);
            ExportedTeam {
                mirrored: team.mirrored,
                last_touch_index: team.last_touch_player.map(|h| h.index),
                last_touch_ms: team.last_touch_ms,
                players: team
                    .players
                    .iter()
                    .map(|p| ExportedPlayer {
                        position: p.position,
                        velocity: p.velocity,
                        facing: p.facing,
                        active: p.active,
                        last_touch_ms: p.last_touch_ms,
                    })
                    .collect(),
            }
        });

        Self {
            version: STATE_VERSION,
            match_id: state.match_id,
            iteration: state.iteration,
            match_time_ms: state.match_time_ms,
            actual_time_ms: state.actual_time_ms,
            match_time_carry: state.match_time_carry,
            phase: state.phase,
            paused: state.paused,
            in_play: state.in_play,
            in_set_piece: state.in_set_piece,
            scores: [state.goals.score(TeamId::First), state.goals.score(TeamId::Second)],
            goal_scored: state.goals.is_goal_scored(),
            ball_in_goal: state.goals.is_ball_in_goal(),
            last_goal_team: state.goals.last_goal_team(),
            last_goal_scorer: state.goals.last_goal_scorer(),
            last_touch_team: state.possession.last_touch_team(),
            touch_map: *state.possession.touch_map(),
            last_touch_player: state.possession.last_touch_player(),
            last_touch_ms: state.possession.last_touch_ms(),
            ball_retainer: state.possession.ball_retainer(),
            ball_mirrored: state.registry.is_ball_mirrored(),
            ball: state.registry.ball,
            teams,
            rng_state: state.rng.state(),
        }
    }

    /// Check this export against the live match without changing anything.
    pub fn validate_against(&self, state: &MatchState) -> Result<(), StateError> {
        if self.version != STATE_VERSION {
            return Err(StateError::UnsupportedVersion { found: self.version, expected: STATE_VERSION });
        }

        for id in TeamId::ALL {
            let expected = state.registry.team(id).players.len();
            let found = self.teams[id.index()].players.len();
            if expected != found {
                return Err(StateError::RosterMismatch { team: id, expected, found });
            }
        }

        let handle_ok = |h: PlayerHandle| (h.index as usize) < self.teams[h.team.index()].players.len();
        if !self.last_touch_player.map_or(true, handle_ok) {
            return Err(StateError::Invariant("last touch player not in roster"));
        }
        if !self.last_goal_scorer.map_or(true, handle_ok) {
            return Err(StateError::Invariant("goal scorer not in roster"));
        }
        if self.last_goal_scorer.is_some() && self.last_goal_scorer.map(|p| p.team) != self.last_goal_team {
            return Err(StateError::Invariant("goal scorer not on the last goal team"));
        }
        if !self.ball_retainer.map_or(true, handle_ok) {
            return Err(StateError::Invariant("ball retainer not in roster"));
        }
        for team in &self.teams {
            if team.last_touch_index.map_or(false, |i| i as usize >= team.players.len()) {
                return Err(StateError::Invariant("team last toucher not in roster"));
            }
        }
        if self.ball_in_goal && !self.goal_scored {
            return Err(StateError::Invariant("ball in goal without a goal"));
        }
        if self.last_touch_player.is_some() && self.last_touch_team.is_none() {
            return Err(StateError::Invariant("touching player without touching team"));
        }

        if self.match_time_carry >= FIXED_ONE as u64 {
            return Err(StateError::OutOfRange("match time carry"));
        }
        let max_x = PITCH_HALF_LENGTH + PITCH_RUN_OFF;
        let max_y = PITCH_HALF_WIDTH + PITCH_RUN_OFF;
        // The ball may sit in a net or just past the boards after a push-out
        let on_pitch = |p: FixedVec3, margin: i32| {
            p.x.checked_abs().map_or(false, |x| x <= max_x + margin)
                && p.y.checked_abs().map_or(false, |y| y <= max_y + margin)
                && p.z >= 0
        };
        if !on_pitch(self.ball.position, GOAL_DEPTH) {
            return Err(StateError::OutOfRange("ball position"));
        }
        let players = self.teams.iter().flat_map(|t| t.players.iter());
        for player in players {
            if !on_pitch(player.position, 0) || player.position.z != 0 {
                return Err(StateError::OutOfRange("player position"));
            }
        }
        Ok(())
    }

    /// Write this export into the live match. Call only after
    /// `validate_against` succeeded for the same state.
    fn apply(self, state: &mut MatchState, prediction_steps: usize) {
        state.match_id = self.match_id;
        state.iteration = self.iteration;
        state.match_time_ms = self.match_time_ms;
        state.actual_time_ms = self.actual_time_ms;
        state.match_time_carry = self.match_time_carry;
        state.phase = self.phase;
        state.paused = self.paused;
        state.in_play = self.in_play;
        state.in_set_piece = self.in_set_piece;

        state.goals.restore(
            self.scores,
            self.goal_scored,
            self.ball_in_goal,
            self.last_goal_team,
            self.last_goal_scorer,
        );

        let mirrored = [self.teams[0].mirrored, self.teams[1].mirrored];
        for (id, exported) in TeamId::ALL.into_iter().zip(self.teams) {
            let team = state.registry.team_mut(id);
            team.last_touch_player = exported.last_touch_index.map(|i| PlayerHandle::new(id, i));
            team.last_touch_ms = exported.last_touch_ms;
            for (player, saved) in team.players.iter_mut().zip(exported.players) {
                player.position = saved.position;
                player.velocity = saved.velocity;
                player.facing = saved.facing;
                player.active = saved.active;
                player.last_touch_ms = saved.last_touch_ms;
            }
        }
        state.registry.restore_mirroring(mirrored, self.ball_mirrored);
        state.registry.ball = self.ball;
        state.registry.update_officials();

        state.possession.reset();
        state.possession.restore_attribution(
            self.last_touch_team,
            self.touch_map,
            self.last_touch_player,
            self.last_touch_ms,
        );
        state.possession.set_ball_retainer(self.ball_retainer);
        state.rng.set_state(self.rng_state);

        state.camera.clear_history();
        state.history.clear();
        state.commit_snapshot(prediction_steps);
    }
}

// =============================================================================
// GET / PROCESS
// =============================================================================

/// Encode an export with its checksum.
pub fn encode_state(exported: &ExportedState) -> Result<Vec<u8>, StateError> {
    let payload = bincode::serialize(exported).map_err(StateError::Encode)?;
    let digest = checksum(HashDomain::ExportPayload, &payload);
    bincode::serialize(&Envelope { payload, checksum: digest }).map_err(StateError::Encode)
}

/// Decode and checksum-verify a blob. Does not look at any live match.
pub fn decode_state(bytes: &[u8]) -> Result<ExportedState, StateError> {
    let envelope: Envelope = bincode::deserialize(bytes).map_err(StateError::Decode)?;
    if checksum(HashDomain::ExportPayload, &envelope.payload) != envelope.checksum {
        return Err(StateError::ChecksumMismatch);
    }
    bincode::deserialize(&envelope.payload).map_err(StateError::Decode)
}

/// Serialize the current match state.
pub fn get_state(state: &MatchState) -> Result<Vec<u8>, StateError> {
    encode_state(&ExportedState::capture(state))
}

/// Load a serialized state into a live match.
///
/// On error the match is left exactly as it was. On success transient
/// possession data, the camera history and the mental images are reset and
/// one fresh image is committed.
pub fn process_state(state: &mut MatchState, bytes: &[u8], prediction_steps: usize) -> Result<(), StateError> {
    let exported = decode_state(bytes)?;
    exported.validate_against(state)?;
    let (iteration, phase) = (exported.iteration, exported.phase);
    exported.apply(state, prediction_steps);
    debug!("Loaded match state at iteration {} ({:?})", iteration, phase);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::core::fixed::to_fixed;
    use crate::game::input::{ControllerFrame, ControllerId, ControllerInputs};
    use crate::game::possession::TouchType;
    use crate::game::state::MatchSetup;
    use crate::game::tick::tick;

    fn fresh() -> MatchState {
        MatchState::new(&MatchSetup::standard([9; 16], 17), &MatchConfig::default()).unwrap()
    }

    fn played() -> MatchState {
        let config = MatchConfig::default();
        let mut state = fresh();
        state.set_phase(MatchPhase::SecondHalf).unwrap();
        state.start_play();
        let mut inputs = ControllerInputs::new();
        inputs.insert(ControllerId(0), ControllerFrame::with_movement(90, -40));
        for _ in 0..40 {
            tick(&mut state, &inputs, &config);
        }
        state.register_touch(PlayerHandle::new(TeamId::Second, 4), TouchType::Accidental).unwrap();
        state.set_last_touch_team(TeamId::First, TouchType::IntentionalKicked);
        state.goals.restore([2, 3], false, false, Some(TeamId::Second), Some(PlayerHandle::new(TeamId::Second, 4)));
        state.mirror(true, false, true);
        state
    }

    #[test]
    fn test_round_trip_restores_match() {
        let source = played();
        let bytes = get_state(&source).unwrap();

        let mut target = fresh();
        process_state(&mut target, &bytes, 10).unwrap();

        assert_eq!(ExportedState::capture(&target), ExportedState::capture(&source));
        assert_eq!(target.phase(), MatchPhase::SecondHalf);
        assert_eq!(target.score(TeamId::First), 2);
        assert_eq!(target.score(TeamId::Second), 3);
        assert_eq!(target.last_touch_team(), Some(TeamId::First));
        assert_eq!(target.last_touch_team_of(TouchType::Accidental), Some(TeamId::Second));
        assert_eq!(target.last_touch_team_of(TouchType::IntentionalKicked), Some(TeamId::First));
        assert_eq!(target.last_touch_team_of(TouchType::IntentionalNonKicked), None);
        // Team 0 was credited with the touch but no player of it touched
        assert_eq!(target.last_touch_player(), None);
        assert_eq!(target.last_goal_scorer(), Some(PlayerHandle::new(TeamId::Second, 4)));
        assert!(target.team(TeamId::First).mirrored);
        assert_eq!(target.history.len(), 1);
    }

    #[test]
    fn test_corrupted_payload_leaves_match_untouched() {
        let bytes = get_state(&played()).unwrap();
        let mut envelope: Envelope = bincode::deserialize(&bytes).unwrap();
        let last = envelope.payload.len() - 1;
        envelope.payload[last] ^= 0xFF;
        let tampered = bincode::serialize(&envelope).unwrap();

        let mut target = fresh();
        let before = target.compute_hash();
        let err = process_state(&mut target, &tampered, 10).unwrap_err();
        assert!(matches!(err, StateError::ChecksumMismatch));
        assert_eq!(target.compute_hash(), before);
        assert_eq!(target.phase(), MatchPhase::PreMatch);
    }

    #[test]
    fn test_load_replaces_goal_scorer() {
        let config = MatchConfig::default();
        let blob = get_state(&fresh()).unwrap();

        let mut target = fresh();
        let striker = PlayerHandle::new(TeamId::First, 3);
        target.register_touch(striker, TouchType::IntentionalKicked).unwrap();
        let previous = FixedVec3::new(to_fixed(54.9), 0, to_fixed(0.5));
        target.registry.ball.position = FixedVec3::new(to_fixed(55.3), 0, to_fixed(0.5));
        target.goals.detect(&target.registry, &target.possession, previous, config.goal_celebration_ms).unwrap();
        assert_eq!(target.last_goal_scorer(), Some(striker));

        process_state(&mut target, &blob, 10).unwrap();
        assert_eq!(target.last_goal_team(), None);
        assert_eq!(target.last_goal_scorer(), None);
        assert_eq!(target.score(TeamId::First), 0);
        assert_eq!(target.score(TeamId::Second), 0);
        assert_eq!(ExportedState::capture(&target), ExportedState::capture(&fresh()));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let mut target = fresh();
        let err = process_state(&mut target, &[1, 2, 3], 10).unwrap_err();
        assert!(matches!(err, StateError::Decode(_)));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut exported = ExportedState::capture(&played());
        exported.version = STATE_VERSION + 1;
        let bytes = encode_state(&exported).unwrap();

        let mut target = fresh();
        let err = process_state(&mut target, &bytes, 10).unwrap_err();
        assert!(matches!(
            err,
            StateError::UnsupportedVersion { found, expected } if found == STATE_VERSION + 1 && expected == STATE_VERSION
        ));
    }

    #[test]
    fn test_roster_mismatch_rejected() {
        let mut exported = ExportedState::capture(&played());
        exported.teams[1].players.pop();
        let bytes = encode_state(&exported).unwrap();

        let mut target = fresh();
        let before = ExportedState::capture(&target);
        let err = process_state(&mut target, &bytes, 10).unwrap_err();
        assert!(matches!(err, StateError::RosterMismatch { team: TeamId::Second, expected: 16, found: 15 }));
        assert_eq!(ExportedState::capture(&target), before);
    }

    #[test]
    fn test_invariant_violations_rejected() {
        let target = fresh();

        let mut exported = ExportedState::capture(&target);
        exported.ball_in_goal = true;
        exported.goal_scored = false;
        assert!(matches!(exported.validate_against(&target), Err(StateError::Invariant(_))));

        let mut exported = ExportedState::capture(&target);
        exported.last_touch_team = Some(TeamId::First);
        exported.last_touch_player = Some(PlayerHandle::new(TeamId::First, 40));
        assert!(matches!(exported.validate_against(&target), Err(StateError::Invariant(_))));

        let mut exported = ExportedState::capture(&target);
        exported.last_goal_team = Some(TeamId::First);
        exported.last_goal_scorer = Some(PlayerHandle::new(TeamId::Second, 1));
        assert!(matches!(
            exported.validate_against(&target),
            Err(StateError::Invariant("goal scorer not on the last goal team"))
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let target = fresh();

        let mut exported = ExportedState::capture(&target);
        exported.teams[0].players[3].position = FixedVec3::ground(to_fixed(500.0), 0);
        assert!(matches!(exported.validate_against(&target), Err(StateError::OutOfRange("player position"))));

        let mut exported = ExportedState::capture(&target);
        exported.ball.position.z = -to_fixed(1.0);
        assert!(matches!(exported.validate_against(&target), Err(StateError::OutOfRange("ball position"))));

        let mut exported = ExportedState::capture(&target);
        exported.match_time_carry = u64::MAX;
        assert!(matches!(exported.validate_against(&target), Err(StateError::OutOfRange(_))));
    }
}
