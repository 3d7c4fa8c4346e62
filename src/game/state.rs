//! Match State
//!
//! Everything the simulation owns for one match, plus the query surface and
//! the commands that may change it from outside a tick. Commands apply
//! immediately, paused or not.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MatchConfig;
use crate::core::fixed::{to_fixed, Fixed, BALL_RADIUS};
use crate::core::hash::{hash_match_state, StateHash};
use crate::core::rng::MatchRng;
use crate::core::vec3::FixedVec3;
use crate::game::camera::{CameraFollower, CameraPose};
use crate::game::entity::{
    BallState, Official, PlayerHandle, PlayerId, PlayerSetup, PlayerState, Registry, TeamId, TeamState,
};
use crate::game::error::MatchError;
use crate::game::events::MatchEvent;
use crate::game::goal::GoalDetector;
use crate::game::history::{MentalHistory, MentalImage};
use crate::game::input::{ControllerBindings, ControllerId};
use crate::game::physics::predict_ball_path;
use crate::game::possession::{PossessionTracker, TouchType};

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Stage of the match. Only moves forward, and only by command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MatchPhase {
    /// Before kick-off
    #[default]
    PreMatch = 0,
    /// First half
    FirstHalf = 1,
    /// Second half
    SecondHalf = 2,
    /// First period of extra time
    ExtraTime1 = 3,
    /// Second period of extra time
    ExtraTime2 = 4,
    /// Penalty shoot-out
    Penalties = 5,
    /// Final whistle blown
    PostMatch = 6,
}

impl MatchPhase {
    /// Whether a command may move the match from `self` to `next`.
    /// Skipping ahead is allowed; going back is not.
    #[inline]
    pub fn can_advance_to(self, next: MatchPhase) -> bool {
        next >= self
    }

    /// Phases in which the ball is played.
    pub fn is_playing_period(self) -> bool {
        !matches!(self, MatchPhase::PreMatch | MatchPhase::PostMatch)
    }
}

// =============================================================================
// SETUP
// =============================================================================

/// Everything needed to construct a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchSetup {
    /// Match identifier
    pub match_id: [u8; 16],
    /// Roster of team 0
    pub first: Vec<PlayerSetup>,
    /// Roster of team 1
    pub second: Vec<PlayerSetup>,
    /// Initial controller bindings
    pub controllers: Vec<(ControllerId, PlayerHandle)>,
    /// Seed for every random draw of the match
    pub seed: u64,
}

/// 4-4-2 kick-off shape for the team defending -x, in metres.
const FORMATION: [(f64, f64); 11] = [
    (-52.0, 0.0),
    (-38.0, -22.0),
    (-40.0, -8.0),
    (-40.0, 8.0),
    (-38.0, 22.0),
    (-22.0, -20.0),
    (-24.0, -6.0),
    (-24.0, 6.0),
    (-22.0, 20.0),
    (-6.0, -8.0),
    (-4.0, 6.0),
];

/// Substitutes per team, starting on the bench.
const SUBSTITUTES: u32 = 5;

impl MatchSetup {
    /// Eleven against eleven plus a bench, controller 0 on team 0's striker.
    pub fn standard(match_id: [u8; 16], seed: u64) -> Self {
        let roster = |side: i32, id_base: u32| -> Vec<PlayerSetup> {
            let mut players: Vec<PlayerSetup> = FORMATION
                .iter()
                .enumerate()
                .map(|(i, (x, y))| PlayerSetup {
                    id: PlayerId(id_base + i as u32),
                    position: FixedVec3::ground(to_fixed(*x) * side, to_fixed(*y) * side),
                    active: true,
                })
                .collect();
            for s in 0..SUBSTITUTES {
                players.push(PlayerSetup {
                    id: PlayerId(id_base + 11 + s),
                    position: FixedVec3::ground(to_fixed(-3.0 - s as f64) * side, to_fixed(-38.0)),
                    active: false,
                });
            }
            players
        };
        Self {
            match_id,
            first: roster(1, 100),
            second: roster(-1, 200),
            controllers: vec![(ControllerId(0), PlayerHandle::new(TeamId::First, 10))],
            seed,
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Match identifier
    pub match_id: [u8; 16],

    /// Seed the match was built with
    pub seed: u64,

    /// Simulated ticks so far (paused ticks excluded)
    pub iteration: u64,

    /// Match clock, scaled by the duration factor
    pub match_time_ms: u64,

    /// Wall-clock pacing time, advances even while paused
    pub actual_time_ms: u64,

    /// Sub-millisecond remainder of the match clock (Q16.16 ms)
    pub match_time_carry: u64,

    pub(crate) phase: MatchPhase,
    pub(crate) paused: bool,
    pub(crate) in_play: bool,
    pub(crate) in_set_piece: bool,

    /// Teams, ball and officials
    pub registry: Registry,

    /// Controller to player bindings
    pub bindings: ControllerBindings,

    /// Touch attribution and possession
    pub possession: PossessionTracker,

    /// Goal flags and scoreboard
    pub goals: GoalDetector,

    /// Mental images, newest first
    pub history: MentalHistory,

    /// Broadcast camera
    pub camera: CameraFollower,

    /// Deterministic RNG (environment draws)
    pub rng: MatchRng,

    /// Events not yet taken by the caller
    #[serde(skip)]
    pub pending_events: Vec<MatchEvent>,
}

impl MatchState {
    /// Build a match from its setup. The config is validated first.
    pub fn new(setup: &MatchSetup, config: &MatchConfig) -> Result<Self, MatchError> {
        config.validate().map_err(|e| MatchError::InvalidConfig(e.to_string()))?;
        let registry = Registry::new(&setup.first, &setup.second)?;

        let mut bindings = ControllerBindings::new();
        for (controller, player) in &setup.controllers {
            if registry.player(*player).is_none() {
                return Err(MatchError::UnknownPlayer(*player));
            }
            bindings.bind(*controller, *player);
        }

        let mut camera = CameraFollower::new(config.camera.settings());
        camera.set_zoom(to_fixed(config.camera.zoom));

        let mut state = Self {
            match_id: setup.match_id,
            seed: setup.seed,
            iteration: 0,
            match_time_ms: 0,
            actual_time_ms: 0,
            match_time_carry: 0,
            phase: MatchPhase::PreMatch,
            paused: false,
            in_play: false,
            in_set_piece: false,
            registry,
            bindings,
            possession: PossessionTracker::new(config.possession_history_len),
            goals: GoalDetector::new(),
            history: MentalHistory::new(config.history_capacity),
            camera,
            rng: MatchRng::new(config.environment_seed.unwrap_or(setup.seed)),
            pending_events: Vec::new(),
        };
        state.commit_snapshot(config.prediction_steps);
        Ok(state)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Simulation suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ball in play.
    pub fn is_in_play(&self) -> bool {
        self.in_play
    }

    /// Set piece being taken.
    pub fn is_in_set_piece(&self) -> bool {
        self.in_set_piece
    }

    /// Goals for a team.
    pub fn score(&self, team: TeamId) -> u32 {
        self.goals.score(team)
    }

    /// Goal pending.
    pub fn is_goal_scored(&self) -> bool {
        self.goals.is_goal_scored()
    }

    /// Ball inside a goal.
    pub fn is_ball_in_goal(&self) -> bool {
        self.goals.is_ball_in_goal()
    }

    /// Team of the last goal's final touch.
    pub fn last_goal_team(&self) -> Option<TeamId> {
        self.goals.last_goal_team()
    }

    /// Player of the last goal's final touch.
    pub fn last_goal_scorer(&self) -> Option<PlayerHandle> {
        self.goals.last_goal_scorer()
    }

    /// Team of the most recent touch of any type.
    pub fn last_touch_team(&self) -> Option<TeamId> {
        self.possession.last_touch_team()
    }

    /// Team of the most recent touch of one type.
    pub fn last_touch_team_of(&self, touch: TouchType) -> Option<TeamId> {
        self.possession.last_touch_team_of(touch)
    }

    /// Last toucher of the last-touch team.
    ///
    /// Resolved through the team, so after `set_last_touch_team` this is
    /// that team's own last toucher (or `None`), never an opponent.
    pub fn last_touch_player(&self) -> Option<PlayerHandle> {
        self.registry.team(self.possession.attribution_team()).last_touch_player
    }

    /// Decaying last-touch weight of a team at the current time.
    pub fn last_touch_bias(&self, team: TeamId, decay_ms: u64) -> Fixed {
        self.registry.team(team).last_touch_bias(decay_ms, self.actual_time_ms)
    }

    /// Team judged to be in possession.
    pub fn best_possession_team(&self) -> TeamId {
        self.possession.best_team()
    }

    /// Player treated as controlling the ball.
    pub fn designated_possession_player(&self) -> Option<PlayerHandle> {
        self.possession.designated_player()
    }

    /// Player holding the ball outside physics.
    pub fn ball_retainer(&self) -> Option<PlayerHandle> {
        self.possession.ball_retainer()
    }

    /// Smoothed possession side over the trailing window.
    pub fn average_possession_side(&self, window_ms: u64) -> Fixed {
        self.possession.average_possession_side(window_ms)
    }

    /// Time span of retained mental images.
    pub fn replay_size_ms(&self) -> u64 {
        self.history.replay_size_ms()
    }

    /// Mental image `history_ms` old, clamped to the oldest retained.
    pub fn mental_image(&self, history_ms: u64) -> Option<&MentalImage> {
        self.history.get(history_ms)
    }

    /// The ball.
    pub fn ball(&self) -> &BallState {
        &self.registry.ball
    }

    /// A team.
    pub fn team(&self, team: TeamId) -> &TeamState {
        self.registry.team(team)
    }

    /// A team by raw id (0 or 1).
    pub fn team_by_index(&self, id: i32) -> Result<&TeamState, MatchError> {
        self.registry.team_by_index(id)
    }

    /// A player.
    pub fn player(&self, handle: PlayerHandle) -> Option<&PlayerState> {
        self.registry.player(handle)
    }

    /// Match officials.
    pub fn officials(&self) -> &[Official] {
        self.registry.officials()
    }

    /// Current camera pose.
    pub fn camera_pose(&self) -> CameraPose {
        self.camera.pose()
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Move to another phase.
    ///
    /// Requesting the current phase does nothing. A real change stops play,
    /// ends any set piece and clears the goal flag.
    pub fn set_phase(&mut self, phase: MatchPhase) -> Result<(), MatchError> {
        let from = self.phase;
        if phase == from {
            return Ok(());
        }
        if !from.can_advance_to(phase) {
            warn!("Rejected phase change {:?} -> {:?}", from, phase);
            return Err(MatchError::InvalidPhaseTransition { from, to: phase });
        }

        self.phase = phase;
        self.in_play = false;
        self.in_set_piece = false;
        self.goals.set_goal_scored(false);
        self.push_event(MatchEvent::phase_changed(self.iteration, from, phase));
        info!("Match phase {:?} -> {:?}", from, phase);
        Ok(())
    }

    /// Put the ball in play.
    pub fn start_play(&mut self) {
        self.in_play = true;
    }

    /// Stop play (whistle).
    pub fn stop_play(&mut self) {
        self.in_play = false;
    }

    /// Begin a set piece.
    pub fn start_set_piece(&mut self) {
        self.in_set_piece = true;
    }

    /// End the set piece.
    pub fn stop_set_piece(&mut self) {
        self.in_set_piece = false;
    }

    /// Suspend or resume simulation.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            debug!("Match {}", if paused { "paused" } else { "resumed" });
        }
        self.paused = paused;
    }

    /// Set the goal flag; clearing it also takes the ball out of the goal.
    pub fn set_goal_scored(&mut self, scored: bool) {
        self.goals.set_goal_scored(scored);
    }

    /// Attribute a touch to a team without naming a player.
    pub fn set_last_touch_team(&mut self, team: TeamId, touch: TouchType) {
        self.possession.set_last_touch_team(team, touch);
    }

    /// Register a touch by a specific player now.
    pub fn register_touch(&mut self, player: PlayerHandle, touch: TouchType) -> Result<(), MatchError> {
        if self.registry.player(player).is_none() {
            return Err(MatchError::UnknownPlayer(player));
        }
        self.possession.register_touch(&mut self.registry, player, touch, self.actual_time_ms);
        self.push_event(MatchEvent::ball_touched(self.iteration, player, touch));
        Ok(())
    }

    /// Give the ball to a player outside normal physics, or release it.
    pub fn set_ball_retainer(&mut self, retainer: Option<PlayerHandle>) -> Result<(), MatchError> {
        if let Some(handle) = retainer {
            if self.registry.player(handle).is_none() {
                return Err(MatchError::UnknownPlayer(handle));
            }
        }
        self.possession.set_ball_retainer(retainer);
        Ok(())
    }

    /// Restart from `focus`: ball placed there and stopped, transient
    /// possession state, camera and mental images cleared, one fresh image
    /// committed.
    pub fn reset_situation(&mut self, focus: FixedVec3, prediction_steps: usize) {
        self.registry.ball = BallState {
            position: FixedVec3::new(focus.x, focus.y, BALL_RADIUS),
            velocity: FixedVec3::ZERO,
        };
        for player in self.registry.all_players_mut() {
            player.velocity = FixedVec3::ZERO;
        }
        self.registry.update_officials();
        self.possession.reset();
        self.camera.clear_history();
        self.history.clear();
        self.commit_snapshot(prediction_steps);
        debug!("Situation reset at {}", focus);
    }

    /// Mirror any of team 0, team 1 and the ball across the centre spot.
    pub fn mirror(&mut self, team_0: bool, team_1: bool, ball: bool) {
        self.registry.mirror(team_0, team_1, ball);
        if ball {
            self.camera.clear_history();
        }
        debug!("Mirrored team0={} team1={} ball={}", team_0, team_1, ball);
    }

    /// Turn camera auto-follow on or off.
    pub fn set_auto_follow(&mut self, on: bool) {
        self.camera.set_auto_follow(on);
    }

    /// Bind a controller to a player, replacing earlier pairings of either.
    pub fn bind_controller(&mut self, controller: ControllerId, player: PlayerHandle) -> Result<(), MatchError> {
        if self.registry.player(player).is_none() {
            return Err(MatchError::UnknownPlayer(player));
        }
        self.bindings.bind(controller, player);
        debug!("Controller {:?} bound to {:?}", controller, player);
        Ok(())
    }

    /// Release a controller.
    pub fn unbind_controller(&mut self, controller: ControllerId) -> Result<PlayerHandle, MatchError> {
        self.bindings
            .unbind(controller)
            .ok_or(MatchError::UnknownController(controller))
    }

    // -------------------------------------------------------------------------
    // Snapshots, hashing, events
    // -------------------------------------------------------------------------

    /// Capture the current state as the newest mental image.
    pub fn commit_snapshot(&mut self, prediction_steps: usize) {
        let prediction = predict_ball_path(&self.registry.ball, self.goals.is_ball_in_goal(), prediction_steps);
        let side = self.possession.side_history().latest().unwrap_or(0);
        let image = MentalImage::capture(&self.registry, self.iteration, self.match_time_ms, prediction, side);
        self.history.commit(image);
    }

    /// Recompute only the newest image's ball prediction.
    pub fn refresh_ball_prediction(&mut self, prediction_steps: usize) -> bool {
        let prediction = predict_ball_path(&self.registry.ball, self.goals.is_ball_in_goal(), prediction_steps);
        self.history.update_latest_ball_prediction(prediction)
    }

    /// Hash of the simulation-relevant state.
    pub fn compute_hash(&self) -> StateHash {
        hash_match_state(self.iteration, |hasher| {
            hasher.update_u64(self.match_time_ms);
            hasher.update_u8(self.phase as u8);
            hasher.update_bool(self.in_play);
            hasher.update_bool(self.in_set_piece);

            for team in self.registry.teams() {
                hasher.update_bool(team.mirrored);
                for player in &team.players {
                    player.hash_into(hasher);
                }
            }
            hasher.update_vec3(self.registry.ball.position);
            hasher.update_vec3(self.registry.ball.velocity);

            self.possession.hash_into(hasher);
            self.goals.hash_into(hasher);
        })
    }

    /// Take pending events (consumes them), ordered by iteration then priority.
    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        events.sort();
        events
    }

    /// Queue an event.
    pub fn push_event(&mut self, event: MatchEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::MatchEventData;

    fn state() -> MatchState {
        MatchState::new(&MatchSetup::standard([7; 16], 99), &MatchConfig::default()).unwrap()
    }

    #[test]
    fn test_standard_setup() {
        let state = state();
        assert_eq!(state.team(TeamId::First).players.len(), 16);
        assert_eq!(state.registry.active_team_players(TeamId::Second).count(), 11);
        assert_eq!(state.bindings.player_for(ControllerId(0)), Some(PlayerHandle::new(TeamId::First, 10)));
        // Both teams start in their own half
        assert!(state.registry.active_team_players(TeamId::First).all(|p| p.position.x < 0));
        assert!(state.registry.active_team_players(TeamId::Second).all(|p| p.position.x > 0));
        // One image committed at construction
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_setup_rejects_unknown_binding() {
        let mut setup = MatchSetup::standard([0; 16], 1);
        setup.controllers.push((ControllerId(1), PlayerHandle::new(TeamId::Second, 40)));
        let err = MatchState::new(&setup, &MatchConfig::default()).unwrap_err();
        assert_eq!(err, MatchError::UnknownPlayer(PlayerHandle::new(TeamId::Second, 40)));
    }

    #[test]
    fn test_phase_moves_forward_only() {
        let mut state = state();
        state.set_phase(MatchPhase::FirstHalf).unwrap();
        state.set_phase(MatchPhase::FirstHalf).unwrap();
        state.set_phase(MatchPhase::PostMatch).unwrap();

        let err = state.set_phase(MatchPhase::SecondHalf).unwrap_err();
        assert_eq!(
            err,
            MatchError::InvalidPhaseTransition { from: MatchPhase::PostMatch, to: MatchPhase::SecondHalf }
        );
        assert_eq!(state.phase(), MatchPhase::PostMatch);

        let changes: Vec<_> = state
            .take_events()
            .into_iter()
            .filter(|e| matches!(e.data, MatchEventData::PhaseChanged { .. }))
            .collect();
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_phase_change_clears_goal_and_stops_play() {
        let mut state = state();
        state.set_phase(MatchPhase::FirstHalf).unwrap();
        state.start_play();
        state.start_set_piece();
        state.goals.restore([1, 0], true, true, Some(TeamId::First), None);

        state.set_phase(MatchPhase::SecondHalf).unwrap();
        assert!(!state.is_in_play());
        assert!(!state.is_in_set_piece());
        assert!(!state.is_goal_scored());
        assert!(!state.is_ball_in_goal());
        assert_eq!(state.score(TeamId::First), 1);
    }

    #[test]
    fn test_register_touch_validates_handle() {
        let mut state = state();
        let bad = PlayerHandle::new(TeamId::First, 99);
        assert_eq!(state.register_touch(bad, TouchType::Accidental), Err(MatchError::UnknownPlayer(bad)));

        let good = PlayerHandle::new(TeamId::Second, 9);
        state.register_touch(good, TouchType::IntentionalKicked).unwrap();
        assert_eq!(state.last_touch_team(), Some(TeamId::Second));
        assert_eq!(state.last_touch_player(), Some(good));
        assert_eq!(state.last_touch_bias(TeamId::Second, 1000), crate::core::fixed::FIXED_ONE);
    }

    #[test]
    fn test_last_touch_player_follows_last_touch_team() {
        let mut state = state();
        assert_eq!(state.last_touch_player(), None);

        let striker = PlayerHandle::new(TeamId::Second, 4);
        state.register_touch(striker, TouchType::IntentionalKicked).unwrap();
        state.set_last_touch_team(TeamId::First, TouchType::Accidental);
        assert_eq!(state.last_touch_team(), Some(TeamId::First));
        // First never touched the ball
        assert_eq!(state.last_touch_player(), None);

        let back = PlayerHandle::new(TeamId::First, 2);
        state.register_touch(back, TouchType::IntentionalNonKicked).unwrap();
        state.set_last_touch_team(TeamId::Second, TouchType::Accidental);
        assert_eq!(state.last_touch_player(), Some(striker));
        assert_eq!(state.last_touch_player().map(|p| p.team), state.last_touch_team());
    }

    #[test]
    fn test_reset_situation() {
        let mut state = state();
        state.set_ball_retainer(Some(PlayerHandle::new(TeamId::First, 0))).unwrap();
        for _ in 0..5 {
            state.commit_snapshot(10);
        }
        let focus = FixedVec3::ground(to_fixed(-30.0), to_fixed(10.0));
        state.reset_situation(focus, 10);

        assert_eq!(state.ball().position.x, focus.x);
        assert_eq!(state.ball().velocity, FixedVec3::ZERO);
        assert_eq!(state.ball_retainer(), None);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.mental_image(0).unwrap().ball.position.x, focus.x);
    }

    #[test]
    fn test_refresh_prediction_only_touches_latest() {
        let mut state = state();
        state.commit_snapshot(0);
        assert!(state.mental_image(0).unwrap().ball_prediction.is_empty());
        state.registry.ball.velocity = FixedVec3::ground(to_fixed(5.0), 0);
        assert!(state.refresh_ball_prediction(20));
        assert_eq!(state.mental_image(0).unwrap().ball_prediction.len(), 20);
        assert_eq!(state.mental_image(10).unwrap().ball_prediction.len(), 100);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = state();
        let b = state();
        assert_eq!(a.compute_hash(), b.compute_hash());

        let mut c = state();
        c.set_last_touch_team(TeamId::Second, TouchType::Accidental);
        assert_ne!(a.compute_hash(), c.compute_hash());
    }

    #[test]
    fn test_unbind_unknown_controller() {
        let mut state = state();
        assert_eq!(state.unbind_controller(ControllerId(5)), Err(MatchError::UnknownController(ControllerId(5))));
        assert!(state.unbind_controller(ControllerId(0)).is_ok());
    }
}
