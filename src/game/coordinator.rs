//! Match Coordinator
//!
//! Owns one `MatchState` together with its config and host, drives the
//! per-tick loop and exposes the command surface. It is the only piece that
//! talks to the host; the simulation below it never does.
//!
//! ```text
//!   caller ──inputs──▶ Match::tick ──▶ tick::tick(state)
//!     ▲                    │
//!     │                    ├─▶ host.goal_netting_moved   (net hit)
//!     └──take_events───────┴─▶ host.clear_message        (caption expired)
//! ```

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::MatchConfig;
use crate::core::fixed::Fixed;
use crate::core::vec3::FixedVec3;
use crate::game::entity::{PlayerHandle, TeamId};
use crate::game::error::MatchError;
use crate::game::events::MatchEvent;
use crate::game::export::{get_state, process_state, StateError};
use crate::game::host::{EnvironmentParams, MatchHost, NullHost, SceneNode, SceneNodeId};
use crate::game::input::{ControllerId, ControllerInputs, ControllerRecording};
use crate::game::possession::TouchType;
use crate::game::state::{MatchPhase, MatchSetup, MatchState};
use crate::game::tick::{tick, TickResult};

/// A running match and its host.
pub struct Match<H: MatchHost = NullHost> {
    state: MatchState,
    config: MatchConfig,
    host: H,
    environment: EnvironmentParams,
    message_expires_ms: Option<u64>,
    stadium: Option<SceneNodeId>,
    /// Netting nodes for the -x and +x goals
    nets: [Option<SceneNodeId>; 2],
    recordings: BTreeMap<ControllerId, ControllerRecording>,
    /// Iteration the current recordings start at (0, or the last load)
    recordings_start: u64,
}

impl<H: MatchHost> Match<H> {
    /// Build a match, request its scene nodes and randomise the environment.
    pub fn new(setup: &MatchSetup, config: MatchConfig, mut host: H) -> Result<Self, MatchError> {
        let mut state = MatchState::new(setup, &config)?;

        let stadium = host.scene_node(SceneNode::Stadium);
        let nets = [-1, 1].map(|side| host.scene_node(SceneNode::GoalNetting { side }));

        let environment = EnvironmentParams::random(&mut state.rng);
        host.apply_environment(&environment);

        state.push_event(MatchEvent::created(state.iteration));
        info!(
            "Match {} created: {} v {} players, seed {}",
            hex::encode(setup.match_id),
            setup.first.len(),
            setup.second.len(),
            setup.seed
        );

        Ok(Self {
            state,
            config,
            host,
            environment,
            message_expires_ms: None,
            stadium,
            nets,
            recordings: BTreeMap::new(),
            recordings_start: 0,
        })
    }

    /// Advance one tick.
    ///
    /// Frames of bound controllers are recorded for replay. While paused
    /// nothing is simulated, but captions still expire.
    pub fn tick(&mut self, inputs: &ControllerInputs) -> TickResult {
        if !self.state.is_paused() {
            let iteration = self.state.iteration;
            for (controller, _) in self.state.bindings.iter() {
                let frame = inputs.get(&controller).copied().unwrap_or_default();
                self.recordings
                    .entry(controller)
                    .or_insert_with(|| ControllerRecording::new(controller))
                    .record(iteration, frame);
            }
        }

        let result = tick(&mut self.state, inputs, &self.config);

        if result.net_hit {
            let ball = self.state.registry.ball.position;
            let net = if ball.x < 0 { self.nets[0] } else { self.nets[1] };
            if let Some(net) = net {
                self.host.goal_netting_moved(net, ball);
            }
        }

        self.expire_message();
        result
    }

    /// Tear the match down, returning every event not yet taken.
    pub fn exit(mut self) -> Vec<MatchEvent> {
        if self.message_expires_ms.take().is_some() {
            self.host.clear_message();
        }
        let iteration = self.state.iteration;
        self.state.push_event(MatchEvent::exited(iteration));
        info!(
            "Match {} exited at iteration {} ({} - {})",
            hex::encode(self.state.match_id),
            iteration,
            self.state.score(TeamId::First),
            self.state.score(TeamId::Second)
        );
        self.state.take_events()
    }

    // -------------------------------------------------------------------------
    // Host services
    // -------------------------------------------------------------------------

    /// Show a caption for `duration_ms` of actual time.
    pub fn spam_message(&mut self, text: &str, duration_ms: u64) {
        self.host.show_message(text, duration_ms);
        self.message_expires_ms = Some(self.state.actual_time_ms + duration_ms);
    }

    fn expire_message(&mut self) {
        if let Some(expires) = self.message_expires_ms {
            if self.state.actual_time_ms >= expires {
                self.message_expires_ms = None;
                self.host.clear_message();
            }
        }
    }

    /// Draw new sun and advertising parameters and hand them to the host.
    pub fn randomize_environment(&mut self) -> EnvironmentParams {
        self.environment = EnvironmentParams::random(&mut self.state.rng);
        self.host.apply_environment(&self.environment);
        debug!("Environment {:?}", self.environment);
        self.environment
    }

    /// Current environment parameters.
    pub fn environment(&self) -> EnvironmentParams {
        self.environment
    }

    /// Cached animation root positions, straight from the host.
    pub fn anim_position_cache(&self, anim_id: u32) -> Option<Vec<FixedVec3>> {
        self.host.anim_position_cache(anim_id)
    }

    /// Stadium scene node, if the host provided one.
    pub fn stadium_node(&self) -> Option<SceneNodeId> {
        self.stadium
    }

    // -------------------------------------------------------------------------
    // State export
    // -------------------------------------------------------------------------

    /// Serialize the match.
    pub fn get_state(&self) -> Result<Vec<u8>, StateError> {
        get_state(&self.state)
    }

    /// Load a serialized match. On error nothing changes.
    ///
    /// Frames recorded before the load no longer lead to the loaded state,
    /// so the recordings restart at the loaded iteration.
    pub fn process_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        process_state(&mut self.state, bytes, self.config.prediction_steps)?;
        self.recordings.clear();
        self.recordings_start = self.state.iteration;
        debug!("Controller recordings restart at iteration {}", self.recordings_start);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// See `MatchState::set_phase`.
    pub fn set_phase(&mut self, phase: MatchPhase) -> Result<(), MatchError> {
        self.state.set_phase(phase)
    }

    /// Put the ball in play.
    pub fn start_play(&mut self) {
        self.state.start_play();
    }

    /// Stop play.
    pub fn stop_play(&mut self) {
        self.state.stop_play();
    }

    /// Begin a set piece.
    pub fn start_set_piece(&mut self) {
        self.state.start_set_piece();
    }

    /// End the set piece.
    pub fn stop_set_piece(&mut self) {
        self.state.stop_set_piece();
    }

    /// Suspend or resume simulation.
    pub fn set_paused(&mut self, paused: bool) {
        self.state.set_paused(paused);
    }

    /// Set or clear the goal flag.
    pub fn set_goal_scored(&mut self, scored: bool) {
        self.state.set_goal_scored(scored);
    }

    /// Attribute a touch to a team.
    pub fn set_last_touch_team(&mut self, team: TeamId, touch: TouchType) {
        self.state.set_last_touch_team(team, touch);
    }

    /// Attribute a touch to a team given by raw id.
    pub fn set_last_touch_team_index(&mut self, team: i32, touch: TouchType) -> Result<(), MatchError> {
        let team = TeamId::try_from(team)?;
        self.state.set_last_touch_team(team, touch);
        Ok(())
    }

    /// Register a touch by a player.
    pub fn register_touch(&mut self, player: PlayerHandle, touch: TouchType) -> Result<(), MatchError> {
        self.state.register_touch(player, touch)
    }

    /// Hand the ball to a player outside physics, or release it.
    pub fn set_ball_retainer(&mut self, retainer: Option<PlayerHandle>) -> Result<(), MatchError> {
        self.state.set_ball_retainer(retainer)
    }

    /// Restart play around `focus`.
    pub fn reset_situation(&mut self, focus: FixedVec3) {
        self.state.reset_situation(focus, self.config.prediction_steps);
    }

    /// Mirror teams and/or the ball.
    pub fn mirror(&mut self, team_0: bool, team_1: bool, ball: bool) {
        self.state.mirror(team_0, team_1, ball);
    }

    /// Turn camera auto-follow on or off.
    pub fn set_auto_follow(&mut self, on: bool) {
        self.state.set_auto_follow(on);
    }

    /// Flip camera auto-follow.
    pub fn toggle_auto_follow(&mut self) {
        self.state.camera.toggle_auto_follow();
    }

    /// Set the camera zoom.
    pub fn set_zoom(&mut self, zoom: Fixed) {
        self.state.camera.set_zoom(zoom);
    }

    /// Bind a controller to a player.
    pub fn bind_controller(&mut self, controller: ControllerId, player: PlayerHandle) -> Result<(), MatchError> {
        self.state.bind_controller(controller, player)
    }

    /// Release a controller.
    pub fn unbind_controller(&mut self, controller: ControllerId) -> Result<PlayerHandle, MatchError> {
        self.state.unbind_controller(controller)
    }

    /// Recompute the newest mental image's ball prediction.
    pub fn refresh_ball_prediction(&mut self) -> bool {
        self.state.refresh_ball_prediction(self.config.prediction_steps)
    }

    // -------------------------------------------------------------------------
    // Access
    // -------------------------------------------------------------------------

    /// Take pending events in delivery order.
    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        self.state.take_events()
    }

    /// Read access to everything the match owns; all queries live here.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// The config the match runs with.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Controller recordings since `recordings_start`, in controller order.
    pub fn recordings(&self) -> Vec<ControllerRecording> {
        self.recordings.values().cloned().collect()
    }

    /// Iteration the recordings start at: 0 for a match played from its
    /// setup, otherwise the iteration of the last loaded state.
    pub fn recordings_start(&self) -> u64 {
        self.recordings_start
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{to_fixed, FIXED_ONE};
    use crate::game::events::MatchEventData;
    use crate::game::input::{inputs_at, ControllerFrame};
    use crate::game::tick::replay_match;

    #[derive(Default)]
    struct RecordingHost {
        shown: Vec<(String, u64)>,
        cleared: usize,
        environments: Vec<EnvironmentParams>,
        requested: Vec<SceneNode>,
        net_moves: Vec<(SceneNodeId, FixedVec3)>,
    }

    impl MatchHost for RecordingHost {
        fn show_message(&mut self, text: &str, duration_ms: u64) {
            self.shown.push((text.to_string(), duration_ms));
        }

        fn clear_message(&mut self) {
            self.cleared += 1;
        }

        fn apply_environment(&mut self, params: &EnvironmentParams) {
            self.environments.push(*params);
        }

        fn anim_position_cache(&self, anim_id: u32) -> Option<Vec<FixedVec3>> {
            (anim_id == 7).then(|| vec![FixedVec3::ZERO, FixedVec3::X])
        }

        fn scene_node(&mut self, node: SceneNode) -> Option<SceneNodeId> {
            self.requested.push(node);
            Some(SceneNodeId(self.requested.len() as u64))
        }

        fn goal_netting_moved(&mut self, net: SceneNodeId, ball: FixedVec3) {
            self.net_moves.push((net, ball));
        }
    }

    fn setup() -> MatchSetup {
        MatchSetup::standard([5; 16], 2024)
    }

    fn new_match() -> Match<RecordingHost> {
        Match::new(&setup(), MatchConfig::default(), RecordingHost::default()).unwrap()
    }

    #[test]
    fn test_creation_requests_scene_and_environment() {
        let mut m = new_match();
        assert_eq!(
            m.host().requested,
            vec![SceneNode::Stadium, SceneNode::GoalNetting { side: -1 }, SceneNode::GoalNetting { side: 1 }]
        );
        assert_eq!(m.stadium_node(), Some(SceneNodeId(1)));
        assert_eq!(m.host().environments.len(), 1);

        let events = m.take_events();
        assert!(matches!(events[0].data, MatchEventData::MatchCreated));
    }

    #[test]
    fn test_environment_is_seeded() {
        let a = new_match();
        let b = new_match();
        assert_eq!(a.environment(), b.environment());

        let mut c = new_match();
        let first = c.environment();
        let second = c.randomize_environment();
        assert_ne!(first, second);
        assert_eq!(c.host().environments.last(), Some(&second));
    }

    #[test]
    fn test_message_expires_on_actual_time() {
        let mut m = new_match();
        m.spam_message("Kick-off", 30);
        assert_eq!(m.host().shown, vec![("Kick-off".to_string(), 30)]);

        m.tick(&ControllerInputs::new());
        m.tick(&ControllerInputs::new());
        assert_eq!(m.host().cleared, 0);

        // Paused ticks still advance actual time
        m.set_paused(true);
        m.tick(&ControllerInputs::new());
        assert_eq!(m.host().cleared, 1);
        assert_eq!(m.state().iteration, 2);
    }

    #[test]
    fn test_anim_cache_passthrough() {
        let m = new_match();
        assert_eq!(m.anim_position_cache(7).map(|v| v.len()), Some(2));
        assert!(m.anim_position_cache(8).is_none());
    }

    #[test]
    fn test_net_hit_reaches_host() {
        let mut m = new_match();
        m.set_phase(MatchPhase::FirstHalf).unwrap();
        m.start_play();
        m.state.registry.ball.position = FixedVec3::new(to_fixed(54.9), 0, to_fixed(1.0));
        m.state.registry.ball.velocity = FixedVec3::new(to_fixed(30.0), 0, 0);

        for _ in 0..30 {
            m.tick(&ControllerInputs::new());
        }
        assert!(m.state().is_goal_scored());
        let (net, ball) = m.host().net_moves[0];
        assert_eq!(net, SceneNodeId(3));
        assert!(ball.x > 0);
    }

    #[test]
    fn test_recordings_replay_identically() {
        let mut m = new_match();
        m.set_phase(MatchPhase::FirstHalf).unwrap();
        m.start_play();
        for i in 0..120i32 {
            let mut inputs = ControllerInputs::new();
            if i % 30 < 20 {
                inputs.insert(ControllerId(0), ControllerFrame::with_movement((i % 100) as i8, 40));
            }
            m.tick(&inputs);
        }

        let (replayed, _) = replay_match(&setup(), m.config(), &m.recordings(), 120).unwrap();
        assert_eq!(replayed.compute_hash(), m.state().compute_hash());
    }

    #[test]
    fn test_load_restarts_recordings() {
        let mut m = new_match();
        m.set_phase(MatchPhase::FirstHalf).unwrap();
        m.start_play();
        let run = |i: u64| {
            let mut inputs = ControllerInputs::new();
            inputs.insert(ControllerId(0), ControllerFrame::with_movement((i % 90) as i8, -30));
            inputs
        };
        for i in 0..50 {
            m.tick(&run(i));
        }
        let saved = m.get_state().unwrap();
        assert_eq!(m.recordings_start(), 0);
        assert!(!m.recordings().is_empty());

        m.process_state(&saved).unwrap();
        assert!(m.recordings().is_empty());
        assert_eq!(m.recordings_start(), 50);
        for i in 50..110 {
            m.tick(&run(i));
        }

        // Loading the same blob and feeding the new recordings reproduces the match
        let mut check = new_match();
        check.process_state(&saved).unwrap();
        let recordings = m.recordings();
        for iteration in 50..110 {
            check.tick(&inputs_at(&recordings, iteration));
        }
        assert_eq!(check.state().compute_hash(), m.state().compute_hash());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MatchConfig::default();
        config.history_capacity = 0;
        let err = Match::new(&setup(), config, NullHost).err();
        assert!(matches!(err, Some(MatchError::InvalidConfig(_))));

        let mut config = MatchConfig::default();
        config.match_duration_factor = 0.0;
        assert!(matches!(Match::new(&setup(), config, NullHost), Err(MatchError::InvalidConfig(_))));
    }

    #[test]
    fn test_state_round_trip_through_coordinator() {
        let mut a = new_match();
        a.set_phase(MatchPhase::SecondHalf).unwrap();
        a.set_last_touch_team_index(1, TouchType::IntentionalNonKicked).unwrap();
        let bytes = a.get_state().unwrap();

        let mut b = new_match();
        b.process_state(&bytes).unwrap();
        assert_eq!(b.state().phase(), MatchPhase::SecondHalf);
        assert_eq!(b.state().last_touch_team_of(TouchType::IntentionalNonKicked), Some(TeamId::Second));
    }

    #[test]
    fn test_invalid_team_index() {
        let mut m = new_match();
        assert_eq!(
            m.set_last_touch_team_index(2, TouchType::Accidental),
            Err(MatchError::InvalidTeamId(2))
        );
    }

    #[test]
    fn test_zoom_and_follow_commands() {
        let mut m = new_match();
        m.set_zoom(2 * FIXED_ONE);
        assert_eq!(m.state().camera.zoom(), 2 * FIXED_ONE);
        m.toggle_auto_follow();
        assert!(!m.state().camera.is_auto_follow());
        m.set_auto_follow(true);
        assert!(m.state().camera.is_auto_follow());
    }

    #[test]
    fn test_exit_returns_remaining_events() {
        let mut m = new_match();
        m.spam_message("Half time", 10_000);
        m.set_phase(MatchPhase::FirstHalf).unwrap();
        let events = m.exit();
        assert!(matches!(events.first().map(|e| &e.data), Some(MatchEventData::MatchCreated)));
        assert!(events.iter().any(|e| matches!(e.data, MatchEventData::MatchExited)));
        assert_eq!(events.len(), 3);
    }
}
