//! Authoritative Simulation Tick
//!
//! One call advances the match by 10 ms in a fixed order:
//!
//! ```text
//! (a) controller frames -> player velocity / facing / contact intents
//! (b) ball and player integration
//! (c) collisions: humanoid pairs, then humanoid-ball
//! (d) possession update
//! (e) goal detection, celebration timer
//! (f) mental image commit
//! (g) camera follow (auto-follow only)
//! (h) iteration, match clock, actual clock
//! ```
//!
//! While paused only the actual clock advances. Same state and same inputs
//! always give the same result: ordered maps, fixed-point math, no clocks.

use tracing::{debug, info, trace};

use crate::config::MatchConfig;
use crate::core::fixed::{scale_ms, PLAYER_FRICTION, RUN_SPEED, TICK_MS};
use crate::core::vec3::FixedVec3;
use crate::game::collision::{
    resolve_ball_contact, resolve_player_collisions, BallContact, ContactIntent, ContactIntents,
};
use crate::game::entity::{PlayerHandle, TeamId};
use crate::game::error::MatchError;
use crate::game::events::MatchEvent;
use crate::game::goal::GoalInfo;
use crate::game::input::{inputs_at, ControllerFrame, ControllerInputs, ControllerRecording};
use crate::game::physics::{ball_on_ground, integrate_ball, integrate_player, pin_ball_to};
use crate::game::state::{MatchPhase, MatchSetup, MatchState};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// False when the tick was skipped because the match is paused
    pub simulated: bool,
    /// Touch registered this tick
    pub contact: Option<BallContact>,
    /// Goal detected this tick
    pub goal: Option<GoalInfo>,
    /// Ball hit the netting this tick
    pub net_hit: bool,
    /// Goal celebration ended this tick
    pub celebration_finished: bool,
}

/// Run one simulation tick.
///
/// `inputs` holds this tick's frame per controller; bound controllers with
/// no entry are treated as idle.
pub fn tick(state: &mut MatchState, inputs: &ControllerInputs, config: &MatchConfig) -> TickResult {
    let mut result = TickResult::default();

    if state.paused {
        state.actual_time_ms += TICK_MS;
        return result;
    }
    result.simulated = true;

    // (a) Controllers
    let intents = apply_controls(state, inputs, config.use_magnet);

    // (b) Physics
    let previous_ball = state.registry.ball.position;
    integrate(state, &mut result);

    // (c) Collisions
    resolve_player_collisions(&mut state.registry);
    if state.possession.ball_retainer().is_none() {
        process_ball_contact(state, &intents, config, &mut result);
    }

    // (d) Possession
    state
        .possession
        .update(&state.registry, &config.possession_params(), state.actual_time_ms);

    // (e) Goals
    process_goals(state, previous_ball, config, &mut result);

    // (f) Mental image
    state.commit_snapshot(config.prediction_steps);

    // (g) Camera
    if state.camera.is_auto_follow() {
        let target = state
            .history
            .get(state.camera.lag_ms())
            .map_or(state.registry.ball.position, |image| image.ball.position);
        state.camera.update(target);
    }

    // (h) Clocks
    state.iteration += 1;
    state.match_time_ms += scale_ms(TICK_MS, config.duration_factor(), &mut state.match_time_carry);
    state.actual_time_ms += TICK_MS;

    trace!("Tick {} ball {}", state.iteration, state.registry.ball.position);
    result
}

/// Turn controller frames into player motion and contact intents.
fn apply_controls(state: &mut MatchState, inputs: &ControllerInputs, use_magnet: bool) -> ContactIntents {
    let mut intents = ContactIntents::new();
    let mut driven: Vec<(PlayerHandle, ControllerFrame)> = state
        .bindings
        .iter()
        .map(|(controller, player)| (player, inputs.get(&controller).copied().unwrap_or_default()))
        .collect();
    driven.sort_by_key(|(player, _)| *player);

    for player in state.registry.all_players_mut() {
        let frame = driven
            .binary_search_by_key(&player.handle, |(h, _)| *h)
            .ok()
            .map(|i| driven[i].1);

        match frame {
            Some(frame) if frame.has_movement() => {
                player.velocity = frame.desired_velocity();
            }
            _ => {
                player.velocity = player.velocity.scale(PLAYER_FRICTION);
            }
        }

        if let Some(frame) = frame {
            if frame.kick_pressed() {
                intents.insert(player.handle, ContactIntent::Kick);
            } else if frame.has_movement() {
                intents.insert(player.handle, ContactIntent::Dribble);
            }
        }
    }

    if use_magnet {
        apply_magnet(state, &driven);
    }
    intents
}

/// An idle controlled designated player drifts toward a loose ball.
fn apply_magnet(state: &mut MatchState, driven: &[(PlayerHandle, ControllerFrame)]) {
    let Some(designated) = state.possession.designated_player() else {
        return;
    };
    if !state.phase.is_playing_period()
        || state.possession.ball_retainer().is_some()
        || !ball_on_ground(&state.registry.ball)
    {
        return;
    }
    let idle = driven.iter().any(|(h, frame)| *h == designated && frame.is_idle());
    if !idle {
        return;
    }
    let ball = state.registry.ball.position;
    if let Some(player) = state.registry.player_mut(designated) {
        let toward = (ball - player.position).flat().normalize();
        if toward != FixedVec3::ZERO {
            player.velocity = toward.scale(RUN_SPEED >> 1);
        }
    }
}

/// Step (b): ball, players, officials.
fn integrate(state: &mut MatchState, result: &mut TickResult) {
    for player in state.registry.all_players_mut().filter(|p| p.active) {
        integrate_player(player);
    }

    match state.possession.ball_retainer() {
        Some(retainer) => {
            if let Some(player) = state.registry.player(retainer).cloned() {
                pin_ball_to(&mut state.registry.ball, &player);
            }
        }
        None => {
            let step = integrate_ball(&mut state.registry.ball, state.goals.is_ball_in_goal());
            result.net_hit = step.hit_net;
        }
    }

    state.registry.update_officials();
}

/// Step (c), ball part: one registered touch at most.
fn process_ball_contact(
    state: &mut MatchState,
    intents: &ContactIntents,
    config: &MatchConfig,
    result: &mut TickResult,
) {
    let contact = resolve_ball_contact(
        &mut state.registry,
        intents,
        state.actual_time_ms,
        &mut state.possession.last_body_ball_ms,
        config.body_ball_throttle_ms,
    );
    if let Some(contact) = contact {
        state
            .possession
            .register_touch(&mut state.registry, contact.player, contact.touch, state.actual_time_ms);
        state.push_event(MatchEvent::ball_touched(state.iteration, contact.player, contact.touch));
        debug!("Touch {:?} by {:?}", contact.touch, contact.player);
        result.contact = Some(contact);
    }
}

/// Step (e).
fn process_goals(state: &mut MatchState, previous_ball: FixedVec3, config: &MatchConfig, result: &mut TickResult) {
    let detected = state
        .goals
        .detect(&state.registry, &state.possession, previous_ball, config.goal_celebration_ms);

    if let Some(info) = detected {
        state.in_play = false;
        state.push_event(MatchEvent::goal_scored(state.iteration, info));
        state.push_event(MatchEvent::short_replay(state.iteration, config.short_replay_ms));
        info!(
            "Goal for {:?}{} ({} - {})",
            info.scoring_team,
            if info.own_goal { " (own goal)" } else { "" },
            state.goals.score(TeamId::First),
            state.goals.score(TeamId::Second),
        );
        result.goal = Some(info);
    } else if state.goals.advance_celebration(TICK_MS) {
        state.push_event(MatchEvent::celebration_finished(state.iteration));
        result.celebration_finished = true;
    }
}

/// Replay a match from controller recordings.
///
/// Builds the match from `setup`, kicks off the first half and runs
/// `ticks` iterations. Returns the final state and every event raised.
pub fn replay_match(
    setup: &MatchSetup,
    config: &MatchConfig,
    recordings: &[ControllerRecording],
    ticks: u64,
) -> Result<(MatchState, Vec<MatchEvent>), MatchError> {
    let mut state = MatchState::new(setup, config)?;
    let mut all_events = Vec::new();

    state.set_phase(MatchPhase::FirstHalf)?;
    state.start_play();

    for iteration in 0..ticks {
        let inputs = inputs_at(recordings, iteration);
        tick(&mut state, &inputs, config);
        all_events.extend(state.take_events());
    }

    Ok((state, all_events))
}

// =============================================================================
// TESTS
// =============================================================================
