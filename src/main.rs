//! Pitch Match demo runner
//!
//! Plays two scripted halves headless, saves and reloads the state at half
//! time, then replays the recorded controller frames and checks that the
//! final state hash matches.

use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use pitch_match::{
    game::{
        events::MatchEventData,
        input::{ControllerFrame, ControllerId, ControllerInputs},
        replay_match, Match, MatchPhase, MatchSetup, TeamId,
    },
    FixedVec3, MatchConfig, VERSION,
};

/// Ticks per half (45 simulated seconds at the default duration factor).
const HALF_TICKS: u64 = 4500;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Pitch Match v{}", VERSION);

    let config = MatchConfig::load_or_default();
    let setup = MatchSetup::standard(*Uuid::new_v4().as_bytes(), 12345);
    info!("Match ID: {}", hex::encode(setup.match_id));

    let mut game = Match::new(&setup, config.clone(), pitch_match::game::NullHost)?;
    game.set_phase(MatchPhase::FirstHalf)?;
    game.start_play();

    let mut goals = 0;
    let mut first_half_recordings = Vec::new();
    for t in 0..HALF_TICKS * 2 {
        if t == HALF_TICKS {
            // Loading restarts the recordings
            first_half_recordings = game.recordings();
            let saved = game.get_state()?;
            info!("Half time: saved {} bytes", saved.len());
            game.process_state(&saved)?;
            game.set_phase(MatchPhase::SecondHalf)?;
            game.mirror(true, true, false);
            game.reset_situation(FixedVec3::ZERO);
            game.start_play();
        }

        game.tick(&scripted_inputs(t));

        for event in game.take_events() {
            match event.data {
                MatchEventData::GoalScored(goal) => {
                    goals += 1;
                    info!("Goal for {:?} at iteration {}", goal.scoring_team, event.iteration);
                }
                MatchEventData::CelebrationFinished => {
                    game.set_goal_scored(false);
                    game.reset_situation(FixedVec3::ZERO);
                    game.start_play();
                }
                _ => {}
            }
        }
    }

    game.set_phase(MatchPhase::PostMatch)?;
    let state = game.state();
    let hash = state.compute_hash();
    info!(
        "Full time: {} - {} ({} goals), match clock {} ms",
        state.score(TeamId::First),
        state.score(TeamId::Second),
        goals,
        state.match_time_ms
    );
    info!("Final state hash: {}", hex::encode(hash));

    // A straight replay of the first half must match a live first half
    let (first_half, _) = replay_match(&setup, &config, &first_half_recordings, HALF_TICKS)?;
    let mut check = Match::new(&setup, config, pitch_match::game::NullHost)?;
    check.set_phase(MatchPhase::FirstHalf)?;
    check.start_play();
    for t in 0..HALF_TICKS {
        check.tick(&scripted_inputs(t));
    }
    if first_half.compute_hash() == check.state().compute_hash() {
        info!("Replay verified: hashes match");
    } else {
        anyhow::bail!("replay diverged from live play");
    }

    let remaining = game.exit();
    info!("Match exited with {} pending events", remaining.len());
    Ok(())
}

/// Controller 0 runs in a slow circle and kicks every two seconds.
fn scripted_inputs(t: u64) -> ControllerInputs {
    let angle = (t / 20) % 360;
    let rad = angle as f64 * std::f64::consts::PI / 180.0;
    let move_x = (rad.cos() * 100.0) as i8;
    let move_y = (rad.sin() * 100.0) as i8;

    let mut frame = ControllerFrame::with_movement(move_x, move_y);
    frame.set_kick(t % 200 == 0);
    frame.set_sprint(rad.sin() > 0.0);

    let mut inputs = ControllerInputs::new();
    inputs.insert(ControllerId(0), frame);
    inputs
}
