//! Ball and Player Integration
//!
//! Tick step (b). A deliberately small integrator: gravity, ground bounce and
//! damping for the ball, velocity integration and pitch clamping for players.
//! Everything runs in Q16.16 with a fixed 10 ms step so that the same inputs
//! always produce the same trajectory.

use crate::core::fixed::{
    fixed_abs, fixed_mul, BALL_AIR_DAMPING, BALL_RADIUS, BALL_RESTITUTION, BALL_ROLL_DAMPING,
    BALL_SETTLE_SPEED, GOAL_DEPTH, GOAL_HALF_WIDTH, GOAL_HEIGHT, GRAVITY, PITCH_HALF_LENGTH,
    PITCH_HALF_WIDTH, PITCH_RUN_OFF, PLAYER_RADIUS, TICK_DT,
};
use crate::core::vec3::FixedVec3;
use crate::game::entity::{BallState, PlayerState};

/// Outcome of one ball integration step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BallStep {
    /// Ball touched the grass this step
    pub bounced: bool,
    /// Ball was stopped by the goal netting this step
    pub hit_net: bool,
}

/// Whether the ball is resting on (or rolling along) the grass.
#[inline]
pub fn ball_on_ground(ball: &BallState) -> bool {
    ball.position.z <= BALL_RADIUS && ball.velocity.z == 0
}

/// Advance the ball by one tick.
///
/// When `in_goal` is set the ball is kept inside the net volume behind the
/// line it crossed.
pub fn integrate_ball(ball: &mut BallState, in_goal: bool) -> BallStep {
    let mut step = BallStep::default();

    let airborne = !ball_on_ground(ball);
    if airborne {
        ball.velocity.z = ball.velocity.z.wrapping_sub(fixed_mul(GRAVITY, TICK_DT));
    }
    ball.position = ball.position + ball.velocity.scale(TICK_DT);

    // Ground contact
    if ball.position.z <= BALL_RADIUS {
        ball.position.z = BALL_RADIUS;
        if ball.velocity.z < 0 {
            step.bounced = true;
            ball.velocity.z = fixed_mul(-ball.velocity.z, BALL_RESTITUTION);
            if ball.velocity.z < BALL_SETTLE_SPEED {
                ball.velocity.z = 0;
            }
        }
    }

    // Damping
    if ball_on_ground(ball) {
        ball.velocity.x = fixed_mul(ball.velocity.x, BALL_ROLL_DAMPING);
        ball.velocity.y = fixed_mul(ball.velocity.y, BALL_ROLL_DAMPING);
    } else {
        ball.velocity = ball.velocity.scale(BALL_AIR_DAMPING);
    }

    if in_goal {
        step.hit_net = contain_in_net(ball);
    } else {
        contain_in_stadium(ball);
    }

    step
}

/// Keep the ball inside the goal it entered. Returns true if the netting
/// stopped it.
fn contain_in_net(ball: &mut BallState) -> bool {
    let side = if ball.position.x < 0 { -1 } else { 1 };
    let back = PITCH_HALF_LENGTH + GOAL_DEPTH - BALL_RADIUS;
    let lateral = GOAL_HALF_WIDTH - BALL_RADIUS;
    let roof = GOAL_HEIGHT - BALL_RADIUS;
    let mut hit = false;

    if fixed_abs(ball.position.x) > back {
        ball.position.x = side * back;
        ball.velocity.x = 0;
        ball.velocity.y = ball.velocity.y >> 1;
        hit = true;
    }
    if fixed_abs(ball.position.y) > lateral {
        ball.position.y = if ball.position.y < 0 { -lateral } else { lateral };
        ball.velocity.y = 0;
        hit = true;
    }
    if ball.position.z > roof {
        ball.position.z = roof;
        ball.velocity.z = 0;
        hit = true;
    }
    hit
}

/// Stop the ball at the advertising boards around the run-off area.
fn contain_in_stadium(ball: &mut BallState) {
    let max_x = PITCH_HALF_LENGTH + PITCH_RUN_OFF;
    let max_y = PITCH_HALF_WIDTH + PITCH_RUN_OFF;
    if fixed_abs(ball.position.x) > max_x {
        ball.position.x = if ball.position.x < 0 { -max_x } else { max_x };
        ball.velocity.x = 0;
    }
    if fixed_abs(ball.position.y) > max_y {
        ball.position.y = if ball.position.y < 0 { -max_y } else { max_y };
        ball.velocity.y = 0;
    }
}

/// Predict the ball's next `steps` positions without touching the live ball.
pub fn predict_ball_path(ball: &BallState, in_goal: bool, steps: usize) -> Vec<FixedVec3> {
    let mut ghost = *ball;
    (0..steps)
        .map(|_| {
            integrate_ball(&mut ghost, in_goal);
            ghost.position
        })
        .collect()
}

/// Advance a player by one tick and keep it inside the run-off area.
pub fn integrate_player(player: &mut PlayerState) {
    player.position = (player.position + player.velocity.scale(TICK_DT))
        .flat()
        .clamp_xy(PITCH_HALF_LENGTH + PITCH_RUN_OFF, PITCH_HALF_WIDTH + PITCH_RUN_OFF);

    let heading = player.velocity.flat();
    if heading != FixedVec3::ZERO {
        let dir = heading.normalize();
        if dir != FixedVec3::ZERO {
            player.facing = dir;
        }
    }
}

/// Pin the ball just in front of the player retaining it.
pub fn pin_ball_to(ball: &mut BallState, retainer: &PlayerState) {
    let reach = PLAYER_RADIUS + BALL_RADIUS;
    let mut position = retainer.position + retainer.facing.scale(reach);
    position.z = BALL_RADIUS;
    ball.position = position;
    ball.velocity = retainer.velocity;
}

// =============================================================================
// TESTS
// =============================================================================
