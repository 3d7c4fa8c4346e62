//! Goal Detection
//!
//! Tick step (e). The ball position before and after physics is tested
//! against both goal-line planes; a crossing inside the goal mouth is a goal.
//!
//! Invariant: `ball_in_goal` implies `goal_scored`. Both flags only change
//! through this module.

use serde::{Deserialize, Serialize};

use crate::core::fixed::{fixed_abs, fixed_div, BALL_RADIUS, GOAL_HALF_WIDTH, GOAL_HEIGHT, PITCH_HALF_LENGTH};
use crate::core::hash::StateHasher;
use crate::core::vec3::FixedVec3;
use crate::game::entity::{PlayerHandle, Registry, TeamId};
use crate::game::possession::PossessionTracker;

/// Whether the ball crossed the goal line on `side` (-1 or +1) between
/// `previous` and `current`, inside the posts and under the bar.
///
/// The whole ball has to be over the line, so the plane sits one ball
/// radius behind it.
pub fn check_for_goal(side: i32, previous: FixedVec3, current: FixedVec3) -> bool {
    let plane = PITCH_HALF_LENGTH + BALL_RADIUS;
    let before = previous.x * side;
    let after = current.x * side;
    if before > plane || after <= plane {
        return false;
    }

    let t = fixed_div(plane - before, after - before);
    let crossing = previous.lerp(current, t);
    fixed_abs(crossing.y) < GOAL_HALF_WIDTH && crossing.z < GOAL_HEIGHT
}

/// A detected goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalInfo {
    /// Team credited with the score
    pub scoring_team: TeamId,
    /// Side (-1 / +1) of the goal the ball went into
    pub goal_side: i32,
    /// Last touch came from the defending team
    pub own_goal: bool,
    /// Last touching team at the moment of the goal
    pub last_touch_team: TeamId,
    /// Last touching player, if a player touch was registered
    pub scorer: Option<PlayerHandle>,
}

/// Goal flags, scoreboard and celebration timer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GoalDetector {
    goal_scored: bool,
    ball_in_goal: bool,
    scores: [u32; 2],
    last_goal_team: Option<TeamId>,
    last_goal_scorer: Option<PlayerHandle>,
    celebration_remaining_ms: Option<u64>,
}

impl GoalDetector {
    /// No goals, flags clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Test both goals and apply the result.
    ///
    /// Does nothing while a goal is already pending.
    pub fn detect(
        &mut self,
        registry: &Registry,
        possession: &PossessionTracker,
        previous: FixedVec3,
        celebration_ms: u64,
    ) -> Option<GoalInfo> {
        if self.goal_scored {
            return None;
        }
        let current = registry.ball.position;
        let side = [-1, 1].into_iter().find(|s| check_for_goal(*s, previous, current))?;

        let defending = TeamId::ALL
            .into_iter()
            .find(|t| registry.team(*t).side() == side)
            .unwrap_or(TeamId::First);
        let scoring_team = defending.opponent();
        let last_touch_team = possession.attribution_team();
        let info = GoalInfo {
            scoring_team,
            goal_side: side,
            own_goal: last_touch_team == defending,
            last_touch_team,
            scorer: registry.team(last_touch_team).last_touch_player,
        };

        self.scores[scoring_team.index()] += 1;
        self.goal_scored = true;
        self.ball_in_goal = true;
        self.last_goal_team = Some(last_touch_team);
        self.last_goal_scorer = info.scorer;
        self.celebration_remaining_ms = Some(celebration_ms);
        Some(info)
    }

    /// Advance the celebration timer. Returns true exactly once, when it
    /// runs out.
    pub fn advance_celebration(&mut self, elapsed_ms: u64) -> bool {
        match self.celebration_remaining_ms {
            Some(remaining) if remaining <= elapsed_ms => {
                self.celebration_remaining_ms = None;
                true
            }
            Some(remaining) => {
                self.celebration_remaining_ms = Some(remaining - elapsed_ms);
                false
            }
            None => false,
        }
    }

    /// Set the goal flag. Clearing it also clears `ball_in_goal`.
    pub fn set_goal_scored(&mut self, scored: bool) {
        if !scored {
            self.ball_in_goal = false;
            self.celebration_remaining_ms = None;
        }
        self.goal_scored = scored;
    }

    /// A goal is pending (scored, restart not yet taken).
    pub fn is_goal_scored(&self) -> bool {
        self.goal_scored
    }

    /// Ball is inside a goal.
    pub fn is_ball_in_goal(&self) -> bool {
        self.ball_in_goal
    }

    /// Goals for a team.
    pub fn score(&self, team: TeamId) -> u32 {
        self.scores[team.index()]
    }

    /// Team credited with the last goal's final touch.
    pub fn last_goal_team(&self) -> Option<TeamId> {
        self.last_goal_team
    }

    /// Player credited with the last goal's final touch.
    pub fn last_goal_scorer(&self) -> Option<PlayerHandle> {
        self.last_goal_scorer
    }

    /// Celebration still running.
    pub fn is_celebrating(&self) -> bool {
        self.celebration_remaining_ms.is_some()
    }

    /// Replace flags and scoreboard wholesale (state load).
    pub(crate) fn restore(
        &mut self,
        scores: [u32; 2],
        goal_scored: bool,
        ball_in_goal: bool,
        last_goal_team: Option<TeamId>,
        last_goal_scorer: Option<PlayerHandle>,
    ) {
        self.scores = scores;
        self.goal_scored = goal_scored;
        self.ball_in_goal = ball_in_goal && goal_scored;
        self.last_goal_team = last_goal_team;
        self.last_goal_scorer = last_goal_scorer;
        self.celebration_remaining_ms = None;
    }

    /// Hash scoreboard and flags.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.scores[0]);
        hasher.update_u32(self.scores[1]);
        hasher.update_bool(self.goal_scored);
        hasher.update_bool(self.ball_in_goal);
        hasher.update_opt_u8(self.last_goal_team.map(|t| t as u8));
        hasher.update_opt_key(self.last_goal_scorer.map(PlayerHandle::key));
    }
}

// =============================================================================
// TESTS
// =============================================================================
