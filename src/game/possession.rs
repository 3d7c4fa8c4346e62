//! Possession Tracking
//!
//! Tick step (d). Keeps touch attribution, the designated possession player,
//! the optional ball retainer and a smoothed possession-side signal.
//!
//! ```text
//! touch registered ──► last_touch_team + touch_map[type]   (same call)
//!                      team.last_touch_player / _ms
//!
//! every tick      ──► dominance[t] = dominance[t] * 0.95 + proximity + bias
//!                      best team  (tie -> last touch team -> first team)
//!                      designated player (retainer, else closest of best)
//!                      side_history.push(side of best team)
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::fixed::{fixed_mul, Fixed, FIXED_ONE, TICK_MS};
use crate::core::hash::StateHasher;
use crate::game::entity::{PlayerHandle, Registry, TeamId};

/// Per-tick retention of accumulated dominance (0.95).
const DOMINANCE_RETAIN: Fixed = 62259;

// =============================================================================
// TOUCH TYPES
// =============================================================================

/// How a ball touch happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TouchType {
    /// Deliberate kick (pass, shot, clearance)
    IntentionalKicked,
    /// Deliberate control without a kick (dribble, trap)
    IntentionalNonKicked,
    /// Ball ran into a player
    Accidental,
}

impl TouchType {
    /// Every touch type, in map order.
    pub const ALL: [TouchType; 3] = [
        TouchType::IntentionalKicked,
        TouchType::IntentionalNonKicked,
        TouchType::Accidental,
    ];

    const fn slot(self) -> usize {
        match self {
            TouchType::IntentionalKicked => 0,
            TouchType::IntentionalNonKicked => 1,
            TouchType::Accidental => 2,
        }
    }
}

/// Last touching team per touch type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchMap {
    entries: [Option<TeamId>; 3],
}

impl TouchMap {
    /// Team that last touched the ball with this touch type.
    #[inline]
    pub fn get(&self, touch: TouchType) -> Option<TeamId> {
        self.entries[touch.slot()]
    }

    /// Record a touch of this type.
    #[inline]
    pub fn set(&mut self, touch: TouchType, team: Option<TeamId>) {
        self.entries[touch.slot()] = team;
    }

    /// All entries in `TouchType::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (TouchType, Option<TeamId>)> + '_ {
        TouchType::ALL.iter().map(move |t| (*t, self.get(*t)))
    }
}

// =============================================================================
// VALUE HISTORY
// =============================================================================

/// Bounded history of one sample per tick, newest last.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValueHistory {
    samples: VecDeque<Fixed>,
    capacity: usize,
}

impl ValueHistory {
    /// Empty history keeping at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append a sample, evicting the oldest when full.
    pub fn push(&mut self, value: Fixed) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Mean of the samples covering the trailing `window_ms`.
    ///
    /// A window shorter than one tick yields the most recent sample; a
    /// window longer than the history yields the mean of everything kept.
    /// Empty history averages to 0.
    pub fn average(&self, window_ms: u64) -> Fixed {
        if self.samples.is_empty() {
            return 0;
        }
        let wanted = (window_ms / TICK_MS).max(1);
        let count = (wanted.min(self.samples.len() as u64)) as usize;
        let sum: i64 = self.samples.iter().rev().take(count).map(|v| *v as i64).sum();
        (sum / count as i64) as Fixed
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<Fixed> {
        self.samples.back().copied()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if nothing has been pushed since the last clear.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

// =============================================================================
// TRACKER
// =============================================================================

/// Tuning for the per-tick possession update.
#[derive(Clone, Copy, Debug)]
pub struct PossessionParams {
    /// Distance at which proximity stops contributing
    pub range: Fixed,
    /// How long a touch keeps biasing dominance (ms)
    pub touch_bias_decay_ms: u64,
}

/// Touch attribution and possession state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PossessionTracker {
    last_touch_team: Option<TeamId>,
    last_touch_player: Option<PlayerHandle>,
    last_touch_ms: Option<u64>,
    touch_map: TouchMap,
    designated_player: Option<PlayerHandle>,
    ball_retainer: Option<PlayerHandle>,
    dominance: [Fixed; 2],
    best_team: TeamId,
    side_history: ValueHistory,
    /// Time of the last registered body-ball contact (collision throttle)
    pub last_body_ball_ms: Option<u64>,
}

impl PossessionTracker {
    /// Fresh tracker with no touches.
    pub fn new(history_len: usize) -> Self {
        Self {
            last_touch_team: None,
            last_touch_player: None,
            last_touch_ms: None,
            touch_map: TouchMap::default(),
            designated_player: None,
            ball_retainer: None,
            dominance: [0; 2],
            best_team: TeamId::First,
            side_history: ValueHistory::new(history_len),
            last_body_ball_ms: None,
        }
    }

    // -------------------------------------------------------------------------
    // Touch attribution
    // -------------------------------------------------------------------------

    /// Attribute a touch of `touch` type to `team`.
    ///
    /// Updates both the most-recent touch and the per-type entry.
    pub fn set_last_touch_team(&mut self, team: TeamId, touch: TouchType) {
        self.last_touch_team = Some(team);
        self.touch_map.set(touch, Some(team));
    }

    /// Register a touch by a specific player at `now_ms`.
    pub fn register_touch(&mut self, registry: &mut Registry, player: PlayerHandle, touch: TouchType, now_ms: u64) {
        self.set_last_touch_team(player.team, touch);
        self.last_touch_player = Some(player);
        self.last_touch_ms = Some(now_ms);

        let team = registry.team_mut(player.team);
        team.last_touch_player = Some(player);
        team.last_touch_ms = Some(now_ms);
        if let Some(p) = team.player_mut(player.index) {
            p.last_touch_ms = Some(now_ms);
        }
    }

    /// Team of the most recent touch of any type.
    pub fn last_touch_team(&self) -> Option<TeamId> {
        self.last_touch_team
    }

    /// Team of the most recent touch, or the first team if nobody touched
    /// the ball yet.
    pub fn attribution_team(&self) -> TeamId {
        self.last_touch_team.unwrap_or(TeamId::First)
    }

    /// Team of the most recent touch of this type.
    pub fn last_touch_team_of(&self, touch: TouchType) -> Option<TeamId> {
        self.touch_map.get(touch)
    }

    /// The whole per-type map.
    pub fn touch_map(&self) -> &TouchMap {
        &self.touch_map
    }

    /// Player of the most recent registered touch.
    pub fn last_touch_player(&self) -> Option<PlayerHandle> {
        self.last_touch_player
    }

    /// Time of the most recent registered touch.
    pub fn last_touch_ms(&self) -> Option<u64> {
        self.last_touch_ms
    }

    /// Replace attribution wholesale (state load).
    pub(crate) fn restore_attribution(
        &mut self,
        last: Option<TeamId>,
        map: TouchMap,
        player: Option<PlayerHandle>,
        at_ms: Option<u64>,
    ) {
        self.last_touch_team = last;
        self.touch_map = map;
        self.last_touch_player = player;
        self.last_touch_ms = at_ms;
    }

    // -------------------------------------------------------------------------
    // Retainer / designated player
    // -------------------------------------------------------------------------

    /// Player allowed to hold the ball outside normal physics.
    pub fn ball_retainer(&self) -> Option<PlayerHandle> {
        self.ball_retainer
    }

    /// Set or clear the ball retainer. The retainer is also designated at once.
    pub fn set_ball_retainer(&mut self, retainer: Option<PlayerHandle>) {
        self.ball_retainer = retainer;
        if retainer.is_some() {
            self.designated_player = retainer;
        }
    }

    /// Player currently treated as controlling the ball.
    pub fn designated_player(&self) -> Option<PlayerHandle> {
        self.designated_player
    }

    /// Team judged to be in possession.
    pub fn best_team(&self) -> TeamId {
        self.best_team
    }

    /// Accumulated dominance score of a team.
    pub fn dominance(&self, team: TeamId) -> Fixed {
        self.dominance[team.index()]
    }

    /// Smoothed possession side over the trailing window: -1.0 means the
    /// team defending the -x goal had the ball throughout.
    pub fn average_possession_side(&self, window_ms: u64) -> Fixed {
        self.side_history.average(window_ms)
    }

    /// Raw possession-side samples.
    pub fn side_history(&self) -> &ValueHistory {
        &self.side_history
    }

    // -------------------------------------------------------------------------
    // Per-tick update
    // -------------------------------------------------------------------------

    /// Recompute dominance, best team, designated player and side sample.
    pub fn update(&mut self, registry: &Registry, params: &PossessionParams, now_ms: u64) {
        let ball = registry.ball.position;

        for team in TeamId::ALL {
            let closest = registry
                .active_team_players(team)
                .map(|p| p.position.flat_distance(ball))
                .min();
            let proximity = closest.map_or(0, |d| Registry::proximity(d, params.range));
            let bias = registry.team(team).last_touch_bias(params.touch_bias_decay_ms, now_ms);

            let slot = &mut self.dominance[team.index()];
            *slot = fixed_mul(*slot, DOMINANCE_RETAIN)
                .saturating_add(proximity)
                .saturating_add(bias);
        }

        let [first, second] = self.dominance;
        self.best_team = if first > second {
            TeamId::First
        } else if second > first {
            TeamId::Second
        } else {
            self.attribution_team()
        };

        self.designated_player = match self.ball_retainer {
            Some(retainer) => Some(retainer),
            None => registry
                .active_team_players(self.best_team)
                .min_by_key(|p| (p.position.flat_distance(ball), p.handle))
                .map(|p| p.handle),
        };

        self.side_history.push(registry.team(self.best_team).side() * FIXED_ONE);
    }

    /// Forget transient possession state (situation reset).
    pub fn reset(&mut self) {
        self.designated_player = None;
        self.ball_retainer = None;
        self.last_body_ball_ms = None;
        self.dominance = [0; 2];
        self.side_history.clear();
    }

    /// Hash attribution and possession state.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_opt_u8(self.last_touch_team.map(|t| t as u8));
        for (_, team) in self.touch_map.iter() {
            hasher.update_opt_u8(team.map(|t| t as u8));
        }
        hasher.update_u8(self.best_team as u8);
        hasher.update_fixed(self.dominance[0]);
        hasher.update_fixed(self.dominance[1]);
        hasher.update_opt_key(self.designated_player.map(PlayerHandle::key));
        hasher.update_opt_key(self.ball_retainer.map(PlayerHandle::key));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;
    use crate::core::vec3::FixedVec3;
    use crate::game::entity::tests::registry;
    use proptest::prelude::*;

    fn params() -> PossessionParams {
        PossessionParams { range: to_fixed(10.0), touch_bias_decay_ms: 2000 }
    }

    #[test]
    fn test_value_history_windows() {
        let mut history = ValueHistory::new(4);
        assert_eq!(history.average(100), 0);

        for v in [FIXED_ONE, -FIXED_ONE, FIXED_ONE, FIXED_ONE, -FIXED_ONE] {
            history.push(v);
        }
        assert_eq!(history.len(), 4);
        // Zero window is the latest sample
        assert_eq!(history.average(0), -FIXED_ONE);
        // Two samples
        assert_eq!(history.average(20), 0);
        // Everything retained: -1, 1, 1, -1
        assert_eq!(history.average(10_000), 0);
    }

    #[test]
    fn test_value_history_full_mean() {
        let mut history = ValueHistory::new(8);
        for v in [FIXED_ONE, FIXED_ONE, FIXED_ONE, -FIXED_ONE] {
            history.push(v);
        }
        assert_eq!(history.average(u64::MAX), FIXED_ONE / 2);
    }

    #[test]
    fn test_touch_updates_last_and_typed_atomically() {
        let mut reg = registry();
        let mut tracker = PossessionTracker::new(100);
        assert_eq!(tracker.attribution_team(), TeamId::First);

        let p = PlayerHandle::new(TeamId::Second, 4);
        tracker.register_touch(&mut reg, p, TouchType::Accidental, 250);

        assert_eq!(tracker.last_touch_team(), Some(TeamId::Second));
        assert_eq!(tracker.last_touch_team_of(TouchType::Accidental), Some(TeamId::Second));
        assert_eq!(tracker.last_touch_team_of(TouchType::IntentionalKicked), None);
        assert_eq!(tracker.last_touch_player(), Some(p));
        assert_eq!(reg.team(TeamId::Second).last_touch_player, Some(p));
        assert_eq!(reg.player(p).unwrap().last_touch_ms, Some(250));
    }

    #[test]
    fn test_best_team_follows_proximity() {
        let mut reg = registry();
        let near = PlayerHandle::new(TeamId::Second, 6);
        reg.player_mut(near).unwrap().position = FixedVec3::ground(to_fixed(1.0), 0);
        let mut tracker = PossessionTracker::new(100);

        tracker.update(&reg, &params(), 0);
        assert_eq!(tracker.best_team(), TeamId::Second);
        assert_eq!(tracker.designated_player(), Some(near));
        assert_eq!(tracker.average_possession_side(0), FIXED_ONE);
    }

    #[test]
    fn test_tie_goes_to_last_touch_team() {
        let mut reg = registry();
        // Everybody far from the ball: no proximity for either side
        for player in reg.all_players_mut() {
            player.position = FixedVec3::ground(to_fixed(50.0), to_fixed(30.0));
        }
        let mut tracker = PossessionTracker::new(100);
        tracker.update(&reg, &params(), 0);
        assert_eq!(tracker.best_team(), TeamId::First);

        tracker.set_last_touch_team(TeamId::Second, TouchType::IntentionalKicked);
        tracker.update(&reg, &params(), 0);
        assert_eq!(tracker.best_team(), TeamId::Second);
    }

    #[test]
    fn test_retainer_is_designated() {
        let reg = registry();
        let mut tracker = PossessionTracker::new(100);
        let keeper = PlayerHandle::new(TeamId::First, 0);
        tracker.set_ball_retainer(Some(keeper));
        tracker.update(&reg, &params(), 0);
        assert_eq!(tracker.designated_player(), Some(keeper));

        tracker.reset();
        assert_eq!(tracker.ball_retainer(), None);
        assert!(tracker.side_history().is_empty());
    }

    proptest! {
        #[test]
        fn prop_last_touch_matches_latest_call(calls in proptest::collection::vec((0usize..2, 0usize..3), 1..50)) {
            let mut tracker = PossessionTracker::new(10);
            let mut expected = [None; 3];
            for (team, touch) in &calls {
                let team = TeamId::ALL[*team];
                let touch = TouchType::ALL[*touch];
                tracker.set_last_touch_team(team, touch);
                expected[touch.slot()] = Some(team);
                prop_assert_eq!(tracker.last_touch_team(), Some(team));
            }
            for touch in TouchType::ALL {
                prop_assert_eq!(tracker.last_touch_team_of(touch), expected[touch.slot()]);
            }
        }

        #[test]
        fn prop_touch_of_other_type_leaves_entry(first in 0usize..2, other in 0usize..2, kept in 0usize..3, offset in 1usize..3) {
            let kept_type = TouchType::ALL[kept];
            let other_type = TouchType::ALL[(kept + offset) % 3];
            let mut map = TouchMap::default();
            map.set(kept_type, Some(TeamId::ALL[first]));
            map.set(other_type, Some(TeamId::ALL[other]));
            prop_assert_eq!(map.get(kept_type), Some(TeamId::ALL[first]));
        }

        #[test]
        fn prop_average_bounded(samples in proptest::collection::vec(-FIXED_ONE..=FIXED_ONE, 1..200), window in 0u64..5000) {
            let mut history = ValueHistory::new(64);
            for s in &samples {
                history.push(*s);
            }
            let avg = history.average(window);
            prop_assert!((-FIXED_ONE..=FIXED_ONE).contains(&avg));
            prop_assert!(history.len() <= 64);
        }
    }
}
