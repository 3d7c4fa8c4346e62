//! Match Events
//!
//! Notifications produced by the coordinator and drained by its caller with
//! `Match::take_events`. This replaces callback hooks: the core never calls
//! into the host to announce something, it queues an event instead.

use serde::{Deserialize, Serialize};

use crate::game::entity::PlayerHandle;
use crate::game::goal::GoalInfo;
use crate::game::possession::TouchType;
use crate::game::state::MatchPhase;

/// Processing order for events raised in the same iteration.
///
/// Lower value = delivered first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Match creation and teardown
    Lifecycle = 0,
    /// Phase transitions
    Phase = 1,
    /// Goals
    Goal = 2,
    /// Ball touches
    Touch = 3,
    /// Replay and presentation cues
    Presentation = 4,
    /// Everything else
    Other = 255,
}

/// Event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchEventData {
    /// Coordinator finished construction
    MatchCreated,

    /// Coordinator torn down
    MatchExited,

    /// Phase changed through a command
    PhaseChanged {
        /// Previous phase
        from: MatchPhase,
        /// New phase
        to: MatchPhase,
    },

    /// A goal was detected
    GoalScored(GoalInfo),

    /// A player touched the ball
    BallTouched {
        /// Touching player
        player: PlayerHandle,
        /// Classification
        touch: TouchType,
    },

    /// Something worth a short replay just happened
    ShortReplayMoment {
        /// Replay length the host should show (ms)
        length_ms: u64,
    },

    /// Goal celebration timer ran out
    CelebrationFinished,
}

/// An event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Iteration when the event occurred
    pub iteration: u64,

    /// Delivery priority
    pub priority: EventPriority,

    /// Player involved (tie-breaking)
    pub player: Option<PlayerHandle>,

    /// Payload
    pub data: MatchEventData,
}

impl MatchEvent {
    /// Create a new event.
    pub fn new(iteration: u64, priority: EventPriority, data: MatchEventData) -> Self {
        let player = match &data {
            MatchEventData::BallTouched { player, .. } => Some(*player),
            MatchEventData::GoalScored(info) => info.scorer,
            _ => None,
        };
        Self { iteration, priority, player, data }
    }

    /// Match created.
    pub fn created(iteration: u64) -> Self {
        Self::new(iteration, EventPriority::Lifecycle, MatchEventData::MatchCreated)
    }

    /// Match exited.
    pub fn exited(iteration: u64) -> Self {
        Self::new(iteration, EventPriority::Lifecycle, MatchEventData::MatchExited)
    }

    /// Phase changed.
    pub fn phase_changed(iteration: u64, from: MatchPhase, to: MatchPhase) -> Self {
        Self::new(iteration, EventPriority::Phase, MatchEventData::PhaseChanged { from, to })
    }

    /// Goal scored.
    pub fn goal_scored(iteration: u64, info: GoalInfo) -> Self {
        Self::new(iteration, EventPriority::Goal, MatchEventData::GoalScored(info))
    }

    /// Ball touched.
    pub fn ball_touched(iteration: u64, player: PlayerHandle, touch: TouchType) -> Self {
        Self::new(iteration, EventPriority::Touch, MatchEventData::BallTouched { player, touch })
    }

    /// Short replay cue.
    pub fn short_replay(iteration: u64, length_ms: u64) -> Self {
        Self::new(iteration, EventPriority::Presentation, MatchEventData::ShortReplayMoment { length_ms })
    }

    /// Celebration over.
    pub fn celebration_finished(iteration: u64) -> Self {
        Self::new(iteration, EventPriority::Presentation, MatchEventData::CelebrationFinished)
    }
}

impl PartialEq for MatchEvent {
    fn eq(&self, other: &Self) -> bool {
        self.iteration == other.iteration
            && self.priority == other.priority
            && self.player == other.player
    }
}

impl Eq for MatchEvent {}

impl PartialOrd for MatchEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.iteration
            .cmp(&other.iteration)
            .then(self.priority.cmp(&other.priority))
            .then(self.player.cmp(&other.player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::TeamId;

    #[test]
    fn test_event_ordering() {
        let a = PlayerHandle::new(TeamId::First, 2);
        let b = PlayerHandle::new(TeamId::Second, 0);

        let touch_a = MatchEvent::ball_touched(10, a, TouchType::Accidental);
        let touch_b = MatchEvent::ball_touched(10, b, TouchType::IntentionalKicked);
        let phase = MatchEvent::phase_changed(10, MatchPhase::PreMatch, MatchPhase::FirstHalf);
        let later = MatchEvent::created(11);

        assert!(phase < touch_a);
        assert!(touch_a < touch_b);
        assert!(touch_b < later);
    }

    #[test]
    fn test_touch_event_carries_player() {
        let p = PlayerHandle::new(TeamId::Second, 9);
        let event = MatchEvent::ball_touched(3, p, TouchType::IntentionalNonKicked);
        assert_eq!(event.player, Some(p));
        assert_eq!(MatchEvent::created(0).player, None);
    }
}
