//! Mental Images
//!
//! Tick step (f). A bounded record of full-state snapshots, one per 10 ms
//! tick, newest first. AI prediction, replays and the camera read past
//! states from here by age.
//!
//! ```text
//! index:   0        1        2              len-1
//!        [now] [now-10ms] [now-20ms] ... [oldest]
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::fixed::{Fixed, TICK_MS};
use crate::core::vec3::FixedVec3;
use crate::game::entity::{BallState, PlayerHandle, Registry};

/// Per-player part of a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player this entry belongs to
    pub handle: PlayerHandle,
    /// Position at capture time
    pub position: FixedVec3,
    /// Velocity at capture time
    pub velocity: FixedVec3,
    /// On the pitch at capture time
    pub active: bool,
}

/// Full-state snapshot of one tick.
///
/// Immutable once committed, except for `ball_prediction` which may be
/// refreshed on the newest image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentalImage {
    /// Iteration the snapshot was taken at
    pub iteration: u64,
    /// Match clock at capture time
    pub match_time_ms: u64,
    /// Ball state
    pub ball: BallState,
    /// Every rostered player, team 0 first
    pub players: Vec<PlayerSnapshot>,
    /// Predicted ball positions for the following ticks
    pub ball_prediction: Vec<FixedVec3>,
    /// Possession-side sample at capture time
    pub possession_side: Fixed,
}

impl MentalImage {
    /// Capture the registry as it is now.
    pub fn capture(
        registry: &Registry,
        iteration: u64,
        match_time_ms: u64,
        ball_prediction: Vec<FixedVec3>,
        possession_side: Fixed,
    ) -> Self {
        let players = registry
            .all_players()
            .map(|p| PlayerSnapshot {
                handle: p.handle,
                position: p.position,
                velocity: p.velocity,
                active: p.active,
            })
            .collect();
        Self {
            iteration,
            match_time_ms,
            ball: registry.ball,
            players,
            ball_prediction,
            possession_side,
        }
    }

    /// Snapshot entry for a player.
    pub fn player(&self, handle: PlayerHandle) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.handle == handle)
    }

    /// Predicted ball position `ms` after capture, clamped to the last
    /// predicted step. Falls back to the captured position.
    pub fn predicted_ball_position(&self, ms: u64) -> FixedVec3 {
        if self.ball_prediction.is_empty() {
            return self.ball.position;
        }
        let idx = ((ms / TICK_MS) as usize).min(self.ball_prediction.len() - 1);
        self.ball_prediction[idx]
    }
}

/// Bounded snapshot history, newest at index 0.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MentalHistory {
    images: VecDeque<MentalImage>,
    capacity: usize,
}

impl MentalHistory {
    /// Empty history retaining at most `capacity` snapshots (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { images: VecDeque::with_capacity(capacity), capacity }
    }

    /// Commit a snapshot as the newest, evicting the oldest when full.
    pub fn commit(&mut self, image: MentalImage) {
        if self.images.len() == self.capacity {
            self.images.pop_back();
        }
        self.images.push_front(image);
    }

    /// Snapshot `history_ms` old.
    ///
    /// Requests older than what is retained return the oldest snapshot.
    /// `None` only when nothing has been committed.
    pub fn get(&self, history_ms: u64) -> Option<&MentalImage> {
        let last = self.images.len().checked_sub(1)?;
        let idx = usize::try_from(history_ms / TICK_MS).unwrap_or(usize::MAX).min(last);
        self.images.get(idx)
    }

    /// Newest snapshot.
    pub fn latest(&self) -> Option<&MentalImage> {
        self.images.front()
    }

    /// Replace the ball prediction of the newest snapshot only.
    /// Returns false if there is no snapshot yet.
    pub fn update_latest_ball_prediction(&mut self, prediction: Vec<FixedVec3>) -> bool {
        match self.images.front_mut() {
            Some(image) => {
                image.ball_prediction = prediction;
                true
            }
            None => false,
        }
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// True if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Maximum number of snapshots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Time span covered by the retained snapshots.
    pub fn replay_size_ms(&self) -> u64 {
        self.images.len() as u64 * TICK_MS
    }

    /// Iterate newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &MentalImage> {
        self.images.iter()
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.images.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
