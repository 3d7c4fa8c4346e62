//! Camera Follower
//!
//! Tick step (g). Smooths the broadcast camera toward a focus point taken
//! from the mental-image history. Recent focus points are kept in a short
//! FIFO and averaged so the camera never jumps on a sudden ball movement.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::fixed::{fixed_div, Fixed, FIXED_ONE};
use crate::core::vec3::FixedVec3;

/// Smallest zoom accepted (wide shot).
const MIN_ZOOM: Fixed = FIXED_ONE >> 2;

/// Camera tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Number of focus points averaged
    pub history_len: usize,
    /// Age of the mental image used as focus (ms)
    pub lag_ms: u64,
    /// Fraction of the remaining distance covered each tick
    pub blend: Fixed,
    /// Field of view at zoom 1.0 (degrees, Q16.16)
    pub base_fov: Fixed,
    /// Horizontal distance behind the focus at zoom 1.0
    pub distance: Fixed,
    /// Height above the grass at zoom 1.0
    pub height: Fixed,
}

/// Derived camera placement: where the eye is and which way it looks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Eye position
    pub position: FixedVec3,
    /// Point looked at
    pub focus: FixedVec3,
    /// Unit view direction, from `position` toward `focus`
    pub orientation: FixedVec3,
    /// Field of view (degrees, Q16.16)
    pub fov: Fixed,
}

impl CameraPose {
    fn looking_at(position: FixedVec3, focus: FixedVec3, fov: Fixed) -> Self {
        Self { position, focus, orientation: (focus - position).normalize(), fov }
    }
}

/// Smoothed camera state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CameraFollower {
    settings: CameraSettings,
    auto_follow: bool,
    zoom: Fixed,
    recent: VecDeque<FixedVec3>,
    pose: CameraPose,
}

impl CameraFollower {
    /// Camera with auto-follow on at zoom 1.0.
    pub fn new(settings: CameraSettings) -> Self {
        let mut camera = Self {
            settings,
            auto_follow: true,
            zoom: FIXED_ONE,
            recent: VecDeque::with_capacity(settings.history_len.max(1)),
            pose: CameraPose::default(),
        };
        camera.pose = CameraPose::looking_at(camera.desired_position(FixedVec3::ZERO), FixedVec3::ZERO, camera.fov());
        camera
    }

    /// Whether the camera follows play on its own.
    pub fn is_auto_follow(&self) -> bool {
        self.auto_follow
    }

    /// Enable or disable auto-follow. Any change clears the focus history.
    pub fn set_auto_follow(&mut self, on: bool) {
        if self.auto_follow != on {
            self.auto_follow = on;
            self.recent.clear();
        }
    }

    /// Flip auto-follow, clearing the focus history.
    pub fn toggle_auto_follow(&mut self) {
        let on = !self.auto_follow;
        self.set_auto_follow(on);
    }

    /// Current zoom factor.
    pub fn zoom(&self) -> Fixed {
        self.zoom
    }

    /// Set the zoom factor (clamped to at least 0.25).
    pub fn set_zoom(&mut self, zoom: Fixed) {
        self.zoom = zoom.max(MIN_ZOOM);
    }

    /// Current pose.
    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Age of the mental image the camera looks at.
    pub fn lag_ms(&self) -> u64 {
        self.settings.lag_ms
    }

    /// Number of focus points currently averaged.
    pub fn history_len(&self) -> usize {
        self.recent.len()
    }

    fn fov(&self) -> Fixed {
        fixed_div(self.settings.base_fov, self.zoom)
    }

    fn desired_position(&self, focus: FixedVec3) -> FixedVec3 {
        let back = fixed_div(self.settings.distance, self.zoom);
        let up = fixed_div(self.settings.height, self.zoom);
        FixedVec3::new(focus.x, focus.y - back, up)
    }

    /// Mean of the retained focus points.
    fn smoothed_focus(&self) -> FixedVec3 {
        let n = self.recent.len() as i64;
        if n == 0 {
            return self.pose.focus;
        }
        let (sx, sy, sz) = self.recent.iter().fold((0i64, 0i64, 0i64), |(x, y, z), p| {
            (x + p.x as i64, y + p.y as i64, z + p.z as i64)
        });
        FixedVec3::new((sx / n) as Fixed, (sy / n) as Fixed, (sz / n) as Fixed)
    }

    /// Feed a new focus target and blend the pose toward it.
    pub fn update(&mut self, target: FixedVec3) {
        if self.recent.len() >= self.settings.history_len.max(1) {
            self.recent.pop_front();
        }
        self.recent.push_back(target);

        let focus = self.smoothed_focus();
        let desired = self.desired_position(focus);
        let position = self.pose.position.lerp(desired, self.settings.blend);
        self.pose = CameraPose::looking_at(position, focus, self.fov());
    }

    /// Drop the focus history without moving the camera.
    pub fn clear_history(&mut self) {
        self.recent.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
