//! Controller Input and Bindings
//!
//! Controllers are external input devices polled by the host. Each one may
//! be bound to a single player; the bound player's velocity and facing are
//! derived from the controller frame in tick step (a).
//!
//! Uses a lookup table (MOVE_LUT) for exact i8 to Fixed conversion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::fixed::{Fixed, RUN_SPEED, SPRINT_SPEED};
use crate::core::vec3::FixedVec3;
use crate::game::entity::PlayerHandle;

// =============================================================================
// MOVE LOOKUP TABLE
// =============================================================================

/// Lookup table for converting i8 stick input to Fixed.
///
/// `(value * 65536) / 127` is not an integer for most values, so all 256
/// results are precomputed with floor division.
///
/// Index 128 (-128 as i8) maps to 0: stick released.
pub static MOVE_LUT: [Fixed; 256] = {
    let mut lut = [0i32; 256];
    let mut i = 0i32;
    while i < 256 {
        let signed = if i < 128 { i } else { i - 256 };
        if signed == -128 {
            lut[i as usize] = 0;
        } else {
            lut[i as usize] = (signed * 65536) / 127;
        }
        i += 1;
    }
    lut
};

/// Convert i8 stick input to Fixed using the lookup table.
#[inline]
pub fn move_to_fixed(input: i8) -> Fixed {
    MOVE_LUT[(input as u8) as usize]
}

// =============================================================================
// CONTROLLER FRAME
// =============================================================================

/// Identifier of a physical or virtual controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub u8);

/// Controller state sampled for a single tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerFrame {
    /// Stick X: -127 (towards -x) to +127; -128 = released
    pub move_x: i8,
    /// Stick Y: -127 to +127; -128 = released
    pub move_y: i8,
    /// Action flags:
    /// - Bit 0: kick pressed this frame
    /// - Bit 1: sprint held
    pub flags: u8,
}

impl Default for ControllerFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerFrame {
    /// Released stick value.
    pub const NO_INPUT: i8 = -128;

    /// Kick flag bit
    pub const FLAG_KICK: u8 = 0x01;

    /// Sprint flag bit
    pub const FLAG_SPRINT: u8 = 0x02;

    /// Idle frame.
    pub const fn new() -> Self {
        Self { move_x: Self::NO_INPUT, move_y: Self::NO_INPUT, flags: 0 }
    }

    /// Frame with a stick direction and no actions.
    pub const fn with_movement(move_x: i8, move_y: i8) -> Self {
        Self { move_x, move_y, flags: 0 }
    }

    /// Stick direction in the ground plane, each axis in [-1, 1].
    #[inline]
    pub fn move_direction(&self) -> FixedVec3 {
        FixedVec3::ground(move_to_fixed(self.move_x), move_to_fixed(self.move_y))
    }

    /// Desired ground velocity for this frame.
    pub fn desired_velocity(&self) -> FixedVec3 {
        let dir = self.move_direction();
        if dir == FixedVec3::ZERO {
            return FixedVec3::ZERO;
        }
        let speed = if self.sprint_held() { SPRINT_SPEED } else { RUN_SPEED };
        dir.normalize().scale(speed)
    }

    /// Kick pressed this frame.
    #[inline]
    pub fn kick_pressed(&self) -> bool {
        self.flags & Self::FLAG_KICK != 0
    }

    /// Sprint held this frame.
    #[inline]
    pub fn sprint_held(&self) -> bool {
        self.flags & Self::FLAG_SPRINT != 0
    }

    /// No stick input and no actions.
    #[inline]
    pub fn is_idle(&self) -> bool {
        !self.has_movement() && self.flags == 0
    }

    /// Stick deflected on either axis.
    #[inline]
    pub fn has_movement(&self) -> bool {
        move_to_fixed(self.move_x) != 0 || move_to_fixed(self.move_y) != 0
    }

    /// Set kick flag.
    #[inline]
    pub fn set_kick(&mut self, pressed: bool) {
        if pressed {
            self.flags |= Self::FLAG_KICK;
        } else {
            self.flags &= !Self::FLAG_KICK;
        }
    }

    /// Set sprint flag.
    #[inline]
    pub fn set_sprint(&mut self, held: bool) {
        if held {
            self.flags |= Self::FLAG_SPRINT;
        } else {
            self.flags &= !Self::FLAG_SPRINT;
        }
    }
}

/// Frames for one tick, keyed by controller. Missing controllers are idle.
pub type ControllerInputs = BTreeMap<ControllerId, ControllerFrame>;

// =============================================================================
// BINDINGS
// =============================================================================

/// Controller to player bindings.
///
/// A controller drives at most one player and a player is driven by at most
/// one controller; binding either side again replaces the old pairing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ControllerBindings {
    map: BTreeMap<ControllerId, PlayerHandle>,
}

impl ControllerBindings {
    /// No bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `controller` to `player`, dropping any previous pairing of either.
    pub fn bind(&mut self, controller: ControllerId, player: PlayerHandle) {
        self.map.retain(|_, bound| *bound != player);
        self.map.insert(controller, player);
    }

    /// Remove a controller binding, returning the player it drove.
    pub fn unbind(&mut self, controller: ControllerId) -> Option<PlayerHandle> {
        self.map.remove(&controller)
    }

    /// Player driven by `controller`.
    pub fn player_for(&self, controller: ControllerId) -> Option<PlayerHandle> {
        self.map.get(&controller).copied()
    }

    /// Controller driving `player`, if any.
    pub fn controller_for(&self, player: PlayerHandle) -> Option<ControllerId> {
        self.map.iter().find(|(_, bound)| **bound == player).map(|(id, _)| *id)
    }

    /// All bindings in controller order.
    pub fn iter(&self) -> impl Iterator<Item = (ControllerId, PlayerHandle)> + '_ {
        self.map.iter().map(|(c, p)| (*c, *p))
    }

    /// Number of bound controllers.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no controller is bound.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// =============================================================================
// RECORDING
// =============================================================================

/// Frame change recorded at a given iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDelta {
    /// Iteration when this frame began
    pub iteration: u64,
    /// The new frame
    pub frame: ControllerFrame,
}

/// Delta-compressed recording of one controller over a match.
///
/// Only frames that differ from the previous one are stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerRecording {
    /// Recorded controller
    pub controller: ControllerId,
    /// Last recorded iteration
    pub end_iteration: u64,
    deltas: Vec<FrameDelta>,
    #[serde(skip, default = "ControllerFrame::new")]
    last_frame: ControllerFrame,
}

impl ControllerRecording {
    /// Create an empty recording.
    pub fn new(controller: ControllerId) -> Self {
        Self {
            controller,
            end_iteration: 0,
            deltas: Vec::with_capacity(256),
            last_frame: ControllerFrame::new(),
        }
    }

    /// Record the frame used at `iteration`.
    pub fn record(&mut self, iteration: u64, frame: ControllerFrame) {
        self.end_iteration = iteration;
        if frame != self.last_frame {
            self.deltas.push(FrameDelta { iteration, frame });
            self.last_frame = frame;
        }
    }

    /// Frame in effect at `iteration`.
    pub fn frame_at(&self, iteration: u64) -> ControllerFrame {
        let idx = self.deltas.partition_point(|d| d.iteration <= iteration);
        if idx == 0 {
            ControllerFrame::new()
        } else {
            self.deltas[idx - 1].frame
        }
    }

    /// Stored frame changes.
    pub fn deltas(&self) -> &[FrameDelta] {
        &self.deltas
    }
}

/// Build the per-tick input map for `iteration` from a set of recordings.
pub fn inputs_at(recordings: &[ControllerRecording], iteration: u64) -> ControllerInputs {
    recordings
        .iter()
        .map(|r| (r.controller, r.frame_at(iteration)))
        .filter(|(_, frame)| !frame.is_idle())
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
