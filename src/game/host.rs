//! Host Collaborator Interface
//!
//! Narrow calls out of the simulation into presentation subsystems
//! (captions, scene graph, environment, animation data). Every method has a
//! no-op default so a headless host only implements what it needs. None of
//! these calls can change simulation state.

use serde::{Deserialize, Serialize};

use crate::core::fixed::{to_fixed, Fixed};
use crate::core::rng::MatchRng;
use crate::core::vec3::FixedVec3;

/// Randomised presentation parameters for a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentParams {
    /// Sun compass direction (degrees, Q16.16)
    pub sun_azimuth: Fixed,
    /// Sun height above the horizon (degrees, Q16.16)
    pub sun_elevation: Fixed,
    /// Advertising board set
    pub adboard_variant: u32,
}

impl EnvironmentParams {
    /// Number of advertising board sets to choose from.
    pub const ADBOARD_VARIANTS: u32 = 8;

    /// Draw a parameter set from the match RNG.
    pub fn random(rng: &mut MatchRng) -> Self {
        Self {
            sun_azimuth: rng.between(0, to_fixed(360.0)),
            sun_elevation: rng.between(to_fixed(15.0), to_fixed(75.0)),
            adboard_variant: rng.below(Self::ADBOARD_VARIANTS),
        }
    }
}

/// Scene-graph nodes the match asks the host for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneNode {
    /// Stadium geometry
    Stadium,
    /// Netting of the goal on `side` (-1 / +1)
    GoalNetting {
        /// Goal side
        side: i32,
    },
}

/// Opaque host-side node identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneNodeId(pub u64);

/// Calls out of the match into the host application.
pub trait MatchHost {
    /// Show a caption for `duration_ms`.
    fn show_message(&mut self, _text: &str, _duration_ms: u64) {}

    /// Remove the current caption.
    fn clear_message(&mut self) {}

    /// Apply new sun and advertising parameters.
    fn apply_environment(&mut self, _params: &EnvironmentParams) {}

    /// Cached root positions of an animation, if the host has them.
    fn anim_position_cache(&self, _anim_id: u32) -> Option<Vec<FixedVec3>> {
        None
    }

    /// Look up or create a scene node.
    fn scene_node(&mut self, _node: SceneNode) -> Option<SceneNodeId> {
        None
    }

    /// The ball pushed the netting of a goal.
    fn goal_netting_moved(&mut self, _net: SceneNodeId, _ball: FixedVec3) {}
}

/// Host that ignores every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHost;

impl MatchHost for NullHost {}
