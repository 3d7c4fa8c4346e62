//! Entity Registry
//!
//! Owns both teams, the ball and the match officials. Players live in
//! per-team rosters; everything else refers to them through `PlayerHandle`,
//! so a roster change can never leave a dangling reference behind.

use serde::{Deserialize, Serialize};

use crate::core::fixed::{
    fixed_clamp, fixed_div, fixed_mul, Fixed, BALL_RADIUS, FIXED_ONE, PITCH_HALF_LENGTH,
    PITCH_HALF_WIDTH,
};
use crate::core::hash::StateHasher;
use crate::core::vec3::FixedVec3;
use crate::game::error::MatchError;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// One of the two teams. Team identity never changes during a match;
/// only the side of the pitch it defends does (see `TeamState::side`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TeamId {
    /// Team 0, the "first" team and the attribution fallback.
    First = 0,
    /// Team 1.
    Second = 1,
}

impl TeamId {
    /// Both teams in processing order.
    pub const ALL: [TeamId; 2] = [TeamId::First, TeamId::Second];

    /// Array index (0 or 1).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The other team.
    #[inline]
    pub const fn opponent(self) -> TeamId {
        match self {
            TeamId::First => TeamId::Second,
            TeamId::Second => TeamId::First,
        }
    }
}

impl TryFrom<i32> for TeamId {
    type Error = MatchError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TeamId::First),
            1 => Ok(TeamId::Second),
            other => Err(MatchError::InvalidTeamId(other)),
        }
    }
}

/// External roster identity of a player (squad/database id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Non-owning reference to a rostered player.
///
/// Ordering is team first, then roster index, which is the fixed
/// iteration order used everywhere contacts are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerHandle {
    /// Owning team
    pub team: TeamId,
    /// Index into that team's roster
    pub index: u16,
}

impl PlayerHandle {
    /// Create a handle.
    pub const fn new(team: TeamId, index: u16) -> Self {
        Self { team, index }
    }

    /// Packed team and index, used when hashing.
    pub const fn key(self) -> u32 {
        ((self.team as u32) << 16) | self.index as u32
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// State of a single player on the pitch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    /// Roster identity
    pub id: PlayerId,
    /// Handle of this player (team + roster slot)
    pub handle: PlayerHandle,
    /// Ground position
    pub position: FixedVec3,
    /// Current velocity
    pub velocity: FixedVec3,
    /// Unit facing direction in the ground plane
    pub facing: FixedVec3,
    /// On the pitch and taking part in play
    pub active: bool,
    /// Actual time (ms) of this player's last ball touch
    pub last_touch_ms: Option<u64>,
}

impl PlayerState {
    /// Create a player standing still at `position`, facing `facing`.
    pub fn new(id: PlayerId, handle: PlayerHandle, position: FixedVec3, facing: FixedVec3) -> Self {
        Self {
            id,
            handle,
            position: position.flat(),
            velocity: FixedVec3::ZERO,
            facing,
            active: true,
            last_touch_ms: None,
        }
    }

    /// Reflect across the centre spot.
    pub fn mirror(&mut self) {
        self.position = self.position.mirrored();
        self.velocity = self.velocity.mirrored();
        self.facing = self.facing.mirrored();
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.0);
        hasher.update_vec3(self.position);
        hasher.update_vec3(self.velocity);
        hasher.update_vec3(self.facing);
        hasher.update_bool(self.active);
        hasher.update_opt_ms(self.last_touch_ms);
    }
}

// =============================================================================
// TEAM STATE
// =============================================================================

/// Roster entry used to build a team at match setup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerSetup {
    /// Roster identity
    pub id: PlayerId,
    /// Kick-off position (absolute pitch coordinates)
    pub position: FixedVec3,
    /// Starts on the pitch (substitutes start inactive)
    pub active: bool,
}

/// A team and its roster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeamState {
    /// Team identity
    pub id: TeamId,
    /// Roster, indexed by `PlayerHandle::index`
    pub players: Vec<PlayerState>,
    /// Whether this team has been mirrored to the other half
    pub mirrored: bool,
    /// Last player of this team to touch the ball
    pub last_touch_player: Option<PlayerHandle>,
    /// Actual time (ms) of that touch
    pub last_touch_ms: Option<u64>,
}

impl TeamState {
    /// Build a team from its roster.
    pub fn new(id: TeamId, roster: &[PlayerSetup]) -> Result<Self, MatchError> {
        if roster.is_empty() {
            return Err(MatchError::InvalidRoster { team: id as u8, reason: "roster is empty" });
        }
        if roster.len() > u16::MAX as usize {
            return Err(MatchError::InvalidRoster { team: id as u8, reason: "roster too large" });
        }

        let mut team = Self {
            id,
            players: Vec::with_capacity(roster.len()),
            mirrored: false,
            last_touch_player: None,
            last_touch_ms: None,
        };
        let facing = team.attack_direction();
        for (index, setup) in roster.iter().enumerate() {
            let handle = PlayerHandle::new(id, index as u16);
            let mut player = PlayerState::new(setup.id, handle, setup.position, facing);
            player.active = setup.active;
            team.players.push(player);
        }
        Ok(team)
    }

    /// Sign of the x coordinate of the goal this team defends (-1 or +1).
    #[inline]
    pub fn side(&self) -> i32 {
        let base = match self.id {
            TeamId::First => -1,
            TeamId::Second => 1,
        };
        if self.mirrored { -base } else { base }
    }

    /// Unit vector pointing at the goal this team attacks.
    #[inline]
    pub fn attack_direction(&self) -> FixedVec3 {
        FixedVec3::new(-self.side() * FIXED_ONE, 0, 0)
    }

    /// Get a player by roster index.
    pub fn player(&self, index: u16) -> Option<&PlayerState> {
        self.players.get(index as usize)
    }

    /// Get a player mutably by roster index.
    pub fn player_mut(&mut self, index: u16) -> Option<&mut PlayerState> {
        self.players.get_mut(index as usize)
    }

    /// Players currently on the pitch, in roster order.
    pub fn active_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter().filter(|p| p.active)
    }

    /// Decaying weight of this team's last touch: 1.0 at the moment of the
    /// touch, falling linearly to 0 after `decay_ms`.
    pub fn last_touch_bias(&self, decay_ms: u64, now_ms: u64) -> Fixed {
        let Some(touch_ms) = self.last_touch_ms else {
            return 0;
        };
        if decay_ms == 0 {
            return if now_ms == touch_ms { FIXED_ONE } else { 0 };
        }
        let age = now_ms.saturating_sub(touch_ms).min(decay_ms);
        let remaining = (decay_ms - age) as i64;
        ((remaining << 16) / decay_ms as i64) as Fixed
    }

    /// Reflect every player across the centre spot and swap defended side.
    pub fn mirror(&mut self) {
        self.mirrored = !self.mirrored;
        for player in &mut self.players {
            player.mirror();
        }
    }
}

// =============================================================================
// BALL
// =============================================================================

/// The single match ball.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallState {
    /// Centre of the ball
    pub position: FixedVec3,
    /// Current velocity
    pub velocity: FixedVec3,
}

impl BallState {
    /// Ball resting on the centre spot.
    pub const fn kick_off() -> Self {
        Self {
            position: FixedVec3::new(0, 0, BALL_RADIUS),
            velocity: FixedVec3::ZERO,
        }
    }

    /// Reflect across the centre spot.
    pub fn mirror(&mut self) {
        self.position = self.position.mirrored();
        self.velocity = self.velocity.mirrored();
    }
}

impl Default for BallState {
    fn default() -> Self {
        Self::kick_off()
    }
}

// =============================================================================
// OFFICIALS
// =============================================================================

/// Match official role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfficialRole {
    /// Referee, follows play
    Referee,
    /// Assistant on the -y touchline, covering the +x half
    AssistantNear,
    /// Assistant on the +y touchline, covering the -x half
    AssistantFar,
}

/// A non-team participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Official {
    /// Role on the pitch
    pub role: OfficialRole,
    /// Ground position
    pub position: FixedVec3,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Owner of every entity in the match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registry {
    teams: [TeamState; 2],
    /// The match ball
    pub ball: BallState,
    ball_mirrored: bool,
    officials: Vec<Official>,
}

impl Registry {
    /// Build the registry from two rosters.
    pub fn new(first: &[PlayerSetup], second: &[PlayerSetup]) -> Result<Self, MatchError> {
        let teams = [
            TeamState::new(TeamId::First, first)?,
            TeamState::new(TeamId::Second, second)?,
        ];
        let mut registry = Self {
            teams,
            ball: BallState::kick_off(),
            ball_mirrored: false,
            officials: vec![
                Official { role: OfficialRole::Referee, position: FixedVec3::ZERO },
                Official { role: OfficialRole::AssistantNear, position: FixedVec3::ZERO },
                Official { role: OfficialRole::AssistantFar, position: FixedVec3::ZERO },
            ],
        };
        registry.update_officials();
        Ok(registry)
    }

    /// Get a team by identity.
    #[inline]
    pub fn team(&self, id: TeamId) -> &TeamState {
        &self.teams[id.index()]
    }

    /// Get a team mutably by identity.
    #[inline]
    pub fn team_mut(&mut self, id: TeamId) -> &mut TeamState {
        &mut self.teams[id.index()]
    }

    /// Get a team by raw id; anything but 0 or 1 is an error.
    pub fn team_by_index(&self, id: i32) -> Result<&TeamState, MatchError> {
        TeamId::try_from(id).map(|team| self.team(team))
    }

    /// Both teams in processing order.
    pub fn teams(&self) -> &[TeamState; 2] {
        &self.teams
    }

    /// Get a player by handle.
    pub fn player(&self, handle: PlayerHandle) -> Option<&PlayerState> {
        self.team(handle.team).player(handle.index)
    }

    /// Get a player mutably by handle.
    pub fn player_mut(&mut self, handle: PlayerHandle) -> Option<&mut PlayerState> {
        self.team_mut(handle.team).player_mut(handle.index)
    }

    /// Every rostered player of a team, active or not.
    pub fn all_team_players(&self, team: TeamId) -> impl Iterator<Item = &PlayerState> {
        self.team(team).players.iter()
    }

    /// Players of a team currently on the pitch.
    pub fn active_team_players(&self, team: TeamId) -> impl Iterator<Item = &PlayerState> {
        self.team(team).active_players()
    }

    /// All players of both teams, team 0 first, roster order within a team.
    pub fn all_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.teams.iter().flat_map(|t| t.players.iter())
    }

    /// Mutable variant of `all_players`, same order.
    pub fn all_players_mut(&mut self) -> impl Iterator<Item = &mut PlayerState> {
        self.teams.iter_mut().flat_map(|t| t.players.iter_mut())
    }

    /// Handles of active players in the fixed contact-resolution order.
    pub fn active_handles(&self) -> Vec<PlayerHandle> {
        self.all_players().filter(|p| p.active).map(|p| p.handle).collect()
    }

    /// Officials (referee and assistants).
    pub fn officials(&self) -> &[Official] {
        &self.officials
    }

    /// Whether the ball has been mirrored an odd number of times.
    pub fn is_ball_mirrored(&self) -> bool {
        self.ball_mirrored
    }

    /// Mirror any combination of team 0, team 1 and the ball.
    ///
    /// Identity and touch history are untouched; only coordinates and the
    /// defended side change.
    pub fn mirror(&mut self, team_0: bool, team_1: bool, ball: bool) {
        if team_0 {
            self.team_mut(TeamId::First).mirror();
        }
        if team_1 {
            self.team_mut(TeamId::Second).mirror();
        }
        if ball {
            self.ball.mirror();
            self.ball_mirrored = !self.ball_mirrored;
        }
    }

    /// Set the mirrored flags without moving anything. Positions loaded
    /// from a saved state are already in their mirrored frame.
    pub(crate) fn restore_mirroring(&mut self, teams: [bool; 2], ball: bool) {
        for (team, mirrored) in self.teams.iter_mut().zip(teams) {
            team.mirrored = mirrored;
        }
        self.ball_mirrored = ball;
    }

    /// Reposition officials around the ball.
    pub fn update_officials(&mut self) {
        let ball = self.ball.position;
        // 3/4 of the way from the centre spot to the ball
        let three_quarters = FIXED_ONE - (FIXED_ONE >> 2);
        let touchline_offset = PITCH_HALF_WIDTH + FIXED_ONE;

        for official in &mut self.officials {
            official.position = match official.role {
                OfficialRole::Referee => FixedVec3::ground(
                    fixed_mul(ball.x, three_quarters),
                    fixed_mul(ball.y, three_quarters),
                ),
                OfficialRole::AssistantNear => FixedVec3::ground(
                    fixed_clamp(ball.x, 0, PITCH_HALF_LENGTH),
                    -touchline_offset,
                ),
                OfficialRole::AssistantFar => FixedVec3::ground(
                    fixed_clamp(ball.x, -PITCH_HALF_LENGTH, 0),
                    touchline_offset,
                ),
            };
        }
    }

    /// Proximity weight: 1.0 at distance zero, falling to 0 at `range`.
    pub fn proximity(distance: Fixed, range: Fixed) -> Fixed {
        if range <= 0 || distance >= range {
            return 0;
        }
        fixed_div(range - distance, range)
    }
}

// =============================================================================
// TESTS
// =============================================================================
