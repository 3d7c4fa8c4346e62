//! Collision Resolution
//!
//! Tick step (c), two passes in a fixed order:
//!
//! ```text
//! humanoid-humanoid   pairs (i < j) over team 0 roster then team 1 roster
//!                     -> PlayerBounce recorded on both players
//!                     -> one summed displacement per player
//!
//! humanoid-ball       same player order, first overlap wins
//!                     -> ball response (kick / dribble / deflection)
//!                     -> BallContact handed to the possession tracker
//! ```

use std::collections::BTreeMap;

use crate::core::fixed::{
    fixed_mul, Fixed, BALL_RADIUS, BALL_RESTITUTION, BOUNCE_FACTOR, DRIBBLE_FACTOR, FIXED_ONE,
    KICK_LIFT, KICK_SPEED, PITCH_HALF_LENGTH, PITCH_HALF_WIDTH, PITCH_RUN_OFF, PLAYER_HEIGHT,
    PLAYER_RADIUS,
};
use crate::core::vec3::FixedVec3;
use crate::game::entity::{BallState, PlayerHandle, PlayerState, Registry};
use crate::game::possession::TouchType;

/// Check if two ground circles overlap.
#[inline]
pub fn circles_overlap(pos_a: FixedVec3, radius_a: Fixed, pos_b: FixedVec3, radius_b: Fixed) -> bool {
    let combined = radius_a + radius_b;
    pos_a.flat().distance_squared(pos_b.flat()) <= fixed_mul(combined, combined)
}

// =============================================================================
// HUMANOID - HUMANOID
// =============================================================================

/// One push received by a player from one opponent in a single tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerBounce {
    /// Player doing the pushing
    pub opponent: PlayerHandle,
    /// Displacement magnitude away from `opponent`
    pub force: Fixed,
}

/// Bounces accumulated per player during one tick.
pub type BounceMap = BTreeMap<PlayerHandle, Vec<PlayerBounce>>;

/// Find every overlapping pair of active players and record the bounce on
/// both sides.
pub fn collect_player_bounces(registry: &Registry) -> BounceMap {
    let players: Vec<&PlayerState> = registry.all_players().filter(|p| p.active).collect();
    let mut bounces = BounceMap::new();

    for i in 0..players.len() {
        for j in (i + 1)..players.len() {
            let (a, b) = (players[i], players[j]);
            if !circles_overlap(a.position, PLAYER_RADIUS, b.position, PLAYER_RADIUS) {
                continue;
            }
            let depth = (PLAYER_RADIUS * 2) - a.position.flat_distance(b.position);
            if depth <= 0 {
                continue;
            }
            let force = fixed_mul(depth, BOUNCE_FACTOR);
            bounces.entry(a.handle).or_default().push(PlayerBounce { opponent: b.handle, force });
            bounces.entry(b.handle).or_default().push(PlayerBounce { opponent: a.handle, force });
        }
    }

    bounces
}

/// Direction pushing `player` away from `opponent`. Coincident players are
/// separated along x by handle order.
fn away_from(player: &PlayerState, opponent: &PlayerState) -> FixedVec3 {
    let dir = (player.position - opponent.position).flat().normalize();
    if dir != FixedVec3::ZERO {
        return dir;
    }
    if player.handle < opponent.handle {
        FixedVec3::X.negate()
    } else {
        FixedVec3::X
    }
}

/// Sum each player's bounces into a single displacement, using positions
/// from before any displacement was applied.
pub fn bounce_displacements(registry: &Registry, bounces: &BounceMap) -> BTreeMap<PlayerHandle, FixedVec3> {
    let mut out = BTreeMap::new();
    for (handle, list) in bounces {
        let Some(player) = registry.player(*handle) else { continue };
        let total = list.iter().fold(FixedVec3::ZERO, |acc, bounce| {
            match registry.player(bounce.opponent) {
                Some(opponent) => acc + away_from(player, opponent).scale(bounce.force),
                None => acc,
            }
        });
        out.insert(*handle, total);
    }
    out
}

/// Run the humanoid pass. Returns the number of players displaced.
pub fn resolve_player_collisions(registry: &mut Registry) -> usize {
    let bounces = collect_player_bounces(registry);
    if bounces.is_empty() {
        return 0;
    }
    let moves = bounce_displacements(registry, &bounces);
    for (handle, delta) in &moves {
        if let Some(player) = registry.player_mut(*handle) {
            player.position = (player.position + *delta)
                .flat()
                .clamp_xy(PITCH_HALF_LENGTH + PITCH_RUN_OFF, PITCH_HALF_WIDTH + PITCH_RUN_OFF);
        }
    }
    moves.len()
}

// =============================================================================
// HUMANOID - BALL
// =============================================================================

/// What a player was trying to do with the ball this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactIntent {
    /// Kick pressed: launch the ball along facing
    Kick,
    /// Controlled and moving: carry the ball
    Dribble,
}

/// Intents gathered in the controller step, keyed by player.
pub type ContactIntents = BTreeMap<PlayerHandle, ContactIntent>;

/// A registered ball touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BallContact {
    /// Player that touched the ball
    pub player: PlayerHandle,
    /// Classification of the touch
    pub touch: TouchType,
}

/// Whether the ball overlaps a player's body cylinder.
#[inline]
pub fn ball_touches_player(ball: &BallState, player: &PlayerState) -> bool {
    ball.position.z - BALL_RADIUS <= PLAYER_HEIGHT
        && circles_overlap(ball.position, BALL_RADIUS, player.position, PLAYER_RADIUS)
}

/// Run the humanoid-ball pass.
///
/// The first active player in handle order that overlaps the ball takes the
/// touch; nobody else can touch it again until `throttle_ms` has passed
/// since `last_contact_ms`.
pub fn resolve_ball_contact(
    registry: &mut Registry,
    intents: &ContactIntents,
    now_ms: u64,
    last_contact_ms: &mut Option<u64>,
    throttle_ms: u64,
) -> Option<BallContact> {
    if let Some(last) = *last_contact_ms {
        if now_ms.saturating_sub(last) < throttle_ms {
            return None;
        }
    }

    let ball = registry.ball;
    let toucher = registry
        .all_players()
        .filter(|p| p.active)
        .find(|p| ball_touches_player(&ball, p))?
        .clone();

    let touch = match intents.get(&toucher.handle) {
        Some(ContactIntent::Kick) => {
            kick(&mut registry.ball, &toucher);
            TouchType::IntentionalKicked
        }
        Some(ContactIntent::Dribble) => {
            dribble(&mut registry.ball, &toucher);
            TouchType::IntentionalNonKicked
        }
        None => {
            deflect(&mut registry.ball, &toucher);
            TouchType::Accidental
        }
    };

    *last_contact_ms = Some(now_ms);
    Some(BallContact { player: toucher.handle, touch })
}

/// Normal from the player's axis to the ball, in the ground plane.
fn contact_normal(ball: &BallState, player: &PlayerState) -> FixedVec3 {
    let n = (ball.position - player.position).flat().normalize();
    if n == FixedVec3::ZERO { player.facing } else { n }
}

/// Place the ball on the surface of the player's cylinder along `normal`.
fn push_out(ball: &mut BallState, player: &PlayerState, normal: FixedVec3) {
    let surface = player.position.flat() + normal.scale(PLAYER_RADIUS + BALL_RADIUS);
    ball.position.x = surface.x;
    ball.position.y = surface.y;
}

fn kick(ball: &mut BallState, player: &PlayerState) {
    push_out(ball, player, player.facing);
    let mut velocity = player.facing.scale(KICK_SPEED);
    velocity.z = KICK_LIFT;
    ball.velocity = velocity;
}

fn dribble(ball: &mut BallState, player: &PlayerState) {
    push_out(ball, player, player.facing);
    ball.velocity = player.velocity.flat().scale(DRIBBLE_FACTOR);
}

fn deflect(ball: &mut BallState, player: &PlayerState) {
    let normal = contact_normal(ball, player);
    push_out(ball, player, normal);

    let relative = ball.velocity - player.velocity;
    let along = relative.flat().dot(normal);
    if along < 0 {
        let impulse = fixed_mul(along, FIXED_ONE + BALL_RESTITUTION);
        ball.velocity = ball.velocity - normal.scale(impulse);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;
    use crate::game::entity::tests::registry;
    use crate::game::entity::TeamId;

    /// Deactivate everyone, then place the listed players.
    fn arrange(registry: &mut Registry, placed: &[(PlayerHandle, f64, f64)]) {
        for player in registry.all_players_mut() {
            player.active = false;
        }
        for (handle, x, y) in placed {
            let player = registry.player_mut(*handle).unwrap();
            player.active = true;
            player.position = FixedVec3::ground(to_fixed(*x), to_fixed(*y));
        }
    }

    fn h(team: TeamId, index: u16) -> PlayerHandle {
        PlayerHandle::new(team, index)
    }

    #[test]
    fn test_circles_overlap() {
        let a = FixedVec3::ground(0, 0);
        let b = FixedVec3::ground(to_fixed(0.8), 0);
        assert!(circles_overlap(a, PLAYER_RADIUS, b, PLAYER_RADIUS));
        let c = FixedVec3::ground(to_fixed(1.0), 0);
        assert!(!circles_overlap(a, PLAYER_RADIUS, c, PLAYER_RADIUS));
    }

    #[test]
    fn test_pair_separates_symmetrically() {
        let mut reg = registry();
        let a = h(TeamId::First, 0);
        let b = h(TeamId::Second, 0);
        arrange(&mut reg, &[(a, 0.0, 0.0), (b, 0.5, 0.0)]);

        assert_eq!(resolve_player_collisions(&mut reg), 2);

        let pa = reg.player(a).unwrap().position;
        let pb = reg.player(b).unwrap().position;
        assert!(pa.x < 0);
        assert!(pb.x > to_fixed(0.5));
        // Overlap of 0.4 m split evenly
        assert!((pb.x - pa.x - PLAYER_RADIUS * 2).abs() < 256);
    }

    #[test]
    fn test_simultaneous_bounces_are_combined() {
        let mut reg = registry();
        let target = h(TeamId::First, 5);
        let left = h(TeamId::Second, 1);
        let below = h(TeamId::Second, 2);
        arrange(&mut reg, &[(target, 0.0, 0.0), (left, -0.6, 0.0), (below, 0.0, -0.6)]);

        let bounces = collect_player_bounces(&reg);
        assert_eq!(bounces[&target].len(), 2);
        let moves = bounce_displacements(&reg, &bounces);

        resolve_player_collisions(&mut reg);
        let moved = reg.player(target).unwrap().position;

        // Pushed away from both opponents, not only the last one processed
        assert!(moved.x > 0, "x displacement missing: {:?}", moved);
        assert!(moved.y > 0, "y displacement missing: {:?}", moved);
        assert_eq!(moved, moves[&target]);
        // Each push is half of the 0.3 m overlap
        let expected = fixed_mul(PLAYER_RADIUS * 2 - to_fixed(0.6), BOUNCE_FACTOR);
        assert!((moved.x - expected).abs() < 256);
        assert!((moved.y - expected).abs() < 256);
    }

    #[test]
    fn test_coincident_players_split_along_x() {
        let mut reg = registry();
        let a = h(TeamId::First, 0);
        let b = h(TeamId::First, 1);
        arrange(&mut reg, &[(a, 10.0, 10.0), (b, 10.0, 10.0)]);
        resolve_player_collisions(&mut reg);
        assert!(reg.player(a).unwrap().position.x < to_fixed(10.0));
        assert!(reg.player(b).unwrap().position.x > to_fixed(10.0));
    }

    #[test]
    fn test_inactive_players_ignored() {
        let mut reg = registry();
        let a = h(TeamId::First, 0);
        let b = h(TeamId::First, 1);
        arrange(&mut reg, &[(a, 0.0, 0.0), (b, 0.3, 0.0)]);
        reg.player_mut(b).unwrap().active = false;
        assert_eq!(resolve_player_collisions(&mut reg), 0);
    }

    #[test]
    fn test_first_team_wins_simultaneous_contact() {
        let mut reg = registry();
        let home = h(TeamId::First, 4);
        let away = h(TeamId::Second, 0);
        arrange(&mut reg, &[(home, -0.4, 0.0), (away, 0.4, 0.0)]);

        let mut last = None;
        let contact = resolve_ball_contact(&mut reg, &ContactIntents::new(), 100, &mut last, 50).unwrap();
        assert_eq!(contact.player, home);
        assert_eq!(contact.touch, TouchType::Accidental);
        assert_eq!(last, Some(100));
    }

    #[test]
    fn test_roster_order_within_team() {
        let mut reg = registry();
        let early = h(TeamId::Second, 1);
        let late = h(TeamId::Second, 7);
        arrange(&mut reg, &[(late, -0.3, 0.0), (early, 0.3, 0.0)]);
        let mut last = None;
        let contact = resolve_ball_contact(&mut reg, &ContactIntents::new(), 0, &mut last, 50).unwrap();
        assert_eq!(contact.player, early);
    }

    #[test]
    fn test_contact_throttle() {
        let mut reg = registry();
        let p = h(TeamId::First, 0);
        arrange(&mut reg, &[(p, 0.3, 0.0)]);

        let mut last = Some(90);
        assert!(resolve_ball_contact(&mut reg, &ContactIntents::new(), 100, &mut last, 50).is_none());
        assert_eq!(last, Some(90));

        reg.ball = BallState::kick_off();
        assert!(resolve_ball_contact(&mut reg, &ContactIntents::new(), 140, &mut last, 50).is_some());
        assert_eq!(last, Some(140));
    }

    #[test]
    fn test_kick_launches_ball_along_facing() {
        let mut reg = registry();
        let p = h(TeamId::First, 0);
        arrange(&mut reg, &[(p, -0.3, 0.0)]);
        reg.player_mut(p).unwrap().facing = FixedVec3::X;

        let mut intents = ContactIntents::new();
        intents.insert(p, ContactIntent::Kick);
        let mut last = None;
        let contact = resolve_ball_contact(&mut reg, &intents, 0, &mut last, 0).unwrap();

        assert_eq!(contact.touch, TouchType::IntentionalKicked);
        assert_eq!(reg.ball.velocity.x, KICK_SPEED);
        assert_eq!(reg.ball.velocity.z, KICK_LIFT);
    }

    #[test]
    fn test_dribble_carries_ball() {
        let mut reg = registry();
        let p = h(TeamId::Second, 3);
        arrange(&mut reg, &[(p, 0.3, 0.0)]);
        {
            let player = reg.player_mut(p).unwrap();
            player.facing = FixedVec3::X.negate();
            player.velocity = FixedVec3::ground(to_fixed(-4.0), 0);
        }
        let mut intents = ContactIntents::new();
        intents.insert(p, ContactIntent::Dribble);
        let mut last = None;
        let contact = resolve_ball_contact(&mut reg, &intents, 0, &mut last, 0).unwrap();

        assert_eq!(contact.touch, TouchType::IntentionalNonKicked);
        assert!(reg.ball.velocity.x < to_fixed(-4.0));
        assert!(reg.ball.position.x < to_fixed(0.3));
    }

    #[test]
    fn test_deflection_reverses_incoming_ball() {
        let mut reg = registry();
        let p = h(TeamId::First, 0);
        arrange(&mut reg, &[(p, 0.5, 0.0)]);
        reg.ball.velocity = FixedVec3::ground(to_fixed(10.0), 0);

        let mut last = None;
        resolve_ball_contact(&mut reg, &ContactIntents::new(), 0, &mut last, 0).unwrap();
        assert!(reg.ball.velocity.x < 0);
    }

    #[test]
    fn test_high_ball_passes_over() {
        let mut reg = registry();
        let p = h(TeamId::First, 0);
        arrange(&mut reg, &[(p, 0.0, 0.0)]);
        reg.ball.position.z = to_fixed(3.0);
        let mut last = None;
        assert!(resolve_ball_contact(&mut reg, &ContactIntents::new(), 0, &mut last, 0).is_none());
    }
}
