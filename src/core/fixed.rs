//! Q16.16 Fixed-Point Arithmetic
//!
//! Every length, speed and factor in the simulation is an `i32` with 16
//! fractional bits, so one unit is 1/65536 m (or m/s, or a plain ratio).
//! Products and quotients widen to `i64` and shift back. Floats appear only
//! in `to_fixed`, which is for constants and test setup.
//!
//! ```text
//!   value = raw / 65536        range ±32768 m     step ≈ 0.015 mm
//!   pitch diagonal ≈ 131 m  -> squared ≈ 17300, still inside i32
//! ```

/// Q16.16 value.
pub type Fixed = i32;

/// Fractional bits.
pub const FIXED_SCALE: i32 = 16;

/// 1.0
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE;

/// 0.5
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1;

// =============================================================================
// TIMING
// =============================================================================

/// Simulation step in milliseconds. Mental images are taken at this rate.
pub const TICK_MS: u64 = 10;

/// One tick in seconds, 0.01 rounded down to 655 raw
pub const TICK_DT: Fixed = 655;

// =============================================================================
// PITCH GEOMETRY (metres)
// =============================================================================

/// Half pitch length along x: 55.0 m
pub const PITCH_HALF_LENGTH: Fixed = 3604480;

/// Half pitch width along y: 36.0 m
pub const PITCH_HALF_WIDTH: Fixed = 2359296;

/// Run-off area players may use outside the lines: 5.0 m
pub const PITCH_RUN_OFF: Fixed = 327680;

/// Half the distance between the posts: 3.66 m
pub const GOAL_HALF_WIDTH: Fixed = 239861;

/// Crossbar height: 2.44 m
pub const GOAL_HEIGHT: Fixed = 159907;

/// Depth of the net behind the line: 2.0 m
pub const GOAL_DEPTH: Fixed = 131072;

/// Ball radius: 0.11 m
pub const BALL_RADIUS: Fixed = 7208;

/// Humanoid collision cylinder radius: 0.45 m
pub const PLAYER_RADIUS: Fixed = 29491;

/// Humanoid collision cylinder height: 1.8 m
pub const PLAYER_HEIGHT: Fixed = 117964;

// =============================================================================
// PHYSICS
// =============================================================================

/// Gravity: 9.81 m/s²
pub const GRAVITY: Fixed = 642908;

/// Vertical speed kept after a ground bounce: 0.6
pub const BALL_RESTITUTION: Fixed = 39321;

/// Per-tick horizontal damping while rolling: 0.99
pub const BALL_ROLL_DAMPING: Fixed = 64880;

/// Per-tick damping while airborne: 0.999
pub const BALL_AIR_DAMPING: Fixed = 65470;

/// Vertical speed below which a grounded ball stops bouncing: 0.5 m/s
pub const BALL_SETTLE_SPEED: Fixed = 32768;

/// Player run speed: 7.0 m/s
pub const RUN_SPEED: Fixed = 458752;

/// Player sprint speed: 9.0 m/s
pub const SPRINT_SPEED: Fixed = 589824;

/// Per-tick velocity decay for players without input: 0.9
pub const PLAYER_FRICTION: Fixed = 58982;

/// Horizontal kick speed: 20.0 m/s
pub const KICK_SPEED: Fixed = 1310720;

/// Vertical lift added to a kick: 3.0 m/s
pub const KICK_LIFT: Fixed = 196608;

/// Ball speed relative to the dribbling player: 1.15
pub const DRIBBLE_FACTOR: Fixed = 75366;

/// Share of the overlap depth each humanoid is pushed per bounce: 0.5
pub const BOUNCE_FACTOR: Fixed = 32768;

// =============================================================================
// ARITHMETIC
// =============================================================================

/// Literal to Q16.16. Constants and tests only; the tick loop never calls it.
///
/// ```
/// use pitch_match::core::fixed::{to_fixed, FIXED_ONE};
/// const PENALTY_SPOT: i32 = to_fixed(11.0);
/// assert_eq!(PENALTY_SPOT, 11 * FIXED_ONE);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// `a * b`, truncated toward negative infinity.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FIXED_SCALE) as Fixed
}

/// `a / b`; a zero divisor yields 0 rather than panicking.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0;
    }
    (((a as i64) << FIXED_SCALE) / b as i64) as Fixed
}

/// Square root by a fixed twelve Newton steps.
///
/// Non-positive input gives 0. Starting from `max(x / 2, 1.0)` converges
/// for everything between a ball radius and a squared pitch diagonal.
pub fn fixed_sqrt(x: Fixed) -> Fixed {
    if x <= 0 {
        return 0;
    }
    let mut root = (x >> 1).max(FIXED_ONE);
    for _ in 0..12 {
        root = (root.wrapping_add(fixed_div(x, root)) >> 1).max(1);
    }
    root
}

/// Magnitude; `i32::MIN` wraps to itself.
#[inline]
pub fn fixed_abs(x: Fixed) -> Fixed {
    x.wrapping_abs()
}

/// `value` limited to `[min, max]`.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    value.max(min).min(max)
}

/// Scale a millisecond count by a Q16.16 factor, keeping the fractional
/// remainder in `carry` (also Q16.16 milliseconds).
#[inline]
pub fn scale_ms(ms: u64, factor: Fixed, carry: &mut u64) -> u64 {
    let wide = ms * factor.max(0) as u64 + *carry;
    *carry = wide & (FIXED_ONE as u64 - 1);
    wide >> FIXED_SCALE
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_match_raw_constants() {
        assert_eq!(to_fixed(1.0), FIXED_ONE);
        assert_eq!(to_fixed(-0.5), -FIXED_HALF);
        assert_eq!(PITCH_HALF_LENGTH, to_fixed(55.0));
        assert_eq!(PITCH_HALF_WIDTH, to_fixed(36.0));
        assert_eq!(GOAL_DEPTH, to_fixed(2.0));
        assert_eq!(TICK_DT, FIXED_ONE / 100);
        assert!(GOAL_HALF_WIDTH < PITCH_HALF_WIDTH);
    }

    #[test]
    fn test_kick_arithmetic() {
        // 20 m/s for one tick is 0.2 m, within rounding
        let step = fixed_mul(KICK_SPEED, TICK_DT);
        assert!((step - to_fixed(0.2)).abs() < 16);
        assert_eq!(fixed_mul(to_fixed(-2.0), to_fixed(3.0)), to_fixed(-6.0));
        assert_eq!(fixed_div(to_fixed(110.0), to_fixed(2.0)), PITCH_HALF_LENGTH);
        assert_eq!(fixed_div(FIXED_ONE, 0), 0);
    }

    #[test]
    fn test_sqrt_across_pitch_scales() {
        for (square, root) in [(0.0121, 0.11), (0.25, 0.5), (4.0, 2.0), (12100.0, 110.0)] {
            let got = fixed_sqrt(to_fixed(square));
            assert!((got - to_fixed(root)).abs() < 100, "sqrt({}) = {}", square, got);
        }
        assert_eq!(fixed_sqrt(0), 0);
        assert_eq!(fixed_sqrt(-FIXED_ONE), 0);
    }

    #[test]
    fn test_abs_and_clamp() {
        assert_eq!(fixed_abs(-PLAYER_RADIUS), PLAYER_RADIUS);
        assert_eq!(fixed_clamp(to_fixed(60.0), -PITCH_HALF_LENGTH, PITCH_HALF_LENGTH), PITCH_HALF_LENGTH);
        assert_eq!(fixed_clamp(0, -FIXED_ONE, FIXED_ONE), 0);
    }

    #[test]
    fn test_scale_ms_carries_fraction() {
        let mut carry = 0;
        // 1.5x: two ticks of 10 ms give exactly 30 ms
        let factor = FIXED_ONE + FIXED_HALF;
        let a = scale_ms(10, factor, &mut carry);
        let b = scale_ms(10, factor, &mut carry);
        assert_eq!(a + b, 30);

        // 1/3 speed never loses time to truncation
        let third = fixed_div(FIXED_ONE, to_fixed(3.0));
        let mut carry = 0;
        let total: u64 = (0..300).map(|_| scale_ms(10, third, &mut carry)).sum();
        assert!((999..=1000).contains(&total), "got {}", total);
    }
}
