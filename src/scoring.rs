//! Dynamic challenge scoring.
//!
//! The value of a challenge decays quadratically from `initial` to `min`
//! over the first `decay` solves:
//!
//! ```text
//! value(r) = initial - floor((initial - min) * (r - 1)^2 / (decay - 1)^2)
//! ```
//!
//! Subtracting the floored drop is the same as taking the ceiling of the
//! continuous curve, so the result can never undershoot `min`.

use crate::types::Points;

/// Returns the value of a challenge once it has `solve_rank` solves.
///
/// `solve_rank` is the 1-based position of the latest solve, i.e. the solve
/// count after counting it. A rank of `0` (no solves yet) reports the
/// initial value.
///
/// ```
/// use ctfledger::scoring::dynamic_score;
///
/// assert_eq!(dynamic_score(500, 100, 20, 1), 500);
/// assert_eq!(dynamic_score(500, 100, 20, 20), 100);
/// assert_eq!(dynamic_score(500, 100, 20, 21), 100);
/// ```
pub fn dynamic_score(initial: Points, min: Points, decay: u64, solve_rank: u64) -> Points {
    if decay == 0 || solve_rank <= 1 {
        return initial.max(min);
    }
    if solve_rank >= decay {
        return min;
    }

    // 1 < solve_rank < decay, hence decay >= 3 and the divisor is non-zero.
    let span = i128::from(initial) - i128::from(min);
    if span <= 0 {
        return min;
    }
    let span = span.unsigned_abs();
    let step = u128::from(solve_rank - 1);
    let steps = u128::from(decay - 1);
    let drop = match (step * step).checked_mul(span) {
        Some(scaled) => scaled / (steps * steps),
        None => {
            let ratio = step as f64 / steps as f64;
            (span as f64 * ratio * ratio) as u128
        }
    };

    let value = i128::from(initial) - i128::try_from(drop).unwrap_or(i128::MAX);
    Points::try_from(value).unwrap_or(min).max(min)
}

/// Recomputes the value a challenge would have at `solve_count` solves.
pub fn value_at(challenge: &crate::ledger::Challenge, solve_count: u64) -> Points {
    if challenge.decay == 0 {
        return challenge.points;
    }
    dynamic_score(
        challenge.initial_value,
        challenge.min_value,
        challenge.decay,
        solve_count,
    )
}
