//! Strike-rate math.

use crate::models::{
    SignupTally, TallyFeedback, BELOW_TARGET_MESSAGE, MEETING_TARGET_MESSAGE,
};

/// Percentage of yes over yes + no, or 0 with no data.
pub fn percentage(yes: u64, no: u64) -> f64 {
    let total = yes + no;
    if total == 0 {
        0.0
    } else {
        yes as f64 / total as f64 * 100.0
    }
}

/// Current strike rate at full precision.
pub fn strike_rate(yes: u32, no: u32) -> f64 {
    percentage(yes as u64, no as u64)
}

/// Round half away from zero to 2 decimal places, for display and storage.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Smallest `k >= 0` with `(yes + k) / (yes + no + k) * 100 >= target`.
///
/// Returns 0 when the target is already met, there are no signups yet, or the
/// target is 100 or more (unreachable by adding yes signups).
///
/// Saturates at `u32::MAX` when the target needs more signups than a count
/// can hold; that value does not reach the target.
pub fn additional_yes_needed(yes: u32, no: u32, target: f64) -> u32 {
    let total = yes as u64 + no as u64;
    if total == 0 || !target.is_finite() || target >= 100.0 {
        return 0;
    }
    if strike_rate(yes, no) >= target {
        return 0;
    }

    let (yes_f, no_f) = (yes as f64, no as f64);
    let numerator = target * yes_f - 100.0 * yes_f + target * no_f;
    let closed_form = (numerator / (100.0 - target)).ceil();
    let mut k = if closed_form > 0.0 {
        closed_form.min(u32::MAX as f64) as u64
    } else {
        0
    };

    // The closed form can land one off when the exact answer is an integer
    // and float rounding pushes it across.
    let meets = |k: u64| percentage(yes as u64 + k, no as u64) >= target;
    while k > 0 && meets(k - 1) {
        k -= 1;
    }
    while !meets(k) && k < u32::MAX as u64 {
        k += 1;
    }

    k as u32
}

/// Live feedback for a complete tally.
pub fn evaluate(tally: &SignupTally) -> TallyFeedback {
    let strike_rate = round2(strike_rate(tally.yes_count, tally.no_count));
    let additional_yes_needed =
        additional_yes_needed(tally.yes_count, tally.no_count, tally.target_rate);
    let meets_target = strike_rate >= tally.target_rate;

    let hint = (!meets_target && additional_yes_needed > 0).then(|| {
        format!(
            "You need {} more YES signups to reach the target.",
            additional_yes_needed
        )
    });

    TallyFeedback {
        strike_rate,
        target_rate: tally.target_rate,
        additional_yes_needed,
        meets_target,
        progress_percent: strike_rate.clamp(0.0, 100.0),
        message: if meets_target {
            MEETING_TARGET_MESSAGE
        } else {
            BELOW_TARGET_MESSAGE
        }
        .to_string(),
        hint,
    }
}
