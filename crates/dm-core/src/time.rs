//! ASS timestamp formatting.

/// Rounds a duration in seconds to the nearest centisecond.
pub(crate) fn round_centis(seconds: f64) -> f64 {
    centis(seconds) / 100.0
}

/// Whole centiseconds in `seconds`, rounding the exact binary value with ties
/// to even, the way two-decimal fixed formatting does.
///
/// `seconds * 100.0` can itself round onto or off a `.5`, so the residual of
/// the product decides ties.
fn centis(seconds: f64) -> f64 {
    let scaled = seconds * 100.0;
    let residual = seconds.mul_add(100.0, -scaled);
    let floor = scaled.floor();
    let fraction = scaled - floor;

    if !fraction.total_cmp(&0.5).is_eq() {
        return scaled.round();
    }
    if residual > 0.0 {
        floor + 1.0
    } else if residual < 0.0 {
        floor
    } else {
        scaled.round_ties_even()
    }
}

/// Formats seconds since stream start as an ASS time, `H:MM:SS.CC`.
///
/// The total is rounded to centiseconds before being split, so carries
/// propagate into the minutes and hours fields. ASS has no representation for
/// negative times; negative and non-finite inputs render as zero.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "input is clamped to a finite non-negative value first"
)]
pub fn format_ass_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let total_cs = centis(seconds) as u64;

    let cs = total_cs % 100;
    let total_seconds = total_cs / 100;
    let secs = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minutes = total_minutes % 60;
    let hours = total_minutes / 60;

    format!("{hours}:{minutes:02}:{secs:02}.{cs:02}")
}
