use crate::window::SlidingWindow;

/// Heat rate in degrees per hour from the window's first and last samples.
///
/// This is a two-point slope scaled by the window length, not an average of
/// per-step deltas, and it divides by the sample count rather than the number
/// of intervals between them. Fewer than two samples yields `0.0`.
pub fn heat_rate(window: &SlidingWindow, sample_interval_minutes: f32) -> f32 {
    let len = window.len();
    if len < 2 {
        return 0.0;
    }
    match (window.oldest(), window.newest()) {
        (Some(oldest), Some(newest)) => {
            (newest - oldest) * (60.0 / (sample_interval_minutes * len as f32))
        }
        _ => 0.0,
    }
}
