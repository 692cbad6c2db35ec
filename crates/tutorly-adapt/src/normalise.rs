//! Normalisation of raw session measurements into [0, 1] sub-scores.
//! Every function returns 1.0 for the best possible outcome.

use tutorly_common::Difficulty;

/// Time a session may run past the expected time before the time
/// component bottoms out, as a multiple of the expected time.
pub const TIME_RATIO_CAP: f64 = 2.0;

/// Time component: finishing instantly scores 1.0, taking exactly the
/// expected time scores 0.5, taking twice as long or more scores 0.0.
pub fn time_score(time_spent_seconds: f64, difficulty: Difficulty) -> f64 {
    let ratio = (time_spent_seconds.max(0.0) / difficulty.expected_seconds()).min(TIME_RATIO_CAP);
    1.0 - ratio / TIME_RATIO_CAP
}

/// Hint component: no hints scores 1.0, `max_hints` or more scores 0.0.
pub fn hint_score(hints_used: u32, max_hints: u32) -> f64 {
    inverted_ratio(hints_used, max_hints)
}

/// Mistake component: no mistakes scores 1.0, `max_mistakes` or more scores 0.0.
pub fn mistake_score(mistakes: u32, max_mistakes: u32) -> f64 {
    inverted_ratio(mistakes, max_mistakes)
}

fn inverted_ratio(count: u32, cap: u32) -> f64 {
    if cap == 0 {
        return if count == 0 { 1.0 } else { 0.0 };
    }
    1.0 - (f64::from(count) / f64::from(cap)).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_score_anchors() {
        assert!((time_score(0.0, Difficulty::Medium) - 1.0).abs() < 1e-9);
        assert!((time_score(600.0, Difficulty::Medium) - 0.5).abs() < 1e-9);
        assert!((time_score(1200.0, Difficulty::Medium) - 0.0).abs() < 1e-9);
        assert!((time_score(99_999.0, Difficulty::Medium) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_score_scales_with_difficulty() {
        // 10 minutes is slow for an easy problem and quick for a very hard one
        assert!(time_score(600.0, Difficulty::VeryHard) > time_score(600.0, Difficulty::Easy));
    }

    #[test]
    fn test_hint_and_mistake_scores() {
        assert_eq!(hint_score(0, 5), 1.0);
        assert!((hint_score(2, 5) - 0.6).abs() < 1e-9);
        assert_eq!(hint_score(9, 5), 0.0);
        assert!((mistake_score(5, 10) - 0.5).abs() < 1e-9);
        assert_eq!(mistake_score(0, 0), 1.0);
        assert_eq!(mistake_score(1, 0), 0.0);
    }
}
