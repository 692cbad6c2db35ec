//! Daily learning streaks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub state: StreakState,
    /// False for a same-day repeat; nothing needs to be written.
    pub changed: bool,
    /// True when an existing streak was broken by a gap.
    pub reset: bool,
}

/// Advance a streak for activity on `today`.
///
/// Consecutive-day activity extends the streak by one, a gap resets it to
/// one, and a second call on the same day leaves it untouched.
pub fn update_learning_streak(previous: Option<StreakState>, today: NaiveDate) -> StreakUpdate {
    let Some(prev) = previous else {
        return StreakUpdate {
            state: StreakState { current_streak: 1, longest_streak: 1, last_activity_date: Some(today) },
            changed: true,
            reset: false,
        };
    };

    let (current, reset) = match prev.last_activity_date {
        Some(last) if last == today => {
            return StreakUpdate { state: prev, changed: false, reset: false };
        }
        // Clock skew: activity dated before the last recorded day.
        Some(last) if last > today => {
            return StreakUpdate { state: prev, changed: false, reset: false };
        }
        Some(last) if (today - last).num_days() == 1 => (prev.current_streak + 1, false),
        Some(_) => (1, prev.current_streak > 0),
        None => (1, false),
    };

    StreakUpdate {
        state: StreakState {
            current_streak: current,
            longest_streak: prev.longest_streak.max(current),
            last_activity_date: Some(today),
        },
        changed: true,
        reset,
    }
}

/// Streak lengths that earn a milestone notification.
pub const MILESTONES: [i32; 5] = [3, 7, 14, 30, 100];

pub fn is_milestone(streak: i32) -> bool {
    MILESTONES.contains(&streak)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn state(current: i32, longest: i32, last: u32) -> StreakState {
        StreakState { current_streak: current, longest_streak: longest, last_activity_date: Some(d(last)) }
    }

    #[test]
    fn test_first_activity_starts_at_one() {
        let u = update_learning_streak(None, d(5));
        assert_eq!(u.state.current_streak, 1);
        assert_eq!(u.state.longest_streak, 1);
        assert!(u.changed);
    }

    #[test]
    fn test_consecutive_day_increments() {
        let u = update_learning_streak(Some(state(4, 4, 4)), d(5));
        assert_eq!(u.state.current_streak, 5);
        assert_eq!(u.state.longest_streak, 5);
        assert_eq!(u.state.last_activity_date, Some(d(5)));
    }

    #[test]
    fn test_gap_resets_to_one_keeps_longest() {
        let u = update_learning_streak(Some(state(6, 9, 2)), d(5));
        assert_eq!(u.state.current_streak, 1);
        assert_eq!(u.state.longest_streak, 9);
        assert!(u.reset);
    }

    #[test]
    fn test_same_day_unchanged() {
        let before = state(3, 3, 5);
        let u = update_learning_streak(Some(before), d(5));
        assert_eq!(u.state, before);
        assert!(!u.changed);
    }

    #[test]
    fn test_month_boundary_is_consecutive() {
        let prev = StreakState {
            current_streak: 2,
            longest_streak: 2,
            last_activity_date: NaiveDate::from_ymd_opt(2026, 2, 28),
        };
        let u = update_learning_streak(Some(prev), d(1));
        assert_eq!(u.state.current_streak, 3);
    }

    #[test]
    fn test_milestones() {
        assert!(is_milestone(7));
        assert!(!is_milestone(8));
    }
}
