//! Session progress shown while a student works through a problem.

use serde::{Deserialize, Serialize};
use tutorly_common::SessionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    /// 0.0–100.0, one decimal place
    pub percent: f64,
    pub remaining_steps: i32,
    pub is_complete: bool,
}

pub fn calculate_session_progress(
    total_steps: i32,
    completed_steps: i32,
    status: SessionStatus,
) -> SessionProgress {
    let total = total_steps.max(0);
    let done = completed_steps.clamp(0, total);

    if status == SessionStatus::Completed {
        return SessionProgress { percent: 100.0, remaining_steps: 0, is_complete: true };
    }
    if total == 0 {
        return SessionProgress { percent: 0.0, remaining_steps: 0, is_complete: false };
    }

    let percent = (f64::from(done) / f64::from(total) * 1000.0).round() / 10.0;
    SessionProgress {
        percent: percent.min(100.0),
        remaining_steps: total - done,
        is_complete: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_progress_rounded() {
        let p = calculate_session_progress(3, 1, SessionStatus::InProgress);
        assert_eq!(p.percent, 33.3);
        assert_eq!(p.remaining_steps, 2);
        assert!(!p.is_complete);
    }

    #[test]
    fn test_completed_forces_full() {
        let p = calculate_session_progress(5, 2, SessionStatus::Completed);
        assert_eq!(p.percent, 100.0);
        assert!(p.is_complete);
    }

    #[test]
    fn test_zero_steps() {
        assert_eq!(calculate_session_progress(0, 0, SessionStatus::InProgress).percent, 0.0);
        assert_eq!(calculate_session_progress(0, 0, SessionStatus::Completed).percent, 100.0);
    }

    #[test]
    fn test_overcount_capped() {
        let p = calculate_session_progress(4, 9, SessionStatus::InProgress);
        assert_eq!(p.percent, 100.0);
        assert_eq!(p.remaining_steps, 0);
    }
}
