//! Engagement label from streak length and recency.

use chrono::NaiveDate;
use tutorly_common::EngagementLevel;

pub fn engagement_level(
    current_streak: i32,
    last_activity: Option<NaiveDate>,
    today: NaiveDate,
) -> EngagementLevel {
    let Some(last) = last_activity else {
        return EngagementLevel::NeedsAttention;
    };
    let idle_days = (today - last).num_days().max(0);

    if current_streak >= 7 && idle_days <= 1 {
        EngagementLevel::Excellent
    } else if current_streak >= 3 && idle_days <= 3 {
        EngagementLevel::Good
    } else if idle_days <= 7 {
        EngagementLevel::Fair
    } else {
        EngagementLevel::NeedsAttention
    }
}
