//! Human-readable labels for values shown in the UI.

use chrono::{DateTime, Utc};
use tutorly_common::{Difficulty, EngagementLevel};

/// `"1h 5m"`, `"4m 10s"` or `"45s"`. Negative input reads as zero.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// A 0..1 ratio as a whole percentage, e.g. `0.857` → `"86%"`.
pub fn format_percent(ratio: f64) -> String {
    if !ratio.is_finite() {
        return "0%".to_string();
    }
    format!("{:.0}%", (ratio * 100.0).clamp(0.0, 100.0))
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Relative time of `ts` as seen at `now`. Timestamps in the future read as
/// "just now"; anything older than a month is shown as a date.
pub fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(ts);
    let seconds = elapsed.num_seconds();

    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = elapsed.num_minutes();
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    match elapsed.num_days() {
        1 => "yesterday".to_string(),
        days @ 2..=6 => format!("{days} days ago"),
        days @ 7..=29 => plural(days / 7, "week"),
        _ => ts.format("%b %-d, %Y").to_string(),
    }
}

pub fn difficulty_label(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy     => "Easy",
        Difficulty::Medium   => "Medium",
        Difficulty::Hard     => "Hard",
        Difficulty::VeryHard => "Very hard",
    }
}

pub fn engagement_label(level: EngagementLevel) -> &'static str {
    match level {
        EngagementLevel::NeedsAttention => "Needs attention",
        EngagementLevel::Fair           => "Fair",
        EngagementLevel::Good           => "Good",
        EngagementLevel::Excellent      => "Excellent",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3900), "1h 5m");
        assert_eq!(format_duration(250), "4m 10s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.857), "86%");
        assert_eq!(format_percent(1.0), "100%");
        assert_eq!(format_percent(1.7), "100%");
        assert_eq!(format_percent(f64::NAN), "0%");
    }

    #[test]
    fn test_format_relative() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(format_relative(now - Duration::seconds(30), now), "just now");
        assert_eq!(format_relative(now + Duration::minutes(5), now), "just now");
        assert_eq!(format_relative(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(format_relative(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(format_relative(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(format_relative(now - Duration::hours(30), now), "yesterday");
        assert_eq!(format_relative(now - Duration::days(3), now), "3 days ago");
        assert_eq!(format_relative(now - Duration::days(15), now), "2 weeks ago");
        assert_eq!(format_relative(now - Duration::days(60), now), "Jan 20, 2024");
    }

    #[test]
    fn test_labels() {
        assert_eq!(difficulty_label(Difficulty::VeryHard), "Very hard");
        assert_eq!(engagement_label(EngagementLevel::NeedsAttention), "Needs attention");
    }
}
