//! Session analytics: score trend, outlier sessions and per-subject summaries.

use serde::{Deserialize, Serialize};

use crate::scorer::{composite_score, AdaptationParams, SessionSample};

/// Minimum slope (score units per session) counted as movement.
pub const TREND_SLOPE_THRESHOLD: f64 = 0.01;
/// Minimum |r| for a slope to count as a trend rather than noise.
pub const TREND_CORRELATION_THRESHOLD: f64 = 0.3;
pub const DEFAULT_ANOMALY_Z: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub slope: f64,
    pub correlation: f64,
    pub direction: TrendDirection,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub index: usize,
    pub score: f64,
    pub z: f64,
}

/// Means over a set of completed sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub sessions: usize,
    pub avg_accuracy: f64,
    pub avg_composite: f64,
    pub avg_time_seconds: f64,
    pub avg_hints: f64,
    pub avg_mistakes: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Least-squares slope of `scores` against their index, with Pearson r.
/// `scores` must be in chronological order.
pub fn trend(scores: &[f64]) -> Trend {
    if scores.len() < 3 {
        return Trend {
            slope: 0.0,
            correlation: 0.0,
            direction: TrendDirection::Stable,
            insufficient_data: true,
        };
    }

    let n = scores.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = mean(scores);

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (i, y) in scores.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let correlation = if sxx > 0.0 && syy > 0.0 { sxy / (sxx * syy).sqrt() } else { 0.0 };

    let direction = if slope > TREND_SLOPE_THRESHOLD && correlation > TREND_CORRELATION_THRESHOLD {
        TrendDirection::Improving
    } else if slope < -TREND_SLOPE_THRESHOLD && correlation < -TREND_CORRELATION_THRESHOLD {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    Trend { slope, correlation, direction, insufficient_data: false }
}

/// Scores whose population z-score exceeds `threshold` in magnitude.
pub fn anomalies(scores: &[f64], threshold: f64) -> Vec<Anomaly> {
    if scores.len() < 2 {
        return Vec::new();
    }
    let mu = mean(scores);
    let variance = scores.iter().map(|s| (s - mu).powi(2)).sum::<f64>() / scores.len() as f64;
    let sd = variance.sqrt();
    if sd < 1e-12 {
        return Vec::new();
    }

    scores
        .iter()
        .enumerate()
        .filter_map(|(index, &score)| {
            let z = (score - mu) / sd;
            (z.abs() > threshold).then_some(Anomaly { index, score, z })
        })
        .collect()
}

pub fn summarize(samples: &[SessionSample], params: &AdaptationParams) -> PerformanceSummary {
    if samples.is_empty() {
        return PerformanceSummary::default();
    }
    let pick = |f: &dyn Fn(&SessionSample) -> f64| -> f64 {
        mean(&samples.iter().map(f).collect::<Vec<_>>())
    };

    PerformanceSummary {
        sessions: samples.len(),
        avg_accuracy: pick(&|s| s.accuracy),
        avg_composite: pick(&|s| composite_score(s, params)),
        avg_time_seconds: pick(&|s| s.time_spent_seconds),
        avg_hints: pick(&|s| f64::from(s.hints_used)),
        avg_mistakes: pick(&|s| f64::from(s.mistakes)),
    }
}
