//! Composite performance score and difficulty recommendation.
//!
//! S(session) = w_a·accuracy + w_t·time + w_h·hints + w_m·mistakes
//!
//! Sessions inside the rolling window are bucketed by difficulty. The
//! hardest bucket whose mean S falls in the optimal-challenge band wins;
//! otherwise the overall mean is thresholded against fixed cutoffs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tutorly_common::Difficulty;
use tutorly_config::AdaptationConfig;

use crate::normalise::{hint_score, mistake_score, time_score};
use crate::weights::WeightVector;

/// One completed problem session, as the scorer sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSample {
    pub difficulty: Difficulty,
    /// 0.0–1.0
    pub accuracy: f64,
    pub time_spent_seconds: f64,
    pub hints_used: u32,
    pub mistakes: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AdaptationParams {
    pub weights: WeightVector,
    pub window_days: i64,
    pub max_sessions: usize,
    pub optimal_low: f64,
    pub optimal_high: f64,
    pub max_hints: u32,
    pub max_mistakes: u32,
    /// Overall-mean cutoffs for VeryHard, Hard and Medium, in that order.
    pub cutoffs: [f64; 3],
}

impl Default for AdaptationParams {
    fn default() -> Self {
        Self::from(&AdaptationConfig::default())
    }
}

impl From<&AdaptationConfig> for AdaptationParams {
    fn from(cfg: &AdaptationConfig) -> Self {
        Self {
            weights: WeightVector::from(&cfg.weights),
            window_days: cfg.window_days,
            max_sessions: cfg.max_sessions,
            optimal_low: cfg.optimal_low,
            optimal_high: cfg.optimal_high,
            max_hints: cfg.max_hints,
            max_mistakes: cfg.max_mistakes,
            cutoffs: cfg.cutoffs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    /// No completed sessions inside the window.
    NoHistory,
    /// A difficulty bucket sits inside the optimal-challenge band.
    OptimalChallenge,
    /// No bucket qualified; overall mean thresholded.
    OverallThreshold,
}

impl RecommendationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationReason::NoHistory        => "no_history",
            RecommendationReason::OptimalChallenge => "optimal_challenge",
            RecommendationReason::OverallThreshold => "overall_threshold",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketScore {
    pub difficulty: Difficulty,
    pub sessions: usize,
    pub mean_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub difficulty: Difficulty,
    /// Share of the session cap actually observed, 0.0–1.0
    pub confidence: f64,
    pub reason: RecommendationReason,
    pub overall_mean: Option<f64>,
    pub buckets: Vec<BucketScore>,
}

impl Recommendation {
    /// The answer when nothing is known about the student.
    pub fn no_history() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            confidence: 0.0,
            reason: RecommendationReason::NoHistory,
            overall_mean: None,
            buckets: Vec::new(),
        }
    }
}

/// Compute the composite score S for one session. Result is in [0, 1].
pub fn composite_score(sample: &SessionSample, params: &AdaptationParams) -> f64 {
    let components = [
        sample.accuracy.clamp(0.0, 1.0),
        time_score(sample.time_spent_seconds, sample.difficulty),
        hint_score(sample.hints_used, params.max_hints),
        mistake_score(sample.mistakes, params.max_mistakes),
    ];

    components
        .iter()
        .zip(params.weights.as_array().iter())
        .map(|(n, w)| n * w)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// Sessions completed within the window, newest first, capped at `max_sessions`.
pub fn select_window<'a>(
    samples: &'a [SessionSample],
    now: DateTime<Utc>,
    params: &AdaptationParams,
) -> Vec<&'a SessionSample> {
    let since = now - Duration::days(params.window_days);
    let mut window: Vec<&SessionSample> = samples
        .iter()
        .filter(|s| s.completed_at >= since && s.completed_at <= now)
        .collect();
    window.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    window.truncate(params.max_sessions);
    window
}

/// Mean composite score per difficulty bucket, easiest first.
pub fn bucket_means(window: &[&SessionSample], params: &AdaptationParams) -> Vec<BucketScore> {
    let mut sums: BTreeMap<Difficulty, (f64, usize)> = BTreeMap::new();
    for sample in window {
        let entry = sums.entry(sample.difficulty).or_insert((0.0, 0));
        entry.0 += composite_score(sample, params);
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(difficulty, (sum, n))| BucketScore {
            difficulty,
            sessions: n,
            mean_score: sum / n as f64,
        })
        .collect()
}

/// Map an overall mean score to a difficulty using the configured cutoffs.
pub fn threshold_difficulty(overall_mean: f64, cutoffs: [f64; 3]) -> Difficulty {
    let [very_hard, hard, medium] = cutoffs;
    if overall_mean >= very_hard {
        Difficulty::VeryHard
    } else if overall_mean >= hard {
        Difficulty::Hard
    } else if overall_mean >= medium {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    }
}

/// Recommend the difficulty that keeps a student in the optimal-challenge band.
pub fn recommend(
    samples: &[SessionSample],
    now: DateTime<Utc>,
    params: &AdaptationParams,
) -> Recommendation {
    let window = select_window(samples, now, params);
    if window.is_empty() {
        return Recommendation::no_history();
    }

    let buckets = bucket_means(&window, params);
    let total: f64 = buckets.iter().map(|b| b.mean_score * b.sessions as f64).sum();
    let overall_mean = total / window.len() as f64;
    let confidence = (window.len() as f64 / params.max_sessions.max(1) as f64).min(1.0);

    let optimal = buckets
        .iter()
        .filter(|b| b.mean_score >= params.optimal_low && b.mean_score <= params.optimal_high)
        .map(|b| b.difficulty)
        .max();

    let (difficulty, reason) = match optimal {
        Some(d) => (d, RecommendationReason::OptimalChallenge),
        None => (threshold_difficulty(overall_mean, params.cutoffs), RecommendationReason::OverallThreshold),
    };
    tracing::debug!(
        sessions = window.len(),
        overall_mean,
        recommended = %difficulty,
        reason = reason.as_str(),
        "difficulty recommendation computed"
    );

    Recommendation {
        difficulty,
        confidence,
        reason,
        overall_mean: Some(overall_mean),
        buckets,
    }
}
