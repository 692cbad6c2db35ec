//! tutorly-adapt — Difficulty adaptation and learning analytics.
//!
//! Everything here is a pure function over plain values; the database
//! layer loads rows, calls in, and persists the result inside its own
//! transaction.

pub mod analytics;
pub mod engagement;
pub mod normalise;
pub mod progress;
pub mod scorer;
pub mod streak;
pub mod weights;

pub use analytics::{anomalies, summarize, trend, Anomaly, PerformanceSummary, Trend, TrendDirection};
pub use engagement::engagement_level;
pub use progress::{calculate_session_progress, SessionProgress};
pub use scorer::{composite_score, recommend, AdaptationParams, Recommendation, RecommendationReason, SessionSample};
pub use streak::{update_learning_streak, StreakState, StreakUpdate};
pub use weights::WeightVector;
