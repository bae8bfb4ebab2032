//! Tier decision table, trend slope and score prediction

use std::fmt;

use serde::{Deserialize, Serialize};

use super::history::RollingHistory;
use crate::config::DifficultyConfig;

/// Absorbs float noise when a slope lands exactly on the decline threshold.
const TREND_EPSILON: f64 = 1e-9;

/// Discrete game complexity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DifficultyTier {
    #[serde(alias = "easy")]
    Easy,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "hard")]
    Hard,
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        })
    }
}

/// Summary statistics of a history window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Mean accuracy over the full window.
    pub average_accuracy: f64,
    /// OLS slope of accuracy vs. index over the most recent points.
    pub trend: f64,
}

impl HistoryStats {
    /// `None` while the history holds fewer than `min_records` entries.
    pub fn compute(history: &RollingHistory, config: &DifficultyConfig) -> Option<Self> {
        if history.len() < config.min_records.max(1) {
            return None;
        }
        let accuracies = history.accuracies();
        let average_accuracy = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
        Some(Self {
            average_accuracy,
            trend: trend(history, config.trend_window),
        })
    }
}

/// Ordinary least squares slope of accuracy against index over the last
/// `window` records. Positive means improving. Zero for fewer than two points.
pub fn trend(history: &RollingHistory, window: usize) -> f64 {
    let window = window.max(2);
    let skip = history.len().saturating_sub(window);
    let points: Vec<f64> = history.iter().skip(skip).map(|r| r.accuracy).collect();
    if points.len() < 2 {
        return 0.0;
    }

    let n = points.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = points.iter().sum::<f64>() / n;

    let (sxy, sxx) = points
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (i, y)| {
            let dx = i as f64 - mean_x;
            (sxy + dx * (y - mean_y), sxx + dx * dx)
        });

    if sxx == 0.0 { 0.0 } else { sxy / sxx }
}

/// Apply the hysteresis table to `current`.
///
/// Returns MEDIUM while there is not enough data.
pub fn recommend_difficulty(
    current: DifficultyTier,
    history: &RollingHistory,
    config: &DifficultyConfig,
) -> DifficultyTier {
    let Some(stats) = HistoryStats::compute(history, config) else {
        return DifficultyTier::Medium;
    };
    let improving = stats.trend >= -TREND_EPSILON;
    let declining = stats.trend <= config.decline_trend + TREND_EPSILON;
    let avg = stats.average_accuracy;

    match current {
        DifficultyTier::Easy => {
            if avg > config.easy_to_medium_accuracy && improving {
                DifficultyTier::Medium
            } else {
                DifficultyTier::Easy
            }
        }
        DifficultyTier::Medium => {
            if avg > config.medium_to_hard_accuracy && improving {
                DifficultyTier::Hard
            } else if avg < config.medium_to_easy_accuracy || declining {
                DifficultyTier::Easy
            } else {
                DifficultyTier::Medium
            }
        }
        DifficultyTier::Hard => {
            if avg < config.hard_to_medium_accuracy || declining {
                DifficultyTier::Medium
            } else {
                DifficultyTier::Hard
            }
        }
    }
}

/// Projected score in `[0, 100]`, extrapolating the trend
/// `prediction_horizon` attempts ahead. `None` with insufficient data.
pub fn predict_score(history: &RollingHistory, config: &DifficultyConfig) -> Option<f64> {
    let stats = HistoryStats::compute(history, config)?;
    let last = history.latest()?.accuracy * 100.0;
    let projected = last + stats.trend * 100.0 * config.prediction_horizon;
    Some(projected.clamp(0.0, 100.0))
}
