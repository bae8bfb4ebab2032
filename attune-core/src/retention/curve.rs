//! Personalized forgetting curve

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scheduler::RetentionProfile;
use crate::config::RetentionConfig;

/// Observed recall strengths are clamped into this range before taking logs.
const MIN_OBSERVED: f64 = 0.05;
const MAX_OBSERVED: f64 = 0.99;

/// One past review of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewed_at: DateTime<Utc>,
    /// Days since the previous review (0 for the first).
    pub elapsed_days: f64,
    /// Recall strength in `[0, 1]`.
    pub strength: f64,
    pub recalled: bool,
}

/// `retention(t) = initial_retention · e^(−decay_rate · t / consolidation_factor)`
///
/// Consolidation stretches the time axis: a well-consolidated trace decays
/// more slowly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForgettingCurve {
    pub initial_retention: f64,
    pub decay_rate: f64,
    pub consolidation_factor: f64,
    pub interference_resistance: f64,
}

impl ForgettingCurve {
    /// Predicted retention after `days`, in `[0, 1]`.
    pub fn retention_at(&self, days: f64) -> f64 {
        let days = days.max(0.0);
        let consolidation = self.consolidation_factor.max(f64::EPSILON);
        (self.initial_retention * (-self.decay_rate * days / consolidation).exp()).clamp(0.0, 1.0)
    }

    /// Days until retention falls to `target`. `None` if it never gets there
    /// (target at or above the initial retention, or non-positive).
    pub fn days_until(&self, target: f64) -> Option<f64> {
        if target <= 0.0 || target >= self.initial_retention || self.decay_rate <= 0.0 {
            return None;
        }
        Some(-(target / self.initial_retention).ln() * self.consolidation_factor / self.decay_rate)
    }
}

/// Fit decay, consolidation and interference resistance from an item's
/// review history.
///
/// Decay comes from reviews with a known elapsed time: each gives
/// `k = −ln(r / R0) / t`, scaled back through the current consolidation so the
/// fitted curve reproduces the observations. Consolidation grows with each
/// success and shrinks with each lapse. Interference resistance follows the
/// recall rate over long gaps. Without usable history the profile's own
/// parameters are kept.
pub fn personalized_forgetting_curve(
    profile: &RetentionProfile,
    history: &[ReviewRecord],
    config: &RetentionConfig,
) -> ForgettingCurve {
    let initial_retention = profile.initial_retention.clamp(f64::EPSILON, 1.0);

    let consolidation_factor = if history.is_empty() {
        profile.consolidation_factor
    } else {
        let (successes, lapses) = history.iter().fold((0u32, 0u32), |(s, l), r| {
            if r.recalled { (s + 1, l) } else { (s, l + 1) }
        });
        1.0 + config.consolidation_gain * f64::from(successes)
            - config.lapse_penalty * f64::from(lapses)
    }
    .clamp(config.min_consolidation, config.max_consolidation);

    let observed: Vec<f64> = history
        .iter()
        .filter(|r| r.elapsed_days > 0.0)
        .map(|r| {
            let strength = r.strength.clamp(MIN_OBSERVED, MAX_OBSERVED);
            let ratio = (strength / initial_retention).min(1.0);
            -ratio.ln() / r.elapsed_days
        })
        .collect();

    let decay_rate = if observed.is_empty() {
        profile.decay_rate
    } else {
        let mean = observed.iter().sum::<f64>() / observed.len() as f64;
        mean * consolidation_factor
    }
    .clamp(config.min_decay_rate, config.max_decay_rate);

    ForgettingCurve {
        initial_retention,
        decay_rate,
        consolidation_factor,
        interference_resistance: fit_interference_resistance(profile, history, config),
    }
}

/// Recall rate over reviews at least `long_interval_days` after the previous
/// one, mapped onto `default · (1 + gain · (2·rate − 1))`. All recalled gives
/// `default · (1 + gain)`, all lapsed `default · (1 − gain)`.
fn fit_interference_resistance(
    profile: &RetentionProfile,
    history: &[ReviewRecord],
    config: &RetentionConfig,
) -> f64 {
    let threshold = config.long_interval_days.max(f64::EPSILON);
    let (recalled, total) = history
        .iter()
        .filter(|r| r.elapsed_days >= threshold)
        .fold((0u32, 0u32), |(recalled, total), r| {
            (recalled + u32::from(r.recalled), total + 1)
        });

    if total == 0 {
        return profile.interference_resistance;
    }
    let rate = f64::from(recalled) / f64::from(total);
    (config.default_interference_resistance * (1.0 + config.interference_gain * (2.0 * rate - 1.0)))
        .clamp(config.min_interference_resistance, config.max_interference_resistance)
}

/// Review offsets in days for a curve: the base schedule scaled by
/// consolidation and interference resistance. Strictly increasing.
pub fn next_review_schedule(curve: &ForgettingCurve, config: &RetentionConfig) -> Vec<f64> {
    let scale = (curve.consolidation_factor * curve.interference_resistance).max(f64::EPSILON);

    let mut offsets = Vec::with_capacity(config.base_offsets_days.len());
    for base in &config.base_offsets_days {
        let last = offsets.last().copied().unwrap_or(0.0);
        // Skip misconfigured entries that would break monotonicity.
        if *base > 0.0 && base * scale > last {
            offsets.push(base * scale);
        }
    }
    if offsets.is_empty() {
        offsets.push(scale);
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> RetentionProfile {
        RetentionProfile::new("item", &RetentionConfig::default())
    }

    fn review(elapsed_days: f64, strength: f64, recalled: bool) -> ReviewRecord {
        ReviewRecord {
            reviewed_at: Utc::now(),
            elapsed_days,
            strength,
            recalled,
        }
    }

    #[test]
    fn no_history_uses_profile_defaults() {
        let config = RetentionConfig::default();
        let curve = personalized_forgetting_curve(&profile(), &[], &config);
        assert_eq!(curve.decay_rate, config.default_decay_rate);
        assert_eq!(curve.consolidation_factor, 1.0);
        assert_eq!(curve.initial_retention, config.default_initial_retention);
    }

    #[test]
    fn retention_decays_monotonically() {
        let curve = personalized_forgetting_curve(&profile(), &[], &RetentionConfig::default());
        let mut last = curve.retention_at(0.0);
        assert!((last - 0.9).abs() < 1e-12);
        for day in 1..30 {
            let r = curve.retention_at(day as f64);
            assert!(r < last);
            last = r;
        }
    }

    #[test]
    fn higher_consolidation_slows_decay() {
        let base = ForgettingCurve {
            initial_retention: 0.9,
            decay_rate: 0.3,
            consolidation_factor: 1.0,
            interference_resistance: 1.0,
        };
        let consolidated = ForgettingCurve {
            consolidation_factor: 2.0,
            ..base
        };
        assert!(consolidated.retention_at(5.0) > base.retention_at(5.0));
    }

    #[test]
    fn fitted_decay_reproduces_observation() {
        let config = RetentionConfig::default();
        // One success at consolidation 1.2: r(4) = 0.6
        let history = [review(4.0, 0.6, true)];
        let curve = personalized_forgetting_curve(&profile(), &history, &config);
        assert!((curve.consolidation_factor - 1.2).abs() < 1e-12);
        assert!((curve.retention_at(4.0) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn lapses_reduce_consolidation_to_floor() {
        let config = RetentionConfig::default();
        let history = [
            review(1.0, 0.0, false),
            review(1.0, 0.0, false),
            review(1.0, 0.0, false),
        ];
        let curve = personalized_forgetting_curve(&profile(), &history, &config);
        assert_eq!(curve.consolidation_factor, config.min_consolidation);
        assert!(curve.decay_rate <= config.max_decay_rate);
    }

    #[test]
    fn schedule_is_strictly_increasing_and_scaled() {
        let config = RetentionConfig::default();
        let curve = ForgettingCurve {
            initial_retention: 0.9,
            decay_rate: 0.3,
            consolidation_factor: 1.5,
            interference_resistance: 1.0,
        };
        let schedule = next_review_schedule(&curve, &config);
        assert_eq!(schedule.len(), config.base_offsets_days.len());
        assert!((schedule[0] - 1.5).abs() < 1e-12);
        assert!(schedule.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn schedule_skips_non_increasing_base_offsets() {
        let config = RetentionConfig {
            base_offsets_days: vec![1.0, 3.0, 3.0, 2.0, 7.0],
            ..Default::default()
        };
        let curve = personalized_forgetting_curve(&profile(), &[], &config);
        assert_eq!(next_review_schedule(&curve, &config), vec![1.0, 3.0, 7.0]);
    }

    #[test]
    fn recall_over_long_gaps_sets_interference_resistance() {
        let config = RetentionConfig::default();

        let resistant = [review(5.0, 0.8, true), review(8.0, 0.7, true)];
        let curve = personalized_forgetting_curve(&profile(), &resistant, &config);
        assert!((curve.interference_resistance - 1.5).abs() < 1e-12);

        let mixed = [review(5.0, 0.8, true), review(8.0, 0.1, false)];
        let curve = personalized_forgetting_curve(&profile(), &mixed, &config);
        assert!((curve.interference_resistance - 1.0).abs() < 1e-12);

        let fragile = [review(4.0, 0.1, false)];
        let curve = personalized_forgetting_curve(&profile(), &fragile, &config);
        assert!((curve.interference_resistance - 0.5).abs() < 1e-12);
    }

    #[test]
    fn short_gaps_keep_profile_resistance() {
        let config = RetentionConfig::default();
        let mut seeded = profile();
        seeded.interference_resistance = 1.3;
        let history = [review(1.0, 0.8, true), review(2.0, 0.1, false)];
        let curve = personalized_forgetting_curve(&seeded, &history, &config);
        assert_eq!(curve.interference_resistance, 1.3);
    }

    #[test]
    fn schedule_scales_with_interference_resistance() {
        let config = RetentionConfig::default();
        let base = ForgettingCurve {
            initial_retention: 0.9,
            decay_rate: 0.3,
            consolidation_factor: 1.0,
            interference_resistance: 1.0,
        };
        let resistant = ForgettingCurve {
            interference_resistance: 1.5,
            ..base
        };
        let plain = next_review_schedule(&base, &config);
        let stretched = next_review_schedule(&resistant, &config);
        assert_eq!(plain.len(), stretched.len());
        for (p, s) in plain.iter().zip(&stretched) {
            assert!((s - p * 1.5).abs() < 1e-9);
        }
    }

    #[test]
    fn days_until_inverts_retention() {
        let curve = ForgettingCurve {
            initial_retention: 0.9,
            decay_rate: 0.2,
            consolidation_factor: 1.3,
            interference_resistance: 1.0,
        };
        let days = curve.days_until(0.5).unwrap();
        assert!((curve.retention_at(days) - 0.5).abs() < 1e-9);
        assert_eq!(curve.days_until(0.95), None);
    }
}
